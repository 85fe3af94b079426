//! Preview metadata for links pasted into the post editor.

use serde::Serialize;
use url::Url;
use webpage::HTML;

use crate::error::AppError;

/// Only this much of a page is read; metadata lives in `<head>`.
const MAX_HTML_BYTES: usize = 512 * 1024;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LinkMeta {
    pub title: String,
    pub description: String,
    pub image: LinkImage,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct LinkImage {
    pub url: String,
}

/// Checks that `raw` is an absolute http(s) URL.
pub fn parse_target(raw: &str) -> Result<Url, AppError> {
    let parsed = Url::parse(raw).map_err(|_| AppError::BadRequest("Invalid URL".to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(AppError::BadRequest("Invalid URL".to_string())),
    }
}

/// Fetches `target` and extracts its preview metadata.
///
/// The client carries the request timeout. The body is read in chunks and
/// cut off at `MAX_HTML_BYTES`.
pub async fn fetch(client: &reqwest::Client, target: Url) -> Result<LinkMeta, reqwest::Error> {
    let mut response = client
        .get(target.clone())
        .send()
        .await?
        .error_for_status()?;

    let mut html_bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = MAX_HTML_BYTES - html_bytes.len();
        if chunk.len() >= room {
            html_bytes.extend_from_slice(&chunk[..room]);
            break;
        }
        html_bytes.extend_from_slice(&chunk);
    }

    Ok(extract(&html_bytes, &target))
}

/// Reads `<title>`, `meta[name=description]` and the first `og:image`.
///
/// Relative image URLs are resolved against `page_url`. Unparsable pages give
/// empty metadata.
pub fn extract(html_bytes: &[u8], page_url: &Url) -> LinkMeta {
    let html = String::from_utf8_lossy(html_bytes).into_owned();
    let page = match HTML::from_string(html, None) {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!(url = %page_url, "unparsable link preview page: {}", e);
            return LinkMeta::default();
        }
    };

    let image = page
        .opengraph
        .images
        .first()
        .and_then(|og| page_url.join(&og.url).ok())
        .map(String::from)
        .unwrap_or_default();

    LinkMeta {
        title: page.title.map(|t| t.trim().to_string()).unwrap_or_default(),
        description: page
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default(),
        image: LinkImage { url: image },
    }
}
