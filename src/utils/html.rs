/// Strips markup that could execute in a browser from user-written text.
///
/// Whitelist based (ammonia): harmless formatting such as `<b>` survives,
/// `<script>`, `<iframe>` and event-handler attributes are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_keeps_formatting() {
        let cleaned = clean_html("<b>hi</b><script>alert(1)</script><img src=x onerror=alert(1)>");
        assert!(cleaned.contains("<b>hi</b>"));
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("onerror"));
    }
}
