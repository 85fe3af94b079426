pub mod cookies;
pub mod hash;
pub mod html;
pub mod jwt;
