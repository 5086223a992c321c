//! Keys of the `options` table touched by installation and the auth gate

/// `"true"` once installation finished
pub const IS_INSTALLED: &str = "is_installed";
pub const BLOG_TITLE: &str = "blog_title";
pub const BLOG_URL: &str = "blog_url";
/// RFC 3339 timestamp of installation
pub const BIRTHDAY: &str = "birthday";
