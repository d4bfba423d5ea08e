//! Small shared utilities.
//!
//! Currently only URL handling: resolving feed-relative item URLs and the
//! scheme check used before any network fetch.

mod url;

pub use url::{is_http_url, normalize_item_url};
