use url::Url;

/// Returns true if the URL carries an absolute `http` or `https` scheme.
///
/// Anything else (relative paths, `file://`, `ftp://`) is rejected before any
/// network or storage work happens.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolves an item URL that may be relative to its feed's origin.
///
/// Feeds sometimes publish item links like `/posts/42` relative to their own
/// host. Absolute `http`/`https` URLs pass through unchanged; anything else is
/// rebuilt as `scheme://host/` + remainder using the feed URL's origin, after
/// stripping a single leading `/`. No dot-segment resolution is performed.
///
/// Pure function: no I/O, no side effects. If the feed URL itself cannot be
/// parsed (it is validated at subscribe time, so this is unexpected), the item
/// URL is returned as-is.
pub fn normalize_item_url(item_url: &str, feed_url: &str) -> String {
    if is_http_url(item_url) {
        return item_url.to_owned();
    }

    let parsed = match Url::parse(feed_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(feed_url = %feed_url, error = %e, "Unparseable feed URL, leaving item URL unresolved");
            return item_url.to_owned();
        }
    };
    let host = match parsed.host_str() {
        Some(host) => host,
        None => {
            tracing::warn!(feed_url = %feed_url, "Feed URL has no host, leaving item URL unresolved");
            return item_url.to_owned();
        }
    };

    let remainder = item_url.strip_prefix('/').unwrap_or(item_url);
    format!("{}://{}/{}", parsed.scheme(), host, remainder)
}
