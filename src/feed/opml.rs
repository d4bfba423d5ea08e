use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::util::is_http_url;

/// Maximum allowed nesting depth for outline elements. Caps memory spent on
/// maliciously deep documents.
const MAX_OUTLINE_DEPTH: usize = 50;

/// Errors that can occur while scanning an OPML document.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// Outline nesting depth exceeds the safety limit
    #[error("Outline nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
    /// The root element is not `<opml>`
    #[error("Not an OPML document")]
    NotOpml,
    /// XML parsing failed
    #[error("XML parse error: {0}")]
    XmlParse(String),
}

/// Extract every feed URL (`xmlUrl` attribute) from an OPML document.
///
/// Outlines may nest arbitrarily under the depth cap; folder outlines
/// (those without `xmlUrl`) are traversed but contribute nothing.
/// Non-http(s) URLs are dropped.
///
/// XXE is structurally impossible here: quick-xml (0.37) never expands
/// `<!ENTITY>` declarations, and `decode_and_unescape_value()` resolves
/// only the five XML builtins.
pub fn extract_feed_urls(content: &str) -> Result<Vec<String>, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if !saw_root {
                    if e.name().as_ref() != b"opml" {
                        return Err(OpmlError::NotOpml);
                    }
                    saw_root = true;
                } else if e.name().as_ref() == b"outline" {
                    depth += 1;
                    if depth > MAX_OUTLINE_DEPTH {
                        return Err(OpmlError::MaxDepthExceeded(MAX_OUTLINE_DEPTH));
                    }
                    if let Some(url) = xml_url_attribute(&e, &reader)? {
                        urls.push(url);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if !saw_root {
                    return Err(OpmlError::NotOpml);
                }
                // Self-closing outline doesn't affect depth
                if e.name().as_ref() == b"outline" {
                    if let Some(url) = xml_url_attribute(&e, &reader)? {
                        urls.push(url);
                    }
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    if !saw_root {
        return Err(OpmlError::NotOpml);
    }
    Ok(urls)
}

fn xml_url_attribute(
    element: &BytesStart,
    reader: &Reader<&[u8]>,
) -> Result<Option<String>, OpmlError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        if attr.key.as_ref() == b"xmlUrl" {
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| OpmlError::XmlParse(e.to_string()))?;
            if is_http_url(&value) {
                return Ok(Some(value.into_owned()));
            }
            tracing::warn!(url = %value, "Skipping outline with non-http URL");
            return Ok(None);
        }
    }
    Ok(None)
}
