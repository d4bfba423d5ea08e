use chrono::{DateTime, Utc};
use feed_rs::parser;
use thiserror::Error;

/// Errors that can occur while parsing feed bytes.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Bytes are not recognizable RSS, Atom, or JSON Feed
    #[error("Not a recognized feed format: {0}")]
    Malformed(#[from] feed_rs::parser::ParseFeedError),
}

/// A parsed feed document, normalized across formats.
///
/// Every field except `entries` is optional: downstream code decides what a
/// missing value means, the parser never substitutes placeholders.
#[derive(Debug, Clone)]
pub struct Channel {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub icon_url: Option<String>,
    pub entries: Vec<Item>,
}

/// One entry of a parsed channel.
///
/// `updated` is carried as a plain `Option`: an item either has an update
/// stamp or it does not, and callers branch on that, never on the source
/// format. Entries without a link are kept (with `url: None`) so the
/// reconciler can count and report them.
#[derive(Debug, Clone)]
pub struct Item {
    pub url: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub author: Option<ItemAuthor>,
}

#[derive(Debug, Clone)]
pub struct ItemAuthor {
    pub name: String,
    pub email: Option<String>,
}

/// Parse raw feed bytes into a normalized [`Channel`].
pub fn parse_channel(bytes: &[u8]) -> Result<Channel, ParseError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone());
            let summary = entry.summary.map(|s| s.content);
            let content = entry.content.and_then(|c| c.body);
            let author = entry
                .authors
                .into_iter()
                .find(|p| !p.name.trim().is_empty())
                .map(|p| ItemAuthor {
                    name: p.name,
                    email: p.email,
                });

            Item {
                url,
                title: entry.title.map(|t| t.content),
                summary,
                content,
                published: entry.published,
                updated: entry.updated,
                author,
            }
        })
        .collect();

    Ok(Channel {
        title: feed.title.map(|t| t.content),
        description: feed.description.map(|d| d.content),
        image_url: feed.logo.map(|l| l.uri),
        icon_url: feed.icon.map(|i| i.uri),
        entries,
    })
}
