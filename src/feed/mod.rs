pub mod discovery;
pub mod fetcher;
pub mod opml;
pub mod parser;
pub mod reconciler;
pub mod refresh;

pub use fetcher::FetchError;
pub use parser::{Channel, Item, ItemAuthor};
pub use reconciler::ReconcileStats;
pub use refresh::RefreshOutcome;
