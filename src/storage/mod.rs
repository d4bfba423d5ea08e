mod articles;
mod authors;
mod feeds;
mod read_states;
mod schema;
mod subscriptions;
mod types;
mod users;

pub use schema::Database;
pub use types::{Article, Author, DatabaseError, Feed, ReadState};
