mod db;
mod feeds;
mod posts;
mod types;
mod users;

pub use db::Database;
pub use types::{Feed, FeedWithOwner, NewPost, Post, StorageError, User};
