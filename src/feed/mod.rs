//! Feed retrieval: HTTP fetch, RSS parsing, publish-date normalization.

mod fetcher;
mod parser;
mod pubdate;

pub use fetcher::{fetch_feed, FetchError};
pub use parser::{parse_document, RawChannel, RawFeedDocument, RawItem};
pub use pubdate::{normalize_pub_date, PubDateError};
