//! feedrake: a command-line RSS aggregator.
//!
//! Users register, follow feeds, and `feedrake agg` polls the
//! oldest-unfetched feed on an interval, persisting deduplicated posts
//! to SQLite.

pub mod agg;
pub mod cli;
pub mod commands;
pub mod feed;
pub mod session;
pub mod storage;
