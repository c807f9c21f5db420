//! The aggregation loop: claim a feed, fetch it, persist its posts.
//!
//! One sequential timeline: each tick claims the single feed whose
//! `last_fetched_at` is oldest (never-fetched feeds first), fetches and
//! parses it, normalizes every item's publish date and inserts the posts,
//! deduplicating by link. The first cycle runs immediately; later cycles
//! run once per interval. Any cycle failure stops the loop; there is no
//! automatic resumption.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::feed::{fetch_feed, normalize_pub_date, FetchError, PubDateError};
use crate::storage::{Database, NewPost, StorageError};

/// Polling interval used when `agg` is given no duration argument.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum AggError {
    /// The interval argument is not a valid positive duration string.
    #[error("invalid polling interval {raw:?}: {reason}")]
    Config { raw: String, reason: String },

    /// The store has no feeds to claim.
    #[error("no feeds to fetch; add one with `feedrake addfeed`")]
    NoFeeds,

    /// Fetching the claimed feed failed.
    #[error("fetching {url}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// An item's publish date matched the timestamp pattern but failed to
    /// parse, which points at malformed upstream data.
    #[error("feed {url} has a malformed publish date {raw:?}")]
    PubDate {
        url: String,
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Any non-duplicate storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Validate an optional interval argument before the loop starts ticking.
///
/// Accepts humantime syntax (`"1m30s"`, `"10ms"`, `"5m"`). `None` means
/// the 5-minute default. Malformed or zero durations fail fast with
/// [`AggError::Config`].
pub fn parse_interval(arg: Option<&str>) -> Result<Duration, AggError> {
    let Some(raw) = arg else {
        return Ok(DEFAULT_INTERVAL);
    };
    let interval = humantime::parse_duration(raw).map_err(|e| AggError::Config {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    if interval.is_zero() {
        return Err(AggError::Config {
            raw: raw.to_string(),
            reason: "interval must be positive".to_string(),
        });
    }
    Ok(interval)
}

/// Drives periodic feed polling against one store.
pub struct Aggregator {
    db: Database,
    client: reqwest::Client,
    interval: Duration,
}

impl Aggregator {
    pub fn new(db: Database, client: reqwest::Client, interval: Duration) -> Self {
        Self {
            db,
            client,
            interval,
        }
    }

    /// Run until a cycle fails or `cancel` fires.
    ///
    /// The first cycle starts immediately; each later cycle starts one
    /// interval after the previous tick. Cancellation between ticks
    /// returns `Ok(())`; cancellation mid-fetch surfaces as a
    /// [`FetchError::Cancelled`] cycle failure.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), AggError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "starting aggregation");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("aggregation stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            self.run_once(&cancel).await?;
        }
    }

    /// One aggregation cycle: claim, fetch, normalize, persist.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<(), AggError> {
        let feed = self
            .db
            .claim_next_feed(Utc::now().timestamp())
            .await?
            .ok_or(AggError::NoFeeds)?;

        tracing::info!(feed = %feed.url, "fetching feed");
        let document = fetch_feed(&self.client, &feed.url, cancel)
            .await
            .map_err(|source| AggError::Fetch {
                url: feed.url.clone(),
                source,
            })?;

        let mut inserted = 0usize;
        let mut duplicates = 0usize;

        for item in document.channel.items {
            let published_at = match normalize_pub_date(&item.pub_date) {
                Ok(ts) => ts,
                // No timestamp found at all: fall back to ingestion time
                Err(PubDateError::NoMatch) => Utc::now(),
                Err(PubDateError::Parse(source)) => {
                    return Err(AggError::PubDate {
                        url: feed.url.clone(),
                        raw: item.pub_date,
                        source,
                    });
                }
            };

            let description = if item.description.is_empty() {
                None
            } else {
                Some(item.description)
            };
            let post = NewPost {
                feed_id: feed.id,
                title: item.title,
                url: item.link,
                description,
                published_at: published_at.timestamp(),
            };

            match self.db.insert_post(&post).await {
                Ok(_) => inserted += 1,
                // The same item reappears across polling cycles; skipping
                // it is the dedup contract, not a failure
                Err(StorageError::Duplicate) => duplicates += 1,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(feed = %feed.url, inserted, duplicates, "cycle complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interval_uses_default() {
        assert_eq!(parse_interval(None).unwrap(), DEFAULT_INTERVAL);
    }

    #[test]
    fn go_style_durations_are_accepted() {
        assert_eq!(
            parse_interval(Some("1m30s")).unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_interval(Some("10ms")).unwrap(),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn malformed_interval_is_a_config_error() {
        assert!(matches!(
            parse_interval(Some("soon")),
            Err(AggError::Config { .. })
        ));
        assert!(matches!(
            parse_interval(Some("-5m")),
            Err(AggError::Config { .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            parse_interval(Some("0s")),
            Err(AggError::Config { .. })
        ));
    }
}
