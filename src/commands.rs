//! Subcommand handlers: thin glue between the CLI, the session and storage.
//!
//! Handlers that need identity go through [`require_user`], the explicit
//! stand-in for "logged-in" middleware: the session is passed in, never
//! read from global state.

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::agg::{self, Aggregator};
use crate::session::Session;
use crate::storage::{Database, StorageError, User};

/// Resolve the session's current user against the store.
async fn require_user(db: &Database, session: &Session) -> Result<User> {
    let name = session.current_user()?;
    match db.get_user_by_name(name).await {
        Ok(user) => Ok(user),
        Err(StorageError::NotFound) => {
            bail!("user '{name}' no longer exists; register or log in again")
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn register(db: &Database, session: &mut Session, name: &str) -> Result<()> {
    let user = match db.create_user(name).await {
        Ok(user) => user,
        Err(StorageError::Duplicate) => bail!("user '{name}' already exists"),
        Err(e) => return Err(e.into()),
    };
    session.set_user(Some(&user.name))?;
    println!("User '{}' created and logged in.", user.name);
    Ok(())
}

pub async fn login(db: &Database, session: &mut Session, name: &str) -> Result<()> {
    let user = match db.get_user_by_name(name).await {
        Ok(user) => user,
        Err(StorageError::NotFound) => bail!("user '{name}' does not exist"),
        Err(e) => return Err(e.into()),
    };
    session.set_user(Some(&user.name))?;
    println!("{} is now logged in.", user.name);
    Ok(())
}

pub async fn reset(db: &Database, session: &mut Session) -> Result<()> {
    db.delete_all_users().await?;
    session.set_user(None)?;
    println!("Database reset; previous user logged out.");
    Ok(())
}

pub async fn users(db: &Database, session: &Session) -> Result<()> {
    let users = db.list_users().await?;
    if users.is_empty() {
        println!("No users registered yet.");
        return Ok(());
    }
    let current = session.user_name();
    for user in users {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

/// Run the aggregation loop until a cycle fails or Ctrl-C is pressed.
pub async fn agg(db: &Database, interval: Option<&str>) -> Result<()> {
    let interval = agg::parse_interval(interval)?;
    let aggregator = Aggregator::new(db.clone(), reqwest::Client::new(), interval);

    let cancel = CancellationToken::new();
    {
        // Ctrl-C cancels the in-flight fetch and stops the loop cleanly
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    aggregator.run(cancel).await?;
    Ok(())
}

pub async fn add_feed(db: &Database, session: &Session, name: &str, url: &str) -> Result<()> {
    let user = require_user(db, session).await?;
    validate_url(url)?;

    let feed = match db.create_feed(name, url, user.id).await {
        Ok(feed) => feed,
        Err(StorageError::Duplicate) => bail!("a feed with URL '{url}' already exists"),
        Err(e) => return Err(e.into()),
    };
    // The creator always follows their own feed
    match db.create_follow(user.id, feed.id).await {
        Ok(()) | Err(StorageError::Duplicate) => {}
        Err(e) => return Err(e.into()),
    }

    println!("Feed '{}' added and followed.", feed.name);
    Ok(())
}

pub async fn feeds(db: &Database) -> Result<()> {
    let feeds = db.list_feeds_with_owners().await?;
    if feeds.is_empty() {
        println!("No feeds yet; add one with `feedrake addfeed <name> <url>`.");
        return Ok(());
    }
    for feed in feeds {
        println!("{}  {}  (added by {})", feed.name, feed.url, feed.owner);
    }
    Ok(())
}

pub async fn follow(db: &Database, session: &Session, url: &str) -> Result<()> {
    let user = require_user(db, session).await?;
    validate_url(url)?;

    let feed = match db.get_feed_by_url(url).await {
        Ok(feed) => feed,
        Err(StorageError::NotFound) => {
            bail!("feed '{url}' does not exist; add it with `feedrake addfeed`")
        }
        Err(e) => return Err(e.into()),
    };
    match db.create_follow(user.id, feed.id).await {
        Ok(()) => println!("{} is now following '{}'.", user.name, feed.name),
        Err(StorageError::Duplicate) => {
            println!("{} already follows '{}'.", user.name, feed.name)
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn following(db: &Database, session: &Session) -> Result<()> {
    let user = require_user(db, session).await?;
    let names = db.follows_for_user(user.id).await?;
    if names.is_empty() {
        println!("Not following any feeds yet; use `feedrake follow <url>`.");
        return Ok(());
    }
    println!("Currently following:");
    for name in names {
        println!(" - {name}");
    }
    Ok(())
}

pub async fn unfollow(db: &Database, session: &Session, url: &str) -> Result<()> {
    let user = require_user(db, session).await?;
    let feed = match db.get_feed_by_url(url).await {
        Ok(feed) => feed,
        Err(StorageError::NotFound) => bail!("feed '{url}' does not exist"),
        Err(e) => return Err(e.into()),
    };
    match db.delete_follow(user.id, feed.id).await {
        Ok(()) => println!("Unfollowed '{}'.", feed.name),
        Err(StorageError::NotFound) => bail!("you are not following '{}'", feed.name),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn browse(db: &Database, session: &Session, limit: i64) -> Result<()> {
    let user = require_user(db, session).await?;
    let posts = db.posts_for_user(user.id, limit).await?;
    if posts.is_empty() {
        println!("No posts yet; run `feedrake agg` to fetch some.");
        return Ok(());
    }
    for post in posts {
        let published = chrono::DateTime::from_timestamp(post.published_at, 0)
            .map(|t| t.to_rfc2822())
            .unwrap_or_else(|| post.published_at.to_string());
        println!();
        println!("Title: {}", post.title);
        println!("URL: {}", post.url);
        println!("Published: {published}");
        match post.description {
            Some(description) => println!("Description:\n{description}"),
            None => println!("Description: N/A"),
        }
    }
    Ok(())
}

fn validate_url(raw: &str) -> Result<()> {
    if url::Url::parse(raw).is_err() {
        bail!("invalid URL: {raw}");
    }
    Ok(())
}
