use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "feedrake",
    about = "Follow RSS feeds and aggregate their posts from the command line",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// The closed set of subcommands. Dispatch is a `match` in `main`, so an
/// unhandled variant is a compile error rather than a missing map entry.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a user and log in as them
    Register {
        /// Username to create
        name: String,
    },

    /// Switch the current user
    Login {
        /// Username to log in as
        name: String,
    },

    /// Delete all users, feeds and posts
    Reset,

    /// List registered users
    Users,

    /// Run the aggregation loop until interrupted
    Agg {
        /// Polling interval, e.g. "1m30s" (default 5m)
        interval: Option<String>,
    },

    /// Register a feed and follow it
    #[command(name = "addfeed")]
    AddFeed {
        /// Display name for the feed
        name: String,
        /// Feed URL
        url: String,
    },

    /// List all feeds and their owners
    Feeds,

    /// Follow an existing feed by URL
    Follow {
        /// Feed URL
        url: String,
    },

    /// List feeds the current user follows
    Following,

    /// Stop following a feed
    Unfollow {
        /// Feed URL
        url: String,
    },

    /// Show recent posts from followed feeds
    Browse {
        /// Maximum number of posts to show
        #[arg(default_value_t = 2)]
        limit: i64,
    },
}
