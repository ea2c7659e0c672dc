pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tidings")]
#[command(about = "A headless Nextcloud News sync client", long_about = None)]
pub struct Cli {
    /// Path to an alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to an alternate database file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to a News server and detect the API level
    Login {
        /// Server root URL, e.g. https://cloud.example.com/
        url: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Show server status and account information
    Status,
    /// Synchronize with the server
    Sync {
        /// Discard incremental state and fetch everything from scratch
        #[arg(long)]
        initial: bool,

        /// Only upload pending read/star changes
        #[arg(long)]
        changes_only: bool,
    },
    /// Fetch another page of older items for a node
    More {
        /// Node notation: feed:ID, folder:ID or starred
        node: String,

        /// Number of items already shown
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// List folders
    Folders {
        /// Only folders containing unread items
        #[arg(long)]
        unread: bool,
    },
    /// List feeds
    Feeds {
        /// Restrict to a node (folder:ID, starred, fresh)
        node: Option<String>,

        /// Only feeds with unread items
        #[arg(long)]
        unread: bool,
    },
    /// List items for a node (default: all)
    Items {
        /// Node notation: all, starred, fresh, feed:ID, folder:ID
        node: Option<String>,

        /// Only unread items
        #[arg(long)]
        unread: bool,
    },
    /// Print an article and mark it read
    Show {
        item_id: i64,

        /// Write the article as a standalone HTML file instead
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Mark items as read
    Read { item_ids: Vec<i64> },
    /// Mark items as unread
    Unread { item_ids: Vec<i64> },
    /// Star items
    Star { item_ids: Vec<i64> },
    /// Remove the star from items
    Unstar { item_ids: Vec<i64> },
    /// Manage feed subscriptions
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },
    /// Read or change preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Background daemon for periodic syncs and change retries
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Wipe the local cache and incremental sync state
    Reset,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one preference, or all of them
    Get { key: Option<String> },
    /// Change a preference, e.g. `config set list.order descending`
    Set { key: String, value: String },
}

#[derive(Subcommand)]
pub enum FeedAction {
    /// Subscribe to a feed
    Add {
        url: String,

        /// Folder to file the feed under (0 = root)
        #[arg(long, default_value_t = 0)]
        folder: i64,
    },
    /// Unsubscribe from a feed
    Remove { feed_id: i64 },
    /// Move a feed to another folder
    Move { feed_id: i64, folder: i64 },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Run the daemon in the foreground
    Start {
        /// Full sync interval (e.g. "30m", "1h", "1d"); defaults to the
        /// configured value
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the sync normally run on startup
        #[arg(long)]
        no_initial_sync: bool,
    },
    /// Stop a running daemon
    Stop,
    /// Check whether a daemon is running
    Status,
}
