//! # Tidings
//!
//! A headless sync client for Nextcloud/ownCloud News servers.
//!
//! ## Architecture
//!
//! ```text
//! API (v1-2 | v2) → Sync → Store → CLI
//! ```
//!
//! - [`api`]: versioned REST clients behind one trait, negotiated at login
//! - [`sync`]: flush-first orchestration of full, delta and load-more syncs
//! - [`store`]: SQLite cache with denormalized counters and an outbox
//! - [`cli`]: command-line front end over the same operations a UI would run
//!
//! ## Quick start
//!
//! ```bash
//! # Log in (detects the API level)
//! tidings login https://cloud.example.com/ -u jane -p secret
//!
//! # Fetch everything
//! tidings sync
//!
//! # Browse and read
//! tidings items all --unread
//! tidings show 1234
//!
//! # Keep syncing in the background
//! tidings daemon start
//! ```

/// Application context and error types.
///
/// [`AppContext`](app::AppContext) wires together the store, the loaded
/// configuration and an API client built from stored credentials.
pub mod app;

/// REST clients for the News API.
///
/// - [`NewsApi`](api::NewsApi): version-independent trait
/// - [`ApiV12`](api::v12::ApiV12): classic v1-2 endpoints
/// - [`ApiV2`](api::v2::ApiV2): combined ETag sync endpoint
pub mod api;

/// Command-line interface using clap.
pub mod cli;

/// TOML configuration: credentials, list preferences, sync cadence, article
/// theme, and the mutable sync state (API level, ETag).
pub mod config;

/// Background daemon: periodic full syncs plus a five-minute retry tick for
/// pending local changes.
pub mod daemon;

/// Core domain models.
///
/// - [`Folder`](domain::Folder), [`Feed`](domain::Feed), [`Item`](domain::Item)
/// - [`TreeNode`](domain::TreeNode): navigation nodes including the
///   unread/starred/fresh pseudo-folders
/// - [`MarkAction`](domain::MarkAction): the four outbound state changes
pub mod domain;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): trait defining cache operations
/// - [`SqliteStore`](store::SqliteStore): rusqlite implementation
pub mod store;

/// Sync orchestration: outbox flush, merge, counter recompute, eviction.
pub mod sync;

/// String and color helpers shared by decoding and rendering.
pub mod util;
