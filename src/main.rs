use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidings::app::AppContext;
use tidings::cli::{commands, Cli, Commands, ConfigAction, DaemonAction, FeedAction};
use tidings::domain::MarkAction;
use tidings::sync::SyncType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut ctx = AppContext::new(cli.config.clone(), cli.database.clone())?;

    match cli.command {
        Commands::Login {
            url,
            username,
            password,
        } => {
            commands::login(&mut ctx, &url, &username, &password).await?;
        }
        Commands::Status => {
            commands::status(&ctx).await?;
        }
        Commands::Sync {
            initial,
            changes_only,
        } => {
            let sync_type = if changes_only {
                SyncType::ChangesOnly
            } else {
                SyncType::Full { initial }
            };
            commands::run_sync(&mut ctx, sync_type).await?;
        }
        Commands::More { node, offset } => {
            commands::load_more(&mut ctx, &node, offset).await?;
        }
        Commands::Folders { unread } => {
            commands::list_folders(&ctx, unread)?;
        }
        Commands::Feeds { node, unread } => {
            commands::list_feeds(&ctx, node.as_deref(), unread)?;
        }
        Commands::Items { node, unread } => {
            commands::list_items(&mut ctx, node.as_deref(), unread)?;
        }
        Commands::Show { item_id, html } => {
            commands::show_item(&mut ctx, item_id, html.as_deref())?;
        }
        Commands::Read { item_ids } => {
            commands::mark(&ctx, &item_ids, MarkAction::MarkRead)?;
        }
        Commands::Unread { item_ids } => {
            commands::mark(&ctx, &item_ids, MarkAction::MarkUnread)?;
        }
        Commands::Star { item_ids } => {
            commands::mark(&ctx, &item_ids, MarkAction::MarkStarred)?;
        }
        Commands::Unstar { item_ids } => {
            commands::mark(&ctx, &item_ids, MarkAction::MarkUnstarred)?;
        }
        Commands::Feed { action } => match action {
            FeedAction::Add { url, folder } => {
                commands::feed_add(&mut ctx, &url, folder).await?;
            }
            FeedAction::Remove { feed_id } => {
                commands::feed_remove(&mut ctx, feed_id).await?;
            }
            FeedAction::Move { feed_id, folder } => {
                commands::feed_move(&mut ctx, feed_id, folder).await?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => {
                commands::config_get(&ctx, key.as_deref())?;
            }
            ConfigAction::Set { key, value } => {
                commands::config_set(&mut ctx, &key, &value)?;
            }
        },
        Commands::Daemon { action } => match action {
            DaemonAction::Start {
                interval,
                no_initial_sync,
            } => {
                commands::daemon_start(ctx, interval.as_deref(), no_initial_sync).await?;
            }
            DaemonAction::Stop => {
                commands::daemon_stop()?;
            }
            DaemonAction::Status => {
                commands::daemon_status()?;
            }
        },
        Commands::Reset => {
            commands::reset(&mut ctx)?;
        }
    }

    Ok(())
}
