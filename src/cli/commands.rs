use std::path::Path;

use chrono::{TimeZone, Utc};

use crate::app::{AppContext, Result, TidingsError};
use crate::config::ChangeAction;
use crate::daemon::{self, Daemon, DaemonConfig};
use crate::domain::{MarkAction, TreeNode};
use crate::store::{SortSpec, Store};
use crate::sync::{self, SyncOutcome, SyncType};
use crate::util::{clean_string, css_color, parse_color};

pub async fn login(ctx: &mut AppContext, url: &str, username: &str, password: &str) -> Result<()> {
    let outcome = crate::api::login(url, username, password).await?;

    ctx.config.server.url = Some(url.to_string());
    ctx.config.server.username = Some(username.to_string());
    ctx.config.server.password = Some(password.to_string());
    ctx.config.state.api_level = Some(outcome.level.as_str().to_string());
    ctx.config.state.etag = None;
    ctx.save_config()?;

    if let Some(user) = &outcome.status.user {
        ctx.store.set_user(user)?;
    }

    println!("Logged in to {} using API {}", url, outcome.level.as_str());
    if let Some(version) = outcome.status.version {
        println!("Server version: {}", version);
    }
    if outcome.status.improperly_configured_cron {
        println!("Warning: the server cron job is improperly configured");
    }

    Ok(())
}

pub async fn status(ctx: &AppContext) -> Result<()> {
    let api = ctx.api()?;
    let status = api.status().await?;

    match status.version {
        Some(version) => println!("Server version: {}", version),
        None => println!("Server version: unknown"),
    }
    if status.improperly_configured_cron {
        println!("Warning: the server cron job is improperly configured");
    }

    if let Some(user) = status.user.or(ctx.store.get_user()?) {
        println!("Account: {} ({})", user.display_name(), user.user_id);
    }

    let pending = ctx.store.pending_changes()?;
    if !pending.is_empty() {
        println!("{} local change(s) waiting for upload", pending.len());
    }

    Ok(())
}

pub async fn run_sync(ctx: &mut AppContext, sync_type: SyncType) -> Result<()> {
    let api = ctx.api()?;
    let prefs = ctx.sync_prefs();
    let outcome = sync::sync(api.as_ref(), ctx.store.as_ref(), &prefs, sync_type).await?;
    finish_sync(ctx, &outcome)?;

    println!(
        "Sync complete: {} uploaded, {} merged, {} evicted",
        outcome.flushed, outcome.merged, outcome.evicted
    );
    if outcome.reduced.dropped > 0 {
        println!(
            "{} reduced update(s) had no matching item and were dropped",
            outcome.reduced.dropped
        );
    }

    Ok(())
}

/// Persist the sync bookkeeping shared by the CLI and the daemon.
pub fn finish_sync(ctx: &mut AppContext, outcome: &SyncOutcome) -> Result<()> {
    ctx.config.state.etag = outcome.etag.clone();
    if outcome.merged > 0 || outcome.reduced.applied > 0 {
        ctx.config.state.needs_update_after_sync = true;
    }
    ctx.save_config()
}

pub async fn load_more(ctx: &mut AppContext, node: &str, offset: i64) -> Result<()> {
    let node = parse_node(node)?;
    run_sync(ctx, SyncType::LoadMore { node, offset }).await
}

pub fn list_folders(ctx: &AppContext, only_unread: bool) -> Result<()> {
    let folders = ctx.store.get_folders(only_unread)?;
    if folders.is_empty() {
        println!("No folders");
        return Ok(());
    }

    for folder in folders {
        let unread: i64 = ctx
            .store
            .get_feeds(&TreeNode::Folder(folder.id), false)?
            .iter()
            .map(|feed| feed.unread_count)
            .sum();
        println!("{:>6}  {} ({} unread)", folder.id, folder.name, unread);
    }

    Ok(())
}

pub fn list_feeds(ctx: &AppContext, node: Option<&str>, only_unread: bool) -> Result<()> {
    let node = match node {
        Some(source) => parse_node(source)?,
        None => TreeNode::AllUnread,
    };
    let feeds = ctx.store.get_feeds(&node, only_unread)?;
    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        let marker = if feed.is_considered_failed() { "!" } else { " " };
        println!(
            "{:>6} {} {} ({} unread, {} starred)",
            feed.id,
            marker,
            feed.display_title(),
            feed.unread_count,
            feed.starred_count
        );
        if let Some(error) = &feed.last_update_error {
            println!("         last update error: {}", error);
        }
    }

    Ok(())
}

pub fn list_items(ctx: &mut AppContext, node: Option<&str>, only_unread: bool) -> Result<()> {
    let node = match node {
        Some(source) => parse_node(source)?,
        None => TreeNode::AllUnread,
    };
    let only_unread = only_unread || ctx.config.list.show_only_unread;
    let sort = SortSpec {
        field: ctx.config.list.sort_field,
        order: ctx.config.list.order,
    };

    let items = ctx.store.get_items(&node, only_unread, sort)?;

    // Snapshot what is being shown so the pager stays stable against syncs
    let name = node_name(ctx, &node)?;
    let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
    ctx.store.update_list_snapshot(&node, &name, &ids)?;

    if ctx.config.state.needs_update_after_sync {
        ctx.config.state.needs_update_after_sync = false;
        ctx.save_config()?;
    }

    if items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in items {
        let read_marker = if item.unread { "\u{25cf}" } else { " " };
        let star_marker = if item.starred { "*" } else { " " };
        println!(
            "{:>8} {}{} {} {}",
            item.id,
            read_marker,
            star_marker,
            format_date(item.pub_date),
            item.display_title()
        );
    }

    Ok(())
}

pub fn show_item(ctx: &mut AppContext, item_id: i64, html: Option<&Path>) -> Result<()> {
    let item = ctx
        .store
        .get_item(item_id)?
        .ok_or(TidingsError::ItemNotFound(item_id))?;
    let feed = ctx.store.get_feed(item.feed_id)?;

    // Opening an article promotes the list snapshot to the pager
    ctx.store.promote_list_snapshot()?;
    ctx.store.mark_items(&[item_id], MarkAction::MarkRead)?;

    if let Some(path) = html {
        let document = render_html(ctx, &item, feed.as_ref());
        std::fs::write(path, document)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    println!("{}", item.display_title());
    match (&item.author, &feed) {
        (Some(author), Some(feed)) => println!("by {} on {}", author, feed.display_title()),
        (Some(author), None) => println!("by {}", author),
        (None, Some(feed)) => println!("on {}", feed.display_title()),
        (None, None) => {}
    }
    println!("{}", format_date(item.pub_date));
    if let Some(url) = &item.url {
        println!("{}", url);
    }
    println!();
    println!("{}", clean_string(&item.body));
    if let (Some(mime), Some(link)) = (&item.enclosure_mime, &item.enclosure_link) {
        println!();
        println!("Enclosure ({}): {}", mime, link);
    }

    Ok(())
}

pub fn mark(ctx: &AppContext, item_ids: &[i64], action: MarkAction) -> Result<()> {
    let changed = ctx.store.mark_items(item_ids, action)?;
    if changed == 0 {
        println!("Nothing to do");
    } else {
        println!(
            "Queued {} change(s); run `tidings sync` or keep the daemon running to upload",
            changed
        );
    }
    Ok(())
}

pub async fn feed_add(ctx: &mut AppContext, url: &str, folder_id: i64) -> Result<()> {
    let api = ctx.api()?;
    let mut feed = api.create_feed(url, folder_id).await?;
    // Items have not been fetched yet for this feed
    feed.unread_count = 0;
    ctx.store.upsert_feed(&feed)?;
    println!("Subscribed to {} (feed {})", feed.display_title(), feed.id);
    Ok(())
}

pub async fn feed_remove(ctx: &mut AppContext, feed_id: i64) -> Result<()> {
    let api = ctx.api()?;
    api.delete_feed(feed_id).await?;
    ctx.store.delete_feed(feed_id)?;
    println!("Unsubscribed from feed {}", feed_id);
    Ok(())
}

pub async fn feed_move(ctx: &mut AppContext, feed_id: i64, folder_id: i64) -> Result<()> {
    let api = ctx.api()?;
    api.move_feed(feed_id, folder_id).await?;
    ctx.store.move_feed(feed_id, folder_id)?;
    println!("Moved feed {} to folder {}", feed_id, folder_id);
    Ok(())
}

pub fn config_get(ctx: &AppContext, key: Option<&str>) -> Result<()> {
    match key {
        Some(key) => {
            let value = ctx.config.get_value(key).ok_or_else(|| {
                TidingsError::Config(format!("Unknown or non-printable key: {}", key))
            })?;
            println!("{}", value);
        }
        None => {
            for key in crate::config::Config::EDITABLE_KEYS {
                if let Some(value) = ctx.config.get_value(key) {
                    println!("{} = {}", key, value);
                }
            }
        }
    }
    Ok(())
}

pub fn config_set(ctx: &mut AppContext, key: &str, value: &str) -> Result<()> {
    ctx.config
        .set_value(key, value)
        .map_err(TidingsError::Config)?;
    ctx.save_config()?;

    match crate::config::Config::change_action(key) {
        ChangeAction::Update => println!("Saved; item listings will use the new setting"),
        ChangeAction::Recreate => println!("Saved; exported articles will use the new theme"),
        ChangeAction::Nothing => println!("Saved"),
    }
    Ok(())
}

pub fn reset(ctx: &mut AppContext) -> Result<()> {
    ctx.store.reset()?;
    ctx.config.state.etag = None;
    ctx.config.state.needs_update_after_sync = false;
    ctx.save_config()?;
    println!("Local cache wiped; the next sync fetches everything again");
    Ok(())
}

pub async fn daemon_start(
    ctx: AppContext,
    interval: Option<&str>,
    no_initial_sync: bool,
) -> Result<()> {
    let mut config = DaemonConfig::from_config(&ctx.config)?;
    if let Some(interval) = interval {
        config.sync_interval_secs =
            DaemonConfig::parse_interval(interval).map_err(TidingsError::Config)?;
    }
    config.sync_on_start = !no_initial_sync;

    let daemon = Daemon::new(ctx, config);
    daemon.run().await
}

pub fn daemon_stop() -> Result<()> {
    daemon::stop_daemon().map_err(TidingsError::Other)?;
    println!("Daemon stopped");
    Ok(())
}

pub fn daemon_status() -> Result<()> {
    println!("{}", daemon::daemon_status());
    Ok(())
}

fn parse_node(source: &str) -> Result<TreeNode> {
    TreeNode::parse(source).ok_or_else(|| {
        TidingsError::Other(format!(
            "Invalid node '{}'; use all, starred, fresh, feed:ID or folder:ID",
            source
        ))
    })
}

fn node_name(ctx: &AppContext, node: &TreeNode) -> Result<String> {
    Ok(match node {
        TreeNode::Folder(id) => ctx
            .store
            .get_folder(*id)?
            .map(|folder| folder.name)
            .unwrap_or_else(|| node.to_string()),
        TreeNode::Feed(id) => ctx
            .store
            .get_feed(*id)?
            .map(|feed| feed.display_title().to_string())
            .unwrap_or_else(|| node.to_string()),
        other => other.to_string(),
    })
}

fn format_date(epoch_secs: i64) -> String {
    match Utc.timestamp_opt(epoch_secs, 0).single() {
        Some(date) if epoch_secs > 0 => date.format("%Y-%m-%d").to_string(),
        _ => "          ".to_string(),
    }
}

fn render_html(ctx: &AppContext, item: &crate::domain::Item, feed: Option<&crate::domain::Feed>) -> String {
    let article = &ctx.config.article;
    let text = css_color(parse_color(&article.text_color).unwrap_or(0xFF33_3333));
    let background = css_color(parse_color(&article.background_color).unwrap_or(0xFFFF_FFFF));
    let link = css_color(parse_color(&article.link_color).unwrap_or(0xFF00_82C9));
    let font = if article.font == "system" {
        "sans-serif".to_string()
    } else {
        article.font.clone()
    };

    let byline = match (&item.author, feed) {
        (Some(author), Some(feed)) => format!(
            "by {} on <a href=\"{}\">{}</a>",
            author,
            feed.link,
            feed.display_title()
        ),
        (Some(author), None) => format!("by {}", author),
        (None, Some(feed)) => format!(
            "on <a href=\"{}\">{}</a>",
            feed.link,
            feed.display_title()
        ),
        (None, None) => String::new(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n\
         body {{ background-color: {background}; color: {text}; font-family: {font}; \
         max-width: 40em; margin: 2em auto; padding: 0 1em; }}\n\
         a {{ color: {link}; }}\n\
         .byline {{ color: {text}; opacity: 0.7; font-size: 0.9em; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n<p class=\"byline\">{byline} \u{2014} {date}</p>\n\
         {body}\n</body>\n</html>\n",
        title = item.display_title(),
        background = background,
        text = text,
        font = font,
        link = link,
        byline = byline,
        date = format_date(item.pub_date),
        body = item.body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feed, Item};

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(0), "          ");
        assert_eq!(format_date(1_600_000_000), "2020-09-13");
    }

    #[test]
    fn test_render_html_uses_theme_colors() {
        let ctx = AppContext::in_memory().unwrap();
        let mut item = Item::new(1, 1);
        item.title = "Hello".into();
        item.body = "<p>World</p>".into();
        item.author = Some("Jane".into());
        let mut feed = Feed::new(1, "https://example.com/feed");
        feed.name = "Example".into();
        feed.link = "https://example.com/".into();

        let html = render_html(&ctx, &item, Some(&feed));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>World</p>"));
        assert!(html.contains("by Jane"));
        // Default text color is opaque #333333
        assert!(html.contains("color: rgba(51,51,51,1.00)"));
    }

    #[test]
    fn test_parse_node_error_message() {
        assert!(parse_node("feed:1").is_ok());
        let error = parse_node("nonsense").unwrap_err();
        assert!(error.to_string().contains("nonsense"));
    }
}
