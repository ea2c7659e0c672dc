//! Background daemon for periodic syncs.
//!
//! Runs a full sync on a configurable interval and, on a much shorter one,
//! retries the upload of pending read/star changes while any remain queued.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::interval;

use crate::app::{AppContext, Result, TidingsError};
use crate::config::Config;
use crate::store::Store;
use crate::sync::{self, SyncType};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Full sync interval in seconds (default: 3600 = 1 hour)
    pub sync_interval_secs: u64,
    /// Pending-change retry interval in seconds (default: 300 = 5 minutes)
    pub flush_interval_secs: u64,
    /// Whether to run a sync immediately on start
    pub sync_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 3600,
            flush_interval_secs: 300,
            sync_on_start: true,
        }
    }
}

impl DaemonConfig {
    /// Build from the application config's interval strings.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            sync_interval_secs: Self::parse_interval(&config.sync.interval)
                .map_err(TidingsError::Config)?,
            flush_interval_secs: Self::parse_interval(&config.sync.flush_interval)
                .map_err(TidingsError::Config)?,
            sync_on_start: true,
        })
    }

    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: AppContext,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(ctx: AppContext, config: DaemonConfig) -> Self {
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("tidings").join("daemon.pid"))
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        if let Some(pid_path) = Self::pid_file_path() {
            if pid_path.exists() {
                if let Ok(pid_str) = fs::read_to_string(&pid_path) {
                    if let Ok(pid) = pid_str.trim().parse::<u32>() {
                        return Self::process_exists(pid);
                    }
                }
            }
        }
        false
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run the daemon until stopped by a signal.
    pub async fn run(mut self) -> Result<()> {
        if Self::is_running() {
            return Err(TidingsError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file().map_err(|e| {
            TidingsError::Other(format!("Failed to write PID file: {}", e))
        })?;

        let shutdown = Arc::new(Notify::new());
        let running = self.running.clone();

        #[cfg(unix)]
        {
            let running = running.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("Failed to set up SIGTERM handler");
                let mut sigint =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                        .expect("Failed to set up SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                running.store(false, Ordering::SeqCst);
                shutdown.notify_waiters();
            });
        }

        #[cfg(windows)]
        {
            let running = running.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                running.store(false, Ordering::SeqCst);
                shutdown.notify_waiters();
            });
        }

        tracing::info!(
            sync_interval = %DaemonConfig::format_interval(self.config.sync_interval_secs),
            flush_interval = %DaemonConfig::format_interval(self.config.flush_interval_secs),
            pid = std::process::id(),
            "daemon started"
        );

        if self.config.sync_on_start {
            self.run_full_sync().await;
        }

        let mut sync_timer = interval(Duration::from_secs(self.config.sync_interval_secs));
        let mut flush_timer = interval(Duration::from_secs(self.config.flush_interval_secs));
        // Skip the immediate first tick of both timers
        sync_timer.tick().await;
        flush_timer.tick().await;

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = sync_timer.tick() => {
                    self.run_full_sync().await;
                }
                _ = flush_timer.tick() => {
                    self.run_flush().await;
                }
                _ = shutdown.notified() => break,
            }
        }

        tracing::info!("daemon shutting down");
        self.remove_pid_file();

        Ok(())
    }

    async fn run_full_sync(&mut self) {
        tracing::info!("running scheduled sync");
        self.run_sync(SyncType::Full { initial: false }).await;
    }

    /// The retry tick: only fires a request while local changes are queued.
    async fn run_flush(&mut self) {
        match self.ctx.store.has_pending_changes() {
            Ok(true) => {
                tracing::info!("retrying pending change upload");
                self.run_sync(SyncType::ChangesOnly).await;
            }
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "failed to check outbox"),
        }
    }

    async fn run_sync(&mut self, sync_type: SyncType) {
        let api = match self.ctx.api() {
            Ok(api) => api,
            Err(e) => {
                tracing::error!(error = %e, "cannot build API client");
                return;
            }
        };

        let prefs = self.ctx.sync_prefs();
        match sync::sync(api.as_ref(), self.ctx.store.as_ref(), &prefs, sync_type).await {
            Ok(outcome) => {
                self.ctx.config.state.etag = outcome.etag.clone();
                if outcome.merged > 0 || outcome.reduced.applied > 0 {
                    self.ctx.config.state.needs_update_after_sync = true;
                }
                if let Err(e) = self.ctx.save_config() {
                    tracing::error!(error = %e, "failed to persist sync state");
                }
                tracing::info!(
                    flushed = outcome.flushed,
                    merged = outcome.merged,
                    evicted = outcome.evicted,
                    "sync finished"
                );
            }
            Err(e) => {
                // Pending changes stay queued; the flush timer retries them
                tracing::error!(error = %e, "sync failed");
            }
        }
    }

    /// Stop the daemon (called externally)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Stop a running daemon by reading the PID file and sending a signal
pub fn stop_daemon() -> std::result::Result<(), String> {
    let pid_path =
        Daemon::pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid_str =
        fs::read_to_string(&pid_path).map_err(|e| format!("Failed to read PID file: {}", e))?;

    let pid: u32 = pid_str
        .trim()
        .parse()
        .map_err(|_| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    {
        use std::process::Command;
        let status = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .map_err(|e| format!("Failed to send signal: {}", e))?;

        if status.success() {
            let _ = fs::remove_file(&pid_path);
            Ok(())
        } else {
            Err(format!("Failed to stop daemon (PID {})", pid))
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .status()
            .map_err(|e| format!("Failed to stop process: {}", e))?;

        if status.success() {
            let _ = fs::remove_file(&pid_path);
            Ok(())
        } else {
            Err(format!("Failed to stop daemon (PID {})", pid))
        }
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    if let Some(pid_path) = Daemon::pid_file_path() {
        if pid_path.exists() {
            if let Ok(pid_str) = fs::read_to_string(&pid_path) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if Daemon::process_exists(pid) {
                        return format!("Daemon is running (PID: {})", pid);
                    } else {
                        return "Daemon is not running (stale PID file)".to_string();
                    }
                }
            }
        }
    }
    "Daemon is not running".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(DaemonConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval("30m").unwrap(), 1800);
        assert_eq!(DaemonConfig::parse_interval("5m").unwrap(), 300);
        assert_eq!(DaemonConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(DaemonConfig::parse_interval("60s").unwrap(), 60);
        assert_eq!(DaemonConfig::parse_interval("3600").unwrap(), 3600);
        assert!(DaemonConfig::parse_interval("invalid").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(DaemonConfig::format_interval(3600), "1h");
        assert_eq!(DaemonConfig::format_interval(1800), "30m");
        assert_eq!(DaemonConfig::format_interval(300), "5m");
        assert_eq!(DaemonConfig::format_interval(86400), "1d");
        assert_eq!(DaemonConfig::format_interval(90), "90s");
        assert_eq!(DaemonConfig::format_interval(7200), "2h");
    }

    #[test]
    fn test_from_config_uses_interval_strings() {
        let config = Config::default();
        let daemon_config = DaemonConfig::from_config(&config).unwrap();
        assert_eq!(daemon_config.sync_interval_secs, 3600);
        assert_eq!(daemon_config.flush_interval_secs, 300);

        let mut config = Config::default();
        config.sync.interval = "bogus".into();
        assert!(DaemonConfig::from_config(&config).is_err());
    }
}
