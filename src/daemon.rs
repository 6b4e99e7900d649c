//! Long-running host for the recurring product update.
//!
//! Fires the pending scheduled job when it comes due. Each run re-arms the
//! job itself, so the daemon only has to watch for due jobs.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, Utc};

use crate::app::{AppContext, Result, SkufillError};
use crate::batch::BatchOutcome;

/// Daemon configuration
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    /// Arm the first run on start if none is pending
    pub install_on_start: bool,
    /// Log file path (None = stdout)
    pub log_file: Option<PathBuf>,
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
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
            .map(|d| d.join("skufill").join("daemon.pid"))
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        read_pid_file().is_some_and(process_exists)
    }

    /// Write PID file
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

    /// Remove PID file
    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Log a message with timestamp
    fn log(&self, msg: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}", timestamp, msg);

        if let Some(ref log_path) = self.config.log_file {
            if let Ok(mut file) = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
            {
                let _ = writeln!(file, "{}", line);
            }
        } else {
            println!("{}", line);
        }
    }

    /// Run the daemon
    pub async fn run(&self) -> Result<()> {
        if Self::is_running() {
            return Err(SkufillError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| SkufillError::Other(format!("Failed to write PID file: {}", e)))?;

        self.spawn_signal_handler();

        let scheduler = self.ctx.runner.scheduler();

        self.log(&format!(
            "Skufill daemon started (poll interval: {}s, PID: {})",
            scheduler.config().poll_interval().as_secs(),
            std::process::id()
        ));

        if self.config.install_on_start {
            let job = scheduler.install()?;
            self.log(&format!("Next update due at {}", job.due_at.with_timezone(&Local)));
        }

        while self.running.load(Ordering::SeqCst) {
            match scheduler.take_due(Utc::now()) {
                Ok(Some(_)) => {
                    self.log("Running scheduled update...");
                    self.run_update().await;
                }
                Ok(None) => {}
                Err(e) => self.log(&format!("Failed to read schedule: {}", e)),
            }

            let wait = match scheduler.pending() {
                Ok(Some(job)) => job.remaining(Utc::now()).min(scheduler.config().poll_interval()),
                _ => scheduler.config().poll_interval(),
            };
            tokio::time::sleep(wait).await;
        }

        self.log("Daemon shutting down...");
        self.remove_pid_file();

        Ok(())
    }

    fn spawn_signal_handler(&self) {
        let running = self.running.clone();

        #[cfg(unix)]
        {
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};

                let (Ok(mut sigterm), Ok(mut sigint)) = (
                    signal(SignalKind::terminate()),
                    signal(SignalKind::interrupt()),
                ) else {
                    tracing::error!("Failed to set up signal handlers");
                    return;
                };

                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                running.store(false, Ordering::SeqCst);
            });
        }

        #[cfg(windows)]
        {
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                running.store(false, Ordering::SeqCst);
            });
        }
    }

    /// Run a single batch
    async fn run_update(&self) {
        let start = Utc::now();

        match self.ctx.runner.run_once().await {
            Ok(BatchOutcome::Completed(summary)) => {
                let elapsed = Utc::now().signed_duration_since(start);
                self.log(&format!(
                    "Update complete: {} candidates, {} updated, {} failed ({:.1}s)",
                    summary.candidates,
                    summary.updated,
                    summary.failed,
                    elapsed.num_milliseconds() as f64 / 1000.0
                ));
            }
            Ok(BatchOutcome::AlreadyRunning) => {
                self.log("Another update is in progress, skipped");
            }
            Err(e) => {
                self.log(&format!("Update failed: {}", e));
                if let Err(e) = self.ctx.runner.scheduler().install() {
                    self.log(&format!("Failed to schedule next update: {}", e));
                }
            }
        }
    }

    /// Stop the daemon (called externally)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn read_pid_file() -> Option<u32> {
    let pid_path = Daemon::pid_file_path()?;
    let pid_str = fs::read_to_string(pid_path).ok()?;
    pid_str.trim().parse::<u32>().ok()
}

#[cfg(unix)]
pub(crate) fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
pub(crate) fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<()> {
    let pid_path = Daemon::pid_file_path()
        .ok_or_else(|| SkufillError::Other("Could not determine PID file path".to_string()))?;

    if !pid_path.exists() {
        return Err(SkufillError::Other(
            "No daemon is running (PID file not found)".to_string(),
        ));
    }

    let pid = read_pid_file()
        .ok_or_else(|| SkufillError::Other("Invalid PID in PID file".to_string()))?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(())
    } else {
        Err(SkufillError::Other(format!(
            "Failed to stop daemon (PID {})",
            pid
        )))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match read_pid_file() {
        Some(pid) if process_exists(pid) => format!("Daemon is running (PID: {})", pid),
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
