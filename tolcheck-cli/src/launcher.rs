//! Double-click entry point: check prerequisites, bootstrap the work
//! directory once, open the browser, run the server.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser;
use crate::server::{self, ServerConfig};

/// Written to the work directory once bootstrap has run.
pub const BOOTSTRAP_MARKER: &str = ".tolcheck-bootstrap";

pub const DEFAULT_BROWSER_DELAY: Duration = Duration::from_secs(2);

/// Something the launcher needs is not installed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MissingPrerequisite(String);

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub server: ServerConfig,
    /// Time between starting the server and opening the browser.
    pub browser_delay: Duration,
    pub open_browser: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser_delay: DEFAULT_BROWSER_DELAY,
            open_browser: true,
        }
    }
}

/// Prepare a fresh work directory.
///
/// Creates `uploads/` and `outputs/` and writes [`BOOTSTRAP_MARKER`]. Does
/// nothing when the marker is already present. Returns whether bootstrap
/// ran.
///
/// # Errors
///
/// Returns an error if a directory or the marker cannot be written.
pub fn bootstrap(config: &ServerConfig) -> anyhow::Result<bool> {
    let marker = config.workdir.join(BOOTSTRAP_MARKER);
    if marker.exists() {
        return Ok(false);
    }

    info!(workdir = %config.workdir.display(), "First run, preparing work directory");
    for dir in [config.uploads_dir(), config.outputs_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let stamp = chrono::Local::now().to_rfc3339();
    std::fs::write(&marker, format!("{stamp}\n"))
        .with_context(|| format!("Failed to write {}", marker.display()))?;
    Ok(true)
}

/// Call `open` with `url` once `delay` has passed, on a background task.
///
/// A failing opener is logged, never fatal.
pub fn schedule_browser_open<F>(url: String, delay: Duration, open: F) -> JoinHandle<()>
where
    F: FnOnce(&str) -> anyhow::Result<()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!(%url, "Opening browser");
        if let Err(e) = open(&url) {
            warn!("Could not open the browser: {e:#}");
        }
    })
}

/// Keep a console window open until the user has read the message.
pub fn pause_on_windows() {
    if cfg!(windows) {
        eprintln!("Press Enter to exit...");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }
}

fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create work directory {}", path.display()))
}

/// Run the launcher until the server stops.
///
/// # Errors
///
/// Returns [`MissingPrerequisite`] when the browser opener is missing, and
/// an error when bootstrap fails or the server cannot start.
pub async fn launch(config: LaunchConfig, verbose: u8) -> anyhow::Result<()> {
    if config.open_browser {
        let opener = browser::find_opener().map_err(|e| MissingPrerequisite(e.to_string()))?;
        info!(opener = %opener.display(), "Found browser opener");
    }

    ensure_workdir(&config.server.workdir)?;
    if bootstrap(&config.server)? {
        println!(
            "Prepared work directory {}",
            config.server.workdir.display()
        );
    }

    let browser_task = config.open_browser.then(|| {
        schedule_browser_open(
            config.server.browser_url(),
            config.browser_delay,
            |url: &str| browser::open(OsStr::new(url)),
        )
    });

    let result = server::serve(config.server, verbose).await;
    if let Some(task) = browser_task {
        task.abort();
    }
    result
}
