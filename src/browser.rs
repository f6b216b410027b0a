// src/browser.rs
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Delay before launching, so the server is accepting connections first.
pub const OPEN_DELAY: Duration = Duration::from_millis(1500);

/// Opens `url` in the system's default browser after [`OPEN_DELAY`].
///
/// Runs in the background; failures are only logged.
pub fn open_later(url: String) {
    tokio::spawn(async move {
        tokio::time::sleep(OPEN_DELAY).await;
        let mut command = launcher(&url);
        match command.status().await {
            Ok(status) if status.success() => debug!("Opened {} in browser", url),
            Ok(status) => warn!("Browser launcher exited with {}", status),
            Err(e) => warn!("Could not open a browser: {}", e),
        }
    });
}

fn launcher(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}
