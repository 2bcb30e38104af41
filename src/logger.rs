//! Session logger: routes `tracing` output to a single file in the OS data
//! directory.
//!
//! The file is **truncated at each launch**, so it only ever holds the most
//! recent session.  When the file cannot be opened, output goes to stderr.
//!
//! Log location:
//!   Windows:  `%APPDATA%\arcdrawer\arcdrawer.log`
//!   Linux:    `~/.local/share/arcdrawer/arcdrawer.log`
//!   macOS:    `~/Library/Application Support/arcdrawer/arcdrawer.log`
//!
//! The level is `info`, or `debug` with `verbose`; `RUST_LOG` overrides it
//! in verbose mode only.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Path of the current session log, if file logging is active.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Install the global subscriber and a panic hook that records panics before
/// the default handler runs.  Safe to call more than once; later calls keep
/// the first subscriber.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path);

    let installed = match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.clone());
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(f))
                .try_init()
                .is_ok()
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok()
        }
    };
    if !installed {
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log = %path.display(),
        "session started"
    );

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC: {info}");
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("arcdrawer").join("arcdrawer.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_app_folder() {
        let path = log_file_path();
        assert!(path.ends_with("arcdrawer/arcdrawer.log"));
    }
}
