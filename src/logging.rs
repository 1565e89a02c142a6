// src/logging.rs
//
// Timestamped logging to stderr, optionally mirrored to an append-only log file.

use std::path::Path;
use std::sync::Mutex;

use crate::error::MonitorError;

/// Mirror target for `tlog!`. `None` means stderr only.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Start mirroring log output to `path`, creating parent directories as needed.
pub fn init_file_logging(path: &Path) -> Result<(), MonitorError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            MonitorError::config(format!("Failed to create log dir {}: {}", dir.display(), e))
        })?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MonitorError::config(format!("Failed to open log file {}: {}", path.display(), e)))?;

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Announced on stderr only; the file starts with the next tlog! line
    eprintln!(
        "{} [logging] File logging started: {}",
        timestamp(),
        path.display()
    );

    Ok(())
}

/// Close the mirror file, if one is open.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!("{} [logging] File logging stopped", timestamp());
        }
    }
}

/// Local wall-clock time as `HH:MM:SS.mmm`.
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// `eprintln!` with a local `HH:MM:SS.mmm` prefix, mirrored to the log file
/// while file logging is active.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", $crate::logging::timestamp(), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}
