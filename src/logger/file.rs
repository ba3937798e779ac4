//! Append-only file sink for log lines
//!
//! File output is optional; when no file is configured `write_to_file`
//! is a no-op.

use once_cell::sync::Lazy;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

static LOG_FILE: Lazy<Mutex<Option<BufWriter<File>>>> = Lazy::new(|| Mutex::new(None));

/// Open (or create) the log file in append mode
pub fn init_file_logging(path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory {}: {}", parent.display(), e);
                return;
            }
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(BufWriter::new(file));
        }
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
        }
    }
}

pub fn write_to_file(line: &str) {
    let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(writer) = guard.as_mut() {
        let _ = writeln!(writer, "{}", line);
    }
}

pub fn flush_file_logging() {
    let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(writer) = guard.as_mut() {
        let _ = writer.flush();
    }
}
