//! # History File Management
//!
//! History is stored in `~/.cityblock_history` by default. Set
//! `CITYBLOCK_HISTORY` to use another file, or to an empty string to turn
//! persistence off:
//!
//! ```bash
//! export CITYBLOCK_HISTORY=/custom/path/history
//! cityblock datasets/images.csv
//! ```
//!
//! The path is resolved at startup and handed to rustyline, which does the
//! file I/O.

use std::env;
use std::path::PathBuf;

const DEFAULT_HISTORY_FILE: &str = ".cityblock_history";
const HISTORY_ENV_VAR: &str = "CITYBLOCK_HISTORY";

pub fn history_path() -> Option<PathBuf> {
    resolve(env::var(HISTORY_ENV_VAR).ok(), home_dir())
}

fn resolve(custom: Option<String>, home: Option<PathBuf>) -> Option<PathBuf> {
    match custom {
        Some(path) if path.is_empty() => None,
        Some(path) => Some(PathBuf::from(path)),
        None => home.map(|home| home.join(DEFAULT_HISTORY_FILE)),
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}
