use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

/// Resolves the home directory of the current user from the environment.
pub fn home_dir() -> Result<PathBuf> {
    env::var("HOME")
        .map(PathBuf::from)
        .context("HOME is not set")
}

/// Directory for diagnostic state (rotated logs). Prefers $XDG_STATE_HOME,
/// falls back to ~/.local/state.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = match env::var("XDG_STATE_HOME") {
        Ok(v) => PathBuf::from(v),
        Err(_) => home_dir()?.join(".local/state"),
    };
    path.push("whereabouts");

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
