use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `--home`, then `$TURNOVER_HOME`, then `~/.turnover`.
pub fn turnover_home(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os("TURNOVER_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".turnover"))
}

pub fn ensure_turnover_home(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = turnover_home(explicit)?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Relative paths in config are taken from the home directory.
pub fn resolve_in_home(home: &Path, configured: &str) -> PathBuf {
    let p = PathBuf::from(configured);
    if p.is_absolute() { p } else { home.join(p) }
}
