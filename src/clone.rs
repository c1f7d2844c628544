//! `git clone` of an arbitrary repository URL into the clone root.

use crate::error::CloneError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub path: PathBuf,
}

/// Last path segment of the URL with any `.git` suffix removed.
pub fn target_dir_name(clone_url: &str) -> Result<String, CloneError> {
    let trimmed = clone_url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if last.is_empty() || last == "." || last == ".." {
        return Err(CloneError::BadUrl(clone_url.to_string()));
    }
    Ok(last.to_string())
}

pub fn target_dir(clone_root: &Path, clone_url: &str) -> Result<PathBuf, CloneError> {
    Ok(clone_root.join(target_dir_name(clone_url)?))
}

/// Runs `git clone <url> <root>/<name>`. A failing git is reported in the
/// outcome, not as an error.
pub fn clone_repository(clone_url: &str, clone_root: &Path) -> Result<CloneOutcome, CloneError> {
    let target = target_dir(clone_root, clone_url)?;

    std::fs::create_dir_all(clone_root).map_err(|source| CloneError::Io {
        path: clone_root.display().to_string(),
        source,
    })?;

    info!(url = %clone_url, target = %target.display(), "Cloning repository");
    let output = Command::new("git")
        .arg("clone")
        .arg("--")
        .arg(clone_url)
        .arg(&target)
        .output()
        .map_err(CloneError::Spawn)?;

    if output.status.success() {
        return Ok(CloneOutcome {
            success: true,
            message: None,
            path: target,
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    warn!(url = %clone_url, error = %stderr, "git clone failed");
    Ok(CloneOutcome {
        success: false,
        message: Some(stderr),
        path: target,
    })
}
