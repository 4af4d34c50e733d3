//! Checkpoint layout and persistence helpers.
//!
//! A checkpoint directory holds two independent artifacts, the agent weights
//! and the dynamics model's disturbance parameters, plus a small manifest
//! recording where in training the snapshot was taken:
//!
//! ```text
//! {output}/{env}-run{N}/
//!   agent.json                 (or whatever the agent writes)
//!   disturbance_model.json     (or whatever the dynamics model writes)
//!   checkpoint.json            (CheckpointManifest)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::Agent;
use crate::dynamics::DynamicsModel;
use crate::error::OrchestratorError;

pub const MANIFEST_FILE: &str = "checkpoint.json";

/// Training position at which a checkpoint was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub episode: u64,
    pub total_steps: u64,
    pub updates: u64,
    pub saved_at: DateTime<Utc>,
}

/// Serialize `value` as pretty JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OrchestratorError> {
    let io_err = |source| OrchestratorError::Checkpoint {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| io_err(std::io::Error::other(e)))?;
    fs::write(path, bytes).map_err(io_err)
}

/// Read a JSON artifact written by [`write_json`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, OrchestratorError> {
    let io_err = |source| OrchestratorError::Checkpoint {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(io_err)?;
    serde_json::from_slice(&bytes).map_err(|e| io_err(std::io::Error::other(e)))
}

/// Create and return the next unused `{parent}/{env_name}-run{N}` directory.
///
/// `N` is one more than the highest run number already present (so the first
/// run of an empty directory is `run1`).
pub fn next_run_folder(parent: &Path, env_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create output root {}", parent.display()))?;

    let prefix = format!("{env_name}-run");
    let mut latest = 0u64;
    for entry in fs::read_dir(parent)
        .with_context(|| format!("failed to list output root {}", parent.display()))?
    {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(id) = name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|n| n.parse::<u64>().ok())
        else {
            continue;
        };
        latest = latest.max(id);
    }

    let folder = parent.join(format!("{prefix}{}", latest + 1));
    fs::create_dir_all(&folder)
        .with_context(|| format!("failed to create run folder {}", folder.display()))?;
    Ok(folder)
}

/// Where to load weights from, and whether training should start from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub dir: PathBuf,
    /// Set when a run number was given explicitly.
    pub load_agent: bool,
}

/// Resolve a `--resume` value.
///
/// - `"default"` -> `{root}/{env}-run0`, nothing loaded before training
/// - a number `n` -> `{root}/{env}-run{n}`, agent weights loaded before training
/// - anything else is taken as a directory path
pub fn resolve_resume(root: &Path, env_name: &str, resume: &str) -> ResumeTarget {
    if resume == "default" {
        ResumeTarget {
            dir: root.join(format!("{env_name}-run0")),
            load_agent: false,
        }
    } else if !resume.is_empty() && resume.chars().all(|c| c.is_ascii_digit()) {
        ResumeTarget {
            dir: root.join(format!("{env_name}-run{resume}")),
            load_agent: true,
        }
    } else {
        ResumeTarget {
            dir: PathBuf::from(resume),
            load_agent: false,
        }
    }
}

/// Persist both checkpoint artifacts and the manifest under `dir`.
///
/// Any failure is returned to the caller; a silently missing checkpoint would
/// make later resumption unreliable.
pub async fn save_checkpoint<A, D>(
    dir: &Path,
    agent: &A,
    dynamics: &D,
    manifest: &CheckpointManifest,
) -> Result<()>
where
    A: Agent,
    D: DynamicsModel,
{
    fs::create_dir_all(dir)
        .map_err(|source| OrchestratorError::Checkpoint {
            path: dir.to_path_buf(),
            source,
        })?;

    agent
        .save_model(dir)
        .await
        .with_context(|| format!("failed to save agent to {}", dir.display()))?;
    dynamics
        .save_disturbance_models(dir)
        .await
        .with_context(|| format!("failed to save disturbance models to {}", dir.display()))?;
    write_json(&dir.join(MANIFEST_FILE), manifest)?;

    info!(
        dir = %dir.display(),
        episode = manifest.episode,
        total_steps = manifest.total_steps,
        "checkpoint saved"
    );
    Ok(())
}

/// Read the manifest of a checkpoint directory, if one was written.
pub fn read_manifest(dir: &Path) -> Result<Option<CheckpointManifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_folders_count_up_from_one() {
        let root = tempfile::tempdir().unwrap();
        let first = next_run_folder(root.path(), "PointMass").unwrap();
        assert!(first.ends_with("PointMass-run1"));
        let second = next_run_folder(root.path(), "PointMass").unwrap();
        assert!(second.ends_with("PointMass-run2"));

        fs::create_dir_all(root.path().join("PointMass-run7")).unwrap();
        fs::create_dir_all(root.path().join("Other-run40")).unwrap();
        let third = next_run_folder(root.path(), "PointMass").unwrap();
        assert!(third.ends_with("PointMass-run8"));
    }

    #[test]
    fn resume_values_resolve_like_the_cli_documents() {
        let root = Path::new("output");
        let default = resolve_resume(root, "PointMass", "default");
        assert_eq!(default.dir, root.join("PointMass-run0"));
        assert!(!default.load_agent);

        let numbered = resolve_resume(root, "PointMass", "3");
        assert_eq!(numbered.dir, root.join("PointMass-run3"));
        assert!(numbered.load_agent);

        let explicit = resolve_resume(root, "PointMass", "/tmp/weights");
        assert_eq!(explicit.dir, PathBuf::from("/tmp/weights"));
        assert!(!explicit.load_agent);
    }

    #[test]
    fn json_round_trip_and_missing_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CheckpointManifest {
            episode: 20,
            total_steps: 2000,
            updates: 1500,
            saved_at: Utc::now(),
        };
        write_json(&dir.path().join(MANIFEST_FILE), &manifest).unwrap();
        assert_eq!(read_manifest(dir.path()).unwrap(), Some(manifest));

        let err = read_json::<CheckpointManifest>(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, OrchestratorError::Checkpoint { .. }));
    }
}
