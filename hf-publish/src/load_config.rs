//! `load_config` module: loads an optional YAML task file and merges it with
//! command-line flags into a [`PublishTarget`].
//!
//! The task file never carries secrets: the token always comes from the
//! environment. Relative `local_path` values are resolved against the task
//! file's directory.
//!
//! ```yaml
//! repo_id: mariofabelo/rf_model
//! repo_type: model
//! local_path: ./rf_model.pkl
//! path_in_repo: rf_model.pkl
//! ```

use anyhow::Result;
use hf_publish_core::contract::RepoType;
use hf_publish_core::publish::PublishTarget;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::cli::PublishArgs;

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    pub repo_id: Option<String>,
    pub repo_type: Option<RepoType>,
    pub local_path: Option<PathBuf>,
    pub path_in_repo: Option<String>,
    pub revision: Option<String>,
    pub commit_message: Option<String>,
    pub private: Option<bool>,
    pub space_sdk: Option<String>,
}

/// Reads and parses a YAML task file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TaskFile> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading task file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read task file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut task: TaskFile = match serde_yaml::from_str(&config_content) {
        Ok(task) => {
            info!(config_path = ?path_ref, "Parsed task file YAML successfully");
            task
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse task file YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Some(local) = &task.local_path {
        if local.is_relative() {
            let base = path_ref.parent().unwrap_or_else(|| Path::new(""));
            task.local_path = Some(base.join(local));
        }
    }
    Ok(task)
}

/// Flags win over the task file. `repo_id` and the local file are required.
pub fn merge_target(file: Option<TaskFile>, args: &PublishArgs) -> Result<PublishTarget> {
    let file = file.unwrap_or_default();

    let repo_id = args.repo_id.clone().or(file.repo_id).ok_or_else(|| {
        error!("No repo_id given");
        anyhow::anyhow!("repo_id is required: pass --repo-id or set repo_id in the config file")
    })?;
    let local_path = args.file.clone().or(file.local_path).ok_or_else(|| {
        error!("No local file given");
        anyhow::anyhow!(
            "a file to upload is required: pass --file or set local_path in the config file"
        )
    })?;

    Ok(PublishTarget {
        repo_id,
        repo_type: args.repo_type.or(file.repo_type).unwrap_or_default(),
        local_path,
        path_in_repo: args.path_in_repo.clone().or(file.path_in_repo),
        revision: args.revision.clone().or(file.revision),
        commit_message: args.commit_message.clone().or(file.commit_message),
        private: match (args.private, args.public) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => file.private,
        },
        space_sdk: args.space_sdk.clone().or(file.space_sdk),
    })
}
