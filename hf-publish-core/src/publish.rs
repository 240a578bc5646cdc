//! High-level workflow: ensure the repository exists, then upload one file.
//!
//! # Steps
//!   - Credential load (only in [`run_publish`]): a missing token stops here,
//!     before the hub client is touched.
//!   - Repository creation with `exist_ok`: any error is logged and swallowed.
//!   - File upload: any error is returned unchanged inside
//!     [`PublishError::Upload`].
//!
//! Progress lines go to stdout for the operator; structured events go through
//! `tracing`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::contract::{
    split_repo_id, CommitInfo, CreateRepoRequest, HubClient, HubError, RepoType, RepoUrl,
    UploadFileRequest,
};
use crate::credentials::{load_token_with, ConfigError, HubToken};

pub const DEFAULT_REVISION: &str = "main";

/// Where and what to publish, without the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub repo_id: String,
    pub repo_type: RepoType,
    pub local_path: PathBuf,
    /// Destination inside the repository. Defaults to the local file name.
    pub path_in_repo: Option<String>,
    pub revision: Option<String>,
    pub commit_message: Option<String>,
    pub private: Option<bool>,
    pub space_sdk: Option<String>,
}

impl PublishTarget {
    pub fn new(repo_id: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        PublishTarget {
            repo_id: repo_id.into(),
            repo_type: RepoType::Model,
            local_path: local_path.into(),
            path_in_repo: None,
            revision: None,
            commit_message: None,
            private: None,
            space_sdk: None,
        }
    }
}

/// A fully resolved upload: credential plus target with defaults applied.
#[derive(Debug, Clone)]
pub struct PublishTask {
    pub token: HubToken,
    pub repo_id: String,
    pub repo_type: RepoType,
    pub local_path: PathBuf,
    pub path_in_repo: String,
    pub revision: String,
    pub commit_message: String,
    pub private: Option<bool>,
    pub space_sdk: Option<String>,
}

impl PublishTask {
    /// Validates the target and fills in defaults.
    pub fn new(token: HubToken, target: PublishTarget) -> Result<Self, ConfigError> {
        split_repo_id(&target.repo_id)?;
        if target.repo_type == RepoType::Space && target.space_sdk.is_none() {
            return Err(ConfigError::MissingSpaceSdk);
        }
        let path_in_repo = match target.path_in_repo {
            Some(p) => p.trim_start_matches('/').to_string(),
            None => default_path_in_repo(&target.local_path),
        };
        let commit_message = target
            .commit_message
            .unwrap_or_else(|| format!("Upload {path_in_repo} with hf-publish"));
        Ok(PublishTask {
            token,
            repo_id: target.repo_id,
            repo_type: target.repo_type,
            local_path: target.local_path,
            path_in_repo,
            revision: target.revision.unwrap_or_else(|| DEFAULT_REVISION.to_string()),
            commit_message,
            private: target.private,
            space_sdk: target.space_sdk,
        })
    }

    fn create_request(&self) -> CreateRepoRequest {
        CreateRepoRequest {
            repo_id: self.repo_id.clone(),
            repo_type: self.repo_type,
            exist_ok: true,
            private: self.private,
            space_sdk: self.space_sdk.clone(),
        }
    }

    fn upload_request(&self) -> UploadFileRequest {
        UploadFileRequest {
            local_path: self.local_path.clone(),
            path_in_repo: self.path_in_repo.clone(),
            repo_id: self.repo_id.clone(),
            repo_type: self.repo_type,
            revision: self.revision.clone(),
            commit_message: self.commit_message.clone(),
        }
    }
}

fn default_path_in_repo(local_path: &Path) -> String {
    local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| local_path.to_string_lossy().into_owned())
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub repo_id: String,
    pub repo_type: RepoType,
    pub path_in_repo: String,
    /// `None` when repository creation failed and was tolerated.
    pub repository: Option<RepoUrl>,
    pub repository_error: Option<String>,
    pub commit: CommitInfo,
}

#[derive(Debug)]
pub enum PublishError {
    /// Raised before any remote call.
    Config(ConfigError),
    /// The upload failed; holds the client's error as returned.
    Upload(HubError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Config(e) => write!(f, "{e}"),
            PublishError::Upload(_) => write!(f, "upload failed"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Config(_) => None,
            PublishError::Upload(e) => Some(e.as_ref()),
        }
    }
}

impl From<ConfigError> for PublishError {
    fn from(e: ConfigError) -> Self {
        PublishError::Config(e)
    }
}

/// Loads the token through `lookup`, then publishes. A missing token returns
/// [`PublishError::Config`] without any call on `client`.
pub async fn run_publish<C, L>(
    target: PublishTarget,
    lookup: L,
    client: &C,
) -> Result<PublishReport, PublishError>
where
    C: HubClient + ?Sized,
    L: Fn(&str) -> Option<String>,
{
    let token = load_token_with(lookup)?;
    let task = PublishTask::new(token, target)?;
    publish(&task, client).await
}

/// Ensures the repository exists, then uploads the file.
pub async fn publish<C>(task: &PublishTask, client: &C) -> Result<PublishReport, PublishError>
where
    C: HubClient + ?Sized,
{
    info!(
        repo_id = %task.repo_id,
        repo_type = %task.repo_type,
        local_path = %task.local_path.display(),
        path_in_repo = %task.path_in_repo,
        "[PUBLISH] Starting"
    );

    println!("Creating repository {}...", task.repo_id);
    let (repository, repository_error) =
        match client.ensure_repository(&task.token, task.create_request()).await {
            Ok(repo) => {
                if repo.created {
                    println!("Repository created successfully!");
                } else {
                    println!("Repository {} already exists.", task.repo_id);
                }
                info!(url = %repo.url, created = repo.created, "[PUBLISH] Repository ready");
                (Some(repo), None)
            }
            Err(e) => {
                println!("Repository creation info: {e}");
                warn!(
                    error = %e,
                    repo_id = %task.repo_id,
                    "[PUBLISH] Repository creation failed, continuing"
                );
                (None, Some(e.to_string()))
            }
        };

    println!(
        "Uploading {} to {}/{}...",
        task.local_path.display(),
        task.repo_id,
        task.path_in_repo
    );
    let commit = match client.upload_file(&task.token, task.upload_request()).await {
        Ok(commit) => commit,
        Err(e) => {
            error!(error = %e, repo_id = %task.repo_id, "[PUBLISH][ERROR] Upload failed");
            return Err(PublishError::Upload(e));
        }
    };
    println!("Upload completed successfully!");
    info!(commit_url = %commit.commit_url, commit_oid = %commit.commit_oid, "[PUBLISH] Done");

    Ok(PublishReport {
        repo_id: task.repo_id.clone(),
        repo_type: task.repo_type,
        path_in_repo: task.path_in_repo.clone(),
        repository,
        repository_error,
        commit,
    })
}
