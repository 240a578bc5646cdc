//! # contract: interface between the publish workflow and the remote hub
//!
//! This module defines a single trait ([`HubClient`]) and the plain data types
//! that flow through it: what to create, what to upload, and what the hub
//! answered. The real implementation lives in [`crate::hub`]; tests use the
//! `mockall`-generated `MockHubClient` (exported with the `test-export-mocks`
//! feature) or their own in-memory fakes.
//!
//! Errors crossing the trait are boxed so that implementors can surface the
//! underlying failure (HTTP status, I/O error, ...) to the caller unchanged.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::credentials::{ConfigError, HubToken};

/// Error type for [`HubClient`] calls.
pub type HubError = Box<dyn std::error::Error + Send + Sync>;

/// Kind of repository on the hub.
/// Deserializes through [`FromStr`], so task files accept the same spellings as flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Model => "model",
            RepoType::Dataset => "dataset",
            RepoType::Space => "space",
        }
    }

    /// Path segment used by the REST API (`/api/models/...`).
    pub fn api_segment(&self) -> &'static str {
        match self {
            RepoType::Model => "models",
            RepoType::Dataset => "datasets",
            RepoType::Space => "spaces",
        }
    }

    /// Prefix used in web and git URLs. Models live at the root.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoType::Model => "",
            RepoType::Dataset => "datasets/",
            RepoType::Space => "spaces/",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" | "models" => Ok(RepoType::Model),
            "dataset" | "datasets" => Ok(RepoType::Dataset),
            "space" | "spaces" => Ok(RepoType::Space),
            other => Err(format!(
                "unknown repo type {other:?}, expected one of: model, dataset, space"
            )),
        }
    }
}

impl TryFrom<String> for RepoType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Splits `owner/name` into its parts. A bare `name` has no owner.
pub fn split_repo_id(repo_id: &str) -> Result<(Option<&str>, &str), ConfigError> {
    let invalid = || ConfigError::InvalidRepoId(repo_id.to_string());
    let mut parts = repo_id.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok((None, name)),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok((Some(owner), name))
        }
        _ => Err(invalid()),
    }
}

/// Request to create a repository, optionally tolerating an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRepoRequest {
    pub repo_id: String,
    pub repo_type: RepoType,
    /// Do not error if the repository already exists.
    pub exist_ok: bool,
    /// Visibility for a newly created repository. `None` keeps the hub default.
    pub private: Option<bool>,
    /// Required by the hub for spaces (`gradio`, `streamlit`, `docker`, `static`).
    pub space_sdk: Option<String>,
}

/// The repository the hub reports after a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoUrl {
    pub url: String,
    pub repo_id: String,
    pub repo_type: RepoType,
    /// `false` when the repository already existed.
    pub created: bool,
}

/// Request to upload one local file into a repository as a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileRequest {
    pub local_path: PathBuf,
    pub path_in_repo: String,
    pub repo_id: String,
    pub repo_type: RepoType,
    pub revision: String,
    pub commit_message: String,
}

/// The commit the hub created for an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub commit_url: String,
    pub commit_oid: String,
}

/// A non-success answer from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubApiError {
    pub status: u16,
    pub message: String,
}

impl HubApiError {
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

impl fmt::Display for HubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub returned {}: {}", self.status, self.message)
    }
}

impl std::error::Error for HubApiError {}

/// Capability set the publish workflow needs from the remote hub.
///
/// The trait is implemented by [`crate::hub::HfApiClient`] and by test doubles.
/// Every call carries the token explicitly; implementors hold no credential.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Create the repository, or no-op when it exists and `exist_ok` is set.
    async fn ensure_repository(
        &self,
        token: &HubToken,
        req: CreateRepoRequest,
    ) -> Result<RepoUrl, HubError>;

    /// Upload a single local file, overwriting whatever is at `path_in_repo`.
    async fn upload_file(
        &self,
        token: &HubToken,
        req: UploadFileRequest,
    ) -> Result<CommitInfo, HubError>;
}
