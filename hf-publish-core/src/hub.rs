//! # hub: `HubClient` over the Hugging Face Hub HTTP API
//!
//! [`HfApiClient`] speaks the same endpoints as the hub's own client library:
//!
//! - `POST /api/repos/create` for repository creation (409 means "exists")
//! - `POST /api/{type}s/{repo}/preupload/{rev}` to pick regular vs LFS upload
//! - the Git LFS batch endpoint for large objects (basic transfer only)
//! - `POST /api/{type}s/{repo}/commit/{rev}` with an NDJSON body to commit
//!
//! The client holds no credential: the token comes with every call.
//! Failures are returned as they happened: [`HubApiError`] for non-success
//! answers, `reqwest::Error` for transport problems, `std::io::Error` for the
//! local file.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::contract::{
    split_repo_id, CommitInfo, CreateRepoRequest, HubApiError, HubClient, HubError, RepoType,
    RepoUrl, UploadFileRequest,
};
use crate::credentials::{resolve_endpoint, ConfigError, HubToken};
use crate::lfs::{BatchRequest, BatchResponse, Object, Transfer, LFS_MEDIA_TYPE};

/// Bytes of the file sent to the preupload endpoint for mode detection.
const SAMPLE_SIZE: usize = 512;

pub struct HfApiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HfApiClient {
    /// Builds a client for the hub at `endpoint` (e.g. `https://huggingface.co`).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, HubError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Url::parse(&endpoint).map_err(|e| {
            error!(error = ?e, endpoint = %endpoint, "Invalid hub endpoint");
            format!("invalid hub endpoint {endpoint:?}: {e}")
        })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("hf-publish/", env!("CARGO_PKG_VERSION")))
            .build()?;
        info!(endpoint = %endpoint, "Initialized HfApiClient");
        Ok(HfApiClient { http, endpoint })
    }

    /// Builds a client for `HF_ENDPOINT`, or the public hub when unset.
    pub fn from_env() -> Result<Self, HubError> {
        Self::new(resolve_endpoint(None))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Web URL of a repository.
    pub fn repo_url(&self, repo_type: RepoType, repo_id: &str) -> String {
        format!("{}/{}{}", self.endpoint, repo_type.url_prefix(), repo_id)
    }

    /// Joins percent-encoded path segments onto the endpoint.
    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, HubError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| format!("hub endpoint {:?} cannot be a base URL", self.endpoint))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/api/{type}s/{owner}/{name}/{action}/{revision}`
    fn repo_api_url(
        &self,
        repo_type: RepoType,
        repo_id: &str,
        action: &str,
        revision: &str,
    ) -> Result<Url, HubError> {
        let mut segments = vec!["api", repo_type.api_segment()];
        segments.extend(repo_id.split('/'));
        segments.push(action);
        segments.push(revision);
        self.url_with_segments(&segments)
    }

    fn lfs_batch_url(&self, repo_type: RepoType, repo_id: &str) -> Result<Url, HubError> {
        let mut segments: Vec<String> = Vec::new();
        if repo_type != RepoType::Model {
            segments.push(repo_type.api_segment().to_string());
        }
        let mut parts: Vec<&str> = repo_id.split('/').collect();
        let last = parts.pop().unwrap_or_default();
        segments.extend(parts.into_iter().map(str::to_string));
        segments.push(format!("{last}.git"));
        segments.extend(["info", "lfs", "objects", "batch"].map(str::to_string));
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.url_with_segments(&refs)
    }

    async fn preupload(
        &self,
        token: &HubToken,
        req: &UploadFileRequest,
        file: &FileUpload,
    ) -> Result<UploadMode, HubError> {
        let url = self.repo_api_url(req.repo_type, &req.repo_id, "preupload", &req.revision)?;
        let body = json!({
            "files": [{
                "path": req.path_in_repo,
                "sample": file.sample,
                "size": file.size,
                "sha": file.sha256,
            }]
        });
        debug!(url = %url, path_in_repo = %req.path_in_repo, "Requesting upload mode");
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Box::new(api_error(resp).await));
        }
        let parsed: PreuploadResponse = resp.json().await?;
        let entry = parsed
            .files
            .into_iter()
            .find(|f| f.path == req.path_in_repo)
            .ok_or_else(|| format!("preupload answer has no entry for {:?}", req.path_in_repo))?;
        if entry.should_ignore {
            warn!(path_in_repo = %req.path_in_repo, "Path is ignored by the repository");
            return Err(format!(
                "{:?} is ignored by the repository's .gitignore",
                req.path_in_repo
            )
            .into());
        }
        info!(path_in_repo = %req.path_in_repo, mode = ?entry.upload_mode, "Upload mode selected");
        Ok(entry.upload_mode)
    }

    async fn lfs_upload(
        &self,
        token: &HubToken,
        req: &UploadFileRequest,
        file: &FileUpload,
    ) -> Result<(), HubError> {
        let object = Object {
            oid: file.sha256.clone(),
            size: file.size,
        };
        let batch_req = BatchRequest::upload(object.clone(), &req.revision);
        let url = self.lfs_batch_url(req.repo_type, &req.repo_id)?;
        debug!(url = %url, oid = %object.oid, "Requesting LFS batch upload");
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::to_vec(&batch_req)?)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Box::new(api_error(resp).await));
        }
        let batch: BatchResponse = resp.json().await?;
        if let Some(transfer) = &batch.transfer {
            if *transfer != Transfer::Basic {
                return Err(format!("unsupported LFS transfer {transfer:?}").into());
            }
        }
        let answer = batch
            .objects
            .into_iter()
            .find(|o| o.oid == object.oid)
            .ok_or_else(|| format!("LFS batch answer has no entry for {}", object.oid))?;
        if let Some(err) = answer.error {
            return Err(Box::new(HubApiError {
                status: err.code,
                message: err.message,
            }));
        }
        let Some(actions) = answer.actions else {
            info!(oid = %object.oid, "LFS object already stored, skipping transfer");
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            let mut put = self.http.put(&upload.href).body(file.content.clone());
            for (name, value) in &upload.header {
                put = put.header(name, value);
            }
            let resp = put.send().await?;
            if !resp.status().is_success() {
                return Err(Box::new(api_error(resp).await));
            }
            info!(oid = %object.oid, size = object.size, "LFS object transferred");
        }

        if let Some(verify) = actions.verify {
            let mut post = self
                .http
                .post(&verify.href)
                .bearer_auth(token.expose())
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(serde_json::to_vec(&object)?);
            for (name, value) in &verify.header {
                post = post.header(name, value);
            }
            let resp = post.send().await?;
            if !resp.status().is_success() {
                return Err(Box::new(api_error(resp).await));
            }
            debug!(oid = %object.oid, "LFS object verified");
        }
        Ok(())
    }

    async fn commit(
        &self,
        token: &HubToken,
        req: &UploadFileRequest,
        file: &FileUpload,
        mode: UploadMode,
    ) -> Result<CommitInfo, HubError> {
        let url = self.repo_api_url(req.repo_type, &req.repo_id, "commit", &req.revision)?;
        let payload = commit_payload(&req.commit_message, &req.path_in_repo, file, mode)?;
        debug!(url = %url, "Creating commit");
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Box::new(api_error(resp).await));
        }
        let parsed: CommitResponse = resp.json().await?;
        Ok(CommitInfo {
            commit_url: parsed.commit_url,
            commit_oid: parsed.commit_oid,
        })
    }
}

#[async_trait]
impl HubClient for HfApiClient {
    async fn ensure_repository(
        &self,
        token: &HubToken,
        req: CreateRepoRequest,
    ) -> Result<RepoUrl, HubError> {
        let body = create_repo_body(&req)?;
        let url = self.url_with_segments(&["api", "repos", "create"])?;
        info!(
            repo_id = %req.repo_id,
            repo_type = %req.repo_type,
            exist_ok = req.exist_ok,
            "Creating repository"
        );
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();

        if status.is_success() {
            let parsed: CreateRepoResponse = resp.json().await.unwrap_or_default();
            return Ok(RepoUrl {
                url: parsed
                    .url
                    .unwrap_or_else(|| self.repo_url(req.repo_type, &req.repo_id)),
                repo_id: req.repo_id,
                repo_type: req.repo_type,
                created: true,
            });
        }
        let err = api_error(resp).await;
        if err.is_conflict() && req.exist_ok {
            info!(repo_id = %req.repo_id, "Repository already exists");
            return Ok(RepoUrl {
                url: self.repo_url(req.repo_type, &req.repo_id),
                repo_id: req.repo_id,
                repo_type: req.repo_type,
                created: false,
            });
        }
        error!(error = %err, repo_id = %req.repo_id, "Repository creation rejected");
        Err(Box::new(err))
    }

    async fn upload_file(
        &self,
        token: &HubToken,
        req: UploadFileRequest,
    ) -> Result<CommitInfo, HubError> {
        let file = FileUpload::read(&req.local_path).await.map_err(|e| {
            error!(error = ?e, local_path = %req.local_path.display(), "Failed to read local file");
            e
        })?;
        info!(
            local_path = %req.local_path.display(),
            path_in_repo = %req.path_in_repo,
            repo_id = %req.repo_id,
            size = file.size,
            "Uploading file"
        );

        let mode = self.preupload(token, &req, &file).await?;
        if mode == UploadMode::Lfs {
            self.lfs_upload(token, &req, &file).await?;
        }
        let commit = self.commit(token, &req, &file, mode).await?;
        info!(commit_url = %commit.commit_url, "Upload committed");
        Ok(commit)
    }
}

/// A local file read into memory with the digests the hub asks for.
#[derive(Debug)]
pub struct FileUpload {
    pub content: Vec<u8>,
    pub size: u64,
    /// Lowercase hex sha256 of the content.
    pub sha256: String,
    /// Base64 of the first bytes, for upload mode detection.
    pub sample: String,
}

impl FileUpload {
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(content))
    }

    pub fn from_bytes(content: Vec<u8>) -> Self {
        let sha256 = format!("{:x}", Sha256::digest(&content));
        let sample_len = content.len().min(SAMPLE_SIZE);
        let sample = general_purpose::STANDARD.encode(&content[..sample_len]);
        FileUpload {
            size: content.len() as u64,
            sha256,
            sample,
            content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Default, Deserialize)]
struct CreateRepoResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_url: String,
    commit_oid: String,
}

/// JSON body for `/api/repos/create`.
fn create_repo_body(req: &CreateRepoRequest) -> Result<Value, ConfigError> {
    let (organization, name) = split_repo_id(&req.repo_id)?;
    let mut body = Map::new();
    body.insert("name".into(), json!(name));
    if let Some(org) = organization {
        body.insert("organization".into(), json!(org));
    }
    if req.repo_type != RepoType::Model {
        body.insert("type".into(), json!(req.repo_type.as_str()));
    }
    if let Some(private) = req.private {
        body.insert("private".into(), json!(private));
    }
    if req.repo_type == RepoType::Space {
        let sdk = req.space_sdk.as_deref().ok_or(ConfigError::MissingSpaceSdk)?;
        body.insert("sdk".into(), json!(sdk));
    }
    Ok(Value::Object(body))
}

/// NDJSON commit body: a header line, then one operation line.
fn commit_payload(
    summary: &str,
    path_in_repo: &str,
    file: &FileUpload,
    mode: UploadMode,
) -> Result<String, serde_json::Error> {
    let header = json!({
        "key": "header",
        "value": { "summary": summary, "description": "" },
    });
    let operation = match mode {
        UploadMode::Regular => json!({
            "key": "file",
            "value": {
                "content": general_purpose::STANDARD.encode(&file.content),
                "path": path_in_repo,
                "encoding": "base64",
            },
        }),
        UploadMode::Lfs => json!({
            "key": "lfsFile",
            "value": {
                "path": path_in_repo,
                "algo": "sha256",
                "oid": file.sha256,
                "size": file.size,
            },
        }),
    };
    Ok(format!(
        "{}\n{}\n",
        serde_json::to_string(&header)?,
        serde_json::to_string(&operation)?
    ))
}

async fn api_error(resp: reqwest::Response) -> HubApiError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    HubApiError {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

/// The hub's `{"error": "..."}` message, else the raw body, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn client() -> HfApiClient {
        HfApiClient::new("https://hub.example/").unwrap()
    }

    fn create_req(repo_id: &str, repo_type: RepoType) -> CreateRepoRequest {
        CreateRepoRequest {
            repo_id: repo_id.to_string(),
            repo_type,
            exist_ok: true,
            private: None,
            space_sdk: None,
        }
    }

    #[test]
    fn model_create_body_omits_type() {
        let body = create_repo_body(&create_req("mariofabelo/rf_model", RepoType::Model)).unwrap();
        assert_eq!(body, json!({ "name": "rf_model", "organization": "mariofabelo" }));
    }

    #[test]
    fn dataset_create_body_carries_type_and_visibility() {
        let mut req = create_req("data", RepoType::Dataset);
        req.private = Some(true);
        let body = create_repo_body(&req).unwrap();
        assert_eq!(body, json!({ "name": "data", "type": "dataset", "private": true }));
    }

    #[test]
    fn space_requires_sdk() {
        let mut req = create_req("me/demo", RepoType::Space);
        assert!(matches!(create_repo_body(&req), Err(ConfigError::MissingSpaceSdk)));
        req.space_sdk = Some("gradio".into());
        assert_eq!(create_repo_body(&req).unwrap()["sdk"], "gradio");
    }

    #[test]
    fn api_urls_are_built_from_segments() {
        let c = client();
        assert_eq!(c.endpoint(), "https://hub.example");
        assert_eq!(
            c.repo_api_url(RepoType::Model, "me/model", "preupload", "main")
                .unwrap()
                .as_str(),
            "https://hub.example/api/models/me/model/preupload/main"
        );
        assert_eq!(
            c.repo_api_url(RepoType::Dataset, "me/data", "commit", "refs/pr/1")
                .unwrap()
                .as_str(),
            "https://hub.example/api/datasets/me/data/commit/refs%2Fpr%2F1"
        );
    }

    #[test]
    fn lfs_batch_url_uses_git_path() {
        let c = client();
        assert_eq!(
            c.lfs_batch_url(RepoType::Model, "me/model").unwrap().as_str(),
            "https://hub.example/me/model.git/info/lfs/objects/batch"
        );
        assert_eq!(
            c.lfs_batch_url(RepoType::Space, "me/demo").unwrap().as_str(),
            "https://hub.example/spaces/me/demo.git/info/lfs/objects/batch"
        );
    }

    #[test]
    fn repo_url_uses_type_prefix() {
        let c = client();
        assert_eq!(
            c.repo_url(RepoType::Model, "me/model"),
            "https://hub.example/me/model"
        );
        assert_eq!(
            c.repo_url(RepoType::Dataset, "me/data"),
            "https://hub.example/datasets/me/data"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(HfApiClient::new("not a url").is_err());
    }

    #[test]
    fn file_digest_and_sample() {
        let file = FileUpload::from_bytes(b"hello".to_vec());
        assert_eq!(file.size, 5);
        assert_eq!(
            file.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(file.sample, "aGVsbG8=");
    }

    #[test]
    fn sample_is_capped() {
        let file = FileUpload::from_bytes(vec![0u8; 2048]);
        let decoded = general_purpose::STANDARD.decode(&file.sample).unwrap();
        assert_eq!(decoded.len(), SAMPLE_SIZE);
    }

    #[test]
    fn regular_commit_payload_inlines_content() {
        let file = FileUpload::from_bytes(b"hello".to_vec());
        let payload = commit_payload("Upload a.txt", "a.txt", &file, UploadMode::Regular).unwrap();
        let lines: Vec<Value> = payload
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Upload a.txt");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["content"], "aGVsbG8=");
        assert_eq!(lines[1]["value"]["path"], "a.txt");
    }

    #[test]
    fn lfs_commit_payload_references_oid() {
        let file = FileUpload::from_bytes(b"hello".to_vec());
        let payload = commit_payload("msg", "rf_model.pkl", &file, UploadMode::Lfs).unwrap();
        let op: Value = serde_json::from_str(payload.lines().nth(1).unwrap()).unwrap();
        assert_eq!(op["key"], "lfsFile");
        assert_eq!(op["value"]["oid"], file.sha256.as_str());
        assert_eq!(op["value"]["algo"], "sha256");
        assert_eq!(op["value"]["size"], 5);
    }

    #[test]
    fn preupload_answer_parses() {
        let parsed: PreuploadResponse = serde_json::from_value(json!({
            "files": [{ "path": "rf_model.pkl", "uploadMode": "lfs", "shouldIgnore": false }]
        }))
        .unwrap();
        assert_eq!(parsed.files[0].upload_mode, UploadMode::Lfs);
        assert!(!parsed.files[0].should_ignore);
    }

    #[test]
    fn error_message_prefers_hub_error_field() {
        assert_eq!(
            error_message(
                StatusCode::CONFLICT,
                r#"{"error":"You already created this model repo"}"#
            ),
            "You already created this model repo"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::UNAUTHORIZED, ""), "Unauthorized");
    }

    #[tokio::test]
    async fn missing_local_file_fails_before_any_request() {
        // Nothing listens on the discard port; the read must fail first.
        let client = HfApiClient::new("http://127.0.0.1:9").unwrap();
        let token = HubToken::new("hf_test").unwrap();
        let err = client
            .upload_file(
                &token,
                UploadFileRequest {
                    local_path: PathBuf::from("/no/such/dir/rf_model.pkl"),
                    path_in_repo: "rf_model.pkl".into(),
                    repo_id: "me/model".into(),
                    repo_type: RepoType::Model,
                    revision: "main".into(),
                    commit_message: "Upload rf_model.pkl".into(),
                },
            )
            .await
            .unwrap_err();
        let io = err
            .downcast_ref::<std::io::Error>()
            .expect("upload should fail with the io error itself");
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
