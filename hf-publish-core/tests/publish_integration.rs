use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use hf_publish_core::contract::{
    CommitInfo, CreateRepoRequest, HubApiError, HubClient, HubError, MockHubClient, RepoType,
    RepoUrl, UploadFileRequest,
};
use hf_publish_core::credentials::HubToken;
use hf_publish_core::publish::{publish, run_publish, PublishError, PublishTarget, PublishTask};
use tempfile::tempdir;

fn token() -> HubToken {
    HubToken::new("hf_test").expect("test token is non-empty")
}

fn commit() -> CommitInfo {
    CommitInfo {
        commit_url: "https://hub.example/me/rf_model/commit/abc123".into(),
        commit_oid: "abc123".into(),
    }
}

fn write_artifact(dir: &std::path::Path, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join("rf_model.pkl");
    std::fs::write(&path, bytes).expect("write artifact");
    path
}

#[tokio::test]
async fn missing_token_stops_before_any_hub_call() {
    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository().times(0);
    hub.expect_upload_file().times(0);

    let target = PublishTarget::new("me/rf_model", "/tmp/rf_model.pkl");
    let err = run_publish(target, |_| None, &hub).await.unwrap_err();

    assert!(matches!(err, PublishError::Config(_)), "got: {err}");
    assert!(err.to_string().contains("HF_TOKEN"), "got: {err}");
}

#[tokio::test]
async fn empty_token_counts_as_missing() {
    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository().times(0);
    hub.expect_upload_file().times(0);

    let target = PublishTarget::new("me/rf_model", "/tmp/rf_model.pkl");
    let err = run_publish(target, |_| Some("  ".to_string()), &hub)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Config(_)));
}

#[tokio::test]
async fn happy_path_creates_with_exist_ok_and_uploads_once() {
    let dir = tempdir().unwrap();
    let local = write_artifact(dir.path(), b"model bytes");
    let expected_local = local.clone();

    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository()
        .withf(|token: &HubToken, req: &CreateRepoRequest| {
            token.expose() == "hf_test"
                && req.exist_ok
                && req.repo_id == "me/rf_model"
                && req.repo_type == RepoType::Model
        })
        .times(1)
        .returning(|_, req: CreateRepoRequest| {
            Ok(RepoUrl {
                url: format!("https://hub.example/{}", req.repo_id),
                repo_id: req.repo_id,
                repo_type: req.repo_type,
                created: true,
            })
        });
    hub.expect_upload_file()
        .withf(move |_: &HubToken, req: &UploadFileRequest| {
            req.local_path == expected_local
                && req.path_in_repo == "rf_model.pkl"
                && req.repo_id == "me/rf_model"
                && req.repo_type == RepoType::Model
                && req.revision == "main"
        })
        .times(1)
        .returning(|_, _| Ok(commit()));

    let target = PublishTarget::new("me/rf_model", local);
    let report = run_publish(
        target,
        |key| (key == "HF_TOKEN").then(|| "hf_test".to_string()),
        &hub,
    )
    .await
    .expect("publish should succeed");

    assert_eq!(report.repo_id, "me/rf_model");
    assert_eq!(report.path_in_repo, "rf_model.pkl");
    assert!(report.repository.as_ref().map(|r| r.created).unwrap_or(false));
    assert!(report.repository_error.is_none());
    assert_eq!(report.commit, commit());
}

#[tokio::test]
async fn repository_creation_error_is_tolerated() {
    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository().times(1).returning(|_, _| {
        Err(Box::new(HubApiError {
            status: 409,
            message: "You already created this model repo".into(),
        }) as HubError)
    });
    hub.expect_upload_file().times(1).returning(|_, _| Ok(commit()));

    let target = PublishTarget::new("me/rf_model", "rf_model.pkl");
    let task = PublishTask::new(token(), target).unwrap();
    let report = publish(&task, &hub).await.expect("creation errors must not halt");

    assert!(report.repository.is_none());
    assert!(report
        .repository_error
        .as_deref()
        .unwrap_or_default()
        .contains("already created"));
}

#[tokio::test]
async fn non_conflict_creation_error_is_also_tolerated() {
    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository()
        .times(1)
        .returning(|_, _| Err("connection reset by peer".into()));
    hub.expect_upload_file().times(1).returning(|_, _| Ok(commit()));

    let target = PublishTarget::new("me/rf_model", "rf_model.pkl");
    let task = PublishTask::new(token(), target).unwrap();
    assert!(publish(&task, &hub).await.is_ok());
}

#[tokio::test]
async fn upload_error_is_returned_unmodified() {
    let remote = HubApiError {
        status: 403,
        message: "You don't have the rights to create a model under this namespace".into(),
    };
    let returned = remote.clone();

    let mut hub = MockHubClient::new();
    hub.expect_ensure_repository().times(1).returning(|_, req| {
        Ok(RepoUrl {
            url: String::new(),
            repo_id: req.repo_id,
            repo_type: req.repo_type,
            created: false,
        })
    });
    hub.expect_upload_file()
        .times(1)
        .returning(move |_, _| Err(Box::new(returned.clone()) as HubError));

    let target = PublishTarget::new("me/rf_model", "rf_model.pkl");
    let task = PublishTask::new(token(), target).unwrap();
    let err = publish(&task, &hub).await.unwrap_err();

    match err {
        PublishError::Upload(inner) => {
            let api = inner
                .downcast_ref::<HubApiError>()
                .expect("the hub's own error type must come through");
            assert_eq!(api, &remote);
        }
        other => panic!("expected upload error, got {other}"),
    }
}

/// In-memory hub that tolerates repeat creation and overwrites on upload.
#[derive(Default)]
struct FakeHub {
    repos: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
    commits: AtomicUsize,
}

#[async_trait]
impl HubClient for FakeHub {
    async fn ensure_repository(
        &self,
        _token: &HubToken,
        req: CreateRepoRequest,
    ) -> Result<RepoUrl, HubError> {
        let mut repos = self.repos.lock().unwrap();
        let created = !repos.contains_key(&req.repo_id);
        if !created && !req.exist_ok {
            return Err(Box::new(HubApiError {
                status: 409,
                message: "exists".into(),
            }));
        }
        repos.entry(req.repo_id.clone()).or_default();
        Ok(RepoUrl {
            url: format!("https://hub.example/{}", req.repo_id),
            repo_id: req.repo_id,
            repo_type: req.repo_type,
            created,
        })
    }

    async fn upload_file(
        &self,
        _token: &HubToken,
        req: UploadFileRequest,
    ) -> Result<CommitInfo, HubError> {
        let bytes = tokio::fs::read(&req.local_path).await?;
        let mut repos = self.repos.lock().unwrap();
        let repo = repos.get_mut(&req.repo_id).ok_or_else(|| {
            Box::new(HubApiError {
                status: 404,
                message: "Repository not found".into(),
            }) as HubError
        })?;
        repo.insert(req.path_in_repo, bytes);
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CommitInfo {
            commit_url: format!("https://hub.example/{}/commit/{n}", req.repo_id),
            commit_oid: format!("{n:040}"),
        })
    }
}

impl FakeHub {
    fn snapshot(&self) -> HashMap<String, HashMap<String, Vec<u8>>> {
        self.repos.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn publishing_twice_leaves_same_end_state() {
    let dir = tempdir().unwrap();
    let local = write_artifact(dir.path(), b"random forest");
    let task = PublishTask::new(token(), PublishTarget::new("me/rf_model", local)).unwrap();

    let once = FakeHub::default();
    publish(&task, &once).await.expect("first publish");

    let twice = FakeHub::default();
    let first = publish(&task, &twice).await.expect("first publish");
    let second = publish(&task, &twice).await.expect("second publish");

    assert!(first.repository.as_ref().unwrap().created);
    assert!(!second.repository.as_ref().unwrap().created);
    assert_eq!(once.snapshot(), twice.snapshot());
    assert_eq!(
        twice.snapshot()["me/rf_model"]["rf_model.pkl"],
        b"random forest".to_vec()
    );
}

#[tokio::test]
async fn missing_local_file_is_fatal() {
    let dir = tempdir().unwrap();
    let task = PublishTask::new(
        token(),
        PublishTarget::new("me/rf_model", dir.path().join("missing.pkl")),
    )
    .unwrap();

    let hub = FakeHub::default();
    let err = publish(&task, &hub).await.unwrap_err();

    let PublishError::Upload(inner) = err else {
        panic!("expected upload error");
    };
    let io = inner
        .downcast_ref::<std::io::Error>()
        .expect("io error should pass through");
    assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    assert!(hub.snapshot()["me/rf_model"].is_empty());
}
