//! Git LFS batch API types, as spoken by the hub for large uploads.
//!
//! Only the `upload` operation with the `basic` transfer is used.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Media type required by the LFS batch endpoint.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md#requests
#[derive(PartialEq, Eq, Debug, Serialize)]
pub struct BatchRequest {
    pub operation: Operation,
    pub transfers: Vec<Transfer>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_property: Option<Ref>,
    pub objects: Vec<Object>,
    pub hash_algo: &'static str,
}

impl BatchRequest {
    /// A basic-transfer upload request for a single sha256 object.
    /// A revision already spelled as a full ref (`refs/pr/1`) is sent as is.
    pub fn upload(object: Object, revision: &str) -> Self {
        let name = if revision.starts_with("refs/") {
            revision.to_string()
        } else {
            format!("refs/heads/{revision}")
        };
        BatchRequest {
            operation: Operation::Upload,
            transfers: vec![Transfer::Basic],
            ref_property: Some(Ref { name }),
            objects: vec![object],
            hash_algo: "sha256",
        }
    }
}

/// https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md#successful-responses
#[derive(PartialEq, Eq, Debug, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub transfer: Option<Transfer>,
    pub objects: Vec<ObjectResponse>,
}

#[derive(PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Download,
    Upload,
}

/// https://github.com/git-lfs/git-lfs/blob/main/docs/api/basic-transfers.md
#[derive(PartialEq, Eq, Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    Basic,
    Multipart,
    #[serde(other)]
    Other,
}

#[derive(PartialEq, Eq, Debug, Serialize)]
pub struct Ref {
    pub name: String,
}

#[derive(PartialEq, Eq, Debug, Clone, Deserialize, Serialize)]
pub struct Object {
    pub oid: String,
    pub size: u64,
}

/// One object of a batch response: either actions to perform or an error.
/// Neither means the server already has the object.
#[derive(PartialEq, Eq, Debug, Deserialize)]
pub struct ObjectResponse {
    pub oid: String,
    pub size: u64,
    #[serde(default)]
    pub actions: Option<Actions>,
    #[serde(default)]
    pub error: Option<ObjectError>,
}

/// https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md#response-errors
#[derive(PartialEq, Eq, Debug, Deserialize)]
pub struct ObjectError {
    pub code: u16,
    pub message: String,
}

#[derive(PartialEq, Eq, Debug, Default, Deserialize)]
pub struct Actions {
    #[serde(default)]
    pub upload: Option<Action>,
    #[serde(default)]
    pub verify: Option<Action>,
}

#[derive(PartialEq, Eq, Debug, Deserialize)]
pub struct Action {
    pub href: String,
    #[serde(default)]
    pub header: HashMap<String, String>,
}
