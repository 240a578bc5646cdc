#![doc = "hf-publish-core: core logic library for hf-publish."]

//! This crate contains the credential loading, the hub client contract, the
//! Hugging Face Hub HTTP client and the publish orchestration.
//! CLI parsing and YAML handling live in the `hf-publish` crate.
//!
//! # Usage
//! Build a [`publish::PublishTask`], pick a [`contract::HubClient`]
//! (the real [`hub::HfApiClient`] or a mock) and call [`publish::publish`].

pub mod contract;
pub mod credentials;
pub mod hub;
pub mod lfs;
pub mod publish;
