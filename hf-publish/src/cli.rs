//! CLI glue for hf-publish: argument parsing, config merging and the async
//! [`run`] entrypoint used by `main` and by integration tests.
//!
//! All hub logic lives in `hf-publish-core`. This module only resolves a
//! [`PublishTarget`] from flags and an optional YAML task file, loads the
//! token, and hands both to [`publish`].

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hf_publish_core::contract::RepoType;
use hf_publish_core::credentials::{load_env_file, load_token};
use hf_publish_core::hub::HfApiClient;
use hf_publish_core::publish::{publish, PublishTarget, PublishTask};
use std::path::PathBuf;

use crate::load_config::{load_config, merge_target};

/// CLI for hf-publish: push a local artifact to a Hugging Face Hub repository.
#[derive(Parser)]
#[clap(
    name = "hf-publish",
    version,
    about = "Ensure a Hugging Face Hub repository exists and upload a file to it"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the repository if needed, then upload one file
    Publish(PublishArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct PublishArgs {
    /// YAML task file; flags override its values
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Repository id, `owner/name` or `name`
    #[clap(long)]
    pub repo_id: Option<String>,

    /// Repository type: model, dataset or space
    #[clap(long)]
    pub repo_type: Option<RepoType>,

    /// Local file to upload
    #[clap(long)]
    pub file: Option<PathBuf>,

    /// Destination path inside the repository (default: the file name)
    #[clap(long)]
    pub path_in_repo: Option<String>,

    /// Branch to commit to (default: main)
    #[clap(long)]
    pub revision: Option<String>,

    #[clap(long)]
    pub commit_message: Option<String>,

    /// Create the repository as private
    #[clap(long, conflicts_with = "public")]
    pub private: bool,

    /// Create the repository as public, overriding `private` in the config file
    #[clap(long)]
    pub public: bool,

    /// Space SDK, required for space repositories
    #[clap(long)]
    pub space_sdk: Option<String>,

    /// Hub base URL (default: $HF_ENDPOINT or https://huggingface.co)
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Explicit env file to load before reading HF_TOKEN
    #[clap(long)]
    pub env_file: Option<PathBuf>,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("run_started");

    match cli.command {
        Commands::Publish(args) => {
            if let Some(env_file) = &args.env_file {
                load_env_file(env_file)?;
            }
            let file = args.config.as_deref().map(load_config).transpose()?;
            let target: PublishTarget = merge_target(file, &args)?;
            tracing::info!(
                command = "publish",
                repo_id = %target.repo_id,
                "Resolved publish target"
            );

            // The token must be present before any client exists.
            let token = load_token()?;
            let task = PublishTask::new(token, target)?;

            let client = match &args.endpoint {
                Some(endpoint) => HfApiClient::new(endpoint.as_str()),
                None => HfApiClient::from_env(),
            }
            .map_err(|e| anyhow::anyhow!(e))?;

            let report = publish(&task, &client).await.with_context(|| {
                format!(
                    "publishing {} to {}",
                    task.local_path.display(),
                    task.repo_id
                )
            })?;
            tracing::info!(command = "publish", ?report, "Publish complete");
            Ok(())
        }
    }
}
