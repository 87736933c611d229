//! imgpipe CLI
//!
//! Ingest images into the media tree and inspect pipeline names and keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use common::naming;
use common::planner::url_paths;
use common::storage::{MediaStore, remote_key};
use common::Size;
use mq::{MqConfig, MqRouter, QueueRouter, init_mq};
use serde::Serialize;
use tracing::info;
use worker::{InlineRouter, Pipeline, UploadRequest, WorkerAppConfig, on_upload, submit};

#[derive(Parser, Debug)]
#[command(name = "imgpipe", version, about)]
struct Cli {
    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an image and queue its variants.
    Upload {
        file: PathBuf,
        /// Uploading user.
        #[arg(long, env = "IMGPIPE_OWNER")]
        owner: u64,
        /// Run resize, audit and CDN sync in this process instead of queueing.
        #[arg(long)]
        sync: bool,
    },
    /// Split an encoded asset name into its parts.
    Decode { name: String },
    /// Print the CDN object key of a media tree path.
    Key { path: PathBuf },
}

#[derive(Serialize)]
struct UploadOutput {
    name: String,
    owner_id: u64,
    original_size: Size,
    urls: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct DecodeOutput {
    stem: String,
    owner_id: u64,
    timestamp: String,
    uploaded_at: Option<String>,
    ext: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Upload { file, owner, sync } => upload(&file, owner, sync, cli.format).await,
        Command::Decode { name } => decode(&name, cli.format),
        Command::Key { path } => key(&path, cli.format),
    }
}

async fn upload(file: &Path, owner: u64, sync: bool, format: OutputFormat) -> anyhow::Result<()> {
    let config = WorkerAppConfig::load().context("Failed to load config")?;

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("File name is not valid UTF-8")?;

    let media = MediaStore::new(&config.pipeline.media_root)
        .await
        .context("Failed to open media root")?;
    let asset = on_upload(
        UploadRequest {
            bytes,
            owner_id: owner,
            original_filename: filename.to_string(),
            received_at: Utc::now(),
        },
        &media,
    )
    .await?;

    let router: Box<dyn QueueRouter> = if sync {
        let pipeline = Pipeline::from_config(&config)
            .await
            .context("Failed to build pipeline")?;
        Box::new(InlineRouter::new(Arc::new(pipeline)))
    } else {
        let mq = init_mq(MqConfig::from(&config.mq))
            .await
            .context("Failed to initialize MQ")?;
        Box::new(MqRouter::new(Arc::new(mq), config.mq.clone()))
    };

    let descriptors = submit(&asset, &config.pipeline.variants, router.as_ref()).await?;
    info!(name = %asset.name, variants = descriptors.len() - 1, sync, "Upload submitted");

    let output = UploadOutput {
        urls: url_paths(&descriptors, media.root()),
        name: asset.name,
        owner_id: asset.owner_id,
        original_size: asset.original_size,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("{} ({}, owner {})", output.name, output.original_size, output.owner_id);
            for (label, url) in &output.urls {
                println!("  {label:<12} {url}");
            }
        }
    }
    Ok(())
}

fn decode(name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let decoded = naming::decode(name)?;
    let output = DecodeOutput {
        uploaded_at: decoded.timestamp.to_datetime().map(|t| t.to_rfc3339()),
        timestamp: decoded.timestamp.to_string(),
        stem: decoded.stem,
        owner_id: decoded.owner_id,
        ext: decoded.ext,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("stem:      {}", output.stem);
            println!("owner:     {}", output.owner_id);
            println!("timestamp: {}", output.timestamp);
            if let Some(at) = &output.uploaded_at {
                println!("uploaded:  {at}");
            }
            println!("ext:       {}", output.ext);
        }
    }
    Ok(())
}

fn key(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let key = remote_key(path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "key": key })),
        OutputFormat::Text => println!("{key}"),
    }
    Ok(())
}
