//! Startup configuration.
//!
//! Resolution order for every setting:
//! 1. command-line flag (or its environment variable)
//! 2. TOML config file given by `--config`
//! 3. compiled default

use crate::orchestrator::WorkflowSettings;
use crate::recognition::QuotaMarks;
use crate::review::ReviewKeys;
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";
const DEFAULT_CAMERA_DIR: &str = "camera";

/// Command-line arguments for attendd
#[derive(Parser, Debug, Default)]
#[command(name = "attendd")]
#[command(about = "Attendance capture and review sidecar")]
#[command(version)]
pub struct Args {
    /// Base URL of the attendance REST API
    #[arg(long, env = "ATTENDD_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Directory holding the local workspace database
    #[arg(long, env = "ATTENDD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Spool directory the camera frame grabber writes into
    #[arg(long, env = "ATTENDD_CAMERA_DIR")]
    pub camera_dir: Option<PathBuf>,

    /// Optional TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    backend_url: Option<String>,
    workspace: Option<PathBuf>,
    camera_dir: Option<PathBuf>,
    #[serde(default)]
    review: ReviewSection,
    #[serde(default)]
    quota: Option<QuotaMarks>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReviewSection {
    approve_key: Option<char>,
    reject_key: Option<char>,
    skip_key: Option<char>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend_url: String,
    /// `None` until the UI selects a workspace.
    pub workspace: Option<PathBuf>,
    pub camera_dir: PathBuf,
    pub review_keys: ReviewKeys,
    pub quota: QuotaMarks,
}

impl Config {
    pub fn workflow(&self) -> WorkflowSettings {
        WorkflowSettings {
            review_keys: self.review_keys,
            quota: self.quota,
        }
    }
}

pub fn load(args: &Args) -> Result<Config> {
    let file = match &args.config {
        Some(path) => read_file(path)?,
        None => FileConfig::default(),
    };
    resolve(args, file)
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

fn resolve(args: &Args, file: FileConfig) -> Result<Config> {
    let defaults = ReviewKeys::default();
    let review_keys = ReviewKeys {
        approve: file.review.approve_key.unwrap_or(defaults.approve),
        reject: file.review.reject_key.unwrap_or(defaults.reject),
        skip: file.review.skip_key.unwrap_or(defaults.skip),
    };
    let keys = [review_keys.approve, review_keys.reject, review_keys.skip]
        .map(|c| c.to_ascii_lowercase());
    if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
        bail!("review keys must be distinct, got {:?}", keys);
    }

    let quota = file.quota.unwrap_or_default();
    if quota.critical_water > quota.low_water {
        bail!(
            "quota critical_water ({}) must not exceed low_water ({})",
            quota.critical_water,
            quota.low_water
        );
    }

    Ok(Config {
        backend_url: args
            .backend_url
            .clone()
            .or(file.backend_url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
        workspace: args.workspace.clone().or(file.workspace),
        camera_dir: args
            .camera_dir
            .clone()
            .or(file.camera_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CAMERA_DIR)),
        review_keys,
        quota,
    })
}
