use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::logging::log_fetch;
use crate::order::{parse_api_orders, parse_orders, ApiOrder, ParsedOrders};
use crate::table::parse_listing;

mod api;
mod cli;
pub mod retry;

pub use api::ApiSource;
pub use cli::CliSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Run the `sf` command and parse its table.
    Cli,
    /// Parse a previously captured table from a file.
    File,
    /// Query the marketplace HTTP API.
    Api,
}

impl SourceKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cli" => Ok(SourceKind::Cli),
            "file" => Ok(SourceKind::File),
            "api" => Ok(SourceKind::Api),
            other => Err(anyhow!("unknown source {:?} (expected cli, file or api)", other)),
        }
    }

    pub fn from_env() -> Self {
        std::env::var("SF_SOURCE")
            .ok()
            .and_then(|v| Self::parse(&v).ok())
            .unwrap_or(SourceKind::Cli)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Cli => "cli",
            SourceKind::File => "file",
            SourceKind::Api => "api",
        }
    }

    pub fn build(self, cfg: &Config) -> Result<Box<dyn OrderSource + Send + Sync>> {
        match self {
            SourceKind::Cli => Ok(Box::new(CliSource::new(cfg.sf_bin.clone(), cfg.sf_args.clone()))),
            SourceKind::File => {
                let path = cfg
                    .input_path
                    .clone()
                    .ok_or_else(|| anyhow!("file source needs --input <FILE>"))?;
                Ok(Box::new(FileSource::new(path)))
            }
            SourceKind::Api => Ok(Box::new(ApiSource::new(cfg)?)),
        }
    }
}

/// What a source hands to the parse stage.
#[derive(Debug, Clone)]
pub enum SourceOutput {
    /// Raw box-drawn table text.
    Table(String),
    Orders(Vec<ApiOrder>),
}

impl SourceOutput {
    pub fn into_orders(self, units_per_node: u32) -> ParsedOrders {
        match self {
            SourceOutput::Table(text) => parse_orders(&parse_listing(&text), units_per_node),
            SourceOutput::Orders(orders) => parse_api_orders(&orders, units_per_node),
        }
    }
}

#[async_trait]
pub trait OrderSource {
    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<SourceOutput>;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl OrderSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self) -> Result<SourceOutput> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading listing from {}", self.path.display()))?;
        if bytes.is_empty() {
            bail!("listing file {} is empty", self.path.display());
        }
        log_fetch(self.name(), bytes.len(), &fingerprint(&bytes));
        Ok(SourceOutput::Table(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// SHA-256 of a fetched payload, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
