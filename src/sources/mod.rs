//! Log store abstraction and implementations.
//!
//! Provides a unified `LogStore` trait with implementations for:
//! - A remote log service over HTTP
//! - A local JSON-lines file
//!
//! plus the `FetchRunner` that executes store calls as background tasks.

pub mod file;
pub mod http;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::model::{ChartAggregate, ChartPeriod, LogInfo, LogLevel, LogsResponse};
use crate::query::QueryDescriptor;

/// Describes which store the session talks to
#[derive(Clone, Debug)]
pub enum StoreKind {
    Http { base_url: String },
    File { path: PathBuf },
}

impl StoreKind {
    /// Build the store this kind describes
    pub fn open(&self, timeout: Duration) -> StoreResult<Arc<dyn LogStore>> {
        Ok(match self {
            StoreKind::Http { base_url } => Arc::new(http::HttpStore::new(base_url, timeout)?),
            StoreKind::File { path } => Arc::new(file::FileStore::new(path.clone())),
        })
    }
}

/// Failure of a store call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Optional endpoints answering "not found" are treated as empty, not failed
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The log store as seen by the client: query parameters in, batches out
#[async_trait::async_trait]
pub trait LogStore: Send + Sync {
    async fn logs(&self, query: &QueryDescriptor) -> StoreResult<LogsResponse>;

    /// Store metadata, used for export headers
    async fn log_info(&self) -> StoreResult<LogInfo>;

    async fn chart_data(
        &self,
        period: ChartPeriod,
        levels: Option<&[LogLevel]>,
    ) -> StoreResult<ChartAggregate>;

    async fn categories(&self) -> StoreResult<Vec<String>>;

    async fn functions(&self) -> StoreResult<Vec<String>>;

    /// Truncate the store. Destructive; callers confirm first.
    async fn clear(&self) -> StoreResult<()>;

    /// Display name for this store
    fn name(&self) -> String;
}
