//! Seams to the external extraction and dialect-conversion processes.
//!
//! Both collaborators run to completion before materialization starts.
//! The engine only sees their finished output.

use std::path::PathBuf;

use accessmig_core::conversion::{ConversionRequest, ConvertedQuery};
use accessmig_core::error::CoreError;
use accessmig_core::issues::SourceObjectType;
use async_trait::async_trait;

/// Produces the raw JSON-on-stdout output for one legacy object.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        source_path: &str,
        object_name: &str,
        object_type: SourceObjectType,
    ) -> Result<String, CoreError>;
}

/// Rewrites a legacy query into target-dialect statements.
#[async_trait]
pub trait QueryConverter: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> Result<ConvertedQuery, CoreError>;
}

/// Extractor returning output captured earlier.
#[derive(Debug, Clone)]
pub struct CapturedExtraction {
    output: String,
}

impl CapturedExtraction {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl Extractor for CapturedExtraction {
    async fn extract(
        &self,
        _source_path: &str,
        _object_name: &str,
        _object_type: SourceObjectType,
    ) -> Result<String, CoreError> {
        Ok(self.output.clone())
    }
}

/// Extractor reading a payload file written by an earlier extraction run.
#[derive(Debug, Clone)]
pub struct PayloadFile {
    path: PathBuf,
}

impl PayloadFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Extractor for PayloadFile {
    async fn extract(
        &self,
        _source_path: &str,
        object_name: &str,
        _object_type: SourceObjectType,
    ) -> Result<String, CoreError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::Extraction(format!(
                "Cannot read payload for '{object_name}' from {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// Converter returning a pre-computed conversion.
#[derive(Debug, Clone)]
pub struct PrecomputedConversion {
    converted: ConvertedQuery,
}

impl PrecomputedConversion {
    pub fn new(converted: ConvertedQuery) -> Self {
        Self { converted }
    }

    /// Load a converter result serialized as JSON.
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::Validation(format!("Cannot read conversion {}: {e}", path.display()))
        })?;
        let converted = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Validation(format!("Malformed conversion {}: {e}", path.display()))
        })?;
        Ok(Self { converted })
    }
}

#[async_trait]
impl QueryConverter for PrecomputedConversion {
    async fn convert(&self, _request: &ConversionRequest) -> Result<ConvertedQuery, CoreError> {
        Ok(self.converted.clone())
    }
}
