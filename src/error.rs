//! Culling error handling
//!
//! Every fallible operation in the crate returns `CullResult<T>`. Runtime
//! capacity problems are not errors (buffers grow instead); the variants here
//! cover setup failures, configuration problems and driver-level faults.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CullError {
    #[error("GPU allocation failed for {resource}: {error}")]
    GpuAllocation { resource: String, error: String },

    #[error("Shader compilation failed: {shader}: {error}")]
    ShaderCompilation { shader: String, error: String },

    #[error("Shader include not found: {include} (required by {shader})")]
    MissingInclude { shader: String, include: String },

    #[error("Failed to map GPU buffer {buffer}: {error}")]
    BufferMapping { buffer: String, error: String },

    #[error("Invalid culling configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse culling config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to start statistics worker: {error}")]
    StatsWorker { error: String },

    #[error("Culling context used after teardown")]
    TornDown,
}

/// Type alias for culling operation results
pub type CullResult<T> = Result<T, CullError>;

/// Helper trait for attaching GPU operation context to foreign errors
pub trait CullErrorContext<T> {
    fn gpu_context(self, resource: &str) -> CullResult<T>;
}

impl<T, E> CullErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn gpu_context(self, resource: &str) -> CullResult<T> {
        self.map_err(|e| gpu_allocation_error(resource, e))
    }
}

/// Create a GPU allocation error
pub fn gpu_allocation_error(resource: &str, error: impl std::fmt::Display) -> CullError {
    CullError::GpuAllocation {
        resource: resource.to_string(),
        error: error.to_string(),
    }
}

/// Create a buffer mapping error
pub fn buffer_mapping_error(buffer: &str, error: impl std::fmt::Display) -> CullError {
    CullError::BufferMapping {
        buffer: buffer.to_string(),
        error: error.to_string(),
    }
}

/// Create a configuration validation error
pub fn invalid_config(reason: impl Into<String>) -> CullError {
    CullError::InvalidConfig {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_context_wraps_display_errors() {
        let result: Result<(), &str> = Err("out of memory");
        let err = result.gpu_context("Visibility Result Buffer").unwrap_err();
        assert_eq!(
            err.to_string(),
            "GPU allocation failed for Visibility Result Buffer: out of memory"
        );
    }

    #[test]
    fn test_invalid_config_message() {
        let err = invalid_config("readback_ring_size must be at least 1");
        assert!(err.to_string().contains("readback_ring_size"));
    }
}
