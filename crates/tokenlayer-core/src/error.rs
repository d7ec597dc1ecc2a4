use std::fmt;

use thiserror::Error;

/// High-level error type shared across the pipeline's components.
///
/// Most failures inside the pipeline are *collected* as [`crate::diagnostics::Diagnostic`]s
/// rather than raised here; `PipelineError` is reserved for the configuration-level failures
/// that abort a stage outright (see the error taxonomy in the design notes).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    #[error("pointer template error: {placeholder} missing from context ({template})")]
    PointerTemplate { template: String, placeholder: String },
    #[error("unknown formatter: {0}")]
    UnknownFormatter(String),
    #[error("policy rule factory missing: {0}")]
    MissingRuleFactory(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("writer error: {0}")]
    Writer(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PipelineError {
    /// Prefixes the error with a breadcrumb without discarding the original variant.
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            PipelineError::UnknownLayer(msg) => {
                PipelineError::UnknownLayer(format!("{ctx}: {msg}"))
            }
            PipelineError::PointerTemplate {
                template,
                placeholder,
            } => PipelineError::PointerTemplate {
                template: format!("{ctx}: {template}"),
                placeholder,
            },
            PipelineError::UnknownFormatter(msg) => {
                PipelineError::UnknownFormatter(format!("{ctx}: {msg}"))
            }
            PipelineError::MissingRuleFactory(msg) => {
                PipelineError::MissingRuleFactory(format!("{ctx}: {msg}"))
            }
            PipelineError::Cache(msg) => PipelineError::Cache(format!("{ctx}: {msg}")),
            PipelineError::Writer(msg) => PipelineError::Writer(format!("{ctx}: {msg}")),
            PipelineError::Cancelled(msg) => PipelineError::Cancelled(format!("{ctx}: {msg}")),
            PipelineError::Serialization(msg) => {
                PipelineError::Serialization(format!("{ctx}: {msg}"))
            }
            PipelineError::Io(err) => PipelineError::Io(err),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
