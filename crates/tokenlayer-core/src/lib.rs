//! Core pipeline for resolving layered design-token documents into platform artifacts:
//! planning and parsing sources, resolving aliases, tracking dependencies for incremental
//! rebuilds, running per-token transforms, emitting platform formats, writing artifacts,
//! diffing token sets across revisions, and evaluating policy rules.

pub mod cancellation;
pub mod canonical;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod events;
pub mod formatter;
pub mod parallelism;
pub mod planner;
pub mod pointer;
pub mod policy;
pub mod resolver;
pub mod session;
pub mod token;
pub mod transform;
pub mod watcher;

pub use cancellation::CancellationToken;
pub use config::{
    FormatterInstanceConfig, FormatterOutputConfig, LayerConfig, PipelineConfig,
    PolicyInstanceConfig, RepositoryConfig, SourceConfig, VirtualDocument,
};
pub use diagnostics::{Diagnostic, DiagnosticLevel};
pub use error::{PipelineError, PipelineResult};
pub use events::{EventBus, PipelineStage, StageEvent, StageSubscriber, TracingSubscriber};
pub use pointer::JsonPointer;
pub use session::{BuildOutcome, PipelineSession};
pub use token::{
    Provenance, ResolvedReference, Token, TokenMetadata, TokenRef, TokenResolution, TokenSet,
    TokenSnapshot, TokenType,
};
pub use watcher::{watch, WatchEvent, WatchEventKind, WatchHandlers, WatchOptions, WatchSubscription};
