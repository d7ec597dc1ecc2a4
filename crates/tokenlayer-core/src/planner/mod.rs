mod plan;
mod pointer_template;
mod repository;

pub use plan::{Plan, PlanContext, PlanEntry, SchemaValidator, SourcePlanner, ValidationIssue};
pub use pointer_template::{resolve_pointer_template, PointerTemplateContext};
pub use repository::{
    DiscoverContext, DiscoverOutcome, DiscoveredDocument, FileGlobRepository, RepositoryIssue,
    SourceRepository, VirtualRepository,
};
