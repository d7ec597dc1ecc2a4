mod definition;
mod executor;
mod planner;
mod writer;

pub use definition::{
    ArtifactContent, FileArtifact, FormatterDefinition, FormatterDefinitionFactory,
    FormatterFactoryContext, FormatterFactoryRegistry, FormatterRun, FormatterToken,
};
pub use executor::{ExecutionContext, FormatterExecutor, FormatterExecutionResult};
pub use planner::{FormatterPlan, FormatterPlanner};
pub use writer::ArtifactWriter;
