mod builtins;
mod engine;
mod rule;
mod violation;

pub use builtins::{
    deprecation_replacement, require_override_approval, require_owner_extension, require_tag,
    wcag_contrast,
};
pub use engine::{PolicyEngine, PolicyExecutionResult, PolicySummary};
pub use rule::{
    PolicyFactoryContext, PolicyHandler, PolicyInput, PolicyRule, PolicyRuleFactory,
    PolicyRuleFactoryRegistry,
};
pub use violation::{PolicyViolation, Severity};
