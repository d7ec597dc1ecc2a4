use std::path::PathBuf;

use crate::config::FormatterInstanceConfig;
use crate::error::PipelineError;

use super::definition::{FormatterDefinition, FormatterFactoryContext, FormatterFactoryRegistry};

/// One planned formatter invocation: its identity, the definition produced by its factory,
/// and the output directory it writes to (§4.5 Planner).
#[derive(Clone)]
pub struct FormatterPlan {
    pub id: String,
    pub name: String,
    pub definition: FormatterDefinition,
    pub output_directory: Option<PathBuf>,
}

/// Resolves `[{ name, options?, output }]` instance configs into [`FormatterPlan`]s by
/// looking up each name in the factory registry. A missing factory fails the whole plan
/// synchronously (§4.5, §7: configuration errors are fatal).
pub struct FormatterPlanner<'a> {
    registry: &'a FormatterFactoryRegistry,
}

impl<'a> FormatterPlanner<'a> {
    pub fn new(registry: &'a FormatterFactoryRegistry) -> Self {
        Self { registry }
    }

    pub fn plan(
        &self,
        instances: &[FormatterInstanceConfig],
    ) -> Result<Vec<FormatterPlan>, PipelineError> {
        instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let factory = self
                    .registry
                    .get(&instance.name)
                    .ok_or_else(|| PipelineError::UnknownFormatter(instance.name.clone()))?;
                let context = FormatterFactoryContext {
                    instance_index: index,
                };
                let definition = factory.create(&instance.options, &context);
                Ok(FormatterPlan {
                    id: format!("{}#{index}", instance.name),
                    name: instance.name.clone(),
                    definition,
                    output_directory: instance.output.directory.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatterOutputConfig;
    use crate::formatter::definition::{FormatterDefinition, FormatterToken};
    use crate::transform::Selector;
    use serde_json::json;

    fn registry_with_css() -> FormatterFactoryRegistry {
        let mut registry = FormatterFactoryRegistry::new();
        registry.register("css", |_: &serde_json::Value, _: &FormatterFactoryContext| {
            FormatterDefinition::new("css", Selector::any(), |_: &[FormatterToken]| Vec::new())
        });
        registry
    }

    #[test]
    fn plan_ids_are_name_hash_index() {
        let registry = registry_with_css();
        let planner = FormatterPlanner::new(&registry);
        let plans = planner
            .plan(&[
                FormatterInstanceConfig {
                    name: "css".into(),
                    options: json!(null),
                    output: FormatterOutputConfig::default(),
                },
                FormatterInstanceConfig {
                    name: "css".into(),
                    options: json!(null),
                    output: FormatterOutputConfig::default(),
                },
            ])
            .unwrap();
        assert_eq!(plans[0].id, "css#0");
        assert_eq!(plans[1].id, "css#1");
    }

    #[test]
    fn missing_factory_is_a_named_error() {
        let registry = registry_with_css();
        let planner = FormatterPlanner::new(&registry);
        let err = planner
            .plan(&[FormatterInstanceConfig {
                name: "swiftui".into(),
                options: json!(null),
                output: FormatterOutputConfig::default(),
            }])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFormatter(name) if name == "swiftui"));
    }
}
