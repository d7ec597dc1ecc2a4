use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::token::TokenSnapshot;

use super::violation::PolicyViolation;

/// Input handed to a policy handler: the snapshot under evaluation plus whatever
/// ambient context the rule needs (e.g. the full resolved set, for cross-token checks).
pub struct PolicyInput<'a> {
    pub snapshot: &'a TokenSnapshot,
    pub context: &'a BTreeMap<String, JsonValue>,
}

/// A configured rule's per-snapshot check, produced by [`PolicyRule::setup`] (§4.7).
pub trait PolicyHandler: Send + Sync {
    fn handle(&self, input: &PolicyInput) -> Vec<PolicyViolation>;
}

impl<F> PolicyHandler for F
where
    F: Fn(&PolicyInput) -> Vec<PolicyViolation> + Send + Sync,
{
    fn handle(&self, input: &PolicyInput) -> Vec<PolicyViolation> {
        self(input)
    }
}

/// `{ name, setup(options) → handler }` (§4.7). A rule is produced once per policy
/// instance by a [`PolicyRuleFactory`], then finalised into a handler by `setup`.
#[derive(Clone)]
pub struct PolicyRule {
    pub name: String,
    setup_fn: Arc<dyn Fn(&JsonValue) -> Arc<dyn PolicyHandler> + Send + Sync>,
}

impl PolicyRule {
    pub fn new(
        name: impl Into<String>,
        setup_fn: impl Fn(&JsonValue) -> Arc<dyn PolicyHandler> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            setup_fn: Arc::new(setup_fn),
        }
    }

    pub fn setup(&self, options: &JsonValue) -> Arc<dyn PolicyHandler> {
        (self.setup_fn)(options)
    }
}

/// Context handed to a [`PolicyRuleFactory`], mirroring [`crate::formatter::FormatterFactoryContext`].
#[derive(Clone, Debug, Default)]
pub struct PolicyFactoryContext {
    pub instance_index: usize,
}

/// Produces a [`PolicyRule`] from a configured instance's options (§6 Policy rule factory
/// port). Registered under a rule name in a [`PolicyRuleFactoryRegistry`].
pub trait PolicyRuleFactory: Send + Sync {
    fn create(&self, options: &JsonValue, context: &PolicyFactoryContext) -> PolicyRule;
}

impl<F> PolicyRuleFactory for F
where
    F: Fn(&JsonValue, &PolicyFactoryContext) -> PolicyRule + Send + Sync,
{
    fn create(&self, options: &JsonValue, context: &PolicyFactoryContext) -> PolicyRule {
        self(options, context)
    }
}

/// Name-keyed registry of policy rule factories, consulted in registration order by the
/// engine (§4.7).
#[derive(Default, Clone)]
pub struct PolicyRuleFactoryRegistry {
    order: Vec<String>,
    factories: BTreeMap<String, Arc<dyn PolicyRuleFactory>>,
}

impl PolicyRuleFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl PolicyRuleFactory + 'static) {
        let name = name.into();
        if !self.factories.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PolicyRuleFactory>> {
        self.factories.get(name)
    }
}
