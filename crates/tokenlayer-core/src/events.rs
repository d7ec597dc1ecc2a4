use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Closed set of pipeline stages that publish lifecycle events.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Plan,
    Resolve,
    Dependency,
    Transform,
    Format,
    Write,
    Policy,
    Diff,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Plan => "plan",
            PipelineStage::Resolve => "resolve",
            PipelineStage::Dependency => "dependency",
            PipelineStage::Transform => "transform",
            PipelineStage::Format => "format",
            PipelineStage::Write => "write",
            PipelineStage::Policy => "policy",
            PipelineStage::Diff => "diff",
        }
    }
}

/// Tagged variant for the three lifecycle events a stage may publish.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StageEvent {
    Start {
        stage: PipelineStage,
        timestamp_ms: u64,
        #[serde(default)]
        attributes: BTreeMap<String, JsonValue>,
    },
    Complete {
        stage: PipelineStage,
        timestamp_ms: u64,
        #[serde(default)]
        attributes: BTreeMap<String, JsonValue>,
    },
    Error {
        stage: PipelineStage,
        timestamp_ms: u64,
        error: String,
        #[serde(default)]
        attributes: BTreeMap<String, JsonValue>,
    },
}

impl StageEvent {
    pub fn start(stage: PipelineStage) -> Self {
        StageEvent::Start {
            stage,
            timestamp_ms: now_ms(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn complete(stage: PipelineStage) -> Self {
        StageEvent::Complete {
            stage,
            timestamp_ms: now_ms(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn error(stage: PipelineStage, error: impl Into<String>) -> Self {
        StageEvent::Error {
            stage,
            timestamp_ms: now_ms(),
            error: error.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            StageEvent::Start { stage, .. }
            | StageEvent::Complete { stage, .. }
            | StageEvent::Error { stage, .. } => *stage,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A subscriber to the in-process lifecycle event bus.
///
/// Structured logging and telemetry-span subscribers are specified only at this contract
/// level (see the Event Bus & Lifecycle component); concrete exporters are external
/// collaborators of the core.
#[async_trait]
pub trait StageSubscriber: Send + Sync {
    async fn on_event(&self, event: &StageEvent) -> Result<(), String>;
}

/// Typed in-process pub/sub used by stages to publish start/complete/error events.
///
/// `publish` awaits all subscribers concurrently and resolves only once every subscriber
/// has settled; a subscriber failure is surfaced back to the publisher but never prevents
/// the others from running. Subscriptions are attachable/detachable between publishes.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Arc<dyn StageSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn StageSubscriber>) {
        self.subscribers.lock().push(subscriber);
    }

    /// Removes all subscribers (used in tests and between independent build sessions).
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    pub async fn publish(&self, event: StageEvent) -> Vec<String> {
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        let futures = subscribers
            .iter()
            .map(|subscriber| subscriber.on_event(&event));
        join_all(futures)
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .collect()
    }
}

/// A [`StageSubscriber`] that forwards events to `tracing`, mirroring the library's
/// logging convention of one span/event per stage boundary.
pub struct TracingSubscriber;

#[async_trait]
impl StageSubscriber for TracingSubscriber {
    async fn on_event(&self, event: &StageEvent) -> Result<(), String> {
        match event {
            StageEvent::Start { stage, .. } => {
                tracing::info!(stage = stage.as_str(), "stage start");
            }
            StageEvent::Complete { stage, .. } => {
                tracing::info!(stage = stage.as_str(), "stage complete");
            }
            StageEvent::Error { stage, error, .. } => {
                tracing::warn!(stage = stage.as_str(), error, "stage error");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber {
        count: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl StageSubscriber for CountingSubscriber {
        async fn on_event(&self, _event: &StageEvent) -> Result<(), String> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn publish_awaits_every_subscriber_even_when_one_fails() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingSubscriber {
            count: count.clone(),
            fail: true,
        }));
        bus.subscribe(Arc::new(CountingSubscriber {
            count: count.clone(),
            fail: false,
        }));

        let errors = bus.publish(StageEvent::start(PipelineStage::Plan)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(errors, vec!["boom".to_string()]);
    }
}
