use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};

/// The kind of change a filesystem watcher reported (§6 Watcher port).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Updated,
    Deleted,
}

/// One reported filesystem change, tagged with a monotonically increasing id scoped to
/// the subscription that produced it.
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub request_id: u64,
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

/// `{ cwd?, ignored? }`: `cwd` relativises reported paths when set; `ignored` is a list of
/// globs matched against the path relative to `cwd` (or the watched root otherwise).
#[derive(Clone, Debug, Default)]
pub struct WatchOptions {
    pub cwd: Option<PathBuf>,
    pub ignored: Option<Vec<String>>,
}

/// The pair of callbacks a caller supplies to `watch` (§6: `{ onEvent, onError? }`).
pub struct WatchHandlers {
    on_event: Arc<dyn Fn(WatchEvent) + Send + Sync>,
    on_error: Option<Arc<dyn Fn(String) + Send + Sync>>,
}

impl WatchHandlers {
    pub fn new(on_event: impl Fn(WatchEvent) + Send + Sync + 'static) -> Self {
        Self {
            on_event: Arc::new(on_event),
            on_error: None,
        }
    }

    pub fn with_on_error(mut self, on_error: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }
}

/// A live watch registration. Dropping it without calling [`WatchSubscription::close`] still
/// stops delivery, since the underlying `notify` watcher is owned by this handle; `close` is
/// the explicit, idempotent form (§6: `subscription.close()`).
pub struct WatchSubscription {
    watcher: Option<RecommendedWatcher>,
}

impl WatchSubscription {
    pub fn close(&mut self) {
        self.watcher.take();
    }
}

/// Registers a filesystem watch over `paths`, delivering `created`/`updated`/`deleted`
/// events to `handlers.on_event` and ignored-pattern matches against the configured `cwd`
/// (or the path itself, absent a `cwd`) (§6 Watcher port).
///
/// Backed by the `notify` crate's recommended platform watcher; each registered path is
/// watched recursively. Watch setup failure (e.g. a missing path) returns an error rather
/// than silently producing no events.
pub fn watch(
    paths: &[PathBuf],
    options: &WatchOptions,
    handlers: WatchHandlers,
) -> notify::Result<WatchSubscription> {
    let ignored = build_ignore_set(options.ignored.as_deref());
    let cwd = options.cwd.clone();
    let request_id = Arc::new(AtomicU64::new(0));

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                for (kind, path) in classify(&event) {
                    if is_ignored(&ignored, &path, cwd.as_deref()) {
                        continue;
                    }
                    let id = request_id.fetch_add(1, Ordering::SeqCst);
                    (handlers.on_event)(WatchEvent {
                        request_id: id,
                        kind,
                        path,
                    });
                }
            }
            Err(err) => {
                if let Some(on_error) = &handlers.on_error {
                    on_error(err.to_string());
                } else {
                    tracing::warn!(error = %err, "watcher error with no onError handler registered");
                }
            }
        }
    })?;

    for path in paths {
        watcher.watch(path, RecursiveMode::Recursive)?;
    }

    Ok(WatchSubscription {
        watcher: Some(watcher),
    })
}

fn classify(event: &Event) -> Vec<(WatchEventKind, PathBuf)> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Created,
        EventKind::Modify(_) => WatchEventKind::Updated,
        EventKind::Remove(_) => WatchEventKind::Deleted,
        _ => return Vec::new(),
    };
    event.paths.iter().cloned().map(|path| (kind, path)).collect()
}

fn build_ignore_set(patterns: Option<&[String]>) -> Option<GlobSet> {
    let patterns = patterns?;
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

fn is_ignored(ignored: &Option<GlobSet>, path: &Path, cwd: Option<&Path>) -> bool {
    let Some(set) = ignored else {
        return false;
    };
    let relative = cwd.and_then(|cwd| path.strip_prefix(cwd).ok()).unwrap_or(path);
    set.is_match(relative)
}
