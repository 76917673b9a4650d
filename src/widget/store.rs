//! Live page widgets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::endpoint::ChatEndpoint;

use super::chat::{ChatWidget, WidgetOptions};
use super::html::HtmlView;

/// Idle time after which a page widget is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Widget bound to a browser page.
pub type PageWidget = ChatWidget<HtmlView>;

#[derive(Debug)]
struct Entry {
    widget: Arc<PageWidget>,
    last_activity: Mutex<Instant>,
}

impl Entry {
    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// An open page keeps its widget alive however long it stays quiet.
    fn expired(&self, now: Instant, timeout: Duration) -> bool {
        self.idle_for(now) > timeout && !self.widget.with_view(|view| view.has_subscribers())
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }
}

/// Thread-safe store of page widgets, keyed by UUID.
///
/// Every page load creates a fresh widget, so a reload starts from an empty
/// transcript.
#[derive(Clone)]
pub struct WidgetStore {
    inner: Arc<WidgetStoreInner>,
}

struct WidgetStoreInner {
    widgets: RwLock<HashMap<String, Entry>>,
    endpoint: Arc<dyn ChatEndpoint>,
    options: WidgetOptions,
    idle_timeout: Duration,
}

impl std::fmt::Debug for WidgetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetStore")
            .field("len", &self.len())
            .field("options", &self.inner.options)
            .field("idle_timeout", &self.inner.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl WidgetStore {
    /// Create a store whose widgets call `endpoint` with `options`.
    #[must_use]
    pub fn new(
        endpoint: Arc<dyn ChatEndpoint>,
        options: WidgetOptions,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(WidgetStoreInner {
                widgets: RwLock::new(HashMap::new()),
                endpoint,
                options,
                idle_timeout,
            }),
        }
    }

    /// Create a widget for a new page, pruning idle ones first.
    pub fn create(&self) -> (String, Arc<PageWidget>) {
        self.prune_idle(Instant::now());

        let id = Uuid::new_v4().to_string();
        let widget = Arc::new(ChatWidget::new(
            HtmlView::new(),
            Arc::clone(&self.inner.endpoint),
            self.inner.options.clone(),
        ));

        let entry = Entry {
            widget: Arc::clone(&widget),
            last_activity: Mutex::new(Instant::now()),
        };
        self.write().insert(id.clone(), entry);

        tracing::debug!(name: "widget.created", widget_id = %id, "Page widget created");
        (id, widget)
    }

    /// Look up a widget and mark it active.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<PageWidget>> {
        let guard = self
            .inner
            .widgets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(id).map(|entry| {
            entry.touch();
            Arc::clone(&entry.widget)
        })
    }

    /// Drop widgets idle for longer than the store's timeout and no longer
    /// watched by a page.
    pub fn prune_idle(&self, now: Instant) -> usize {
        let timeout = self.inner.idle_timeout;
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|_, entry| !entry.expired(now, timeout));
        let removed = before - guard.len();
        if removed > 0 {
            tracing::debug!(name: "widget.pruned", removed, "Idle page widgets dropped");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .widgets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner
            .widgets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
