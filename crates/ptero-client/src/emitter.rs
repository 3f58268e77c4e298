//! A named-slot callback registry for pipeline and shard events

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{BoxError, Error, Result};

type SyncSlot = Box<dyn Fn(Value) -> std::result::Result<(), BoxError> + Send + Sync>;
type AsyncSlot =
    Box<dyn Fn(Value) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

// Whether a handler must be awaited is recorded at registration time, not
// discovered at dispatch time.
enum Slot {
    Sync(SyncSlot),
    Async(AsyncSlot),
}

/// Decouples producers of named events from consumers.
///
/// One handler per event name; registering a name again replaces the
/// previous handler. Emitting an event nobody listens to is a silent no-op.
#[derive(Default)]
pub struct Emitter {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous handler for an event, replacing any prior
    /// handler under the same name.
    pub fn add_event<F>(&self, name: impl Into<String>, slot: F)
    where
        F: Fn(Value) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.write_slots()
            .insert(name.into(), Arc::new(Slot::Sync(Box::new(slot))));
    }

    /// Registers an asynchronous handler for an event, replacing any prior
    /// handler under the same name. The handler is awaited at dispatch.
    pub fn add_async_event<F, Fut>(&self, name: impl Into<String>, slot: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let slot: AsyncSlot = Box::new(move |payload| Box::pin(slot(payload)));
        self.write_slots()
            .insert(name.into(), Arc::new(Slot::Async(slot)));
    }

    /// Removes the handler for an event. No-op if none is registered.
    pub fn remove_event(&self, name: &str) {
        self.write_slots().remove(name);
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.read_slots().contains_key(name)
    }

    /// Removes all registered handlers.
    pub fn clear_slots(&self) {
        self.write_slots().clear();
    }

    /// Invokes the handler registered for `name`, if any.
    ///
    /// # Errors
    /// Returns [`Error::Event`] wrapping the handler's failure; the
    /// handler's own error type never propagates as itself.
    pub async fn emit(&self, name: &str, payload: Value) -> Result<()> {
        // Take the slot out under the lock, invoke without it, so an async
        // handler never holds the registry across an await point.
        let slot = self.read_slots().get(name).cloned();
        let Some(slot) = slot else {
            return Ok(());
        };

        let outcome = match &*slot {
            Slot::Sync(f) => f(payload),
            Slot::Async(f) => f(payload).await,
        };

        outcome.map_err(|source| Error::Event {
            event: name.to_string(),
            source,
        })
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.read_slots().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_sync_handler_receives_payload() {
        let emitter = Emitter::new();
        let seen = Arc::new(Mutex::new(None));

        let captured = Arc::clone(&seen);
        emitter.add_event("status_update", move |payload| {
            *captured.lock().unwrap() = Some(payload);
            Ok(())
        });

        emitter
            .emit("status_update", json!("running"))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(json!("running")));
    }

    #[tokio::test]
    async fn test_async_handler_is_awaited() {
        let emitter = Emitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let captured = Arc::clone(&count);
        emitter.add_async_event("stats_update", move |_payload| {
            let captured = Arc::clone(&captured);
            async move {
                captured.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        emitter.emit("stats_update", json!({})).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let emitter = Emitter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let captured = Arc::clone(&first);
        emitter.add_event("debug", move |_| {
            captured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let captured = Arc::clone(&second);
        emitter.add_event("debug", move |_| {
            captured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        emitter.emit("debug", Value::Null).await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_emit_without_handler_is_silent() {
        let emitter = Emitter::new();
        assert!(emitter.emit("nobody", Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn test_handler_failure_becomes_event_error() {
        let emitter = Emitter::new();
        emitter.add_event("error", |_| Err("original cause".into()));

        let err = emitter.emit("error", Value::Null).await.unwrap_err();
        match err {
            Error::Event { event, source } => {
                assert_eq!(event, "error");
                assert_eq!(source.to_string(), "original cause");
            }
            other => panic!("expected Error::Event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_handler_failure_becomes_event_error() {
        let emitter = Emitter::new();
        emitter.add_async_event("output", |_| async { Err("async cause".into()) });

        let err = emitter.emit("output", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::Event { .. }));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let emitter = Emitter::new();
        emitter.remove_event("never registered");

        emitter.add_event("debug", |_| Ok(()));
        assert!(emitter.has_event("debug"));
        emitter.remove_event("debug");
        assert!(!emitter.has_event("debug"));
    }

    #[test]
    fn test_clear_slots() {
        let emitter = Emitter::new();
        emitter.add_event("a", |_| Ok(()));
        emitter.add_event("b", |_| Ok(()));

        emitter.clear_slots();
        assert!(!emitter.has_event("a"));
        assert!(!emitter.has_event("b"));
    }
}
