//! # Sync Listeners
//!
//! Delivery of [`SyncEvent`]s to whoever started a run.
//!
//! A [`SyncListener`] is called from the sync task, in event order, and must
//! not block. Two implementations ship with the crate:
//!
//! - [`ChannelListener`] forwards into an unbounded tokio channel; the consumer
//!   drains it on whatever thread or task it likes
//! - [`EventBus`] broadcasts to every subscriber and drops events for lagging
//!   receivers

use crate::job::SyncProgress;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::trace;

/// Receives the events of one sync run.
pub trait SyncListener: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Listener that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SyncListener for ChannelListener {
    fn on_event(&self, event: &SyncEvent) {
        // Receiver gone means nobody is interested any more.
        let _ = self.sender.send(event.clone());
    }
}

impl SyncListener for EventBus {
    fn on_event(&self, event: &SyncEvent) {
        self.emit(CoreEvent::Sync(event.clone())).ok();
    }
}

/// Listener that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl SyncListener for NullListener {
    fn on_event(&self, _event: &SyncEvent) {}
}

/// Shared, live progress of the active run.
pub(crate) type ProgressCell = Arc<Mutex<SyncProgress>>;

/// Fans the events of one run out to its listener and the coordinator's bus,
/// and publishes the live progress snapshot.
pub(crate) struct ProgressEmitter {
    listener: Arc<dyn SyncListener>,
    bus: Option<EventBus>,
    progress: ProgressCell,
}

impl ProgressEmitter {
    pub(crate) fn new(
        listener: Arc<dyn SyncListener>,
        bus: Option<EventBus>,
        progress: ProgressCell,
    ) -> Self {
        Self {
            listener,
            bus,
            progress,
        }
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        trace!(run_id = event.run_id(), ?event, "Delivering sync event");
        self.listener.on_event(&event);
        if let Some(bus) = &self.bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    pub(crate) fn publish_progress(&self, progress: &SyncProgress) {
        let mut slot = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        *slot = progress.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::SyncRunId;
    use std::path::PathBuf;

    fn file_error(run_id: &str) -> SyncEvent {
        SyncEvent::FileError {
            run_id: run_id.to_string(),
            path: PathBuf::from("/music/bad.mp3"),
            message: "corrupt".to_string(),
        }
    }

    #[test]
    fn test_channel_listener_preserves_order() {
        let (listener, mut receiver) = ChannelListener::new();
        listener.on_event(&file_error("a"));
        listener.on_event(&file_error("b"));

        assert_eq!(receiver.try_recv().unwrap().run_id(), "a");
        assert_eq!(receiver.try_recv().unwrap().run_id(), "b");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_listener_survives_dropped_receiver() {
        let (listener, receiver) = ChannelListener::new();
        drop(receiver);
        listener.on_event(&file_error("a"));
    }

    #[tokio::test]
    async fn test_emitter_mirrors_to_bus_and_publishes_progress() {
        let bus = EventBus::new(16);
        let mut bus_rx = bus.subscribe();
        let (listener, mut rx) = ChannelListener::new();
        let run_id = SyncRunId::new();
        let progress: ProgressCell = Arc::new(Mutex::new(SyncProgress::new(run_id)));

        let emitter = ProgressEmitter::new(Arc::new(listener), Some(bus), progress.clone());
        emitter.emit(file_error("run"));

        let mut snapshot = SyncProgress::new(run_id);
        snapshot.update(1, 2, crate::job::SyncPhase::Reconciling);
        emitter.publish_progress(&snapshot);

        assert_eq!(rx.recv().await.unwrap(), file_error("run"));
        assert_eq!(
            bus_rx.recv().await.unwrap(),
            CoreEvent::Sync(file_error("run"))
        );
        assert_eq!(progress.lock().unwrap().percent, 50);
    }
}
