//! Engine event delivery
//!
//! A dedicated thread drains engine events and applies their side
//! effects in arrival order: watchdog arming, state transitions, the
//! buffering floor, and the video dimension cache all happen here before
//! the listener hears about the event. Listeners are held weakly so a UI
//! layer that forgets to detach cannot be kept alive by the player.

use crate::controller::watchdog::BufferWatchdog;
use crate::controller::{ControllerCore, PlaybackState};
use crate::engine::events::{
    EngineEvent, SessionEvent, INFO_BUFFERING_END, INFO_BUFFERING_START,
};
use crate::utils::error::{IntoCoreError, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Receiver of playback callbacks
///
/// All methods have empty default bodies so implementors only override
/// what they care about. Callbacks arrive on the delivery thread, never
/// on the caller's thread.
pub trait PlayerListener: Send + Sync {
    /// The engine finished preparing and playback can start
    fn on_prepared(&self) {}

    /// Playback reached the end of the media
    fn on_auto_completion(&self) {}

    /// Buffered percentage changed
    fn on_buffering_update(&self, _percent: i32) {}

    /// A seek finished
    fn on_seek_complete(&self) {}

    /// The engine reported a fault
    fn on_error(&self, _code: i32, _extra: i32) {}

    /// The engine reported an informational condition
    fn on_info(&self, _code: i32, _extra: i32) {}

    /// Video dimensions changed; read them back through the controller
    fn on_video_size_changed(&self) {}
}

/// Weakly held listener slots
///
/// The current slot receives callbacks; the last slot is a parked
/// reference the embedder can swap back in. Neither slot keeps its
/// listener alive.
pub(crate) struct ListenerSlots {
    current: RwLock<Option<Weak<dyn PlayerListener>>>,
    last: RwLock<Option<Weak<dyn PlayerListener>>>,
}

impl ListenerSlots {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            last: RwLock::new(None),
        }
    }

    /// Replace or clear the active listener
    pub fn set_current(&self, listener: Option<Arc<dyn PlayerListener>>) {
        *self.current.write() = listener.as_ref().map(Arc::downgrade);
    }

    /// Replace or clear the parked listener
    pub fn set_last(&self, listener: Option<Arc<dyn PlayerListener>>) {
        *self.last.write() = listener.as_ref().map(Arc::downgrade);
    }

    /// The active listener, if it is still alive
    pub fn current(&self) -> Option<Arc<dyn PlayerListener>> {
        self.current.read().as_ref().and_then(Weak::upgrade)
    }

    /// The parked listener, if it is still alive
    pub fn last(&self) -> Option<Arc<dyn PlayerListener>> {
        self.last.read().as_ref().and_then(Weak::upgrade)
    }
}

/// Event delivery thread and its listener slots
pub(crate) struct EventBridge {
    listeners: Arc<ListenerSlots>,
    shutdown_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventBridge {
    /// Spawn the delivery thread draining `events_rx`
    pub fn start(
        core: Arc<ControllerCore>,
        watchdog: Arc<BufferWatchdog>,
        events_rx: Receiver<SessionEvent>,
    ) -> Result<Self> {
        let listeners = Arc::new(ListenerSlots::new());
        let thread_listeners = Arc::clone(&listeners);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("player-events".to_string())
            .spawn(move || {
                loop {
                    crossbeam::channel::select! {
                        recv(events_rx) -> msg => match msg {
                            Ok(event) => {
                                deliver(&core, &watchdog, &thread_listeners, event);
                            }
                            Err(_) => break,
                        },
                        recv(shutdown_rx) -> _ => break,
                    }
                }

                debug!("Event delivery thread stopped");
            })
            .queue_err("Failed to spawn event delivery thread")?;

        Ok(Self {
            listeners,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Shared handle to the listener slots
    pub fn listeners(&self) -> Arc<ListenerSlots> {
        Arc::clone(&self.listeners)
    }

    /// Stop the delivery thread and wait for it to exit
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Event delivery thread panicked during shutdown");
            }
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply one event's side effects, then notify the active listener
///
/// Events tagged with a superseded session are dropped wholesale: a
/// replaced or released engine must not touch state, the watchdog, or
/// the listener.
fn deliver(
    core: &ControllerCore,
    watchdog: &BufferWatchdog,
    listeners: &ListenerSlots,
    message: SessionEvent,
) {
    let SessionEvent { session, event } = message;

    if session != core.current_session() {
        debug!("Dropping {:?} from superseded session {}", event, session);
        return;
    }

    let listener = listeners.current();

    match event {
        EngineEvent::Prepared => {
            watchdog.cancel();
            core.states().advance(PlaybackState::Prepared);
            if let Some(listener) = listener {
                listener.on_prepared();
            }
        }
        EngineEvent::AutoCompletion => {
            watchdog.cancel();
            core.states().advance(PlaybackState::Stopped);
            if let Some(listener) = listener {
                listener.on_auto_completion();
            }
        }
        EngineEvent::BufferingUpdate { percent } => {
            let floored = percent.max(core.buffer_point());
            if let Some(listener) = listener {
                listener.on_buffering_update(floored);
            }
        }
        EngineEvent::SeekComplete => {
            watchdog.cancel();
            if let Some(listener) = listener {
                listener.on_seek_complete();
            }
        }
        EngineEvent::Error { code, extra } => {
            warn!("Engine reported error {} (extra {})", code, extra);
            watchdog.cancel();
            core.states().advance(PlaybackState::Error);
            if let Some(listener) = listener {
                listener.on_error(code, extra);
            }
        }
        EngineEvent::Info { code, extra } => {
            match code {
                INFO_BUFFERING_START => watchdog.start(),
                INFO_BUFFERING_END => watchdog.cancel(),
                _ => {}
            }
            if let Some(listener) = listener {
                listener.on_info(code, extra);
            }
        }
        EngineEvent::VideoSizeChanged { width, height } => {
            core.set_video_size(width, height);
            if let Some(listener) = listener {
                listener.on_video_size_changed();
            }
        }
    }
}
