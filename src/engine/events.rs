//! Engine event types and the sink engines emit them through
//!
//! Engines report playback progress by sending [`EngineEvent`] values
//! into the [`EventSink`] handed to them at prepare time. Emission is
//! safe from any engine thread; delivery to the listener happens later
//! on the controller's own delivery thread. Each sink is tagged with the
//! session it was created for, so late events from a replaced engine are
//! recognized and dropped instead of corrupting the current session.

use crossbeam::channel::Sender;

/// Info code reported when network buffering starts
pub const INFO_BUFFERING_START: i32 = 701;

/// Info code reported when network buffering ends
pub const INFO_BUFFERING_END: i32 = 702;

/// Info code reported when the stream carries a rotation change
pub const INFO_VIDEO_ROTATION_CHANGED: i32 = 10001;

/// Reserved error code for a buffering deadline that elapsed
///
/// Delivered as both code and extra of a synthesized error event when
/// the watchdog fires. Distinct from every legitimate engine error code.
pub const BUFFER_TIMEOUT_CODE: i32 = -192;

/// Reserved error code for an engine that failed to come up
///
/// Delivered as both code and extra of a synthesized error event when
/// engine creation or prepare submission fails inside the command worker.
pub const ENGINE_SETUP_CODE: i32 = -193;

/// An event reported by the engine backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Asynchronous prepare finished; the engine is ready to start
    Prepared,

    /// Playback reached the end of media on its own
    AutoCompletion,

    /// Buffered share of the stream changed
    BufferingUpdate {
        /// Buffered percentage, 0 to 100
        percent: i32,
    },

    /// A previously requested seek finished
    SeekComplete,

    /// The engine hit an unrecoverable error
    Error {
        /// Backend-defined error code
        code: i32,
        /// Backend-defined detail code
        extra: i32,
    },

    /// Informational report from the engine
    Info {
        /// Backend-defined info code
        code: i32,
        /// Backend-defined detail code
        extra: i32,
    },

    /// The decoded video dimensions changed
    VideoSizeChanged {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
}

/// An engine event together with the session that produced it
#[derive(Debug, Clone)]
pub(crate) struct SessionEvent {
    pub(crate) session: u64,
    pub(crate) event: EngineEvent,
}

/// Handle an engine uses to report events
///
/// Cloneable and sendable across threads. All emissions from the same
/// sink carry the session id the sink was created under.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: u64,
    tx: Sender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn new(session: u64, tx: Sender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    /// Report an event from the engine
    ///
    /// Never blocks and never fails; if the controller is gone the event
    /// is discarded.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(SessionEvent {
            session: self.session,
            event,
        });
    }

    /// The session this sink reports for
    pub fn session(&self) -> u64 {
        self.session
    }
}
