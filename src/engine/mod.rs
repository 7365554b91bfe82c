//! Engine capability module for playcore
//!
//! This module defines the one canonical contract every media engine
//! backend implements, the factory capability the controller uses to
//! instantiate backends, and the data types exchanged across that
//! boundary. The controller never branches on a concrete backend type;
//! everything it needs from an engine goes through [`MediaEngine`].

mod model;
mod sim;

pub mod events;

pub use events::{EngineEvent, EventSink};
pub use model::{EngineOption, OptionValue, PlaybackRequest};
pub use sim::{SimEngine, SimEngineFactory, SimScript};

use crate::utils::error::Result;
use std::sync::Arc;

/// Opaque token identifying a display surface
///
/// The controller never interprets it; engine backends map the raw id to
/// whatever native display binding they use. Tokens compare by id, so an
/// attach and a matching release refer to the same surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    /// Wrap a raw surface id
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw surface id
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Capability interface for one native engine instance
///
/// At most one engine is bound per controller at a time. The controller's
/// command worker is the only caller of the mutating operations; the
/// read-only accessors may be called from any thread and must be cheap
/// and non-blocking. Engines report progress exclusively through the
/// [`EventSink`] passed to [`MediaEngine::connect_events`].
pub trait MediaEngine: Send + Sync {
    /// Register the sink this engine reports events through
    ///
    /// Called once, before `prepare_async`. Replaces any previous sink.
    fn connect_events(&self, sink: EventSink);

    /// Begin asynchronous preparation of a playback request
    ///
    /// Returns once the request has been submitted; readiness arrives
    /// later as a prepared event. Options are applied verbatim, in order.
    ///
    /// # Arguments
    ///
    /// * `request` - The playback request to prepare
    /// * `options` - Backend-specific options, opaque to the controller
    fn prepare_async(&self, request: &PlaybackRequest, options: &[EngineOption]) -> Result<()>;

    /// Start or resume playback
    fn start(&self);

    /// Stop playback
    fn stop(&self);

    /// Pause playback
    fn pause(&self);

    /// Release every native resource held by this engine
    ///
    /// The engine must not emit further events after release returns.
    fn release(&self);

    /// Seek to a position in milliseconds
    fn seek_to(&self, position_ms: i64);

    /// Current playback position in milliseconds
    fn current_position(&self) -> i64;

    /// Media duration in milliseconds, 0 when unknown
    fn duration(&self) -> i64;

    /// Decoded video width in pixels, 0 before the first size report
    fn video_width(&self) -> u32;

    /// Decoded video height in pixels, 0 before the first size report
    fn video_height(&self) -> u32;

    /// Whether the engine is currently playing
    fn is_playing(&self) -> bool;

    /// Buffered share of the stream, 0 to 100
    fn buffered_percentage(&self) -> i32;

    /// Measured network throughput in bytes per second
    fn net_speed(&self) -> u64;

    /// Set the playback speed multiplier
    ///
    /// # Arguments
    ///
    /// * `speed` - Speed multiplier, 1.0 is normal
    /// * `sound_touch` - Preserve audio pitch while changing speed
    fn set_speed(&self, speed: f32, sound_touch: bool);

    /// Change speed while playback is already running
    ///
    /// Some backends distinguish this from `set_speed`; the default
    /// delegates.
    fn set_speed_playing(&self, speed: f32, sound_touch: bool) {
        self.set_speed(speed, sound_touch);
    }

    /// Mute or unmute audio output
    fn set_muted(&self, muted: bool);

    /// Bind a display surface
    fn set_display(&self, surface: SurfaceHandle);

    /// Release a previously bound display surface
    fn release_surface(&self, surface: SurfaceHandle);
}

/// Capability for instantiating engine backends
///
/// Injected at controller construction; there is no process-global
/// backend selection. A plain closure works:
///
/// ```ignore
/// let factory = Arc::new(|| -> Result<Arc<dyn MediaEngine>> {
///     Ok(Arc::new(SimEngine::new(SimScript::default())))
/// });
/// ```
pub trait EngineFactory: Send + Sync {
    /// Create a fresh engine instance
    fn create(&self) -> Result<Arc<dyn MediaEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Arc<dyn MediaEngine>> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn MediaEngine>> {
        self()
    }
}

/// Hook invoked with every engine the factory returns
///
/// Runs on the command worker right after creation, before events are
/// connected, letting integrators apply backend tweaks at creation time.
pub type EngineCreatedHook = Arc<dyn Fn(&Arc<dyn MediaEngine>) + Send + Sync>;
