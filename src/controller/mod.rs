//! Playback controller module for playcore
//!
//! This module orchestrates media playback against a swappable engine
//! backend. Lifecycle commands are serialized through a single worker
//! thread, engine callbacks are funneled through a delivery thread, and
//! a watchdog bounds how long buffering may stall. The embedder talks to
//! [`PlaybackController`] and hears back through [`PlayerListener`].

mod command_queue;
mod event_bridge;
mod state;
mod watchdog;

pub use event_bridge::PlayerListener;
pub use state::PlaybackState;

use crate::engine::events::{EngineEvent, SessionEvent, BUFFER_TIMEOUT_CODE};
use crate::engine::{
    EngineCreatedHook, EngineFactory, EngineOption, MediaEngine, PlaybackRequest, SurfaceHandle,
};
use crate::utils::config::Config;
use crate::utils::error::{PlayCoreError, Result};
use command_queue::{Command, CommandQueue};
use crossbeam::channel::unbounded;
use event_bridge::{EventBridge, ListenerSlots};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use state::StateTracker;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use watchdog::BufferWatchdog;

/// Play position marker value meaning no position has been staged
pub const PLAY_POSITION_NONE: i32 = -22;

/// Shared controller state
///
/// Owned behind an `Arc` by the facade, the command worker, the event
/// delivery thread, and the watchdog callback. The engine slot holds the
/// backend currently in use; the session counter stamps engine callbacks
/// so output from a replaced or released backend is recognizable.
pub(crate) struct ControllerCore {
    engine: RwLock<Option<Arc<dyn MediaEngine>>>,
    session: AtomicU64,
    video_size: RwLock<(u32, u32)>,
    buffer_point: AtomicI32,
    muted: AtomicBool,
    markers: Mutex<PlayMarkers>,
    options: RwLock<Vec<EngineOption>>,
    created_hook: RwLock<Option<EngineCreatedHook>>,
    states: StateTracker,
}

/// App-facing resume markers, reset synchronously by release
struct PlayMarkers {
    tag: String,
    position: i32,
}

impl ControllerCore {
    pub fn new() -> Self {
        Self {
            engine: RwLock::new(None),
            session: AtomicU64::new(0),
            video_size: RwLock::new((0, 0)),
            buffer_point: AtomicI32::new(0),
            muted: AtomicBool::new(false),
            markers: Mutex::new(PlayMarkers {
                tag: String::new(),
                position: PLAY_POSITION_NONE,
            }),
            options: RwLock::new(Vec::new()),
            created_hook: RwLock::new(None),
            states: StateTracker::new(),
        }
    }

    pub fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.engine.read().clone()
    }

    pub fn store_engine(&self, engine: Arc<dyn MediaEngine>) {
        *self.engine.write() = Some(engine);
    }

    pub fn take_engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.engine.write().take()
    }

    pub fn current_session(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }

    /// Advance the session counter, superseding all earlier sessions
    pub fn next_session(&self) -> u64 {
        self.session.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn video_size(&self) -> (u32, u32) {
        *self.video_size.read()
    }

    pub fn set_video_size(&self, width: u32, height: u32) {
        *self.video_size.write() = (width, height);
    }

    pub fn buffer_point(&self) -> i32 {
        self.buffer_point.load(Ordering::Acquire)
    }

    pub fn set_buffer_point(&self, percent: i32) {
        self.buffer_point.store(percent, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    pub fn play_tag(&self) -> String {
        self.markers.lock().tag.clone()
    }

    pub fn set_play_tag(&self, tag: String) {
        self.markers.lock().tag = tag;
    }

    pub fn play_position(&self) -> i32 {
        self.markers.lock().position
    }

    pub fn set_play_position(&self, position: i32) {
        self.markers.lock().position = position;
    }

    pub fn reset_markers(&self) {
        let mut markers = self.markers.lock();
        markers.tag.clear();
        markers.position = PLAY_POSITION_NONE;
    }

    pub fn engine_options(&self) -> Vec<EngineOption> {
        self.options.read().clone()
    }

    pub fn set_engine_options(&self, options: Vec<EngineOption>) {
        *self.options.write() = options;
    }

    pub fn created_hook(&self) -> Option<EngineCreatedHook> {
        self.created_hook.read().clone()
    }

    pub fn set_created_hook(&self, hook: Option<EngineCreatedHook>) {
        *self.created_hook.write() = hook;
    }

    pub fn states(&self) -> &StateTracker {
        &self.states
    }
}

/// Builder for customized controller construction
pub struct PlaybackControllerBuilder {
    factory: Option<Arc<dyn EngineFactory>>,
    config: Config,
    listener: Option<Arc<dyn PlayerListener>>,
    created_hook: Option<EngineCreatedHook>,
}

impl PlaybackControllerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            factory: None,
            config: Config::default(),
            listener: None,
            created_hook: None,
        }
    }

    /// Set the engine factory used to build backends
    pub fn with_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Attach the initial playback listener
    ///
    /// The controller only holds listeners weakly; the caller keeps the
    /// owning reference alive for as long as callbacks are wanted.
    pub fn with_listener(mut self, listener: Arc<dyn PlayerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Install a hook invoked for every freshly created engine
    pub fn with_engine_created_hook(mut self, hook: EngineCreatedHook) -> Self {
        self.created_hook = Some(hook);
        self
    }

    /// Build the controller, spawning its worker threads
    pub fn build(self) -> Result<PlaybackController> {
        let factory = self.factory.ok_or_else(|| {
            PlayCoreError::Config("An engine factory is required".to_string())
        })?;
        self.config.validate()?;

        let core = Arc::new(ControllerCore::new());
        core.set_muted(self.config.playback.mute_on_start);
        core.set_created_hook(self.created_hook);

        let (events_tx, events_rx) = unbounded();

        // Expiry is reported like any other engine fault, stamped with
        // the session that is current when the deadline fires.
        let timeout_core = Arc::clone(&core);
        let timeout_tx = events_tx.clone();
        let watchdog = Arc::new(BufferWatchdog::spawn(
            self.config.timeout.millis,
            self.config.timeout.enabled,
            Box::new(move || {
                let _ = timeout_tx.send(SessionEvent {
                    session: timeout_core.current_session(),
                    event: EngineEvent::Error {
                        code: BUFFER_TIMEOUT_CODE,
                        extra: BUFFER_TIMEOUT_CODE,
                    },
                });
            }),
        )?);

        let bridge = EventBridge::start(Arc::clone(&core), Arc::clone(&watchdog), events_rx)?;
        let listeners = bridge.listeners();
        listeners.set_current(self.listener);

        let queue = CommandQueue::start(
            Arc::clone(&core),
            factory,
            Arc::clone(&watchdog),
            events_tx,
        )?;

        Ok(PlaybackController {
            core,
            listeners,
            watchdog,
            queue,
            bridge,
        })
    }
}

impl Default for PlaybackControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Facade over the playback machinery
///
/// Cheap to share behind an `Arc` and safe to call from any thread.
/// Lifecycle commands (prepare, release, surface changes) are queued and
/// run on the command worker; everything else acts on the current engine
/// directly. Dropping the controller tears down the engine and stops all
/// worker threads.
pub struct PlaybackController {
    core: Arc<ControllerCore>,
    listeners: Arc<ListenerSlots>,
    watchdog: Arc<BufferWatchdog>,
    queue: CommandQueue,
    bridge: EventBridge,
}

impl PlaybackController {
    /// Start building a controller
    pub fn builder() -> PlaybackControllerBuilder {
        PlaybackControllerBuilder::new()
    }

    /// Create a controller with default configuration
    pub fn new(factory: Arc<dyn EngineFactory>) -> Result<Self> {
        Self::builder().with_factory(factory).build()
    }

    /// Queue preparation of a new media source
    ///
    /// Any current engine is torn down and replaced. A request with an
    /// empty URL is rejected silently. When the watchdog is enabled, the
    /// buffering deadline starts counting from this call.
    pub fn prepare(&self, request: PlaybackRequest) {
        if request.url.is_empty() {
            debug!("Ignoring prepare with an empty url");
            return;
        }

        if self.queue.submit(Command::Prepare(request)).is_err() {
            warn!("Prepare dropped, controller is shut down");
            return;
        }

        self.watchdog.start();
    }

    /// Queue teardown of the current engine
    ///
    /// The play tag and play position are reset before this returns, so
    /// a caller can stage markers for the next source immediately. The
    /// buffering floor and mute flag are cleared on the worker turn.
    pub fn release(&self) {
        self.core.reset_markers();
        if self.queue.submit(Command::Release).is_err() {
            warn!("Release dropped, controller is shut down");
        }
    }

    /// Queue attachment of a rendering surface
    pub fn set_display(&self, surface: SurfaceHandle) {
        if self.queue.submit(Command::AttachSurface(surface)).is_err() {
            warn!("Surface attach dropped, controller is shut down");
        }
    }

    /// Queue detachment of a rendering surface
    pub fn release_surface(&self, surface: SurfaceHandle) {
        if self.queue.submit(Command::ReleaseSurface(surface)).is_err() {
            warn!("Surface release dropped, controller is shut down");
        }
    }

    /// Begin or resume playback
    ///
    /// Goes straight to the bound engine, or does nothing without one.
    /// The state tracker follows along only when the transition is legal;
    /// the engine hears the call either way.
    pub fn start(&self) {
        let engine = match self.core.engine() {
            Some(engine) => engine,
            None => {
                debug!("Start ignored, no engine");
                return;
            }
        };
        engine.start();
        self.core.states().advance(PlaybackState::Playing);
    }

    /// Suspend playback
    pub fn pause(&self) {
        let engine = match self.core.engine() {
            Some(engine) => engine,
            None => {
                debug!("Pause ignored, no engine");
                return;
            }
        };
        engine.pause();
        self.core.states().advance(PlaybackState::Paused);
    }

    /// Halt playback
    pub fn stop(&self) {
        let engine = match self.core.engine() {
            Some(engine) => engine,
            None => {
                debug!("Stop ignored, no engine");
                return;
            }
        };
        engine.stop();
        self.core.states().advance(PlaybackState::Stopped);
    }

    /// Seek to a position in milliseconds
    pub fn seek_to(&self, position_ms: i64) {
        if let Some(engine) = self.core.engine() {
            engine.seek_to(position_ms);
        }
    }

    /// Replace or clear the active listener
    pub fn set_listener(&self, listener: Option<Arc<dyn PlayerListener>>) {
        self.listeners.set_current(listener);
    }

    /// Replace or clear the parked listener
    pub fn set_last_listener(&self, listener: Option<Arc<dyn PlayerListener>>) {
        self.listeners.set_last(listener);
    }

    /// The active listener, if it is still alive
    pub fn listener(&self) -> Option<Arc<dyn PlayerListener>> {
        self.listeners.current()
    }

    /// The parked listener, if it is still alive
    pub fn last_listener(&self) -> Option<Arc<dyn PlayerListener>> {
        self.listeners.last()
    }

    /// Current playback position in milliseconds, 0 without an engine
    pub fn current_position(&self) -> i64 {
        self.core
            .engine()
            .map(|engine| engine.current_position())
            .unwrap_or(0)
    }

    /// Media duration in milliseconds, 0 without an engine
    pub fn duration(&self) -> i64 {
        self.core
            .engine()
            .map(|engine| engine.duration())
            .unwrap_or(0)
    }

    /// Whether playback is currently running, false without an engine
    pub fn is_playing(&self) -> bool {
        self.core
            .engine()
            .map(|engine| engine.is_playing())
            .unwrap_or(false)
    }

    /// Buffered percentage as the engine reports it, 0 without an engine
    ///
    /// The buffering floor only shapes [`PlayerListener::on_buffering_update`]
    /// callbacks; this accessor is a raw pass-through.
    pub fn buffered_percentage(&self) -> i32 {
        self.core
            .engine()
            .map(|engine| engine.buffered_percentage())
            .unwrap_or(0)
    }

    /// Network throughput in bytes per second, 0 without an engine
    pub fn net_speed(&self) -> u64 {
        self.core
            .engine()
            .map(|engine| engine.net_speed())
            .unwrap_or(0)
    }

    /// Decoded video width read from the engine, 0 without an engine
    pub fn video_width(&self) -> u32 {
        self.core
            .engine()
            .map(|engine| engine.video_width())
            .unwrap_or(0)
    }

    /// Decoded video height read from the engine, 0 without an engine
    pub fn video_height(&self) -> u32 {
        self.core
            .engine()
            .map(|engine| engine.video_height())
            .unwrap_or(0)
    }

    /// Cached video width, updated on every size-changed callback
    ///
    /// Unlike [`PlaybackController::video_width`] this survives without a
    /// live engine read and can be corrected by the embedding view.
    pub fn current_video_width(&self) -> u32 {
        self.core.video_size().0
    }

    /// Cached video height, updated on every size-changed callback
    pub fn current_video_height(&self) -> u32 {
        self.core.video_size().1
    }

    /// Override the cached video width
    pub fn set_current_video_width(&self, width: u32) {
        let (_, height) = self.core.video_size();
        self.core.set_video_size(width, height);
    }

    /// Override the cached video height
    pub fn set_current_video_height(&self, height: u32) {
        let (width, _) = self.core.video_size();
        self.core.set_video_size(width, height);
    }

    /// Set the playback rate
    pub fn set_speed(&self, speed: f32, sound_touch: bool) {
        if let Some(engine) = self.core.engine() {
            engine.set_speed(speed, sound_touch);
        }
    }

    /// Set the playback rate without interrupting playback
    pub fn set_speed_playing(&self, speed: f32, sound_touch: bool) {
        if let Some(engine) = self.core.engine() {
            engine.set_speed_playing(speed, sound_touch);
        }
    }

    /// Mute or unmute
    ///
    /// The flag outlives the engine: it is re-applied to every engine a
    /// later prepare creates, until release clears it.
    pub fn set_muted(&self, muted: bool) {
        self.core.set_muted(muted);
        if let Some(engine) = self.core.engine() {
            engine.set_muted(muted);
        }
    }

    /// Whether the mute flag is set
    pub fn is_muted(&self) -> bool {
        self.core.is_muted()
    }

    /// Reconfigure the buffering watchdog
    pub fn set_timeout(&self, timeout_ms: u64, enabled: bool) {
        self.watchdog.set_timeout(timeout_ms, enabled);
    }

    /// Whether the buffering watchdog is enabled
    pub fn is_timeout_enabled(&self) -> bool {
        self.watchdog.is_enabled()
    }

    /// Configured buffering deadline in milliseconds
    pub fn timeout_millis(&self) -> u64 {
        self.watchdog.timeout_millis()
    }

    /// Set the reported buffering floor
    pub fn set_buffer_point(&self, percent: i32) {
        self.core.set_buffer_point(percent);
    }

    /// The reported buffering floor
    pub fn buffer_point(&self) -> i32 {
        self.core.buffer_point()
    }

    /// Stage a play tag for the next source
    pub fn set_play_tag<S: Into<String>>(&self, tag: S) {
        self.core.set_play_tag(tag.into());
    }

    /// The staged play tag, empty when none is staged
    pub fn play_tag(&self) -> String {
        self.core.play_tag()
    }

    /// Stage a play position marker for the next source
    pub fn set_play_position(&self, position: i32) {
        self.core.set_play_position(position);
    }

    /// The staged play position, [`PLAY_POSITION_NONE`] when unset
    pub fn play_position(&self) -> i32 {
        self.core.play_position()
    }

    /// Replace the options handed to future prepare calls
    pub fn set_engine_options(&self, options: Vec<EngineOption>) {
        self.core.set_engine_options(options);
    }

    /// The options handed to future prepare calls
    pub fn engine_options(&self) -> Vec<EngineOption> {
        self.core.engine_options()
    }

    /// Install or clear the engine-created hook
    pub fn set_engine_created_hook(&self, hook: Option<EngineCreatedHook>) {
        self.core.set_created_hook(hook);
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.core.states().current()
    }

    /// State before the most recent change
    pub fn last_state(&self) -> PlaybackState {
        self.core.states().last()
    }

    /// The engine currently in use, if any
    pub fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.core.engine()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        debug!("Shutting down playback controller");
        let _ = self.queue.submit(Command::Release);
        self.queue.shutdown();
        self.watchdog.shutdown();
        self.bridge.shutdown();
    }
}
