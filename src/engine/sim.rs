//! Simulated engine backend
//!
//! A scripted in-process implementation of [`MediaEngine`] used by the
//! demo binary and the test suites. It signals readiness after a
//! configurable delay, models an advancing playback position, and records
//! the calls it receives so tests can assert on them. A script can also
//! stay silent (never signal readiness, for watchdog tests), fail the
//! prepare submission, or keep emitting after release to model a badly
//! behaved backend.

use crate::engine::events::{EngineEvent, EventSink};
use crate::engine::{EngineFactory, EngineOption, MediaEngine, PlaybackRequest, SurfaceHandle};
use crate::utils::error::{IntoCoreError, PlayCoreError, Result};
use log::debug;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Behavior script for a simulated engine
#[derive(Debug, Clone)]
pub struct SimScript {
    /// Delay between prepare submission and the prepared signal
    pub prepare_delay: Duration,

    /// Never signal readiness (models a stalled stream)
    pub silent: bool,

    /// Fail the prepare submission itself
    pub fail_prepare: bool,

    /// Keep emitting after release (models a badly behaved backend)
    pub emit_after_release: bool,

    /// Reported video dimensions
    pub video_size: (u32, u32),

    /// Reported media duration in milliseconds
    pub duration_ms: i64,

    /// Reported network throughput in bytes per second
    pub net_speed: u64,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            prepare_delay: Duration::from_millis(20),
            silent: false,
            fail_prepare: false,
            emit_after_release: false,
            video_size: (1280, 720),
            duration_ms: 60_000,
            net_speed: 1_310_720,
        }
    }
}

/// Scripted [`MediaEngine`] implementation
pub struct SimEngine {
    script: SimScript,
    released: Arc<AtomicBool>,
    sink: Mutex<Option<EventSink>>,
    state: Arc<Mutex<SimState>>,
}

#[derive(Debug, Default)]
struct SimState {
    base_position_ms: i64,
    playing_since: Option<Instant>,
    speed: f32,
    muted: bool,
    buffered: i32,
    size_known: bool,
    attached_surface: Option<SurfaceHandle>,
    released_surfaces: Vec<SurfaceHandle>,
    applied_options: Vec<EngineOption>,
    prepared_url: Option<String>,
}

impl SimEngine {
    /// Create an engine following the given script
    pub fn new(script: SimScript) -> Self {
        Self {
            script,
            released: Arc::new(AtomicBool::new(false)),
            sink: Mutex::new(None),
            state: Arc::new(Mutex::new(SimState {
                speed: 1.0,
                ..SimState::default()
            })),
        }
    }

    /// Whether release has been called
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Whether the engine is currently muted
    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// The options handed to the last prepare call
    pub fn applied_options(&self) -> Vec<EngineOption> {
        self.state.lock().applied_options.clone()
    }

    /// The URL of the last prepared request
    pub fn prepared_url(&self) -> Option<String> {
        self.state.lock().prepared_url.clone()
    }

    /// The currently attached surface, if any
    pub fn attached_surface(&self) -> Option<SurfaceHandle> {
        self.state.lock().attached_surface
    }

    /// Surfaces released so far
    pub fn released_surfaces(&self) -> Vec<SurfaceHandle> {
        self.state.lock().released_surfaces.clone()
    }

    /// A clone of the connected sink, for scripted event emission in tests
    pub fn event_sink(&self) -> Option<EventSink> {
        self.sink.lock().clone()
    }

    fn fold_position(state: &mut SimState, duration_ms: i64) {
        if let Some(since) = state.playing_since.take() {
            let advanced = (since.elapsed().as_millis() as f64 * state.speed as f64) as i64;
            state.base_position_ms = (state.base_position_ms + advanced).min(duration_ms);
        }
    }
}

impl MediaEngine for SimEngine {
    fn connect_events(&self, sink: EventSink) {
        *self.sink.lock() = Some(sink);
    }

    fn prepare_async(&self, request: &PlaybackRequest, options: &[EngineOption]) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.prepared_url = Some(request.url.clone());
            state.applied_options = options.to_vec();
        }

        if self.script.fail_prepare {
            return Err(PlayCoreError::engine_error("scripted prepare failure"));
        }

        if self.script.silent {
            debug!("sim engine staying silent for {}", request.url);
            return Ok(());
        }

        let sink = self.sink.lock().clone();
        let released = Arc::clone(&self.released);
        let state = Arc::clone(&self.state);
        let delay = self.script.prepare_delay;
        let (width, height) = self.script.video_size;
        let ignore_release = self.script.emit_after_release;

        thread::Builder::new()
            .name("sim-engine-prepare".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if released.load(Ordering::Acquire) && !ignore_release {
                    return;
                }

                {
                    let mut state = state.lock();
                    state.buffered = 100;
                    state.size_known = true;
                }

                if let Some(sink) = sink {
                    sink.emit(EngineEvent::VideoSizeChanged { width, height });
                    sink.emit(EngineEvent::Prepared);
                }
            })
            .engine_err("Failed to spawn sim prepare thread")?;

        Ok(())
    }

    fn start(&self) {
        if self.is_released() {
            return;
        }
        let mut state = self.state.lock();
        if state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        Self::fold_position(&mut state, self.script.duration_ms);
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        Self::fold_position(&mut state, self.script.duration_ms);
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
        let mut state = self.state.lock();
        Self::fold_position(&mut state, self.script.duration_ms);
    }

    fn seek_to(&self, position_ms: i64) {
        {
            let mut state = self.state.lock();
            let resume = state.playing_since.is_some();
            state.base_position_ms = position_ms.clamp(0, self.script.duration_ms);
            state.playing_since = if resume { Some(Instant::now()) } else { None };
        }

        if !self.is_released() {
            if let Some(sink) = self.sink.lock().clone() {
                sink.emit(EngineEvent::SeekComplete);
            }
        }
    }

    fn current_position(&self) -> i64 {
        let state = self.state.lock();
        let mut position = state.base_position_ms;
        if let Some(since) = state.playing_since {
            position += (since.elapsed().as_millis() as f64 * state.speed as f64) as i64;
        }
        position.min(self.script.duration_ms)
    }

    fn duration(&self) -> i64 {
        self.script.duration_ms
    }

    fn video_width(&self) -> u32 {
        if self.state.lock().size_known {
            self.script.video_size.0
        } else {
            0
        }
    }

    fn video_height(&self) -> u32 {
        if self.state.lock().size_known {
            self.script.video_size.1
        } else {
            0
        }
    }

    fn is_playing(&self) -> bool {
        !self.is_released() && self.state.lock().playing_since.is_some()
    }

    fn buffered_percentage(&self) -> i32 {
        self.state.lock().buffered
    }

    fn net_speed(&self) -> u64 {
        self.script.net_speed
    }

    fn set_speed(&self, speed: f32, _sound_touch: bool) {
        let mut state = self.state.lock();
        let was_playing = state.playing_since.is_some();
        Self::fold_position(&mut state, self.script.duration_ms);
        state.speed = speed;
        if was_playing {
            state.playing_since = Some(Instant::now());
        }
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn set_display(&self, surface: SurfaceHandle) {
        self.state.lock().attached_surface = Some(surface);
    }

    fn release_surface(&self, surface: SurfaceHandle) {
        let mut state = self.state.lock();
        state.released_surfaces.push(surface);
        if state.attached_surface == Some(surface) {
            state.attached_surface = None;
        }
    }
}

/// Factory producing [`SimEngine`] instances
///
/// Keeps every created engine around so tests can inspect earlier
/// instances after they have been replaced. Scripts can be queued to give
/// consecutive engines different behavior; the default script applies
/// once the queue is empty.
pub struct SimEngineFactory {
    default_script: SimScript,
    queued: Mutex<VecDeque<SimScript>>,
    engines: Mutex<Vec<Arc<SimEngine>>>,
}

impl SimEngineFactory {
    /// Create a factory with a default script
    pub fn new(default_script: SimScript) -> Self {
        Self {
            default_script,
            queued: Mutex::new(VecDeque::new()),
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Queue a script for the next created engine
    pub fn queue_script(&self, script: SimScript) {
        self.queued.lock().push_back(script);
    }

    /// Number of engines created so far
    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    /// The nth created engine
    pub fn engine(&self, index: usize) -> Option<Arc<SimEngine>> {
        self.engines.lock().get(index).cloned()
    }

    /// The most recently created engine
    pub fn last_engine(&self) -> Option<Arc<SimEngine>> {
        self.engines.lock().last().cloned()
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(&self) -> Result<Arc<dyn MediaEngine>> {
        let script = self
            .queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());

        let engine = Arc::new(SimEngine::new(script));
        self.engines.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}
