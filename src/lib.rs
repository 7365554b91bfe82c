//! playcore - a playback controller over swappable media engines
//!
//! This crate mediates between an application UI and a media engine
//! backend. The controller serializes engine lifecycle work on a single
//! command thread, delivers engine callbacks through a dedicated event
//! thread, and bounds buffering stalls with a watchdog. Backends plug in
//! through the [`engine::MediaEngine`] trait and are built on demand by
//! an injected [`engine::EngineFactory`].

pub mod controller;
pub mod engine;
pub mod utils;

pub use controller::{
    PlaybackController, PlaybackControllerBuilder, PlaybackState, PlayerListener,
    PLAY_POSITION_NONE,
};
pub use engine::events::{
    BUFFER_TIMEOUT_CODE, ENGINE_SETUP_CODE, INFO_BUFFERING_END, INFO_BUFFERING_START,
    INFO_VIDEO_ROTATION_CHANGED,
};
pub use engine::{
    EngineCreatedHook, EngineEvent, EngineFactory, EngineOption, EventSink, MediaEngine,
    OptionValue, PlaybackRequest, SimEngine, SimEngineFactory, SimScript, SurfaceHandle,
};
pub use utils::config::Config;
pub use utils::error::{PlayCoreError, Result};
