//! Serialized lifecycle command execution
//!
//! Engine construction and teardown are expensive and order-sensitive,
//! so they run on a single worker thread fed by a FIFO channel. Commands
//! submitted from any thread execute one at a time in submission order,
//! which makes prepare-release races impossible by construction.

use crate::controller::watchdog::BufferWatchdog;
use crate::controller::{ControllerCore, PlaybackState};
use crate::engine::events::{EngineEvent, EventSink, SessionEvent, ENGINE_SETUP_CODE};
use crate::engine::{EngineFactory, PlaybackRequest, SurfaceHandle};
use crate::utils::error::{IntoCoreError, Result};
use crossbeam::channel::{unbounded, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Commands executed by the worker thread
pub(crate) enum Command {
    /// Tear down any current engine, build a fresh one, and submit the request
    Prepare(PlaybackRequest),

    /// Hand a rendering surface to the current engine
    AttachSurface(SurfaceHandle),

    /// Detach a rendering surface from the current engine
    ReleaseSurface(SurfaceHandle),

    /// Tear down the current engine and reset per-engine state
    Release,

    /// Stop the worker thread
    Shutdown,
}

/// FIFO command queue with a single worker thread
pub(crate) struct CommandQueue {
    cmd_tx: Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Spawn the worker thread
    pub fn start(
        core: Arc<ControllerCore>,
        factory: Arc<dyn EngineFactory>,
        watchdog: Arc<BufferWatchdog>,
        events_tx: Sender<SessionEvent>,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("player-commands".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        Command::Prepare(request) => {
                            exec_prepare(&core, factory.as_ref(), &events_tx, request);
                        }
                        Command::AttachSurface(surface) => {
                            if let Some(engine) = core.engine() {
                                engine.set_display(surface);
                            } else {
                                debug!("No engine to attach surface {:?} to", surface);
                            }
                        }
                        Command::ReleaseSurface(surface) => {
                            if let Some(engine) = core.engine() {
                                engine.release_surface(surface);
                            } else {
                                debug!("No engine holding surface {:?}", surface);
                            }
                        }
                        Command::Release => {
                            exec_release(&core, &watchdog);
                        }
                        Command::Shutdown => {
                            if let Some(engine) = core.take_engine() {
                                engine.release();
                            }
                            break;
                        }
                    }
                }

                debug!("Command thread stopped");
            })
            .queue_err("Failed to spawn command thread")?;

        Ok(Self {
            cmd_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue a command for the worker thread
    pub fn submit(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .queue_err("Command queue is shut down")
    }

    /// Stop the worker thread and wait for it to exit
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Command thread panicked during shutdown");
            }
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build a fresh engine for `request` and submit the prepare
///
/// The session counter is bumped first so anything the outgoing engine
/// still emits is recognizably stale. A factory or submission failure is
/// reported through the event channel like an engine fault, with the
/// setup error code.
fn exec_prepare(
    core: &ControllerCore,
    factory: &dyn EngineFactory,
    events_tx: &Sender<SessionEvent>,
    request: PlaybackRequest,
) {
    let session = core.next_session();
    core.set_video_size(0, 0);

    if let Some(old) = core.take_engine() {
        old.release();
    }

    core.states().advance(PlaybackState::Initializing);
    info!("Preparing {} (session {})", request.url, session);

    let engine = match factory.create() {
        Ok(engine) => engine,
        Err(err) => {
            error!("Engine construction failed: {}", err);
            let _ = events_tx.send(SessionEvent {
                session,
                event: EngineEvent::Error {
                    code: ENGINE_SETUP_CODE,
                    extra: ENGINE_SETUP_CODE,
                },
            });
            return;
        }
    };

    if let Some(hook) = core.created_hook() {
        hook(&engine);
    }

    engine.connect_events(EventSink::new(session, events_tx.clone()));
    engine.set_muted(core.is_muted());
    core.store_engine(Arc::clone(&engine));

    let options = core.engine_options();
    if let Err(err) = engine.prepare_async(&request, &options) {
        error!("Prepare submission failed for {}: {}", request.url, err);
        if let Some(engine) = core.take_engine() {
            engine.release();
        }
        let _ = events_tx.send(SessionEvent {
            session,
            event: EngineEvent::Error {
                code: ENGINE_SETUP_CODE,
                extra: ENGINE_SETUP_CODE,
            },
        });
    }
}

/// Tear down the current engine and reset per-engine state
///
/// The buffering floor and mute flag belong to the engine lifetime and
/// are cleared here. The session bump makes any callback the released
/// engine still produces stale.
fn exec_release(core: &ControllerCore, watchdog: &BufferWatchdog) {
    if let Some(engine) = core.take_engine() {
        engine.release();
    }

    core.next_session();
    core.set_buffer_point(0);
    core.set_muted(false);
    watchdog.cancel();
    core.states().advance(PlaybackState::Released);
}
