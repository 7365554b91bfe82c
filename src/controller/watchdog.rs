//! Buffering timeout watchdog
//!
//! Tracks at most one outstanding buffering deadline on a dedicated
//! thread. Arming replaces any earlier deadline, so a stall is always
//! measured from the most recent prepare or buffering start. The
//! watchdog is inert unless enabled and reports expiry through a
//! callback injected at construction.

use crate::utils::error::{IntoCoreError, Result};
use crossbeam::channel::{unbounded, RecvTimeoutError, Sender};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Commands understood by the watchdog thread
enum WatchdogCmd {
    /// Arm a deadline this far in the future, replacing any pending one
    Arm(Duration),

    /// Drop the pending deadline, if any
    Disarm,

    /// Stop the watchdog thread
    Shutdown,
}

/// Single-deadline buffering watchdog
pub(crate) struct BufferWatchdog {
    cmd_tx: Sender<WatchdogCmd>,
    handle: Mutex<Option<JoinHandle<()>>>,
    enabled: AtomicBool,
    timeout_ms: AtomicU64,
}

impl BufferWatchdog {
    /// Spawn the watchdog thread
    ///
    /// # Arguments
    /// * `timeout_ms` - Deadline length used by [`BufferWatchdog::start`]
    /// * `enabled` - Whether deadlines are armed at all
    /// * `on_timeout` - Invoked on the watchdog thread when a deadline expires
    pub fn spawn(
        timeout_ms: u64,
        enabled: bool,
        on_timeout: Box<dyn Fn() + Send>,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("buffer-watchdog".to_string())
            .spawn(move || {
                let mut deadline: Option<Instant> = None;

                loop {
                    let cmd = match deadline {
                        Some(at) => {
                            let now = Instant::now();
                            if at <= now {
                                deadline = None;
                                on_timeout();
                                continue;
                            }
                            match cmd_rx.recv_timeout(at - now) {
                                Ok(cmd) => cmd,
                                Err(RecvTimeoutError::Timeout) => {
                                    deadline = None;
                                    on_timeout();
                                    continue;
                                }
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        None => match cmd_rx.recv() {
                            Ok(cmd) => cmd,
                            Err(_) => break,
                        },
                    };

                    match cmd {
                        WatchdogCmd::Arm(timeout) => {
                            deadline = Some(Instant::now() + timeout);
                        }
                        WatchdogCmd::Disarm => {
                            deadline = None;
                        }
                        WatchdogCmd::Shutdown => break,
                    }
                }

                debug!("Buffer watchdog thread stopped");
            })
            .watchdog_err("Failed to spawn buffer watchdog thread")?;

        Ok(Self {
            cmd_tx,
            handle: Mutex::new(Some(handle)),
            enabled: AtomicBool::new(enabled),
            timeout_ms: AtomicU64::new(timeout_ms),
        })
    }

    /// Arm the configured deadline, replacing any pending one
    ///
    /// Does nothing while the watchdog is disabled.
    pub fn start(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        let millis = self.timeout_ms.load(Ordering::Acquire);
        debug!("Arming buffer watchdog for {} ms", millis);
        let _ = self.cmd_tx.send(WatchdogCmd::Arm(Duration::from_millis(millis)));
    }

    /// Drop the pending deadline regardless of the enabled flag
    pub fn cancel(&self) {
        let _ = self.cmd_tx.send(WatchdogCmd::Disarm);
    }

    /// Reconfigure the deadline length and the enabled flag
    ///
    /// Disabling also disarms a pending deadline so a stale timer cannot
    /// fire after protection was switched off.
    pub fn set_timeout(&self, timeout_ms: u64, enabled: bool) {
        self.timeout_ms.store(timeout_ms, Ordering::Release);
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.cancel();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn timeout_millis(&self) -> u64 {
        self.timeout_ms.load(Ordering::Acquire)
    }

    /// Stop the watchdog thread and wait for it to exit
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WatchdogCmd::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Buffer watchdog thread panicked during shutdown");
            }
        }
    }
}

impl Drop for BufferWatchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
