//! Bridge from the key listener thread into async code
//!
//! A dedicated std thread owns the key source and polls it. Shift presses
//! are handed to the async side over a bounded tokio channel, but only while
//! a wait is open: every call to [`KeyEventBridge::next_side`] publishes a
//! fresh wait id in a shared slot, and the listener takes that id (leaving
//! the slot empty) before sending. One wait therefore gets exactly one
//! resolution, and presses with no open wait are dropped.

use crate::keyboard::{KeyEvent, KeySource, ListenerError};
use crate::trial::Side;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Slot value meaning "no wait open"
const NO_WAIT: u64 = 0;

/// Error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start` was called on a bridge that already ran
    #[error("key listener already started")]
    AlreadyStarted,
    /// A wait was requested before `start`
    #[error("key listener not started")]
    NotStarted,
    /// The listener thread is gone (stopped or source exhausted)
    #[error("key listener disconnected")]
    Disconnected,
    /// The key source could not attach to the keyboard
    #[error("failed to start key listener: {0}")]
    Listener(#[from] ListenerError),
}

/// A shift press matched to the wait it resolves
#[derive(Debug, Clone, Copy)]
struct Resolved {
    wait_id: u64,
    side: Side,
}

/// Per-event callback run on the listener thread
struct ShiftDispatch {
    pending: Arc<AtomicU64>,
    tx: mpsc::Sender<Resolved>,
}

impl ShiftDispatch {
    /// Returns true when the event resolved the open wait
    fn on_event(&self, event: &KeyEvent) -> bool {
        if !event.is_press() {
            return false;
        }
        let Some(side) = Side::from_key(event.key) else {
            return false;
        };
        let wait_id = self.pending.swap(NO_WAIT, Ordering::AcqRel);
        if wait_id == NO_WAIT {
            return false;
        }
        match self.tx.try_send(Resolved { wait_id, side }) {
            Ok(()) => {
                log::debug!("{} shift resolved wait {}", side, wait_id);
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("hand-off channel full, dropping {} shift", side);
                // Reopen the wait unless the consumer already opened a newer one
                let _ = self.pending.compare_exchange(
                    NO_WAIT,
                    wait_id,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Cloneable handle that asks the listener thread to exit
#[derive(Debug, Clone, Default)]
pub struct ListenerShutdown {
    flag: Arc<AtomicBool>,
}

impl ListenerShutdown {
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

enum ListenerState {
    Idle,
    Listening {
        thread: JoinHandle<()>,
        rx: mpsc::Receiver<Resolved>,
    },
    Stopped,
}

/// Turns key presses from a listener thread into awaitable [`Side`] values
pub struct KeyEventBridge {
    state: ListenerState,
    pending: Arc<AtomicU64>,
    last_wait: u64,
    shutdown: ListenerShutdown,
    poll_interval: Duration,
    capacity: usize,
}

impl KeyEventBridge {
    /// Create a bridge polling its source every `poll_interval`, buffering
    /// up to `capacity` hand-offs
    pub fn new(poll_interval: Duration, capacity: usize) -> Self {
        Self {
            state: ListenerState::Idle,
            pending: Arc::new(AtomicU64::new(NO_WAIT)),
            last_wait: NO_WAIT,
            shutdown: ListenerShutdown::default(),
            poll_interval,
            capacity: capacity.max(1),
        }
    }

    /// Handle for stopping the listener from another thread
    pub fn shutdown_handle(&self) -> ListenerShutdown {
        self.shutdown.clone()
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, ListenerState::Listening { .. })
    }

    /// Spawn the listener thread.
    ///
    /// `open` runs on the new thread and builds the key source there. This
    /// call blocks the calling thread until the source is open, so attach
    /// failures surface here. On an async runtime that stalls the executor
    /// for as long as opening the source takes. A bridge can be started once.
    pub fn start<F, S>(&mut self, open: F) -> Result<(), BridgeError>
    where
        F: FnOnce() -> Result<S, ListenerError> + Send + 'static,
        S: KeySource + 'static,
    {
        if !matches!(self.state, ListenerState::Idle) {
            return Err(BridgeError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let dispatch = ShiftDispatch {
            pending: Arc::clone(&self.pending),
            tx,
        };
        let shutdown = self.shutdown.clone();
        let interval = self.poll_interval;

        let thread = thread::Builder::new()
            .name("shift-listener".into())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                listen(source, &dispatch, &shutdown, interval);
            })
            .map_err(ListenerError::Io)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("key listener started (poll every {:?})", interval);
                self.state = ListenerState::Listening { thread, rx };
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                self.state = ListenerState::Stopped;
                Err(e.into())
            }
            Err(_) => {
                let _ = thread.join();
                self.state = ListenerState::Stopped;
                Err(ListenerError::ThreadExited.into())
            }
        }
    }

    /// Wait for the next shift press and report its side.
    ///
    /// Taking `&mut self` keeps a single wait in flight. Dropping the
    /// returned future abandons the wait; a late press for it is discarded
    /// by the next call.
    pub async fn next_side(&mut self) -> Result<Side, BridgeError> {
        let rx = match &mut self.state {
            ListenerState::Listening { rx, .. } => rx,
            ListenerState::Idle => return Err(BridgeError::NotStarted),
            ListenerState::Stopped => return Err(BridgeError::Disconnected),
        };

        self.last_wait = self.last_wait.wrapping_add(1).max(1);
        let wait_id = self.last_wait;
        self.pending.store(wait_id, Ordering::Release);

        loop {
            match rx.recv().await {
                Some(resolved) if resolved.wait_id == wait_id => return Ok(resolved.side),
                Some(stale) => {
                    log::debug!("discarding stale hand-off for wait {}", stale.wait_id);
                }
                None => {
                    self.pending.store(NO_WAIT, Ordering::Release);
                    return Err(BridgeError::Disconnected);
                }
            }
        }
    }

    /// Stop the listener thread and wait for it to exit.
    ///
    /// Blocks the calling thread for at most one poll of the source plus one
    /// poll interval. Safe to call repeatedly. A bridge that was never started cannot be
    /// started afterwards.
    pub fn stop(&mut self) {
        self.shutdown.request();
        self.pending.store(NO_WAIT, Ordering::Release);
        if let ListenerState::Listening { thread, .. } =
            std::mem::replace(&mut self.state, ListenerState::Stopped)
        {
            if thread.join().is_err() {
                log::warn!("key listener thread panicked");
            }
            log::info!("key listener stopped");
        }
    }
}

impl Drop for KeyEventBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Listener thread body
fn listen<S: KeySource>(
    mut source: S,
    dispatch: &ShiftDispatch,
    shutdown: &ListenerShutdown,
    interval: Duration,
) {
    let mut events = Vec::new();
    while !shutdown.is_requested() && source.is_alive() {
        events.clear();
        source.poll(&mut events);
        for event in &events {
            dispatch.on_event(event);
        }
        thread::sleep(interval);
    }
    log::debug!("key listener thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyCode;

    /// Repeatedly taps one key: press on one poll, release on the next
    struct TappingSource {
        key: KeyCode,
        down: bool,
    }

    impl KeySource for TappingSource {
        fn poll(&mut self, out: &mut Vec<KeyEvent>) -> usize {
            self.down = !self.down;
            out.push(if self.down {
                KeyEvent::press(self.key)
            } else {
                KeyEvent::release(self.key)
            });
            1
        }
    }

    /// Produces nothing and dies after its first poll
    struct DeadSource;

    impl KeySource for DeadSource {
        fn poll(&mut self, _out: &mut Vec<KeyEvent>) -> usize {
            0
        }

        fn is_alive(&self) -> bool {
            false
        }
    }

    fn dispatch() -> (ShiftDispatch, mpsc::Receiver<Resolved>) {
        dispatch_with_capacity(4)
    }

    fn dispatch_with_capacity(capacity: usize) -> (ShiftDispatch, mpsc::Receiver<Resolved>) {
        let (tx, rx) = mpsc::channel(capacity);
        let dispatch = ShiftDispatch {
            pending: Arc::new(AtomicU64::new(NO_WAIT)),
            tx,
        };
        (dispatch, rx)
    }

    fn bridge() -> KeyEventBridge {
        KeyEventBridge::new(Duration::from_millis(1), 4)
    }

    #[test]
    fn dispatch_resolves_left_and_right() {
        let (dispatch, mut rx) = dispatch();

        dispatch.pending.store(1, Ordering::Release);
        assert!(dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));
        let resolved = rx.try_recv().unwrap();
        assert_eq!(resolved.wait_id, 1);
        assert_eq!(resolved.side, Side::Left);

        dispatch.pending.store(2, Ordering::Release);
        assert!(dispatch.on_event(&KeyEvent::press(KeyCode::RIGHT_SHIFT)));
        assert_eq!(rx.try_recv().unwrap().side, Side::Right);
    }

    #[test]
    fn dispatch_ignores_other_keys_and_releases() {
        let (dispatch, mut rx) = dispatch();
        dispatch.pending.store(1, Ordering::Release);

        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode(30))));
        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_CTRL)));
        assert!(!dispatch.on_event(&KeyEvent::release(KeyCode::LEFT_SHIFT)));
        assert!(rx.try_recv().is_err());
        // The wait is still open for a real shift press
        assert_eq!(dispatch.pending.load(Ordering::Acquire), 1);
    }

    #[test]
    fn dispatch_drops_presses_without_open_wait() {
        let (dispatch, mut rx) = dispatch();
        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_resolves_each_wait_once() {
        let (dispatch, mut rx) = dispatch();
        dispatch.pending.store(3, Ordering::Release);

        assert!(dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));
        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode::RIGHT_SHIFT)));
        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));

        assert_eq!(rx.try_recv().unwrap().side, Side::Left);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_keeps_wait_open_when_channel_full() {
        let (dispatch, mut rx) = dispatch_with_capacity(1);
        dispatch
            .tx
            .try_send(Resolved { wait_id: 1, side: Side::Right })
            .unwrap();

        dispatch.pending.store(7, Ordering::Release);
        assert!(!dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));
        assert_eq!(dispatch.pending.load(Ordering::Acquire), 7);

        // Once there is room the same wait resolves
        assert_eq!(rx.try_recv().unwrap().wait_id, 1);
        assert!(dispatch.on_event(&KeyEvent::press(KeyCode::LEFT_SHIFT)));
        let resolved = rx.try_recv().unwrap();
        assert_eq!(resolved.wait_id, 7);
        assert_eq!(resolved.side, Side::Left);
    }

    #[tokio::test]
    async fn next_side_before_start_fails() {
        let mut bridge = bridge();
        assert!(matches!(bridge.next_side().await, Err(BridgeError::NotStarted)));
    }

    #[test]
    fn start_failure_propagates() {
        let mut bridge = bridge();
        let result = bridge.start(|| Err::<TappingSource, _>(ListenerError::NoDevices));
        assert!(matches!(
            result,
            Err(BridgeError::Listener(ListenerError::NoDevices))
        ));
        assert!(!bridge.is_listening());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut bridge = bridge();
        bridge
            .start(|| Ok(TappingSource { key: KeyCode(30), down: false }))
            .unwrap();
        let second = bridge.start(|| Ok(TappingSource { key: KeyCode(30), down: false }));
        assert!(matches!(second, Err(BridgeError::AlreadyStarted)));
        bridge.stop();
    }

    #[tokio::test]
    async fn tapped_left_shift_resolves_left() {
        let mut bridge = bridge();
        bridge
            .start(|| Ok(TappingSource { key: KeyCode::LEFT_SHIFT, down: false }))
            .unwrap();
        assert_eq!(bridge.next_side().await.unwrap(), Side::Left);
        assert_eq!(bridge.next_side().await.unwrap(), Side::Left);
        bridge.stop();
    }

    #[tokio::test]
    async fn tapped_right_shift_resolves_right() {
        let mut bridge = bridge();
        bridge
            .start(|| Ok(TappingSource { key: KeyCode::RIGHT_SHIFT, down: false }))
            .unwrap();
        assert_eq!(bridge.next_side().await.unwrap(), Side::Right);
        bridge.stop();
    }

    #[tokio::test]
    async fn dead_source_disconnects() {
        let mut bridge = bridge();
        bridge.start(|| Ok(DeadSource)).unwrap();
        assert!(matches!(bridge.next_side().await, Err(BridgeError::Disconnected)));
    }

    #[tokio::test]
    async fn stale_hand_off_is_discarded() {
        let (tx, rx) = mpsc::channel(4);
        let mut bridge = bridge();
        bridge.state = ListenerState::Listening {
            thread: thread::spawn(|| {}),
            rx,
        };
        bridge.last_wait = 4;

        tx.try_send(Resolved { wait_id: 1, side: Side::Right }).unwrap();
        tx.try_send(Resolved { wait_id: 5, side: Side::Left }).unwrap();

        assert_eq!(bridge.next_side().await.unwrap(), Side::Left);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut bridge = bridge();
        bridge
            .start(|| Ok(TappingSource { key: KeyCode(30), down: false }))
            .unwrap();
        bridge.stop();
        bridge.stop();
        assert!(!bridge.is_listening());
        assert!(matches!(bridge.next_side().await, Err(BridgeError::Disconnected)));
        assert!(matches!(
            bridge.start(|| Ok(DeadSource)),
            Err(BridgeError::AlreadyStarted)
        ));
    }

    #[test]
    fn stop_before_start_is_noop() {
        let mut bridge = bridge();
        bridge.stop();
        assert!(!bridge.is_listening());
    }

    #[test]
    fn stop_returns_promptly() {
        let mut bridge = KeyEventBridge::new(Duration::from_millis(20), 4);
        bridge
            .start(|| Ok(TappingSource { key: KeyCode(30), down: false }))
            .unwrap();
        let started = std::time::Instant::now();
        bridge.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!bridge.is_listening());
    }

    #[test]
    fn shutdown_handle_stops_thread() {
        let mut bridge = bridge();
        bridge
            .start(|| Ok(TappingSource { key: KeyCode(30), down: false }))
            .unwrap();
        let handle = bridge.shutdown_handle();
        handle.request();
        assert!(handle.is_requested());
        // Join returns because the thread observed the flag
        bridge.stop();
    }
}
