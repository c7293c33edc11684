//! The event capture state machine.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sleeplog_core::{Event, EventKind};

use crate::hardware::HardwareSignal;
use crate::signaler::Signaler;

/// Spacing between flashes in an acknowledgement sequence.
const SEQUENCE_INTERVAL: Duration = Duration::from_millis(250);

/// Buffer size for the machine's input channel.
const INPUT_BUFFER: usize = 32;

/// Upper bound on events queued after failed persistence writes.
const MAX_PENDING_EVENTS: usize = 256;

/// Errors returned by an [`EventSink`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for captured events, typically the record store.
pub trait EventSink {
    /// Persists one event.
    fn record(&mut self, event: &Event) -> Result<(), SinkError>;
}

/// The machine's current logical state.
///
/// Runtime only: state is not reconstructed from the store, so a process
/// restart loses the in-flight session back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    InBed,
    SleepStart,
    Sleeping,
    Awake,
    OutOfBed,
}

/// One unit of work for the dispatch loop: a hardware signal or a timer
/// expiration. Delivering both through the same channel keeps processing
/// strictly in arrival order.
#[derive(Debug, Clone)]
pub enum Input {
    /// A signal from the hardware event source.
    Signal(HardwareSignal),
    /// The inactivity countdown armed with this generation elapsed.
    InactivityElapsed(u64),
    /// Stop the dispatch loop. The machine keeps a sender for its timer
    /// tasks, so the channel alone cannot signal end of input.
    Shutdown,
}

/// Timing configuration for the capture machine.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Quiet period after a button press before the sleeper is presumed
    /// asleep.
    pub cooldown: Duration,
    /// Interval of the heartbeat blink while presumed asleep.
    pub blink_interval: Duration,
}

/// Creates the machine's input channel.
///
/// The sender side is shared by the hardware source adapter and the
/// machine's own timer tasks.
#[must_use]
pub fn channel() -> (mpsc::Sender<Input>, mpsc::Receiver<Input>) {
    mpsc::channel(INPUT_BUFFER)
}

/// Owns the capture session state: the logical state code, the inactivity
/// countdown, and the periodic blink, with no ambient globals.
///
/// The inactivity countdown is a spawned sleep task stamped with a
/// generation counter. Canceling bumps the generation (and aborts the task),
/// so an expiration message from a canceled timer is recognized as stale and
/// never acts; at most one countdown and one periodic blink are outstanding
/// at any instant.
///
/// Persistence is optimistic: logical state always advances even when a
/// write fails. Failed writes are logged and parked in a bounded queue that
/// is flushed, in order, before the next write; while the queue is stalled,
/// new events join its tail so the store never sees events out of emission
/// order.
pub struct CaptureMachine<S: EventSink> {
    state: CaptureState,
    sink: S,
    signaler: Signaler,
    config: CaptureConfig,
    timers: mpsc::Sender<Input>,
    timer_generation: u64,
    inactivity: Option<JoinHandle<()>>,
    pending: VecDeque<Event>,
    last_emitted_ms: Option<i64>,
}

impl<S: EventSink> CaptureMachine<S> {
    /// Creates a machine in the `Idle` state.
    ///
    /// `timers` must be the sender side of the channel whose receiver is
    /// passed to [`run`](Self::run), so timer expirations join the same
    /// ordered input stream as hardware signals.
    pub fn new(
        sink: S,
        signaler: Signaler,
        config: CaptureConfig,
        timers: mpsc::Sender<Input>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            sink,
            signaler,
            config,
            timers,
            timer_generation: 0,
            inactivity: None,
            pending: VecDeque::new(),
            last_emitted_ms: None,
        }
    }

    /// The current logical state.
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Runs the cooperative dispatch loop until [`Input::Shutdown`] arrives
    /// or the input channel closes.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<Input>) {
        while let Some(input) = inputs.recv().await {
            if matches!(input, Input::Shutdown) {
                break;
            }
            self.dispatch(input);
        }
        self.cancel_inactivity();
        tracing::info!("capture loop stopped");
    }

    /// Processes one input. Inputs are handled one at a time, in arrival
    /// order.
    pub fn dispatch(&mut self, input: Input) {
        match input {
            Input::Signal(signal) => self.handle_signal(signal),
            Input::InactivityElapsed(generation) => self.on_inactivity(generation),
            Input::Shutdown => {}
        }
    }

    fn handle_signal(&mut self, signal: HardwareSignal) {
        match signal {
            HardwareSignal::LidRaised => {
                self.emit(EventKind::InBed);
                self.signaler.blink_sequence(3, SEQUENCE_INTERVAL);
                self.set_state(CaptureState::InBed);
            }
            HardwareSignal::ButtonReleased => match self.state {
                CaptureState::InBed => {
                    self.emit(EventKind::SleepStart);
                    self.reset_countdown();
                    self.set_state(CaptureState::SleepStart);
                }
                CaptureState::Sleeping => {
                    self.emit(EventKind::Awake);
                    self.reset_countdown();
                    self.set_state(CaptureState::Awake);
                }
                CaptureState::Awake => {
                    // A press while already awake only resets the countdown.
                    self.reset_countdown();
                }
                _ => {
                    tracing::debug!(state = ?self.state, "button press ignored");
                }
            },
            HardwareSignal::LidClosed => {
                self.emit(EventKind::OutOfBed);
                self.cancel_inactivity();
                self.set_state(CaptureState::OutOfBed);
            }
            HardwareSignal::Fault(payload) => {
                // A device error must never crash the capture loop.
                tracing::error!(%payload, state = ?self.state, "hardware fault reported");
            }
        }
    }

    fn on_inactivity(&mut self, generation: u64) {
        if generation != self.timer_generation {
            tracing::debug!(generation, "stale inactivity timer ignored");
            return;
        }
        // Consume the generation so a duplicate expiration cannot act twice.
        self.timer_generation += 1;
        self.inactivity = None;
        match self.state {
            CaptureState::InBed
            | CaptureState::SleepStart
            | CaptureState::Sleeping
            | CaptureState::Awake => {
                self.emit(EventKind::Sleeping);
                self.signaler.start_periodic(self.config.blink_interval);
                self.set_state(CaptureState::Sleeping);
            }
            CaptureState::Idle | CaptureState::OutOfBed => {
                tracing::debug!(state = ?self.state, "inactivity timer elapsed outside a session");
            }
        }
    }

    /// Acknowledges a qualifying button press: stops the heartbeat blink,
    /// restarts the inactivity countdown, and flashes twice.
    fn reset_countdown(&mut self) {
        self.signaler.stop_periodic();
        self.signaler.blink_sequence(2, SEQUENCE_INTERVAL);
        self.arm_inactivity();
        tracing::debug!(cooldown = ?self.config.cooldown, "inactivity countdown armed");
    }

    fn arm_inactivity(&mut self) {
        self.cancel_inactivity();
        let generation = self.timer_generation;
        let cooldown = self.config.cooldown;
        let timers = self.timers.clone();
        self.inactivity = Some(tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            // The machine may already be gone; nothing to do then.
            let _ = timers.send(Input::InactivityElapsed(generation)).await;
        }));
    }

    fn cancel_inactivity(&mut self) {
        self.timer_generation += 1;
        if let Some(handle) = self.inactivity.take() {
            handle.abort();
        }
    }

    fn emit(&mut self, kind: EventKind) {
        let event = Event::new(kind, self.next_timestamp());
        tracing::info!(kind = %event.kind, id = %event.id, "capture event");
        self.flush_pending();
        if !self.pending.is_empty() {
            // Older parked events must land first; writing around a stalled
            // queue would reorder the store.
            tracing::warn!(id = %event.id, "store still unavailable, queueing event");
            self.push_pending(event);
            return;
        }
        if let Err(err) = self.sink.record(&event) {
            tracing::warn!(error = %err, id = %event.id, "event write failed, queued for retry");
            self.push_pending(event);
        }
    }

    fn flush_pending(&mut self) {
        while let Some(event) = self.pending.front() {
            match self.sink.record(event) {
                Ok(()) => {
                    tracing::info!(id = %event.id, "retried event write succeeded");
                    self.pending.pop_front();
                }
                Err(_) => break,
            }
        }
    }

    fn push_pending(&mut self, event: Event) {
        if self.pending.len() >= MAX_PENDING_EVENTS {
            if let Some(dropped) = self.pending.pop_front() {
                tracing::warn!(id = %dropped.id, "retry queue full, dropping oldest event");
            }
        }
        self.pending.push_back(event);
    }

    /// Timestamps are part of the event identifier and must be unique, so a
    /// clock reading that collides with the previous emission is nudged
    /// forward one millisecond.
    ///
    /// Identifiers and the store both carry millisecond precision, so the
    /// comparison works in milliseconds too; two dispatches inside one
    /// wall-clock millisecond would otherwise pass a finer-grained guard
    /// and still collide.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let mut ms = now.timestamp_millis();
        if let Some(last) = self.last_emitted_ms {
            if ms <= last {
                ms = last + 1;
            }
        }
        self.last_emitted_ms = Some(ms);
        // A wall-clock millisecond is always representable.
        DateTime::from_timestamp_millis(ms).unwrap_or(now)
    }

    fn set_state(&mut self, next: CaptureState) {
        tracing::info!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}
