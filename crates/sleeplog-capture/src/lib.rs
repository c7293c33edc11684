//! Event capture runtime for the sleep logger.
//!
//! Reacts to physical button and lid signals with debounced timers and LED
//! feedback, emitting typed, timestamped events through an [`EventSink`].
//! The whole runtime is single-threaded and event-driven: hardware signals
//! and timer expirations are delivered one at a time through a cooperative
//! dispatch loop.

pub mod hardware;
pub mod machine;
pub mod signaler;

pub use hardware::{HardwareSignal, UnknownSignal};
pub use machine::{CaptureConfig, CaptureMachine, CaptureState, EventSink, Input, SinkError};
pub use signaler::{Led, Signaler, TracingLed};
