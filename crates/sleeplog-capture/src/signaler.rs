//! LED feedback for the capture machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A binary output device. The only operation is setting the level.
pub trait Led: Send + Sync + 'static {
    /// Drives the output high (`true`) or low (`false`).
    fn set_level(&self, level: bool);
}

/// An [`Led`] that logs level changes instead of driving a GPIO pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLed;

impl Led for TracingLed {
    fn set_level(&self, level: bool) {
        tracing::debug!(level = u8::from(level), "led");
    }
}

/// Drives the LED: single flashes, timed flash sequences, and a periodic
/// heartbeat blink.
///
/// Flashes and sequences are fire-and-forget tasks; overlapping calls race
/// on the output level and the last scheduled "low" wins, which is accepted
/// for an operator indicator. The periodic blink is the one cancelable
/// component: at most one periodic task is alive, and starting a new one
/// stops its predecessor first.
pub struct Signaler {
    led: Arc<dyn Led>,
    pulse: Duration,
    periodic: Option<JoinHandle<()>>,
}

impl Signaler {
    /// Creates a signaler with the given flash pulse width.
    pub fn new(led: Arc<dyn Led>, pulse: Duration) -> Self {
        Self {
            led,
            pulse,
            periodic: None,
        }
    }

    /// Sets the output high now and low after `duration`. Non-blocking.
    pub fn flash(&self, duration: Duration) {
        let led = Arc::clone(&self.led);
        led.set_level(true);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            led.set_level(false);
        });
    }

    /// Produces `times` flashes of the pulse width, spaced `interval` apart
    /// start-to-start. Fire-and-forget; the sequence cannot be canceled
    /// mid-run.
    ///
    /// A single counter-driven task paces the whole sequence; each flash is
    /// scheduled relative to the previous one, not against the wall clock.
    pub fn blink_sequence(&self, times: u32, interval: Duration) {
        let led = Arc::clone(&self.led);
        let pulse = self.pulse;
        tokio::spawn(async move {
            for i in 0..times {
                led.set_level(true);
                tokio::time::sleep(pulse).await;
                led.set_level(false);
                if i + 1 < times {
                    tokio::time::sleep(interval.saturating_sub(pulse)).await;
                }
            }
        });
    }

    /// Starts a repeating flash at the given interval, replacing any
    /// periodic blink already running.
    pub fn start_periodic(&mut self, interval: Duration) {
        self.stop_periodic();
        let led = Arc::clone(&self.led);
        let pulse = self.pulse;
        self.periodic = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                led.set_level(true);
                tokio::time::sleep(pulse).await;
                led.set_level(false);
            }
        }));
    }

    /// Stops the periodic blink, canceling any pending future flash.
    pub fn stop_periodic(&mut self) {
        if let Some(handle) = self.periodic.take() {
            handle.abort();
        }
    }

    /// Whether a periodic blink is currently scheduled.
    #[must_use]
    pub fn periodic_active(&self) -> bool {
        self.periodic.is_some()
    }
}

impl Drop for Signaler {
    fn drop(&mut self) {
        self.stop_periodic();
    }
}
