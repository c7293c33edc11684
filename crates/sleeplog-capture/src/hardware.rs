//! Signals delivered by the hardware button and lid sensor.

use std::str::FromStr;

use thiserror::Error;

/// A discrete signal from the hardware event source.
///
/// Signals are fire-and-forget notifications; there is no request/response
/// channel back to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareSignal {
    /// The big red button was pressed and released.
    ButtonReleased,
    /// The lid over the button was raised.
    LidRaised,
    /// The lid over the button was closed.
    LidClosed,
    /// The device reported an error condition.
    Fault(String),
}

/// Error type for unrecognized signal names.
#[derive(Debug, Clone, Error)]
#[error("unknown hardware signal: {0}")]
pub struct UnknownSignal(String);

impl FromStr for HardwareSignal {
    type Err = UnknownSignal;

    /// Parses the signal names used by the line-based simulator source.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "button-released" | "button" => Ok(Self::ButtonReleased),
            "lid-raised" | "raise" => Ok(Self::LidRaised),
            "lid-closed" | "close" => Ok(Self::LidClosed),
            "error" | "fault" => Ok(Self::Fault(String::new())),
            other => match other.strip_prefix("error:").or_else(|| other.strip_prefix("fault:")) {
                Some(payload) => Ok(Self::Fault(payload.trim().to_string())),
                None => Err(UnknownSignal(other.to_string())),
            },
        }
    }
}
