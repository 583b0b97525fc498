//! Maps `Box<dyn Error>` from trait boundaries to typed `DispenserError`.
//!
//! The traits in `dispenser_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with a feature-gated path for `dispenser_hardware::HwError` downcasting.

use dispenser_traits::BoxError;
use eyre::WrapErr;

use crate::error::{DispenserError, Result};

/// Map a trait-boundary error to a typed `DispenserError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> DispenserError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<dispenser_hardware::HwError>() {
            return match hw {
                dispenser_hardware::HwError::Gpio(msg) => DispenserError::HardwareFault(msg.clone()),
                dispenser_hardware::HwError::Io(io) => DispenserError::Io(io.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return DispenserError::Io(io.to_string());
    }
    DispenserError::Hardware(e.to_string())
}

/// Attach a typed error and a short context to a collaborator result.
pub(crate) trait HwResultExt<T> {
    fn hw(self, what: &'static str) -> Result<T>;
}

impl<T> HwResultExt<T> for std::result::Result<T, BoxError> {
    fn hw(self, what: &'static str) -> Result<T> {
        self.map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err(what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_io() {
        let e: BoxError = Box::new(std::io::Error::other("bus gone"));
        assert!(matches!(map_hw_error(&*e), DispenserError::Io(m) if m.contains("bus gone")));
    }

    #[test]
    fn unknown_errors_map_to_hardware() {
        let e: BoxError = "lcd nak".into();
        assert!(matches!(map_hw_error(&*e), DispenserError::Hardware(m) if m == "lcd nak"));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn gpio_errors_map_to_fault() {
        let e: BoxError = Box::new(dispenser_hardware::HwError::Gpio("pin busy".into()));
        assert!(matches!(map_hw_error(&*e), DispenserError::HardwareFault(m) if m == "pin busy"));
    }

    #[test]
    fn context_is_attached() {
        let r: std::result::Result<(), BoxError> = Err("nope".into());
        let err = r.hw("writing display").unwrap_err();
        assert_eq!(err.to_string(), "writing display");
        assert!(err.downcast_ref::<DispenserError>().is_some());
    }
}
