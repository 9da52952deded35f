//! Fuel gauge contract.

use core::future::Future;

use crate::types::{DeciCelsius, MilliVolts, Percent, SignedMilliAmps};

/// Errors surfaced by a fuel gauge implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GaugeError {
    /// Bus transaction with the gauge failed
    Bus,
}

/// Fuel gauge trait for battery-side measurements.
///
/// Read failures are recoverable: the service substitutes fail-safe sentinel
/// values ([`crate::types::TEMP_SENSE_FAILED`] for temperature, zero for the
/// rest) and lets the protection logic treat them as out of range.
pub trait FuelGauge {
    /// Battery terminal voltage
    fn battery_voltage(&mut self) -> impl Future<Output = Result<MilliVolts, GaugeError>>;
    /// Battery current, negative while discharging
    fn battery_current(&mut self) -> impl Future<Output = Result<SignedMilliAmps, GaugeError>>;
    /// Battery temperature in tenths of a degree Celsius
    fn battery_temperature(&mut self) -> impl Future<Output = Result<DeciCelsius, GaugeError>>;
    /// Raw state of charge
    fn soc(&mut self) -> impl Future<Output = Result<Percent, GaugeError>>;
    /// User-facing rounded state of charge
    fn ui_soc(&mut self) -> impl Future<Output = Result<Percent, GaugeError>>;
    /// Whether the battery identification resistor is present
    fn battery_id_present(&mut self) -> impl Future<Output = bool>;
}
