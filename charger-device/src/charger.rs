//! Charger IC controller contract.

use core::future::Future;

use crate::types::{MicroAmps, MicroVolts};

/// Errors surfaced by a charger controller implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerError {
    /// Bus transaction with the charger IC failed
    Bus,
    /// The controller does not implement this constraint; callers fall back
    /// to the software-computed value
    NotSupported,
    /// The controller rejected the command in its current state
    InvalidState,
}

/// Hardware events raised by the charger IC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerEvent {
    /// Charge termination reached
    Eoc,
    /// Battery fell below the recharge threshold
    Recharge,
    /// Hardware safety timer expired
    SafetyTimeout,
    /// Input over-voltage fault
    VbusOvp,
    /// State changed, re-evaluate
    Update,
}

/// Input power path regulation state, sampled from the charger IC
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IndpmState {
    /// Input voltage regulation active (VBUS collapsed to MIVR)
    pub vdpm: bool,
    /// Input current regulation active
    pub idpm: bool,
}

/// Charger controller trait that charger IC drivers implement to integrate
/// with the charging service.
///
/// All setters return the value actually programmed, which the hardware may
/// have rounded to its register granularity. A controller that cannot express
/// a constraint returns [`ChargerError::NotSupported`] and the service keeps
/// its software value.
pub trait ChargerController {
    /// Wait for the next hardware event
    fn wait_event(&mut self) -> impl Future<Output = ChargerEvent>;

    /// Bring up the charger hardware; the service retries this until it
    /// succeeds, so a device that appears late is not an error
    fn init(&mut self) -> impl Future<Output = Result<(), ChargerError>>;

    /// Program the input current limit
    fn set_input_current(&mut self, ua: MicroAmps) -> impl Future<Output = Result<MicroAmps, ChargerError>>;
    /// Read back the programmed input current limit
    fn input_current(&mut self) -> impl Future<Output = Result<MicroAmps, ChargerError>>;

    /// Program the fast-charge current limit
    fn set_charging_current(&mut self, ua: MicroAmps) -> impl Future<Output = Result<MicroAmps, ChargerError>>;
    /// Read back the programmed fast-charge current limit
    fn charging_current(&mut self) -> impl Future<Output = Result<MicroAmps, ChargerError>>;

    /// Smallest fast-charge current the hardware can regulate
    fn minimum_charging_current(&mut self) -> impl Future<Output = Result<MicroAmps, ChargerError>>;

    /// Program the charge termination voltage
    fn set_constant_voltage(&mut self, uv: MicroVolts) -> impl Future<Output = Result<MicroVolts, ChargerError>>;
    /// Read back the charge termination voltage
    fn constant_voltage(&mut self) -> impl Future<Output = Result<MicroVolts, ChargerError>>;

    /// Program the minimum input voltage regulation threshold
    fn set_mivr(&mut self, uv: MicroVolts) -> impl Future<Output = Result<MicroVolts, ChargerError>>;
    /// Read back the MIVR threshold
    fn mivr(&mut self) -> impl Future<Output = Result<MicroVolts, ChargerError>>;

    /// Measure the input (VBUS) voltage
    fn vbus(&mut self) -> impl Future<Output = Result<MicroVolts, ChargerError>>;

    /// Enable or disable charging
    fn enable(&mut self, enable: bool) -> impl Future<Output = Result<(), ChargerError>>;
    /// Whether charging is currently enabled
    fn is_enabled(&mut self) -> impl Future<Output = Result<bool, ChargerError>>;
    /// Whether the IC reports charge termination
    fn is_charging_done(&mut self) -> impl Future<Output = Result<bool, ChargerError>>;

    /// Run automatic input current limit detection and return the measured
    /// capability
    fn run_aicl(&mut self) -> impl Future<Output = Result<MicroAmps, ChargerError>>;

    /// Sample the input regulation state
    fn indpm_state(&mut self) -> impl Future<Output = Result<IndpmState, ChargerError>>;

    /// Log the controller's register file for diagnostics
    fn dump_registers(&mut self) -> impl Future<Output = ()>;
}
