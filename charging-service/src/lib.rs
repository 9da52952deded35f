//! Battery charging control service.
//!
//! Coordinates charger type detection, temperature policy (JEITA or a plain
//! charge window), end-of-charge and DPM protections, adapter power
//! negotiation and user overrides into a single current/voltage decision,
//! applied to the charger hardware from one worker task.
//!
//! The service is generic over the hardware contracts in `charger-device`;
//! wire it up with [`create_charging_service!`] or own a
//! [`ChargingService`] directly.

#![no_std]

use charger_device::types::{DeciCelsius, MicroAmps};

pub mod algorithm;
pub mod config;
pub mod context;
pub mod jeita;
pub mod mivr;
pub mod power_detect;
pub mod protect;
pub mod resolver;
pub mod service;
pub mod thermal;

#[cfg(test)]
mod testutil;

pub use service::ChargingService;

/// Commands posted by user-facing surfaces. Every command wakes the control
/// loop for an immediate re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerCommand {
    /// Replace the input current limit outright; `None` clears the override
    SetForceInputCurrent {
        /// Charge channel
        channel: usize,
        /// Override value
        limit: Option<MicroAmps>,
    },
    /// Replace the charge current limit outright; `None` clears the override
    SetForceChargingCurrent {
        /// Charge channel
        channel: usize,
        /// Override value
        limit: Option<MicroAmps>,
    },
    /// Thermal ceiling on the input current limit; may only lower it
    SetThermalInputLimit {
        /// Charge channel
        channel: usize,
        /// Ceiling value
        limit: Option<MicroAmps>,
    },
    /// Thermal ceiling on the charge current limit; may only lower it
    SetThermalChargingLimit {
        /// Charge channel
        channel: usize,
        /// Ceiling value
        limit: Option<MicroAmps>,
    },
    /// Charger IC junction temperature reported by the thermal layer
    ReportJunctionTemperature {
        /// Charge channel
        channel: usize,
        /// Temperature in tenths of a degree
        temp_dc: DeciCelsius,
    },
    /// Allow or forbid fast-charge voltages above 5V
    EnableHvCharging(bool),
    /// Master charging switch
    EnableCharging(bool),
    /// Sustained-charge reduced CV mode
    EnableTopOff(bool),
    /// Force discharge regardless of charger state
    ForceDischarge(bool),
}

/// Generates a statically allocated service instance bound to concrete
/// hardware types and the functions to drive it:
///
/// - `charging_service_init(config, charger, gauge, port, metrics, suspend)`
/// - `charging_service_task(service)`
///
/// The service holds single-owner state, so it lives in a `StaticCell`
/// rather than a shared lock; `charging_service_init` may be called once.
#[macro_export]
macro_rules! create_charging_service {
    ($charger:ty, $gauge:ty, $port:ty, $metrics:ty, $suspend:ty) => {
        type ChargingServiceInstance =
            $crate::ChargingService<$charger, $gauge, $port, $metrics, $suspend>;

        static CHARGING_SERVICE: ::static_cell::StaticCell<ChargingServiceInstance> =
            ::static_cell::StaticCell::new();

        pub fn charging_service_init(
            config: $crate::config::ChargerConfig,
            charger: $charger,
            gauge: $gauge,
            port: $port,
            metrics: $metrics,
            suspend: $suspend,
        ) -> &'static ChargingServiceInstance {
            CHARGING_SERVICE.init($crate::ChargingService::new(
                config, charger, gauge, port, metrics, suspend,
            ))
        }

        #[embassy_executor::task]
        pub async fn charging_service_task(service: &'static ChargingServiceInstance) {
            service.process().await;
        }
    };
}
