//! Type-C/PD port contract.

use core::future::Future;

use crate::types::ChargerType;

/// Notifications delivered by the PD/Type-C stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdNotification {
    /// Cable removed
    PlugOut,
    /// PD hard reset on the wire
    HardReset,
    /// Fixed-voltage PD contract established
    FixedVoltageReady,
    /// PD 3.0 contract established
    Pd30Ready,
    /// Programmable power supply contract established
    ApdoReady,
    /// Type-C attach without PD
    TypeCOnly,
    /// Moisture detected in the receptacle
    WaterDetected,
}

/// Advertised Type-C current from the remote pull-up
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpCurrent {
    /// Default USB current (500mA)
    #[default]
    Default,
    /// 1.5A advertisement
    OneAndHalf,
    /// 3A advertisement
    ThreeAmps,
}

/// Port-side contract: BC1.2 result polling plus PD notifications.
pub trait ChargerPort {
    /// Wait for the next PD/Type-C notification
    fn wait_notification(&mut self) -> impl Future<Output = PdNotification>;
    /// Current BC1.2 detection result
    fn charger_type(&mut self) -> impl Future<Output = ChargerType>;
    /// Remote Rp advertisement, [`RpCurrent::Default`] when nothing attached
    fn remote_rp_current(&mut self) -> impl Future<Output = RpCurrent>;
}
