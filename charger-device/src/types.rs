//! Shared unit aliases and platform-level enums.
//!
//! All currents and voltages cross the capability boundary in microamps and
//! microvolts. Conversion to milli-units happens only at logging and metrics
//! boundaries.

/// Current in microamps
pub type MicroAmps = u32;
/// Voltage in microvolts
pub type MicroVolts = u32;
/// Current in milliamps
pub type MilliAmps = u32;
/// Voltage in millivolts
pub type MilliVolts = u32;
/// Signed current in milliamps, negative while discharging
pub type SignedMilliAmps = i32;
/// Temperature in tenths of a degree Celsius
pub type DeciCelsius = i32;
/// State of charge in percent, 0..=100
pub type Percent = u32;

/// Temperature reported when the sense path failed, in whole degrees Celsius.
/// Downstream protection treats it as out-of-range cold.
pub const TEMP_SENSE_FAILED: i32 = -127;

/// Detected charger port type
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerType {
    /// Nothing attached, or detection has not completed
    #[default]
    Unknown,
    /// Standard downstream port
    Usb,
    /// Charging downstream port
    Cdp,
    /// Dedicated charging port (AC adapter)
    Dcp,
    /// Non-standard adapter that shorts or floats the data lines
    NonStandard,
    /// Wireless pad limited to 5W
    Wireless5W,
    /// Wireless pad limited to 10W
    Wireless10W,
    /// Wireless pad of unreported capability
    WirelessDefault,
}

impl ChargerType {
    /// Any of the wireless pad variants
    pub fn is_wireless(self) -> bool {
        matches!(self, Self::Wireless5W | Self::Wireless10W | Self::WirelessDefault)
    }

    /// A cable is attached and its type has been resolved
    pub fn is_attached(self) -> bool {
        self != Self::Unknown
    }
}

/// Negotiated USB PD contract level
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdType {
    /// No PD contract
    #[default]
    None,
    /// Type-C attach without PD negotiation
    TypecOnly,
    /// PD 2.0 fixed-voltage contract
    Fixed,
    /// PD 3.0 contract
    Pd30,
    /// PD 3.0 with programmable power supply
    Apdo,
}

/// System boot mode, restricting charge current in test modes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    /// Normal boot
    #[default]
    Normal,
    /// Factory meta mode
    Meta,
    /// Advanced factory meta mode
    AdvancedMeta,
}

impl BootMode {
    /// Factory modes hard-clamp charge current
    pub fn is_meta(self) -> bool {
        matches!(self, Self::Meta | Self::AdvancedMeta)
    }
}

/// Physical charger topology
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerConfiguration {
    /// One charger IC
    #[default]
    Single,
    /// Two charger ICs stacked in series
    DualSeries,
    /// Two charger ICs in parallel, splitting charge current
    DualParallel,
}

/// Adapter capability tier discovered by power detection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterPowerCategory {
    /// Detection not possible on this port state (0W)
    #[default]
    None,
    /// 5W adapter
    W5,
    /// 7.5W adapter, from Type-C Rp 1.5A
    W7_5,
    /// 9W adapter
    W9,
    /// 12W adapter
    W12,
    /// 15W adapter, from Type-C Rp 3A
    W15,
}
