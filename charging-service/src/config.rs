//! Configuration for the charging service.
//!
//! Every knob has a documented default matching the reference hardware, so a
//! platform with no device configuration still charges safely.

use charger_device::types::{MicroAmps, MicroVolts, MilliVolts};
use embassy_time::Duration;

/// Top-level charging service configuration
#[derive(Clone)]
pub struct ChargerConfig {
    /// Battery constant-voltage target
    pub battery_cv: MicroVolts,
    /// Reduced constant voltage while top-off mode is enabled
    pub top_off_cv: MicroVolts,

    /// Input limit for a standard downstream port
    pub usb_input_current: MicroAmps,
    /// Charge limit for a standard downstream port
    pub usb_charger_current: MicroAmps,
    /// Input limit for a charging downstream port
    pub cdp_input_current: MicroAmps,
    /// Charge limit for a charging downstream port
    pub cdp_charger_current: MicroAmps,
    /// Input limit for a dedicated charging port
    pub ac_input_current: MicroAmps,
    /// Charge limit for a dedicated charging port
    pub ac_charger_current: MicroAmps,
    /// Input and charge limit for a non-standard adapter
    pub non_std_charger_current: MicroAmps,
    /// Hard clamp applied in factory meta boot modes
    pub meta_boot_current: MicroAmps,
    /// Hard clamp applied in ATM test mode on USB/CDP ports
    pub atm_test_current: MicroAmps,
    /// Current pair used when the remote Type-C pull-up advertises 3A
    pub typec_rp_3a_current: MicroAmps,
    /// Current pair used when the remote Type-C pull-up advertises 1.5A
    pub typec_rp_1a5_current: MicroAmps,

    /// VBUS over-voltage threshold
    pub max_charger_voltage: MicroVolts,
    /// VBUS under-voltage lockout threshold
    pub vbus_uvlo_voltage: MicroVolts,

    /// Use the JEITA temperature policy; when false the simpler
    /// min/max-charge-temperature protection applies instead
    pub enable_sw_jeita: bool,

    /// Evaluation period while a charger is attached
    pub polling_interval: Duration,
    /// Retry period while the charger hardware has not yet appeared
    pub discovery_retry_interval: Duration,
    /// Continuous-charging safety timer
    pub max_charging_time: Duration,

    /// Wireless pad current tiers
    pub wireless: WirelessConfig,
    /// JEITA band thresholds and per-band limits
    pub jeita: JeitaConfig,
    /// Non-JEITA temperature protection thresholds
    pub thermal: ThermalConfig,
    /// Dynamic MIVR tier selection
    pub mivr: MivrConfig,
    /// End-of-charge protection
    pub eoc: EocConfig,
    /// Debounced input-power-limited end-of-charge detection
    pub dpm: DpmConfig,
    /// Weak/invalid charger probe
    pub invalid_charger: InvalidChargerConfig,
    /// Adapter power-category detection
    pub power_detect: PowerDetectConfig,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            battery_cv: 4_350_000,
            top_off_cv: 4_100_000,
            usb_input_current: 500_000,
            usb_charger_current: 500_000,
            cdp_input_current: 1_500_000,
            cdp_charger_current: 1_500_000,
            ac_input_current: 3_200_000,
            ac_charger_current: 2_050_000,
            non_std_charger_current: 500_000,
            meta_boot_current: 200_000,
            atm_test_current: 100_000,
            typec_rp_3a_current: 3_000_000,
            typec_rp_1a5_current: 1_500_000,
            max_charger_voltage: 6_500_000,
            vbus_uvlo_voltage: 2_600_000,
            enable_sw_jeita: true,
            polling_interval: Duration::from_secs(10),
            discovery_retry_interval: Duration::from_secs(5),
            max_charging_time: Duration::from_secs(12 * 60 * 60),
            wireless: WirelessConfig::default(),
            jeita: JeitaConfig::default(),
            thermal: ThermalConfig::default(),
            mivr: MivrConfig::default(),
            eoc: EocConfig::default(),
            dpm: DpmConfig::default(),
            invalid_charger: InvalidChargerConfig::default(),
            power_detect: PowerDetectConfig::default(),
        }
    }
}

/// One wireless pad capability tier
#[derive(Clone, Copy)]
pub struct WirelessTier {
    /// Input current limit
    pub input_ua: MicroAmps,
    /// Charge current limit
    pub charging_ua: MicroAmps,
    /// Thermal input power budget; caps the input limit at
    /// `power_mw / vbus_mv` when set
    pub power_limit_mw: Option<u32>,
    /// Pad output voltage class used for the power-budget division
    pub vbus_mv: MilliVolts,
}

/// Wireless pad tiers
#[derive(Clone, Copy)]
pub struct WirelessConfig {
    /// 5W pad
    pub w5: WirelessTier,
    /// 10W pad
    pub w10: WirelessTier,
    /// Pad of unreported capability
    pub fallback: WirelessTier,
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            w5: WirelessTier {
                input_ua: 1_000_000,
                charging_ua: 1_000_000,
                power_limit_mw: Some(5_000),
                vbus_mv: 5_000,
            },
            w10: WirelessTier {
                input_ua: 1_100_000,
                charging_ua: 2_000_000,
                power_limit_mw: Some(10_000),
                vbus_mv: 9_000,
            },
            fallback: WirelessTier {
                input_ua: 750_000,
                charging_ua: 750_000,
                power_limit_mw: None,
                vbus_mv: 5_000,
            },
        }
    }
}

/// JEITA thresholds in whole degrees Celsius with hysteresis re-entry
/// bounds, plus the per-band CV and charge-current limits.
///
/// A `None` CV means the band charges at the battery default CV.
#[derive(Clone, Copy)]
pub struct JeitaConfig {
    /// Below this the battery is too cold to charge
    pub temp_t0_thres: i32,
    /// Leaving the below-T0 band requires exceeding this
    pub temp_t0_thres_plus_x: i32,
    /// T0..T1 cold band upper bound
    pub temp_t1_thres: i32,
    /// Leaving a colder band into T1..T2 requires exceeding this
    pub temp_t1_thres_plus_x: i32,
    /// T1..T2 cool band upper bound, start of the normal band
    pub temp_t2_thres: i32,
    /// Leaving a colder band into the normal band requires exceeding this
    pub temp_t2_thres_plus_x: i32,
    /// End of the normal band
    pub temp_t3_thres: i32,
    /// Leaving the T3..T4 warm band requires dropping below this
    pub temp_t3_thres_minus_x: i32,
    /// Above this the battery is too hot to charge
    pub temp_t4_thres: i32,
    /// Leaving the above-T4 band requires dropping below this
    pub temp_t4_thres_minus_x: i32,

    /// CV while below T0 (charging is off, applied on re-entry)
    pub cv_below_t0: Option<MicroVolts>,
    /// CV in the T0..T1 band
    pub cv_t0_to_t1: Option<MicroVolts>,
    /// CV in the T1..T2 band
    pub cv_t1_to_t2: Option<MicroVolts>,
    /// CV in the normal band; `None` uses the battery default
    pub cv_t2_to_t3: Option<MicroVolts>,
    /// CV in the T3..T4 band
    pub cv_t3_to_t4: Option<MicroVolts>,
    /// CV above T4 (charging is off)
    pub cv_above_t4: Option<MicroVolts>,

    /// Charge-current ceiling in the T0..T1 band
    pub current_t0_to_t1: Option<MicroAmps>,
    /// Charge-current ceiling in the T1..T2 band
    pub current_t1_to_t2: Option<MicroAmps>,
    /// Charge-current ceiling in the T3..T4 band
    pub current_t3_to_t4: Option<MicroAmps>,
}

impl Default for JeitaConfig {
    fn default() -> Self {
        Self {
            temp_t0_thres: -10,
            temp_t0_thres_plus_x: -7,
            temp_t1_thres: 0,
            temp_t1_thres_plus_x: 6,
            temp_t2_thres: 10,
            temp_t2_thres_plus_x: 16,
            temp_t3_thres: 45,
            temp_t3_thres_minus_x: 39,
            temp_t4_thres: 50,
            temp_t4_thres_minus_x: 47,
            cv_below_t0: Some(4_040_000),
            cv_t0_to_t1: Some(4_040_000),
            cv_t1_to_t2: Some(4_240_000),
            cv_t2_to_t3: None,
            cv_t3_to_t4: Some(4_240_000),
            cv_above_t4: Some(4_240_000),
            current_t0_to_t1: Some(350_000),
            current_t1_to_t2: None,
            current_t3_to_t4: Some(1_500_000),
        }
    }
}

/// Non-JEITA battery temperature protection window
#[derive(Clone, Copy)]
pub struct ThermalConfig {
    /// Below this charging stops
    pub min_charge_temp: i32,
    /// Re-enabling after a cold stop requires exceeding this
    pub min_charge_temp_plus_x: i32,
    /// At or above this charging stops
    pub max_charge_temp: i32,
    /// Re-enabling after a hot stop requires dropping below this
    pub max_charge_temp_minus_x: i32,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            min_charge_temp: 2,
            min_charge_temp_plus_x: 6,
            max_charge_temp: 50,
            max_charge_temp_minus_x: 47,
        }
    }
}

/// Dynamic MIVR tiers selected against measured VBAT
#[derive(Clone, Copy)]
pub struct MivrConfig {
    /// VBAT bound for the lowest tier
    pub vbat_low_mv: MilliVolts,
    /// VBAT bound for the middle tier
    pub vbat_mid_mv: MilliVolts,
    /// MIVR while VBAT is below the low bound
    pub mivr_low_uv: MicroVolts,
    /// MIVR while VBAT is between the bounds
    pub mivr_mid_uv: MicroVolts,
    /// MIVR once VBAT is above the middle bound
    pub mivr_high_uv: MicroVolts,
}

impl Default for MivrConfig {
    fn default() -> Self {
        Self {
            vbat_low_mv: 3_400,
            vbat_mid_mv: 3_850,
            mivr_low_uv: 4_200_000,
            mivr_mid_uv: 4_300_000,
            mivr_high_uv: 4_400_000,
        }
    }
}

/// End-of-charge protection
#[derive(Clone, Copy)]
pub struct EocConfig {
    /// Lowest recharge threshold; the effective threshold is
    /// `max(soc_exit, soc_at_entry - 2)`
    pub soc_exit: u32,
    /// Protection survives a replug shorter than this
    pub disconnect_reset: Duration,
}

impl Default for EocConfig {
    fn default() -> Self {
        Self {
            soc_exit: 96,
            disconnect_reset: Duration::from_secs(60),
        }
    }
}

/// Debounced input-power-limited end-of-charge detection.
///
/// Some charger ICs throttle themselves near full charge without raising the
/// done flag; sustained INDPM under these bounds is treated as termination.
#[derive(Clone, Copy)]
pub struct DpmConfig {
    /// Consecutive qualifying evaluations required to latch
    pub count_max: u32,
    /// Qualifying battery current ceiling, milliamps
    pub ibat_max_ma: u32,
    /// Qualifying VBAT floor, millivolts
    pub vbat_min_mv: MilliVolts,
    /// Qualifying input-limit floor
    pub iusb_min_ua: MicroAmps,
    /// Qualifying charge-limit floor
    pub ichg_min_ua: MicroAmps,
}

impl Default for DpmConfig {
    fn default() -> Self {
        Self {
            count_max: 9,
            ibat_max_ma: 300,
            vbat_min_mv: 4_250,
            iusb_min_ua: 800_000,
            ichg_min_ua: 500_000,
        }
    }
}

/// Weak/invalid charger probe settings
#[derive(Clone, Copy)]
pub struct InvalidChargerConfig {
    /// Probe enabled
    pub enable: bool,
    /// Input limit forced during the probe
    pub test_input_ua: MicroAmps,
    /// Charge limit forced during the probe
    pub test_charging_ua: MicroAmps,
    /// MIVR forced during the probe; VBUS sagging below it marks the
    /// adapter weak
    pub test_mivr_uv: MicroVolts,
    /// Settling time before sampling
    pub settle: Duration,
}

impl Default for InvalidChargerConfig {
    fn default() -> Self {
        Self {
            enable: true,
            test_input_ua: 1_000_000,
            test_charging_ua: 1_000_000,
            test_mivr_uv: 4_600_000,
            settle: Duration::from_millis(200),
        }
    }
}

/// Adapter power-category detection settings
#[derive(Clone, Copy)]
pub struct PowerDetectConfig {
    /// Detection enabled
    pub enable: bool,
    /// Aggressive MIVR programmed for the OCP probe
    pub probe_mivr_uv: MicroVolts,
    /// Input limit programmed for the OCP probe
    pub probe_input_ua: MicroAmps,
    /// Charge limit programmed for the OCP probe
    pub probe_charging_ua: MicroAmps,
    /// Settling time before running AICL
    pub settle: Duration,
    /// AICL at or above this maps to the 9W tier
    pub aicl_9w_min_ua: MicroAmps,
    /// AICL at or above this maps to the 12W tier
    pub aicl_12w_min_ua: MicroAmps,
    /// Input limit applied for a 5W adapter
    pub iusb_5w_ua: MicroAmps,
    /// Input limit applied for a 7.5W adapter (Type-C Rp 1.5A)
    pub iusb_7p5w_ua: MicroAmps,
    /// Input limit applied for a 9W adapter
    pub iusb_9w_ua: MicroAmps,
    /// Input limit applied for a 12W adapter
    pub iusb_12w_ua: MicroAmps,
    /// Input limit applied for a 15W adapter (Type-C Rp 3A)
    pub iusb_15w_ua: MicroAmps,
}

impl Default for PowerDetectConfig {
    fn default() -> Self {
        Self {
            enable: true,
            probe_mivr_uv: 4_500_000,
            probe_input_ua: 3_200_000,
            probe_charging_ua: 2_000_000,
            settle: Duration::from_millis(50),
            aicl_9w_min_ua: 1_600_000,
            aicl_12w_min_ua: 2_000_000,
            iusb_5w_ua: 1_000_000,
            iusb_7p5w_ua: 1_500_000,
            iusb_9w_ua: 1_800_000,
            iusb_12w_ua: 2_400_000,
            iusb_15w_ua: 3_000_000,
        }
    }
}
