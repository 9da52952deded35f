//! The charger context: every piece of mutable charging state.
//!
//! One instance lives for the life of the device. It is mutated exclusively
//! by the control-loop worker; external event sources only post commands and
//! wake requests.

use charger_device::notify::NotifyCode;
use charger_device::types::{
    BootMode, ChargerConfiguration, ChargerType, DeciCelsius, MicroAmps, MicroVolts, PdType,
};

use crate::config::ChargerConfig;
use crate::jeita::JeitaState;
use crate::power_detect::PowerDetection;
use crate::protect::dpm::DpmEoc;
use crate::protect::eoc::EocProtect;
use crate::protect::invalid::InvalidChargerDet;
use crate::protect::vbus::VbusState;
use crate::thermal::ThermalState;

/// Input limit restored whenever a cable is removed
pub const DEFAULT_INPUT_CURRENT_UA: MicroAmps = 500_000;
/// Charge limit restored whenever a cable is removed
pub const DEFAULT_CHARGING_CURRENT_UA: MicroAmps = 500_000;
/// Number of charge channels tracked
pub const CHANNEL_COUNT: usize = 2;

/// Per-channel limit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelLimits {
    /// Input current limit most recently applied
    pub input_current_limit: MicroAmps,
    /// Charge current limit most recently applied
    pub charging_current_limit: MicroAmps,
    /// Thermal override on the input limit; may only lower it
    pub thermal_input_limit: Option<MicroAmps>,
    /// Thermal override on the charge limit; may only lower it
    pub thermal_charging_limit: Option<MicroAmps>,
    /// User override replacing the input limit outright
    pub force_input_limit: Option<MicroAmps>,
    /// User override replacing the charge limit outright
    pub force_charging_limit: Option<MicroAmps>,
    /// Last AICL measurement for this channel
    pub aicl_result: Option<MicroAmps>,
    /// Last reported charger IC junction temperature
    pub junction_temp: Option<DeciCelsius>,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            input_current_limit: DEFAULT_INPUT_CURRENT_UA,
            charging_current_limit: DEFAULT_CHARGING_CURRENT_UA,
            thermal_input_limit: None,
            thermal_charging_limit: None,
            force_input_limit: None,
            force_charging_limit: None,
            aicl_result: None,
            junction_temp: None,
        }
    }
}

impl ChannelLimits {
    /// Reset the plug-cycle-scoped values, keeping the standing thermal and
    /// user overrides.
    fn reset_for_plug_cycle(&mut self) {
        self.input_current_limit = DEFAULT_INPUT_CURRENT_UA;
        self.charging_current_limit = DEFAULT_CHARGING_CURRENT_UA;
        self.aicl_result = None;
    }
}

/// All charging state, owned by the control loop.
pub struct ChargerContext {
    /// Service configuration
    pub config: ChargerConfig,

    /// Detected charger port type
    pub charger_type: ChargerType,
    /// Negotiated PD contract level
    pub pd_type: PdType,
    /// System boot mode
    pub boot_mode: BootMode,
    /// Physical charger topology
    pub topology: ChargerConfiguration,

    /// JEITA policy state
    pub jeita: JeitaState,
    /// Non-JEITA temperature protection state
    pub thermal: ThermalState,
    /// Per-channel limits
    pub limits: [ChannelLimits; CHANNEL_COUNT],

    /// End-of-charge protection
    pub eoc_protect: EocProtect,
    /// Debounced DPM end-of-charge detection
    pub dpm_eoc: DpmEoc,
    /// Weak/invalid charger detection
    pub invalid_charger: InvalidChargerDet,
    /// Adapter power detection result
    pub power_detection: PowerDetection,
    /// VBUS window state
    pub vbus_state: VbusState,
    /// CV most recently programmed into the hardware
    pub applied_cv: MicroVolts,
    /// Continuous-charging safety timer expired
    pub safety_timeout: bool,
    /// Authoritative verdict from the previous tick
    pub can_charging: bool,
    /// User-visible warning status
    pub notify_code: NotifyCode,

    /// User switch: charging permitted at all
    pub charging_enabled: bool,
    /// User switch: force discharge regardless of state
    pub discharge_override: bool,
    /// User switch: allow fast-charge voltages above 5V
    pub hv_charging_enabled: bool,
    /// User switch: sustained-charge reduced CV
    pub top_off_enabled: bool,
    /// Platform switch: unlimited USB port, treat as AC
    pub usb_unlimited: bool,
    /// Moisture detected in the receptacle
    pub water_detected: bool,
    /// ATM test mode active
    pub atm_enabled: bool,
}

impl ChargerContext {
    /// Create the context with documented defaults.
    pub fn new(config: ChargerConfig) -> Self {
        let applied_cv = config.battery_cv;
        Self {
            config,
            charger_type: ChargerType::Unknown,
            pd_type: PdType::None,
            boot_mode: BootMode::Normal,
            topology: ChargerConfiguration::Single,
            jeita: JeitaState::default(),
            thermal: ThermalState::default(),
            limits: [ChannelLimits::default(); CHANNEL_COUNT],
            eoc_protect: EocProtect::default(),
            dpm_eoc: DpmEoc::default(),
            invalid_charger: InvalidChargerDet::default(),
            power_detection: PowerDetection::default(),
            vbus_state: VbusState::Normal,
            applied_cv,
            safety_timeout: false,
            can_charging: false,
            notify_code: NotifyCode::NONE,
            charging_enabled: true,
            discharge_override: false,
            hv_charging_enabled: true,
            top_off_enabled: false,
            usb_unlimited: false,
            water_detected: false,
            atm_enabled: false,
        }
    }

    /// A CV-lowering policy is in effect; end-of-charge at a reduced CV must
    /// not latch the full-battery protection.
    pub fn cv_lowered(&self) -> bool {
        if self.top_off_enabled {
            return true;
        }
        if self.config.enable_sw_jeita {
            matches!(self.jeita.cv, Some(cv) if cv < self.config.battery_cv)
        } else {
            false
        }
    }

    /// The temperature policy selected by configuration permits charging.
    pub fn temperature_policy_allows(&self) -> bool {
        if self.config.enable_sw_jeita {
            self.jeita.charging_allowed
        } else {
            self.thermal.charging_allowed()
        }
    }

    /// The pre-resolution charging verdict: every protection and switch that
    /// can veto charging, in one place.
    pub fn charging_permitted(&self, battery_id_present: bool) -> bool {
        self.charging_enabled
            && !self.discharge_override
            && battery_id_present
            && self.temperature_policy_allows()
            && !self.eoc_protect.active
            && !self.dpm_eoc.disable_charging
            && !self.invalid_charger.weak
            && !self.safety_timeout
            && self.vbus_state == VbusState::Normal
    }

    /// Cable attached. `disconnected_long_enough` reports whether the gap
    /// since the previous plug-out exceeded the EOC disconnect window.
    pub fn plug_in(&mut self, charger_type: ChargerType, disconnected_long_enough: bool) {
        self.charger_type = charger_type;
        self.eoc_protect.on_reconnect(disconnected_long_enough);
    }

    /// Cable removed: full protection-state reset back to defaults.
    /// The EOC latch survives until the disconnect window elapses.
    pub fn plug_out(&mut self) {
        self.charger_type = ChargerType::Unknown;
        self.pd_type = PdType::None;
        self.invalid_charger = InvalidChargerDet::default();
        self.power_detection = PowerDetection::default();
        self.dpm_eoc.reset();
        self.vbus_state = VbusState::Normal;
        self.safety_timeout = false;
        self.water_detected = false;
        self.notify_code = NotifyCode::NONE;
        for channel in &mut self.limits {
            channel.reset_for_plug_cycle();
        }
    }

    /// Set or clear a notify-code flag; returns true when the code changed.
    pub fn set_notify(&mut self, flag: NotifyCode, set: bool) -> bool {
        let previous = self.notify_code;
        self.notify_code.set(flag, set);
        self.notify_code != previous
    }
}
