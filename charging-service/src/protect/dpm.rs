//! Debounced input-power-limited end-of-charge detection.
//!
//! Some charger ICs drift into input regulation near full charge and never
//! raise the done flag. A tick where every qualifying condition holds bumps
//! a counter; any disqualifying tick resets it, so only sustained regulation
//! latches the charging-off state.

use charger_device::charger::IndpmState;
use charger_device::info;
use charger_device::types::{MicroAmps, MicroVolts, MilliVolts, Percent, SignedMilliAmps};

use crate::config::DpmConfig;

/// DPM end-of-charge state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DpmEoc {
    /// Latched: charging is held off
    pub disable_charging: bool,
    /// Consecutive qualifying ticks observed
    pub count: u32,
    /// Raw SOC below which the latch clears
    pub soc_exit: Percent,
    /// CV at latch time; a CV change clears the latch
    pub cv_enter: Option<MicroVolts>,
}

/// Snapshot inputs for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct DpmInputs {
    /// Battery current, negative while discharging
    pub ibat_ma: SignedMilliAmps,
    /// CV currently applied
    pub cv_uv: MicroVolts,
    /// Battery default CV
    pub battery_cv_uv: MicroVolts,
    /// Input current limit currently applied
    pub input_limit_ua: MicroAmps,
    /// Charge current limit currently applied
    pub charging_limit_ua: MicroAmps,
    /// Charger hardware reports charging enabled
    pub charger_enabled: bool,
    /// Charger IC reports charge termination
    pub chg_done: bool,
    /// Battery terminal voltage
    pub vbat_mv: MilliVolts,
    /// Raw state of charge
    pub soc: Percent,
    /// Input regulation state sampled from the IC
    pub indpm: IndpmState,
}

/// Outcome of one evaluation, for callers that emit metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpmOutcome {
    /// Nothing changed
    Unchanged,
    /// The latch engaged this tick
    Latched,
    /// The latch cleared this tick
    Cleared,
}

impl DpmEoc {
    /// Run one evaluation.
    pub fn evaluate(&mut self, inputs: &DpmInputs, cfg: &DpmConfig) -> DpmOutcome {
        if self.disable_charging {
            if inputs.soc < self.soc_exit || self.cv_enter != Some(inputs.cv_uv) {
                info!("dpm eoc: exit at soc {}", inputs.soc);
                *self = Self::default();
                return DpmOutcome::Cleared;
            }
            return DpmOutcome::Unchanged;
        }

        let qualifying = inputs.charger_enabled
            && !inputs.chg_done
            && inputs.cv_uv == inputs.battery_cv_uv
            && inputs.ibat_ma >= 0
            && (inputs.ibat_ma as u32) <= cfg.ibat_max_ma
            && inputs.input_limit_ua >= cfg.iusb_min_ua
            && inputs.charging_limit_ua >= cfg.ichg_min_ua
            && inputs.vbat_mv >= cfg.vbat_min_mv
            && (inputs.indpm.vdpm || inputs.indpm.idpm);

        if !qualifying {
            self.count = 0;
            return DpmOutcome::Unchanged;
        }

        self.count += 1;
        if self.count < cfg.count_max {
            return DpmOutcome::Unchanged;
        }

        self.disable_charging = true;
        self.soc_exit = inputs.soc.saturating_sub(1);
        self.cv_enter = Some(inputs.cv_uv);
        info!(
            "dpm eoc: latched after {} ticks, exit below soc {}",
            self.count, self.soc_exit
        );
        DpmOutcome::Latched
    }

    /// Drop all state, used on plug events.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
