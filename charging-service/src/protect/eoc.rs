//! End-of-charge protection.
//!
//! Once the charger reports termination at a full UI state of charge, keep
//! charging off until the battery has actually drained a little, instead of
//! trickle-cycling at the top. Suppressed while any CV-lowering policy is in
//! effect, since termination at a reduced CV is not a full battery.

use charger_device::info;
use charger_device::types::Percent;

use crate::config::EocConfig;

/// End-of-charge protection latch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EocProtect {
    /// Charging is held off
    pub active: bool,
    /// Raw SOC below which charging resumes
    pub recharge_soc: Percent,
}

/// Snapshot inputs for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct EocInputs {
    /// Charger IC reports charge termination
    pub chg_done: bool,
    /// Raw state of charge
    pub soc: Percent,
    /// User-facing state of charge
    pub ui_soc: Percent,
    /// A CV-lowering policy (top-off mode, reduced JEITA CV) is active
    pub cv_lowered: bool,
}

impl EocProtect {
    /// Run one evaluation.
    pub fn evaluate(&mut self, inputs: &EocInputs, cfg: &EocConfig) {
        if !self.active {
            if inputs.chg_done && inputs.ui_soc >= 100 && !inputs.cv_lowered {
                self.active = true;
                self.recharge_soc = cfg.soc_exit.max(inputs.soc.saturating_sub(2));
                info!("eoc protect: enter, recharge below soc {}", self.recharge_soc);
            }
        } else if inputs.soc < self.recharge_soc || inputs.ui_soc < 100 || inputs.cv_lowered {
            info!("eoc protect: exit at soc {}", inputs.soc);
            self.active = false;
        }
    }

    /// A replug longer than the configured disconnect window drops the
    /// latch; shorter glitches keep it.
    pub fn on_reconnect(&mut self, disconnected_long_enough: bool) {
        if self.active && disconnected_long_enough {
            self.active = false;
        }
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::*;

    fn full_battery() -> EocInputs {
        EocInputs {
            chg_done: true,
            soc: 98,
            ui_soc: 100,
            cv_lowered: false,
        }
    }

    #[test]
    fn round_trip_through_protection() {
        let cfg = EocConfig::default(); // soc_exit = 96
        let mut eoc = EocProtect::default();

        eoc.evaluate(&full_battery(), &cfg);
        assert!(eoc.active);
        assert_eq!(eoc.recharge_soc, 96);

        // Draining to just above the threshold holds the latch.
        eoc.evaluate(
            &EocInputs {
                chg_done: false,
                soc: 96,
                ui_soc: 100,
                cv_lowered: false,
            },
            &cfg,
        );
        assert!(eoc.active);

        eoc.evaluate(
            &EocInputs {
                chg_done: false,
                soc: 95,
                ui_soc: 100,
                cv_lowered: false,
            },
            &cfg,
        );
        assert!(!eoc.active);
    }

    #[test]
    fn high_entry_soc_raises_threshold() {
        let cfg = EocConfig::default();
        let mut eoc = EocProtect::default();

        let mut inputs = full_battery();
        inputs.soc = 100;
        eoc.evaluate(&inputs, &cfg);
        assert_eq!(eoc.recharge_soc, 98);
    }

    #[test]
    fn cv_lowering_policy_blocks_entry_and_forces_exit() {
        let cfg = EocConfig::default();
        let mut eoc = EocProtect::default();

        let mut inputs = full_battery();
        inputs.cv_lowered = true;
        eoc.evaluate(&inputs, &cfg);
        assert!(!eoc.active, "termination at a reduced CV is not full");

        inputs.cv_lowered = false;
        eoc.evaluate(&inputs, &cfg);
        assert!(eoc.active);

        inputs.cv_lowered = true;
        eoc.evaluate(&inputs, &cfg);
        assert!(!eoc.active);
    }

    #[test]
    fn ui_soc_below_full_exits() {
        let cfg = EocConfig::default();
        let mut eoc = EocProtect::default();

        eoc.evaluate(&full_battery(), &cfg);
        assert!(eoc.active);

        eoc.evaluate(
            &EocInputs {
                chg_done: false,
                soc: 97,
                ui_soc: 99,
                cv_lowered: false,
            },
            &cfg,
        );
        assert!(!eoc.active);
    }

    #[test]
    fn short_replug_keeps_latch() {
        let mut eoc = EocProtect {
            active: true,
            recharge_soc: 96,
        };
        eoc.on_reconnect(false);
        assert!(eoc.active);
        eoc.on_reconnect(true);
        assert!(!eoc.active);
    }
}
