//! JEITA temperature state machine.
//!
//! Six temperature bands over five ordered thresholds. Each boundary has a
//! hysteresis bound that must be crossed in the opposite direction before a
//! non-normal band is left, so a battery sitting exactly on a threshold does
//! not flap between bands.

use charger_device::info;
use charger_device::types::{MicroAmps, MicroVolts};

use crate::config::JeitaConfig;

/// JEITA temperature band
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JeitaBand {
    /// Too cold to charge
    BelowT0,
    /// Cold, reduced CV and current
    T0ToT1,
    /// Cool, reduced CV
    T1ToT2,
    /// Normal
    #[default]
    T2ToT3,
    /// Warm, reduced CV and current
    T3ToT4,
    /// Too hot to charge
    AboveT4,
}

/// JEITA evaluation output, refreshed every control-loop tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JeitaState {
    /// Current band
    pub sm: JeitaBand,
    /// Band before the latest evaluation, kept for transition logging
    pub pre_sm: JeitaBand,
    /// CV limit for the band; `None` charges at the battery default
    pub cv: Option<MicroVolts>,
    /// Charge-current ceiling for the band
    pub current_limit: Option<MicroAmps>,
    /// Whether the band permits charging at all
    pub charging_allowed: bool,
}

impl Default for JeitaState {
    fn default() -> Self {
        Self {
            sm: JeitaBand::T2ToT3,
            pre_sm: JeitaBand::T2ToT3,
            cv: None,
            current_limit: None,
            charging_allowed: true,
        }
    }
}

impl JeitaState {
    /// Re-evaluate the band for the measured battery temperature.
    pub fn evaluate(&mut self, temp_c: i32, cfg: &JeitaConfig) {
        self.pre_sm = self.sm;
        self.sm = next_band(self.sm, temp_c, cfg);
        self.charging_allowed = !matches!(self.sm, JeitaBand::AboveT4 | JeitaBand::BelowT0);
        self.cv = cv_for(self.sm, cfg);
        self.current_limit = current_for(self.sm, cfg);

        if self.sm != self.pre_sm {
            info!(
                "sw_jeita: {:?} -> {:?} at {}C, charging {}",
                self.pre_sm, self.sm, temp_c, self.charging_allowed
            );
        }
    }
}

fn next_band(prev: JeitaBand, temp: i32, cfg: &JeitaConfig) -> JeitaBand {
    use JeitaBand::*;

    if temp >= cfg.temp_t4_thres {
        AboveT4
    } else if temp > cfg.temp_t3_thres {
        // Hot band is only left once temperature drops past the hysteresis
        // bound, not merely past the threshold.
        if prev == AboveT4 && temp > cfg.temp_t4_thres_minus_x {
            AboveT4
        } else {
            T3ToT4
        }
    } else if temp >= cfg.temp_t2_thres {
        if prev == T3ToT4 && temp > cfg.temp_t3_thres_minus_x {
            T3ToT4
        } else if matches!(prev, T1ToT2 | T0ToT1 | BelowT0) && temp < cfg.temp_t2_thres_plus_x {
            prev
        } else {
            T2ToT3
        }
    } else if temp >= cfg.temp_t1_thres {
        if matches!(prev, T0ToT1 | BelowT0) && temp < cfg.temp_t1_thres_plus_x {
            prev
        } else {
            T1ToT2
        }
    } else if temp >= cfg.temp_t0_thres {
        if prev == BelowT0 && temp < cfg.temp_t0_thres_plus_x {
            BelowT0
        } else {
            T0ToT1
        }
    } else {
        BelowT0
    }
}

fn cv_for(band: JeitaBand, cfg: &JeitaConfig) -> Option<MicroVolts> {
    match band {
        JeitaBand::BelowT0 => cfg.cv_below_t0,
        JeitaBand::T0ToT1 => cfg.cv_t0_to_t1,
        JeitaBand::T1ToT2 => cfg.cv_t1_to_t2,
        JeitaBand::T2ToT3 => cfg.cv_t2_to_t3,
        JeitaBand::T3ToT4 => cfg.cv_t3_to_t4,
        JeitaBand::AboveT4 => cfg.cv_above_t4,
    }
}

fn current_for(band: JeitaBand, cfg: &JeitaConfig) -> Option<MicroAmps> {
    match band {
        JeitaBand::T0ToT1 => cfg.current_t0_to_t1,
        JeitaBand::T1ToT2 => cfg.current_t1_to_t2,
        JeitaBand::T3ToT4 => cfg.current_t3_to_t4,
        _ => None,
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::*;

    fn run(state: &mut JeitaState, temps: &[i32], cfg: &JeitaConfig) {
        for &t in temps {
            state.evaluate(t, cfg);
        }
    }

    #[test]
    fn hot_band_needs_hysteresis_to_clear() {
        let cfg = JeitaConfig::default(); // t4 = 50, minus_x = 47
        let mut state = JeitaState::default();

        state.evaluate(55, &cfg);
        assert_eq!(state.sm, JeitaBand::AboveT4);
        assert!(!state.charging_allowed);

        // Sweep down; everything above the hysteresis bound must hold the
        // hot band.
        for t in (48..=54).rev() {
            state.evaluate(t, &cfg);
            assert_eq!(state.sm, JeitaBand::AboveT4, "still hot at {t}C");
            assert!(!state.charging_allowed);
        }

        state.evaluate(47, &cfg);
        assert_eq!(state.sm, JeitaBand::T3ToT4);
        assert!(state.charging_allowed);

        run(&mut state, &[46, 45, 44], &cfg);
        assert_eq!(state.sm, JeitaBand::T3ToT4, "warm band held by t3 hysteresis");
    }

    #[test]
    fn cold_band_needs_hysteresis_to_clear() {
        let cfg = JeitaConfig::default(); // t0 = -10, plus_x = -7
        let mut state = JeitaState::default();

        state.evaluate(-12, &cfg);
        assert_eq!(state.sm, JeitaBand::BelowT0);
        assert!(!state.charging_allowed);

        state.evaluate(-8, &cfg);
        assert_eq!(state.sm, JeitaBand::BelowT0, "-8C is inside the re-entry band");

        state.evaluate(-6, &cfg);
        assert_eq!(state.sm, JeitaBand::T0ToT1);
        assert!(state.charging_allowed);
        assert_eq!(state.current_limit, cfg.current_t0_to_t1);
    }

    #[test]
    fn normal_band_uses_battery_default_cv() {
        let cfg = JeitaConfig::default();
        let mut state = JeitaState::default();

        state.evaluate(25, &cfg);
        assert_eq!(state.sm, JeitaBand::T2ToT3);
        assert_eq!(state.cv, None);
        assert_eq!(state.current_limit, None);
        assert!(state.charging_allowed);
    }

    #[test]
    fn warming_from_cool_holds_until_plus_x() {
        let cfg = JeitaConfig::default(); // t2 = 10, plus_x = 16
        let mut state = JeitaState::default();

        state.evaluate(5, &cfg);
        assert_eq!(state.sm, JeitaBand::T1ToT2);

        state.evaluate(12, &cfg);
        assert_eq!(state.sm, JeitaBand::T1ToT2, "12C is below the re-entry bound");

        state.evaluate(16, &cfg);
        assert_eq!(state.sm, JeitaBand::T2ToT3);
    }

    #[test]
    fn pre_sm_tracks_previous_band() {
        let cfg = JeitaConfig::default();
        let mut state = JeitaState::default();

        state.evaluate(55, &cfg);
        state.evaluate(30, &cfg);
        assert_eq!(state.pre_sm, JeitaBand::AboveT4);
        assert_eq!(state.sm, JeitaBand::T2ToT3);
    }

    #[test]
    fn sense_failure_reads_as_too_cold() {
        let cfg = JeitaConfig::default();
        let mut state = JeitaState::default();

        state.evaluate(charger_device::types::TEMP_SENSE_FAILED, &cfg);
        assert_eq!(state.sm, JeitaBand::BelowT0);
        assert!(!state.charging_allowed);
    }
}
