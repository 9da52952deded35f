//! Battery temperature protection for platforms not using JEITA.
//!
//! A plain charge window: charging stops outside `min..max` battery
//! temperature and resumes only after the hysteresis bound is crossed back.

use charger_device::info;

use crate::config::ThermalConfig;

/// Temperature protection band
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermalBand {
    /// Too cold to charge
    Low,
    /// Inside the charge window
    #[default]
    Normal,
    /// Too hot to charge
    High,
}

/// Temperature protection state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalState {
    /// Current band
    pub sm: ThermalBand,
    /// Band before the latest evaluation
    pub pre_sm: ThermalBand,
}

impl ThermalState {
    /// Charging is permitted only inside the window
    pub fn charging_allowed(&self) -> bool {
        self.sm == ThermalBand::Normal
    }

    /// Re-evaluate the band for the measured battery temperature.
    pub fn evaluate(&mut self, temp_c: i32, cfg: &ThermalConfig) {
        self.pre_sm = self.sm;
        self.sm = if temp_c >= cfg.max_charge_temp {
            ThermalBand::High
        } else if self.sm == ThermalBand::High && temp_c > cfg.max_charge_temp_minus_x {
            ThermalBand::High
        } else if temp_c < cfg.min_charge_temp {
            ThermalBand::Low
        } else if self.sm == ThermalBand::Low && temp_c < cfg.min_charge_temp_plus_x {
            ThermalBand::Low
        } else {
            ThermalBand::Normal
        };

        if self.sm != self.pre_sm {
            info!("battery thermal: {:?} -> {:?} at {}C", self.pre_sm, self.sm, temp_c);
        }
    }
}
