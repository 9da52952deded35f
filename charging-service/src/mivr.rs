//! Dynamic MIVR tier selection.
//!
//! With a deeply discharged battery the charger can pull VBUS close to the
//! adapter's floor; raising MIVR as VBAT recovers keeps the input path out of
//! regulation. Skipped entirely while a fast-charge algorithm owns the bus
//! voltage.

use charger_device::types::{MicroVolts, MilliVolts};

use crate::config::MivrConfig;

/// Select the MIVR threshold for the measured battery voltage.
pub fn select_mivr(vbat_mv: MilliVolts, cfg: &MivrConfig) -> MicroVolts {
    if vbat_mv < cfg.vbat_low_mv {
        cfg.mivr_low_uv
    } else if vbat_mv < cfg.vbat_mid_mv {
        cfg.mivr_mid_uv
    } else {
        cfg.mivr_high_uv
    }
}
