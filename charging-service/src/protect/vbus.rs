//! VBUS range check.
//!
//! Every tick the measured input voltage is checked against the OVP and
//! UVLO thresholds. Recovery from UVLO invalidates the last AICL result:
//! it was measured against a collapsed rail.

use charger_device::types::{ChargerType, MicroVolts};
use charger_device::warn;

use crate::config::ChargerConfig;

/// Input voltage window state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VbusState {
    /// Inside the window
    #[default]
    Normal,
    /// Over-voltage
    Ovp,
    /// Under-voltage lockout
    Uvlo,
}

/// One evaluation: the new state plus whether this tick is the UVLO-to-normal
/// recovery edge (the caller drops its cached AICL result on that edge).
pub fn evaluate(
    prev: VbusState,
    charger_type: ChargerType,
    vbus_uv: MicroVolts,
    cfg: &ChargerConfig,
) -> (VbusState, bool) {
    // No cable means no meaningful rail; wireless pads regulate their own
    // rectified voltage and mask the OVP comparison.
    if !charger_type.is_attached() || charger_type.is_wireless() {
        return (VbusState::Normal, false);
    }

    // An observed over-voltage holds until the next plug event clears it.
    if prev == VbusState::Ovp {
        return (VbusState::Ovp, false);
    }

    let state = if vbus_uv > cfg.max_charger_voltage {
        warn!("vbus {}mV over limit", vbus_uv / 1000);
        VbusState::Ovp
    } else if vbus_uv < cfg.vbus_uvlo_voltage {
        warn!("vbus {}mV under lockout", vbus_uv / 1000);
        VbusState::Uvlo
    } else {
        VbusState::Normal
    };

    let recovered_from_uvlo = prev == VbusState::Uvlo && state == VbusState::Normal;
    (state, recovered_from_uvlo)
}
