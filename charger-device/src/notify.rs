//! User-visible battery warning status.

use bitflags::bitflags;

/// Battery warning status bitmask surfaced to the user layer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotifyCode(pub u32);

bitflags! {
    impl NotifyCode: u32 {
        /// No abnormal condition
        const NONE = 0;
        /// VBUS above the over-voltage threshold
        const VBUS_OVP = 1 << 0;
        /// VBUS below the under-voltage lockout threshold
        const VBUS_UVLO = 1 << 1;
        /// Weak or invalid adapter detected
        const INVALID_CHARGER = 1 << 2;
        /// Continuous-charging safety timer expired
        const SAFETY_TIMEOUT = 1 << 3;
        /// Battery too hot to charge
        const BAT_HOT = 1 << 4;
        /// Battery too cold to charge
        const BAT_COLD = 1 << 5;
    }
}

impl NotifyCode {
    /// Any condition that forces charging off
    pub fn is_abnormal(self) -> bool {
        self != Self::NONE
    }
}
