//! Current/voltage limit resolution.
//!
//! A pure function from the charger context plus a sensor snapshot to the
//! final input-current / charge-current / CV triple and the basic-versus-fast
//! charging verdict. Every hardware side effect (AICL, power detection) runs
//! before this in the tick and feeds in through the context, so resolving
//! twice over unchanged state yields identical output.
//!
//! The priority ladder, first match wins for the baseline pair:
//! unlimited-USB, water detection, factory boot modes and ATM test clamps,
//! then the per-charger-type defaults. Basic-mode refinements (AICL, Type-C
//! Rp, adapter power tier) apply next, then the temperature-policy clamp,
//! then per-channel thermal overrides; user force overrides replace the
//! result outright, and the hardware minimum is enforced last.

use charger_device::port::RpCurrent;
use charger_device::types::{ChargerType, MicroAmps, MicroVolts, PdType};

use crate::config::WirelessTier;
use crate::context::ChargerContext;

/// Snapshot inputs that are not part of the long-lived context
#[derive(Debug, Clone, Copy)]
pub struct ResolveInputs {
    /// Remote Type-C Rp advertisement
    pub rp_current: RpCurrent,
    /// Hardware minimum regulatable charge current, if reported
    pub hw_min_charging_current: Option<MicroAmps>,
    /// A fast-charge plugin is ready or running
    pub fast_algo_available: bool,
}

/// Resolved limits for the primary channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Resolution {
    /// Input current limit
    pub input_current_ua: MicroAmps,
    /// Charge current limit
    pub charging_current_ua: MicroAmps,
    /// CV to apply; `None` charges at the battery default
    pub cv_uv: Option<MicroVolts>,
    /// Stay in basic charging; fast-charge plugins are not consulted
    pub is_basic: bool,
    /// The temperature-policy clamp that was applied, if any; recorded so
    /// callers can tell a policy-forced ceiling from an unset one
    pub policy_current_clamp: Option<MicroAmps>,
}

fn wireless_pair(tier: &WirelessTier) -> (MicroAmps, MicroAmps) {
    let mut input = tier.input_ua;
    if let Some(power_mw) = tier.power_limit_mw {
        // power budget / pad voltage class, in microamps
        let budget_ua = (power_mw as u64 * 1_000_000 / tier.vbus_mv as u64) as MicroAmps;
        input = input.min(budget_ua);
    }
    (input, tier.charging_ua)
}

/// Resolve the limits for the primary channel.
pub fn resolve_limits(ctx: &ChargerContext, inputs: &ResolveInputs) -> Resolution {
    let cfg = &ctx.config;
    let wireless = ctx.charger_type.is_wireless();
    let mut is_basic = true;
    let mut type_dispatched = false;

    // Baseline pair, first match wins.
    let (mut input, mut charging) = if ctx.usb_unlimited {
        (cfg.ac_input_current, cfg.ac_charger_current)
    } else if ctx.water_detected {
        (cfg.usb_input_current, cfg.usb_charger_current)
    } else if ctx.boot_mode.is_meta() {
        (cfg.meta_boot_current, cfg.meta_boot_current)
    } else if ctx.atm_enabled && matches!(ctx.charger_type, ChargerType::Usb | ChargerType::Cdp) {
        (cfg.atm_test_current, cfg.atm_test_current)
    } else {
        type_dispatched = true;
        if !wireless && inputs.fast_algo_available {
            // A negotiation plugin owns the adapter; the baseline pair
            // still applies until it raises the bus voltage.
            is_basic = false;
        }
        match ctx.charger_type {
            ChargerType::Usb | ChargerType::Unknown => (cfg.usb_input_current, cfg.usb_charger_current),
            ChargerType::Cdp => (cfg.cdp_input_current, cfg.cdp_charger_current),
            ChargerType::Dcp => (cfg.ac_input_current, cfg.ac_charger_current),
            ChargerType::NonStandard => (cfg.non_std_charger_current, cfg.non_std_charger_current),
            ChargerType::Wireless5W => wireless_pair(&cfg.wireless.w5),
            ChargerType::Wireless10W => wireless_pair(&cfg.wireless.w10),
            ChargerType::WirelessDefault => wireless_pair(&cfg.wireless.fallback),
        }
    };

    // Basic refinements run only for wired basic charging.
    if type_dispatched && is_basic && !wireless {
        if let Some(aicl) = ctx.limits[0].aicl_result {
            input = input.min(aicl);
        }
        if ctx.pd_type == PdType::TypecOnly {
            match inputs.rp_current {
                RpCurrent::ThreeAmps => {
                    input = cfg.typec_rp_3a_current;
                    charging = charging.max(cfg.typec_rp_3a_current);
                }
                RpCurrent::OneAndHalf => {
                    input = cfg.typec_rp_1a5_current;
                    charging = charging.max(cfg.typec_rp_1a5_current);
                }
                RpCurrent::Default => {}
            }
        }
        if let Some(iusb) = ctx.power_detection.iusb_ua {
            input = input.min(iusb);
        }
    }

    // Temperature-policy clamp: only ever lowers the charge ceiling.
    let mut policy_current_clamp = None;
    if cfg.enable_sw_jeita {
        if let Some(ceiling) = ctx.jeita.current_limit {
            if ceiling < charging {
                charging = ceiling;
                policy_current_clamp = Some(ceiling);
            }
        }
    }

    // Per-channel thermal overrides: lowest priority, lower-only.
    let ch = &ctx.limits[0];
    if let Some(t) = ch.thermal_input_limit {
        input = input.min(t);
    }
    if let Some(t) = ch.thermal_charging_limit {
        charging = charging.min(t);
    }

    // User force overrides replace the computed values outright.
    if let Some(f) = ch.force_input_limit {
        input = f;
    }
    if let Some(f) = ch.force_charging_limit {
        charging = f;
    }

    // Refuse to fast-charge below the hardware's regulation floor.
    if let Some(hw_min) = inputs.hw_min_charging_current {
        if charging < hw_min {
            charging = 0;
            is_basic = true;
        }
    }

    Resolution {
        input_current_ua: input,
        charging_current_ua: charging,
        cv_uv: resolve_cv(ctx),
        is_basic,
        policy_current_clamp,
    }
}

/// CV selection: the lowest of the active CV-lowering policies, or `None`
/// for the battery default.
fn resolve_cv(ctx: &ChargerContext) -> Option<MicroVolts> {
    let mut cv: Option<MicroVolts> = None;
    if ctx.top_off_enabled {
        cv = Some(ctx.config.top_off_cv);
    }
    if ctx.config.enable_sw_jeita {
        if let Some(jeita_cv) = ctx.jeita.cv {
            cv = Some(cv.map_or(jeita_cv, |c| c.min(jeita_cv)));
        }
    }
    cv
}

/// Per-channel split of a resolution for the configured topology. Channel 1
/// is idle in a single-charger build; parallel builds split the charge
/// current evenly.
pub fn split_for_topology(
    resolution: &Resolution,
    topology: charger_device::types::ChargerConfiguration,
) -> [(MicroAmps, MicroAmps); 2] {
    use charger_device::types::ChargerConfiguration::*;
    match topology {
        Single => [
            (resolution.input_current_ua, resolution.charging_current_ua),
            (0, 0),
        ],
        DualSeries => [
            (resolution.input_current_ua, resolution.charging_current_ua),
            (resolution.input_current_ua, resolution.charging_current_ua),
        ],
        DualParallel => {
            let half = resolution.charging_current_ua / 2;
            [
                (resolution.input_current_ua, half),
                (resolution.input_current_ua, resolution.charging_current_ua - half),
            ]
        }
    }
}
