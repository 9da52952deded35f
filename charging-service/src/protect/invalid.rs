//! Weak/invalid charger detection.
//!
//! Once per plug-in the adapter is loaded at a known test point. An adapter
//! that collapses into input voltage regulation, or whose VBUS sags below
//! the test MIVR, cannot sustain its advertised current and is marked weak.

use charger_device::charger::{ChargerController, ChargerError, IndpmState};
use charger_device::types::{MicroAmps, MicroVolts};
use charger_device::{info, warn};
use embassy_time::Timer;

use crate::config::InvalidChargerConfig;

/// Detection result, reset on plug-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidChargerDet {
    /// Detection already ran for this plug cycle
    pub done: bool,
    /// Adapter marked weak/invalid; charging is held off
    pub weak: bool,
}

/// Weakness verdict from the sampled probe state.
pub fn verdict(indpm: IndpmState, vbus_uv: MicroVolts, cfg: &InvalidChargerConfig) -> bool {
    indpm.vdpm || vbus_uv < cfg.test_mivr_uv
}

/// Saved limits restored after a probe. Values the hardware could not report
/// are left untouched afterwards.
struct SavedPoint {
    input: Option<MicroAmps>,
    charging: Option<MicroAmps>,
    mivr: Option<MicroVolts>,
}

async fn save<C: ChargerController>(charger: &mut C) -> SavedPoint {
    SavedPoint {
        input: charger.input_current().await.ok(),
        charging: charger.charging_current().await.ok(),
        mivr: charger.mivr().await.ok(),
    }
}

async fn restore<C: ChargerController>(charger: &mut C, saved: SavedPoint) {
    if let Some(ua) = saved.input {
        let _ = charger.set_input_current(ua).await;
    }
    if let Some(ua) = saved.charging {
        let _ = charger.set_charging_current(ua).await;
    }
    if let Some(uv) = saved.mivr {
        let _ = charger.set_mivr(uv).await;
    }
}

/// Run the bounded probe on the worker. The caller marks the detection done
/// regardless of outcome; a bus failure skips the verdict rather than
/// marking the adapter weak.
pub async fn probe<C: ChargerController>(
    charger: &mut C,
    cfg: &InvalidChargerConfig,
) -> Result<bool, ChargerError> {
    let saved = save(charger).await;

    let setup = async {
        charger.set_mivr(cfg.test_mivr_uv).await?;
        charger.set_input_current(cfg.test_input_ua).await?;
        charger.set_charging_current(cfg.test_charging_ua).await?;
        Ok::<(), ChargerError>(())
    }
    .await;

    if let Err(e) = setup {
        warn!("invalid charger probe: setup failed {:?}", e);
        restore(charger, saved).await;
        return Err(e);
    }

    Timer::after(cfg.settle).await;

    let indpm = charger.indpm_state().await;
    let vbus = charger.vbus().await;
    restore(charger, saved).await;

    let (indpm, vbus) = match (indpm, vbus) {
        (Ok(i), Ok(v)) => (i, v),
        _ => {
            warn!("invalid charger probe: sample failed");
            return Err(ChargerError::Bus);
        }
    };

    let weak = verdict(indpm, vbus, cfg);
    if weak {
        info!("invalid charger probe: vdpm={} vbus={}mV", indpm.vdpm, vbus / 1000);
    }
    Ok(weak)
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::*;

    #[test]
    fn vdpm_marks_weak() {
        let cfg = InvalidChargerConfig::default();
        assert!(verdict(
            IndpmState { vdpm: true, idpm: false },
            5_000_000,
            &cfg
        ));
    }

    #[test]
    fn vbus_sag_marks_weak() {
        let cfg = InvalidChargerConfig::default(); // test mivr 4.6V
        assert!(verdict(IndpmState::default(), 4_400_000, &cfg));
    }

    #[test]
    fn healthy_adapter_passes() {
        let cfg = InvalidChargerConfig::default();
        assert!(!verdict(IndpmState::default(), 5_000_000, &cfg));
        assert!(!verdict(
            IndpmState { vdpm: false, idpm: true },
            5_000_000,
            &cfg
        ));
    }

    use crate::testutil::MockCharger;
    use embassy_futures::block_on;

    #[test]
    fn probe_flags_a_sagging_adapter_and_restores_limits() {
        let mut charger = MockCharger::default();
        charger.vbus_uv.set(4_300_000); // below the 4.6V test MIVR
        let cfg = InvalidChargerConfig {
            settle: embassy_time::Duration::from_millis(1),
            ..InvalidChargerConfig::default()
        };

        let weak = block_on(probe(&mut charger, &cfg)).unwrap();
        assert!(weak);

        assert_eq!(charger.input_ua.get(), 500_000);
        assert_eq!(charger.charging_ua.get(), 500_000);
        assert_eq!(charger.mivr_uv.get(), 4_400_000);
    }

    #[test]
    fn probe_passes_a_stiff_adapter() {
        let mut charger = MockCharger::default();
        let cfg = InvalidChargerConfig {
            settle: embassy_time::Duration::from_millis(1),
            ..InvalidChargerConfig::default()
        };

        let weak = block_on(probe(&mut charger, &cfg)).unwrap();
        assert!(!weak);
    }
}
