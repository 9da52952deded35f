//! Adapter power-category detection.
//!
//! Runs once per plug-in cycle. A Type-C Rp advertisement settles the tier
//! immediately; otherwise a DCP adapter is probed with an aggressive load
//! (the OCP probe) and the AICL result is bucketed into a tier. The probe
//! transiently perturbs the real charge current; callers tolerate the
//! bounded glitch window in exchange for a fast answer.

use charger_device::charger::{ChargerController, ChargerError};
use charger_device::metrics::{MetricsEvent, MetricsSink};
use charger_device::port::RpCurrent;
use charger_device::types::{AdapterPowerCategory, ChargerType, MicroAmps, MicroVolts};
use charger_device::{info, warn};
use embassy_time::Timer;

use crate::config::PowerDetectConfig;

/// Tier assumed when the OCP probe's AICL fails outright. A 15W adapter in
/// its constant-voltage region can abort AICL, so the failure is read as "a
/// strong adapter we could not measure". Tunable policy, not a physical law.
pub const AICL_FAILURE_FALLBACK: AdapterPowerCategory = AdapterPowerCategory::W12;

/// Detection result, reset on plug-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerDetection {
    /// Detection already ran for this plug cycle
    pub done: bool,
    /// Detected capability tier
    pub category: AdapterPowerCategory,
    /// Input limit for the tier, applied by the resolver
    pub iusb_ua: Option<MicroAmps>,
}

/// Bucket a measured AICL capability into a power tier.
pub fn bucket_aicl(aicl_ua: MicroAmps, cfg: &PowerDetectConfig) -> AdapterPowerCategory {
    if aicl_ua >= cfg.aicl_12w_min_ua {
        AdapterPowerCategory::W12
    } else if aicl_ua >= cfg.aicl_9w_min_ua {
        AdapterPowerCategory::W9
    } else {
        AdapterPowerCategory::W5
    }
}

/// Input limit for a detected tier.
pub fn iusb_for(category: AdapterPowerCategory, cfg: &PowerDetectConfig) -> Option<MicroAmps> {
    match category {
        AdapterPowerCategory::None => None,
        AdapterPowerCategory::W5 => Some(cfg.iusb_5w_ua),
        AdapterPowerCategory::W7_5 => Some(cfg.iusb_7p5w_ua),
        AdapterPowerCategory::W9 => Some(cfg.iusb_9w_ua),
        AdapterPowerCategory::W12 => Some(cfg.iusb_12w_ua),
        AdapterPowerCategory::W15 => Some(cfg.iusb_15w_ua),
    }
}

struct SavedPoint {
    input: Option<MicroAmps>,
    charging: Option<MicroAmps>,
    cv: Option<MicroVolts>,
    mivr: Option<MicroVolts>,
}

async fn save<C: ChargerController>(charger: &mut C) -> SavedPoint {
    SavedPoint {
        input: charger.input_current().await.ok(),
        charging: charger.charging_current().await.ok(),
        cv: charger.constant_voltage().await.ok(),
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
    if let Some(uv) = saved.cv {
        let _ = charger.set_constant_voltage(uv).await;
    }
    if let Some(uv) = saved.mivr {
        let _ = charger.set_mivr(uv).await;
    }
}

/// Load the adapter hard and measure what it can actually source.
async fn ocp_probe<C: ChargerController>(
    charger: &mut C,
    cfg: &PowerDetectConfig,
) -> Result<MicroAmps, ChargerError> {
    let saved = save(charger).await;

    let setup = async {
        charger.set_mivr(cfg.probe_mivr_uv).await?;
        charger.set_charging_current(cfg.probe_charging_ua).await?;
        charger.set_input_current(cfg.probe_input_ua).await?;
        Ok::<(), ChargerError>(())
    }
    .await;

    if let Err(e) = setup {
        restore(charger, saved).await;
        return Err(e);
    }

    Timer::after(cfg.settle).await;
    let aicl = charger.run_aicl().await;
    restore(charger, saved).await;
    aicl
}

/// Run detection for this plug cycle.
pub async fn detect<C: ChargerController, M: MetricsSink>(
    charger: &mut C,
    metrics: &M,
    charger_type: ChargerType,
    rp: RpCurrent,
    cfg: &PowerDetectConfig,
) -> PowerDetection {
    let (category, aicl_ua) = match rp {
        // An Rp advertisement is authoritative; no probing.
        RpCurrent::ThreeAmps => (AdapterPowerCategory::W15, None),
        RpCurrent::OneAndHalf => (AdapterPowerCategory::W7_5, None),
        RpCurrent::Default => {
            if charger_type != ChargerType::Dcp {
                // Nothing to probe on this port state.
                (AdapterPowerCategory::None, None)
            } else {
                match ocp_probe(charger, cfg).await {
                    Ok(aicl) => (bucket_aicl(aicl, cfg), Some(aicl)),
                    Err(e) => {
                        warn!("power detect: aicl failed {:?}, assuming strong adapter", e);
                        (AICL_FAILURE_FALLBACK, None)
                    }
                }
            }
        }
    };

    let iusb_ua = iusb_for(category, cfg);
    info!(
        "power detect: category {:?}, aicl {:?}mA",
        category,
        aicl_ua.map(|ua| ua / 1000)
    );
    metrics.emit(MetricsEvent::AdapterPower {
        category,
        aicl_ma: aicl_ua.map(|ua| ua / 1000),
    });

    PowerDetection {
        done: true,
        category,
        iusb_ua,
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::*;

    #[test]
    fn aicl_tier_bucketing() {
        let cfg = PowerDetectConfig {
            aicl_9w_min_ua: 500_000,
            aicl_12w_min_ua: 1_800_000,
            ..PowerDetectConfig::default()
        };

        assert_eq!(bucket_aicl(2_800_000, &cfg), AdapterPowerCategory::W12);
        // Boundary is inclusive.
        assert_eq!(bucket_aicl(1_800_000, &cfg), AdapterPowerCategory::W12);
        assert_eq!(bucket_aicl(1_200_000, &cfg), AdapterPowerCategory::W9);
        assert_eq!(bucket_aicl(400_000, &cfg), AdapterPowerCategory::W5);
    }

    #[test]
    fn default_thresholds() {
        let cfg = PowerDetectConfig::default(); // 9W at 1.6A, 12W at 2.0A
        assert_eq!(bucket_aicl(1_800_000, &cfg), AdapterPowerCategory::W9);
        assert_eq!(bucket_aicl(2_000_000, &cfg), AdapterPowerCategory::W12);
        assert_eq!(bucket_aicl(1_599_999, &cfg), AdapterPowerCategory::W5);
    }

    #[test]
    fn tier_input_limits() {
        let cfg = PowerDetectConfig::default();
        assert_eq!(iusb_for(AdapterPowerCategory::None, &cfg), None);
        assert_eq!(iusb_for(AdapterPowerCategory::W15, &cfg), Some(cfg.iusb_15w_ua));
        assert_eq!(iusb_for(AdapterPowerCategory::W9, &cfg), Some(cfg.iusb_9w_ua));
    }

    #[test]
    fn fallback_is_a_strong_tier() {
        // The AICL-failure fallback must never pick a tier below what a
        // healthy probe could produce for a strong adapter.
        assert!(AICL_FAILURE_FALLBACK >= AdapterPowerCategory::W12);
    }

    use crate::testutil::{MockCharger, RecordingMetrics};
    use charger_device::metrics::MetricsEvent;
    use embassy_futures::block_on;

    #[test]
    fn dcp_ocp_probe_end_to_end() {
        let mut charger = MockCharger::default();
        charger.aicl.set(Some(1_800_000));
        let metrics = RecordingMetrics::default();
        let cfg = PowerDetectConfig {
            aicl_9w_min_ua: 1_500_000,
            aicl_12w_min_ua: 2_000_000,
            ..PowerDetectConfig::default()
        };

        let detection = block_on(detect(
            &mut charger,
            &metrics,
            ChargerType::Dcp,
            RpCurrent::Default,
            &cfg,
        ));

        assert!(detection.done);
        assert_eq!(detection.category, AdapterPowerCategory::W9);
        assert_eq!(detection.iusb_ua, Some(cfg.iusb_9w_ua));

        let events = metrics.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            MetricsEvent::AdapterPower {
                category: AdapterPowerCategory::W9,
                aicl_ma: Some(1_800),
            }
        );

        // The probe restored the limits it perturbed.
        assert_eq!(charger.input_ua.get(), 500_000);
        assert_eq!(charger.charging_ua.get(), 500_000);
        assert_eq!(charger.mivr_uv.get(), 4_400_000);
        assert_eq!(charger.aicl_runs.get(), 1);
    }

    #[test]
    fn rp_advertisement_skips_the_probe() {
        let mut charger = MockCharger::default();
        let metrics = RecordingMetrics::default();
        let cfg = PowerDetectConfig::default();

        let detection = block_on(detect(
            &mut charger,
            &metrics,
            ChargerType::Dcp,
            RpCurrent::ThreeAmps,
            &cfg,
        ));

        assert_eq!(detection.category, AdapterPowerCategory::W15);
        assert_eq!(detection.iusb_ua, Some(cfg.iusb_15w_ua));
        assert_eq!(charger.aicl_runs.get(), 0, "Rp answer is terminal");
    }

    #[test]
    fn non_dcp_port_yields_no_tier() {
        let mut charger = MockCharger::default();
        let metrics = RecordingMetrics::default();
        let cfg = PowerDetectConfig::default();

        let detection = block_on(detect(
            &mut charger,
            &metrics,
            ChargerType::Usb,
            RpCurrent::Default,
            &cfg,
        ));

        assert!(detection.done);
        assert_eq!(detection.category, AdapterPowerCategory::None);
        assert_eq!(detection.iusb_ua, None);
        assert_eq!(charger.aicl_runs.get(), 0);
    }

    #[test]
    fn aicl_failure_falls_back_to_12w() {
        let mut charger = MockCharger::default();
        charger.aicl.set(None);
        let metrics = RecordingMetrics::default();
        let cfg = PowerDetectConfig::default();

        let detection = block_on(detect(
            &mut charger,
            &metrics,
            ChargerType::Dcp,
            RpCurrent::Default,
            &cfg,
        ));

        assert_eq!(detection.category, AdapterPowerCategory::W12);
        assert_eq!(detection.iusb_ua, Some(cfg.iusb_12w_ua));
    }
}
