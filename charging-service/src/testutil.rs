//! Shared hardware mocks for unit tests.

extern crate std;

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use charger_device::charger::{ChargerController, ChargerError, ChargerEvent, IndpmState};
use charger_device::gauge::{FuelGauge, GaugeError};
use charger_device::metrics::{MetricsEvent, MetricsSink};
use charger_device::port::{ChargerPort, PdNotification, RpCurrent};
use charger_device::types::{
    ChargerType, DeciCelsius, MicroAmps, MicroVolts, MilliVolts, Percent, SignedMilliAmps,
};

/// Charger IC mock backed by cells, so tests can inspect and steer it while
/// the service holds it.
pub struct MockCharger {
    pub input_ua: Cell<MicroAmps>,
    pub charging_ua: Cell<MicroAmps>,
    pub cv_uv: Cell<MicroVolts>,
    pub mivr_uv: Cell<MicroVolts>,
    pub vbus_uv: Cell<MicroVolts>,
    pub enabled: Cell<bool>,
    pub chg_done: Cell<bool>,
    pub indpm: Cell<IndpmState>,
    /// `None` makes AICL fail
    pub aicl: Cell<Option<MicroAmps>>,
    pub aicl_runs: Cell<u32>,
    pub min_charging_ua: Cell<MicroAmps>,
}

impl Default for MockCharger {
    fn default() -> Self {
        Self {
            input_ua: Cell::new(500_000),
            charging_ua: Cell::new(500_000),
            cv_uv: Cell::new(4_350_000),
            mivr_uv: Cell::new(4_400_000),
            vbus_uv: Cell::new(5_000_000),
            enabled: Cell::new(false),
            chg_done: Cell::new(false),
            indpm: Cell::new(IndpmState::default()),
            aicl: Cell::new(None),
            aicl_runs: Cell::new(0),
            min_charging_ua: Cell::new(100_000),
        }
    }
}

impl ChargerController for MockCharger {
    async fn wait_event(&mut self) -> ChargerEvent {
        core::future::pending().await
    }

    async fn init(&mut self) -> Result<(), ChargerError> {
        Ok(())
    }

    async fn set_input_current(&mut self, ua: MicroAmps) -> Result<MicroAmps, ChargerError> {
        self.input_ua.set(ua);
        Ok(ua)
    }

    async fn input_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(self.input_ua.get())
    }

    async fn set_charging_current(&mut self, ua: MicroAmps) -> Result<MicroAmps, ChargerError> {
        self.charging_ua.set(ua);
        Ok(ua)
    }

    async fn charging_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(self.charging_ua.get())
    }

    async fn minimum_charging_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(self.min_charging_ua.get())
    }

    async fn set_constant_voltage(&mut self, uv: MicroVolts) -> Result<MicroVolts, ChargerError> {
        self.cv_uv.set(uv);
        Ok(uv)
    }

    async fn constant_voltage(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(self.cv_uv.get())
    }

    async fn set_mivr(&mut self, uv: MicroVolts) -> Result<MicroVolts, ChargerError> {
        self.mivr_uv.set(uv);
        Ok(uv)
    }

    async fn mivr(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(self.mivr_uv.get())
    }

    async fn vbus(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(self.vbus_uv.get())
    }

    async fn enable(&mut self, enable: bool) -> Result<(), ChargerError> {
        self.enabled.set(enable);
        Ok(())
    }

    async fn is_enabled(&mut self) -> Result<bool, ChargerError> {
        Ok(self.enabled.get())
    }

    async fn is_charging_done(&mut self) -> Result<bool, ChargerError> {
        Ok(self.chg_done.get())
    }

    async fn run_aicl(&mut self) -> Result<MicroAmps, ChargerError> {
        self.aicl_runs.set(self.aicl_runs.get() + 1);
        self.aicl.get().ok_or(ChargerError::Bus)
    }

    async fn indpm_state(&mut self) -> Result<IndpmState, ChargerError> {
        Ok(self.indpm.get())
    }

    async fn dump_registers(&mut self) {}
}

/// Fuel gauge mock with a healthy mid-charge battery by default.
pub struct MockGauge {
    pub vbat_mv: Cell<MilliVolts>,
    pub ibat_ma: Cell<SignedMilliAmps>,
    pub temp_dc: Cell<Option<DeciCelsius>>,
    pub soc: Cell<Percent>,
    pub ui_soc: Cell<Percent>,
    pub battery_id: Cell<bool>,
}

impl Default for MockGauge {
    fn default() -> Self {
        Self {
            vbat_mv: Cell::new(3_900),
            ibat_ma: Cell::new(800),
            temp_dc: Cell::new(Some(250)),
            soc: Cell::new(50),
            ui_soc: Cell::new(50),
            battery_id: Cell::new(true),
        }
    }
}

impl FuelGauge for MockGauge {
    async fn battery_voltage(&mut self) -> Result<MilliVolts, GaugeError> {
        Ok(self.vbat_mv.get())
    }

    async fn battery_current(&mut self) -> Result<SignedMilliAmps, GaugeError> {
        Ok(self.ibat_ma.get())
    }

    async fn battery_temperature(&mut self) -> Result<DeciCelsius, GaugeError> {
        self.temp_dc.get().ok_or(GaugeError::Bus)
    }

    async fn soc(&mut self) -> Result<Percent, GaugeError> {
        Ok(self.soc.get())
    }

    async fn ui_soc(&mut self) -> Result<Percent, GaugeError> {
        Ok(self.ui_soc.get())
    }

    async fn battery_id_present(&mut self) -> bool {
        self.battery_id.get()
    }
}

/// Port mock: a settable BC1.2 result, never delivers PD notifications.
pub struct MockPort {
    pub charger_type: Cell<ChargerType>,
    pub rp: Cell<RpCurrent>,
}

impl Default for MockPort {
    fn default() -> Self {
        Self {
            charger_type: Cell::new(ChargerType::Unknown),
            rp: Cell::new(RpCurrent::Default),
        }
    }
}

impl ChargerPort for MockPort {
    async fn wait_notification(&mut self) -> PdNotification {
        core::future::pending().await
    }

    async fn charger_type(&mut self) -> ChargerType {
        self.charger_type.get()
    }

    async fn remote_rp_current(&mut self) -> RpCurrent {
        self.rp.get()
    }
}

/// Metrics sink recording every event; clone it to keep a handle after the
/// service takes ownership.
#[derive(Clone, Default)]
pub struct RecordingMetrics {
    pub events: Rc<RefCell<Vec<MetricsEvent>>>,
}

impl MetricsSink for RecordingMetrics {
    fn emit(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl RecordingMetrics {
    /// Count recorded adapter-power events.
    pub fn adapter_power_events(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, MetricsEvent::AdapterPower { .. }))
            .count()
    }
}
