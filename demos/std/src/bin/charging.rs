//! Host demo: the charging service over scripted mock hardware.
//!
//! Plugs a DCP adapter in, lets the service detect and charge for a while,
//! then unplugs it, in a loop. Watch the log output to follow the state
//! machine.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use charger_device::charger::{ChargerController, ChargerError, ChargerEvent, IndpmState};
use charger_device::gauge::{FuelGauge, GaugeError};
use charger_device::metrics::{MetricsEvent, MetricsSink};
use charger_device::port::{ChargerPort, PdNotification, RpCurrent};
use charger_device::suspend::NoSuspend;
use charger_device::types::{
    ChargerType, DeciCelsius, MicroAmps, MicroVolts, MilliVolts, Percent, SignedMilliAmps,
};
use charging_service::config::ChargerConfig;
use embassy_executor::Executor;
use embassy_time::{Duration, Timer};
use log::info;
use static_cell::StaticCell;

/// State shared between the mocks and the scenario script.
#[derive(Clone)]
struct Bench {
    charger_type: Arc<AtomicU8>,
    vbus_uv: Arc<AtomicU32>,
    aicl_ua: Arc<AtomicU32>,
    soc: Arc<AtomicU32>,
    enabled: Arc<AtomicBool>,
}

impl Bench {
    fn new() -> Self {
        Self {
            charger_type: Arc::new(AtomicU8::new(0)),
            vbus_uv: Arc::new(AtomicU32::new(0)),
            aicl_ua: Arc::new(AtomicU32::new(1_700_000)),
            soc: Arc::new(AtomicU32::new(55)),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn charger_type(&self) -> ChargerType {
        match self.charger_type.load(Ordering::Relaxed) {
            1 => ChargerType::Dcp,
            2 => ChargerType::Usb,
            _ => ChargerType::Unknown,
        }
    }

    fn plug_dcp(&self) {
        self.charger_type.store(1, Ordering::Relaxed);
        self.vbus_uv.store(5_000_000, Ordering::Relaxed);
    }

    fn unplug(&self) {
        self.charger_type.store(0, Ordering::Relaxed);
        self.vbus_uv.store(0, Ordering::Relaxed);
    }
}

struct BenchCharger {
    bench: Bench,
}

impl ChargerController for BenchCharger {
    async fn wait_event(&mut self) -> ChargerEvent {
        std::future::pending().await
    }

    async fn init(&mut self) -> Result<(), ChargerError> {
        Ok(())
    }

    async fn set_input_current(&mut self, ua: MicroAmps) -> Result<MicroAmps, ChargerError> {
        Ok(ua)
    }

    async fn input_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(500_000)
    }

    async fn set_charging_current(&mut self, ua: MicroAmps) -> Result<MicroAmps, ChargerError> {
        Ok(ua)
    }

    async fn charging_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(500_000)
    }

    async fn minimum_charging_current(&mut self) -> Result<MicroAmps, ChargerError> {
        Ok(100_000)
    }

    async fn set_constant_voltage(&mut self, uv: MicroVolts) -> Result<MicroVolts, ChargerError> {
        Ok(uv)
    }

    async fn constant_voltage(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(4_350_000)
    }

    async fn set_mivr(&mut self, uv: MicroVolts) -> Result<MicroVolts, ChargerError> {
        Ok(uv)
    }

    async fn mivr(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(4_400_000)
    }

    async fn vbus(&mut self) -> Result<MicroVolts, ChargerError> {
        Ok(self.bench.vbus_uv.load(Ordering::Relaxed))
    }

    async fn enable(&mut self, enable: bool) -> Result<(), ChargerError> {
        self.bench.enabled.store(enable, Ordering::Relaxed);
        info!("[hw] charger enable: {enable}");
        Ok(())
    }

    async fn is_enabled(&mut self) -> Result<bool, ChargerError> {
        Ok(self.bench.enabled.load(Ordering::Relaxed))
    }

    async fn is_charging_done(&mut self) -> Result<bool, ChargerError> {
        Ok(false)
    }

    async fn run_aicl(&mut self) -> Result<MicroAmps, ChargerError> {
        match self.bench.aicl_ua.load(Ordering::Relaxed) {
            0 => Err(ChargerError::Bus),
            ua => Ok(ua),
        }
    }

    async fn indpm_state(&mut self) -> Result<IndpmState, ChargerError> {
        Ok(IndpmState::default())
    }

    async fn dump_registers(&mut self) {}
}

struct BenchGauge {
    bench: Bench,
}

impl FuelGauge for BenchGauge {
    async fn battery_voltage(&mut self) -> Result<MilliVolts, GaugeError> {
        Ok(3_900)
    }

    async fn battery_current(&mut self) -> Result<SignedMilliAmps, GaugeError> {
        Ok(if self.bench.enabled.load(Ordering::Relaxed) { 1_200 } else { -300 })
    }

    async fn battery_temperature(&mut self) -> Result<DeciCelsius, GaugeError> {
        Ok(250)
    }

    async fn soc(&mut self) -> Result<Percent, GaugeError> {
        Ok(self.bench.soc.load(Ordering::Relaxed))
    }

    async fn ui_soc(&mut self) -> Result<Percent, GaugeError> {
        Ok(self.bench.soc.load(Ordering::Relaxed))
    }

    async fn battery_id_present(&mut self) -> bool {
        true
    }
}

struct BenchPort {
    bench: Bench,
}

impl ChargerPort for BenchPort {
    async fn wait_notification(&mut self) -> PdNotification {
        std::future::pending().await
    }

    async fn charger_type(&mut self) -> ChargerType {
        self.bench.charger_type()
    }

    async fn remote_rp_current(&mut self) -> RpCurrent {
        RpCurrent::Default
    }
}

struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn emit(&self, event: MetricsEvent) {
        info!("[metrics] {event:?}");
    }
}

charging_service::create_charging_service!(BenchCharger, BenchGauge, BenchPort, LogMetrics, NoSuspend);

#[embassy_executor::task]
async fn scenario(bench: Bench, service: &'static ChargingServiceInstance) {
    loop {
        Timer::after(Duration::from_secs(3)).await;
        info!("[bench] plugging in a DCP adapter");
        bench.plug_dcp();
        service.kick();

        Timer::after(Duration::from_secs(15)).await;
        info!("[bench] unplugging");
        bench.unplug();
        service.notify_cable_out();
    }
}

#[embassy_executor::task]
async fn monitor(service: &'static ChargingServiceInstance) {
    loop {
        Timer::after(Duration::from_secs(5)).await;
        service.with_context(|ctx| {
            info!(
                "[monitor] type {:?} charging {} tier {:?} iusb {}mA ichg {}mA",
                ctx.charger_type,
                ctx.can_charging,
                ctx.power_detection.category,
                ctx.limits[0].input_current_limit / 1000,
                ctx.limits[0].charging_current_limit / 1000,
            );
        });
    }
}

fn main() {
    env_logger::builder().filter_level(log::LevelFilter::Info).init();

    static EXECUTOR: StaticCell<Executor> = StaticCell::new();
    let executor = EXECUTOR.init(Executor::new());
    let bench = Bench::new();

    let service = charging_service_init(
        ChargerConfig::default(),
        BenchCharger { bench: bench.clone() },
        BenchGauge { bench: bench.clone() },
        BenchPort { bench: bench.clone() },
        LogMetrics,
        NoSuspend,
    );
    info!("charging service init'd");

    executor.run(|spawner| {
        spawner.must_spawn(charging_service_task(service));
        spawner.must_spawn(scenario(bench.clone(), service));
        spawner.must_spawn(monitor(service));
    });
}
