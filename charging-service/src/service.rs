//! The charging control loop.
//!
//! One worker owns the hardware handles and all context mutation. External
//! event sources (PD notifier, charger IRQs, user commands) only enqueue
//! work and wake the worker; the worker serializes everything through the
//! fixed tick order: sample, plug transitions, MIVR, protections, verdict,
//! resolution, apply.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU8, Ordering};

use charger_device::charger::{ChargerController, ChargerError, ChargerEvent};
use charger_device::gauge::FuelGauge;
use charger_device::metrics::{MetricsEvent, MetricsSink};
use charger_device::notify::NotifyCode;
use charger_device::port::{ChargerPort, PdNotification, RpCurrent};
use charger_device::suspend::SuspendBlocker;
use charger_device::types::{
    ChargerType, MicroAmps, MicroVolts, MilliVolts, PdType, Percent, SignedMilliAmps,
    TEMP_SENSE_FAILED,
};
use charger_device::{debug, error, info, trace, warn};
use embassy_futures::select::{select, select4, Either, Either4};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::algorithm::{standard_set, AlgoEvent, AlgoLimits, AlgoState, AlgorithmSet, ChargeAlgorithm};
use crate::config::ChargerConfig;
use crate::context::ChargerContext;
use crate::protect::dpm::{DpmInputs, DpmOutcome};
use crate::protect::eoc::EocInputs;
use crate::protect::{invalid, vbus};
use crate::resolver::{resolve_limits, split_for_topology, ResolveInputs, Resolution};
use crate::{mivr, power_detect, ChargerCommand};

/// Queue depth for user commands
const COMMAND_QUEUE: usize = 4;
/// Fast-charge plugins above this bus voltage need the HV-charging switch
const HV_THRESHOLD_UV: MicroVolts = 5_000_000;

/// One tick's sensor readings. Failed reads are degraded to fail-safe
/// sentinels here so the protection logic never sees an error.
#[derive(Debug, Clone, Copy)]
struct SensorSnapshot {
    charger_type: ChargerType,
    temp_c: i32,
    vbat_mv: MilliVolts,
    ibat_ma: SignedMilliAmps,
    soc: Percent,
    ui_soc: Percent,
    vbus_uv: MicroVolts,
    battery_id_present: bool,
    charger_enabled: bool,
    chg_done: bool,
    indpm: charger_device::charger::IndpmState,
    min_charging_current: Option<MicroAmps>,
    rp_current: RpCurrent,
}

/// The charging service: context plus hardware bindings.
pub struct ChargingService<C, F, P, M, S>
where
    C: ChargerController,
    F: FuelGauge,
    P: ChargerPort,
    M: MetricsSink,
    S: SuspendBlocker,
{
    context: RefCell<ChargerContext>,
    charger: RefCell<C>,
    gauge: RefCell<F>,
    port: RefCell<P>,
    metrics: M,
    suspend: S,
    algorithms: RefCell<AlgorithmSet>,
    commands: Channel<NoopRawMutex, ChargerCommand, COMMAND_QUEUE>,
    wake: Signal<NoopRawMutex, ()>,
    /// Plug-out debounce counter. The one field written outside the worker
    /// (IRQ/notifier context), consumed with a swap each tick.
    cable_out_cnt: AtomicU8,
    charging_since: Cell<Option<Instant>>,
    disconnected_at: Cell<Option<Instant>>,
}

impl<C, F, P, M, S> ChargingService<C, F, P, M, S>
where
    C: ChargerController,
    F: FuelGauge,
    P: ChargerPort,
    M: MetricsSink,
    S: SuspendBlocker,
{
    /// Create the service with the standard plugin rotation.
    pub fn new(config: ChargerConfig, charger: C, gauge: F, port: P, metrics: M, suspend: S) -> Self {
        Self::with_algorithms(config, charger, gauge, port, metrics, suspend, standard_set())
    }

    /// Create the service with an explicit, priority-ordered plugin list.
    pub fn with_algorithms(
        config: ChargerConfig,
        charger: C,
        gauge: F,
        port: P,
        metrics: M,
        suspend: S,
        algorithms: AlgorithmSet,
    ) -> Self {
        Self {
            context: RefCell::new(ChargerContext::new(config)),
            charger: RefCell::new(charger),
            gauge: RefCell::new(gauge),
            port: RefCell::new(port),
            metrics,
            suspend,
            algorithms: RefCell::new(algorithms),
            commands: Channel::new(),
            wake: Signal::new(),
            cable_out_cnt: AtomicU8::new(0),
            charging_since: Cell::new(None),
            disconnected_at: Cell::new(None),
        }
    }

    /// Enqueue a command and wake the worker.
    pub async fn command(&self, cmd: ChargerCommand) {
        self.commands.send(cmd).await;
        self.wake.signal(());
    }

    /// Enqueue a command without waiting for queue space.
    pub fn try_command(&self, cmd: ChargerCommand) -> Result<(), TrySendError<ChargerCommand>> {
        let res = self.commands.try_send(cmd);
        self.wake.signal(());
        res
    }

    /// Wake the worker for an immediate re-evaluation.
    pub fn kick(&self) {
        self.wake.signal(());
    }

    /// Record an unplug edge from IRQ/notifier context and wake the worker.
    pub fn notify_cable_out(&self) {
        self.cable_out_cnt.fetch_add(1, Ordering::Relaxed);
        self.wake.signal(());
    }

    /// Inspect the context, for introspection surfaces and tests.
    pub fn with_context<R>(&self, f: impl FnOnce(&ChargerContext) -> R) -> R {
        f(&self.context.borrow())
    }

    /// Run the service forever. Retries hardware discovery until the charger
    /// IC appears, then alternates between evaluation ticks and waiting.
    #[allow(clippy::await_holding_refcell_ref)]
    pub async fn process(&self) -> ! {
        let mut charger = self.charger.borrow_mut();
        let mut gauge = self.gauge.borrow_mut();
        let mut port = self.port.borrow_mut();

        loop {
            match charger.init().await {
                Ok(()) => break,
                Err(e) => {
                    // Deferred probe is normal; the device may appear later.
                    let retry = self.context.borrow().config.discovery_retry_interval;
                    warn!("charger hardware not ready ({:?}), retrying", e);
                    Timer::after(retry).await;
                }
            }
        }
        info!("charging service started");

        loop {
            self.suspend.hold();
            self.tick(&mut charger, &mut gauge, &mut port).await;
            self.suspend.release();

            let (polling, attached) = {
                let ctx = self.context.borrow();
                (ctx.config.polling_interval, ctx.charger_type.is_attached())
            };

            // The polling alarm is armed only while a charger is attached;
            // otherwise the worker blocks until an event arrives.
            let timer_or_wake = async {
                if attached {
                    match select(Timer::after(polling), self.wake.wait()).await {
                        Either::First(()) => (),
                        Either::Second(()) => (),
                    }
                } else {
                    self.wake.wait().await;
                }
            };

            match select4(
                timer_or_wake,
                self.commands.receive(),
                port.wait_notification(),
                charger.wait_event(),
            )
            .await
            {
                Either4::First(()) => {}
                Either4::Second(cmd) => self.handle_command(cmd),
                Either4::Third(notification) => self.handle_pd_notification(notification),
                Either4::Fourth(event) => self.handle_charger_event(event),
            }

            // Coalesce whatever else queued up while we were waiting.
            while let Ok(cmd) = self.commands.try_receive() {
                self.handle_command(cmd);
            }
        }
    }

    fn handle_command(&self, cmd: ChargerCommand) {
        trace!("command: {:?}", cmd);
        let mut ctx = self.context.borrow_mut();
        match cmd {
            ChargerCommand::SetForceInputCurrent { channel, limit } => {
                if let Some(ch) = ctx.limits.get_mut(channel) {
                    ch.force_input_limit = limit;
                }
            }
            ChargerCommand::SetForceChargingCurrent { channel, limit } => {
                if let Some(ch) = ctx.limits.get_mut(channel) {
                    ch.force_charging_limit = limit;
                }
            }
            ChargerCommand::SetThermalInputLimit { channel, limit } => {
                if let Some(ch) = ctx.limits.get_mut(channel) {
                    ch.thermal_input_limit = limit;
                }
            }
            ChargerCommand::SetThermalChargingLimit { channel, limit } => {
                if let Some(ch) = ctx.limits.get_mut(channel) {
                    ch.thermal_charging_limit = limit;
                }
            }
            ChargerCommand::ReportJunctionTemperature { channel, temp_dc } => {
                if let Some(ch) = ctx.limits.get_mut(channel) {
                    ch.junction_temp = Some(temp_dc);
                }
            }
            ChargerCommand::EnableHvCharging(enable) => ctx.hv_charging_enabled = enable,
            ChargerCommand::EnableCharging(enable) => ctx.charging_enabled = enable,
            ChargerCommand::EnableTopOff(enable) => {
                if ctx.top_off_enabled != enable {
                    ctx.top_off_enabled = enable;
                    self.metrics.emit(MetricsEvent::TopOffMode(enable));
                }
            }
            ChargerCommand::ForceDischarge(enable) => ctx.discharge_override = enable,
        }
    }

    fn handle_pd_notification(&self, notification: PdNotification) {
        debug!("pd notification: {:?}", notification);
        let mut ctx = self.context.borrow_mut();
        let mut algorithms = self.algorithms.borrow_mut();
        match notification {
            PdNotification::PlugOut => {
                ctx.pd_type = PdType::None;
                self.cable_out_cnt.fetch_add(1, Ordering::Relaxed);
            }
            PdNotification::HardReset => {
                ctx.pd_type = PdType::None;
                for algo in algorithms.iter_mut() {
                    algo.notify(AlgoEvent::HardReset);
                }
            }
            PdNotification::FixedVoltageReady => {
                ctx.pd_type = PdType::Fixed;
                for algo in algorithms.iter_mut() {
                    algo.notify(AlgoEvent::PdReady(PdType::Fixed));
                }
            }
            PdNotification::Pd30Ready => {
                ctx.pd_type = PdType::Pd30;
                for algo in algorithms.iter_mut() {
                    algo.notify(AlgoEvent::PdReady(PdType::Pd30));
                }
            }
            PdNotification::ApdoReady => {
                ctx.pd_type = PdType::Apdo;
                for algo in algorithms.iter_mut() {
                    algo.notify(AlgoEvent::PdReady(PdType::Apdo));
                }
            }
            PdNotification::TypeCOnly => {
                ctx.pd_type = PdType::TypecOnly;
                for algo in algorithms.iter_mut() {
                    algo.notify(AlgoEvent::PdReady(PdType::TypecOnly));
                }
            }
            PdNotification::WaterDetected => {
                warn!("water detected in receptacle");
                ctx.water_detected = true;
            }
        }
    }

    fn handle_charger_event(&self, event: ChargerEvent) {
        debug!("charger event: {:?}", event);
        if event == ChargerEvent::SafetyTimeout {
            let mut ctx = self.context.borrow_mut();
            ctx.safety_timeout = true;
            if ctx.set_notify(NotifyCode::SAFETY_TIMEOUT, true) {
                self.metrics.emit(MetricsEvent::NotifyCodeChanged(ctx.notify_code));
            }
        }
        // Eoc, Recharge, VbusOvp and Update all re-evaluate on the tick that
        // follows this wake-up.
    }

    /// A plugin is ready or running and permitted by the HV switch.
    fn fast_algo_available(&self) -> bool {
        let hv_enabled = self.context.borrow().hv_charging_enabled;
        self.algorithms
            .borrow()
            .iter()
            .any(|a| {
                matches!(a.state(), AlgoState::Ready | AlgoState::Running)
                    && (hv_enabled || a.max_vbus() <= HV_THRESHOLD_UV)
            })
    }

    async fn read_snapshot(&self, charger: &mut C, gauge: &mut F, port: &mut P) -> SensorSnapshot {
        let temp_c = match gauge.battery_temperature().await {
            Ok(deci) => deci / 10,
            Err(_) => TEMP_SENSE_FAILED,
        };
        SensorSnapshot {
            charger_type: port.charger_type().await,
            temp_c,
            vbat_mv: gauge.battery_voltage().await.unwrap_or(0),
            ibat_ma: gauge.battery_current().await.unwrap_or(0),
            soc: gauge.soc().await.unwrap_or(0),
            ui_soc: gauge.ui_soc().await.unwrap_or(0),
            vbus_uv: charger.vbus().await.unwrap_or(0),
            battery_id_present: gauge.battery_id_present().await,
            charger_enabled: charger.is_enabled().await.unwrap_or(false),
            chg_done: charger.is_charging_done().await.unwrap_or(false),
            indpm: charger.indpm_state().await.unwrap_or_default(),
            min_charging_current: charger.minimum_charging_current().await.ok(),
            rp_current: port.remote_rp_current().await,
        }
    }

    /// Detect attach/detach edges and run their side effects.
    fn handle_plug_transition(&self, snapshot: &SensorSnapshot) {
        let mut ctx = self.context.borrow_mut();
        let mut algorithms = self.algorithms.borrow_mut();
        let cable_out = self.cable_out_cnt.swap(0, Ordering::Relaxed);

        if snapshot.charger_type == ctx.charger_type {
            if cable_out > 0 {
                trace!("coalesced {} cable-out glitches", cable_out);
            }
            return;
        }

        if !snapshot.charger_type.is_attached() {
            info!("plug out");
            ctx.plug_out();
            self.disconnected_at.set(Some(Instant::now()));
            self.charging_since.set(None);
            for algo in algorithms.iter_mut() {
                algo.notify(AlgoEvent::PlugOut);
            }
            return;
        }

        if ctx.charger_type.is_attached() {
            // Type re-detection without an observed unplug still starts a
            // fresh plug cycle.
            ctx.plug_out();
        }
        let disconnected_long_enough = match self.disconnected_at.get() {
            Some(at) => Instant::now() - at >= ctx.config.eoc.disconnect_reset,
            None => true,
        };
        info!("plug in: {:?}", snapshot.charger_type);
        ctx.plug_in(snapshot.charger_type, disconnected_long_enough);
        self.charging_since.set(Some(Instant::now()));
        for algo in algorithms.iter_mut() {
            algo.notify(AlgoEvent::PlugIn(snapshot.charger_type));
        }
    }

    /// Run the once-per-plug probes and the per-tick AICL refinement.
    /// Adapter measurements only make sense while basic charging owns the
    /// input path, so everything but the invalid-charger probe is skipped
    /// while a fast-charge plugin is available.
    async fn run_probes(&self, charger: &mut C, snapshot: &SensorSnapshot, fast_available: bool) {
        let (invalid_due, invalid_cfg) = {
            let ctx = self.context.borrow();
            (
                ctx.config.invalid_charger.enable
                    && !ctx.invalid_charger.done
                    && !ctx.charger_type.is_wireless(),
                ctx.config.invalid_charger,
            )
        };
        if invalid_due {
            let result = invalid::probe(charger, &invalid_cfg).await;
            let mut ctx = self.context.borrow_mut();
            ctx.invalid_charger.done = true;
            if let Ok(weak) = result {
                ctx.invalid_charger.weak = weak;
                if weak {
                    self.metrics.emit(MetricsEvent::InvalidCharger);
                    if ctx.set_notify(NotifyCode::INVALID_CHARGER, true) {
                        self.metrics.emit(MetricsEvent::NotifyCodeChanged(ctx.notify_code));
                    }
                }
            }
        }

        let (detect_due, detect_cfg, charger_type) = {
            let ctx = self.context.borrow();
            (
                ctx.config.power_detect.enable
                    && !ctx.power_detection.done
                    && !ctx.charger_type.is_wireless()
                    && !fast_available,
                ctx.config.power_detect,
                ctx.charger_type,
            )
        };
        if detect_due {
            let detection =
                power_detect::detect(charger, &self.metrics, charger_type, snapshot.rp_current, &detect_cfg)
                    .await;
            self.context.borrow_mut().power_detection = detection;
        }

        let aicl_due = {
            let ctx = self.context.borrow();
            !ctx.charger_type.is_wireless()
                && ctx.vbus_state == vbus::VbusState::Normal
                && !fast_available
        };
        if aicl_due {
            if let Ok(ua) = charger.run_aicl().await {
                self.context.borrow_mut().limits[0].aicl_result = Some(ua);
            }
        }
    }

    /// The pure protection pass over one snapshot.
    fn run_protections(&self, snapshot: &SensorSnapshot) {
        let mut ctx = self.context.borrow_mut();
        let mut code_changed = false;

        // VBUS window; recovery from UVLO invalidates cached AICL data.
        let (vbus_state, recovered) =
            vbus::evaluate(ctx.vbus_state, ctx.charger_type, snapshot.vbus_uv, &ctx.config);
        ctx.vbus_state = vbus_state;
        if recovered {
            ctx.limits[0].aicl_result = None;
        }
        // The OVP flag is sticky: nothing short of a new plug event clears
        // it. UVLO tracks the live rail so the recovery edge is visible.
        if vbus_state == vbus::VbusState::Ovp {
            code_changed |= ctx.set_notify(NotifyCode::VBUS_OVP, true);
        }
        code_changed |= ctx.set_notify(NotifyCode::VBUS_UVLO, vbus_state == vbus::VbusState::Uvlo);

        // Software safety timer, latched until the next plug cycle.
        if let Some(since) = self.charging_since.get() {
            if !ctx.safety_timeout && Instant::now() - since >= ctx.config.max_charging_time {
                error!("continuous charging safety timer expired");
                ctx.safety_timeout = true;
            }
        }
        let safety_timeout = ctx.safety_timeout;
        code_changed |= ctx.set_notify(NotifyCode::SAFETY_TIMEOUT, safety_timeout);

        // Exactly one temperature policy runs per tick.
        let (hot, cold) = if ctx.config.enable_sw_jeita {
            let cfg = ctx.config.jeita;
            ctx.jeita.evaluate(snapshot.temp_c, &cfg);
            (
                ctx.jeita.sm == crate::jeita::JeitaBand::AboveT4,
                ctx.jeita.sm == crate::jeita::JeitaBand::BelowT0,
            )
        } else {
            let cfg = ctx.config.thermal;
            ctx.thermal.evaluate(snapshot.temp_c, &cfg);
            (
                ctx.thermal.sm == crate::thermal::ThermalBand::High,
                ctx.thermal.sm == crate::thermal::ThermalBand::Low,
            )
        };
        code_changed |= ctx.set_notify(NotifyCode::BAT_HOT, hot);
        code_changed |= ctx.set_notify(NotifyCode::BAT_COLD, cold);

        // End-of-charge protection.
        let eoc_inputs = EocInputs {
            chg_done: snapshot.chg_done,
            soc: snapshot.soc,
            ui_soc: snapshot.ui_soc,
            cv_lowered: ctx.cv_lowered(),
        };
        let eoc_cfg = ctx.config.eoc;
        ctx.eoc_protect.evaluate(&eoc_inputs, &eoc_cfg);

        // Debounced DPM end-of-charge.
        let dpm_inputs = DpmInputs {
            ibat_ma: snapshot.ibat_ma,
            cv_uv: ctx.applied_cv,
            battery_cv_uv: ctx.config.battery_cv,
            input_limit_ua: ctx.limits[0].input_current_limit,
            charging_limit_ua: ctx.limits[0].charging_current_limit,
            charger_enabled: snapshot.charger_enabled,
            chg_done: snapshot.chg_done,
            vbat_mv: snapshot.vbat_mv,
            soc: snapshot.soc,
            indpm: snapshot.indpm,
        };
        let dpm_cfg = ctx.config.dpm;
        if ctx.dpm_eoc.evaluate(&dpm_inputs, &dpm_cfg) == DpmOutcome::Latched {
            self.metrics.emit(MetricsEvent::DpmEocEntered);
        }

        if code_changed {
            self.metrics.emit(MetricsEvent::NotifyCodeChanged(ctx.notify_code));
        }
    }

    /// Hand the adapter to the highest-priority usable plugin; stop the
    /// rest. Plugins above the permitted voltage ceiling are stopped when
    /// high-voltage charging is disabled.
    fn drive_fast_algorithms(&self, resolution: &Resolution) {
        let hv_enabled = self.context.borrow().hv_charging_enabled;
        let mut algorithms = self.algorithms.borrow_mut();
        let limits = AlgoLimits {
            input_ua: Some(resolution.input_current_ua),
            charging_ua: Some(resolution.charging_current_ua),
            cv_uv: resolution.cv_uv,
        };

        let mut owner_found = false;
        for algo in algorithms.iter_mut() {
            let usable = matches!(algo.state(), AlgoState::Ready | AlgoState::Running)
                && (hv_enabled || algo.max_vbus() <= HV_THRESHOLD_UV);
            if usable && !owner_found {
                owner_found = true;
                algo.set_limit(limits);
                if algo.state() == AlgoState::Ready {
                    if let Err(e) = algo.start() {
                        warn!("{}: failed to start ({:?})", algo.name(), e);
                        owner_found = false;
                    }
                }
            } else if algo.state() == AlgoState::Running {
                algo.stop();
            }
        }
    }

    fn stop_running_algorithms(&self) {
        for algo in self.algorithms.borrow_mut().iter_mut() {
            if algo.state() == AlgoState::Running {
                algo.stop();
            }
        }
    }

    async fn apply_resolution(&self, charger: &mut C, resolution: &Resolution) {
        let (topology, battery_cv) = {
            let ctx = self.context.borrow();
            (ctx.topology, ctx.config.battery_cv)
        };
        let split = split_for_topology(resolution, topology);

        let applied_input = match charger.set_input_current(split[0].0).await {
            Ok(ua) => ua,
            Err(ChargerError::NotSupported) => split[0].0,
            Err(e) => {
                warn!("set_input_current failed: {:?}", e);
                split[0].0
            }
        };
        let applied_charging = match charger.set_charging_current(split[0].1).await {
            Ok(ua) => ua,
            Err(ChargerError::NotSupported) => split[0].1,
            Err(e) => {
                warn!("set_charging_current failed: {:?}", e);
                split[0].1
            }
        };
        let cv = resolution.cv_uv.unwrap_or(battery_cv);
        let applied_cv = match charger.set_constant_voltage(cv).await {
            Ok(uv) => uv,
            Err(ChargerError::NotSupported) => cv,
            Err(e) => {
                warn!("set_constant_voltage failed: {:?}", e);
                cv
            }
        };

        let mut ctx = self.context.borrow_mut();
        ctx.limits[0].input_current_limit = applied_input;
        ctx.limits[0].charging_current_limit = applied_charging;
        ctx.limits[1].input_current_limit = split[1].0;
        ctx.limits[1].charging_current_limit = split[1].1;
        ctx.applied_cv = applied_cv;
        debug!(
            "applied iusb {}mA ichg {}mA cv {}mV basic {}",
            applied_input / 1000,
            applied_charging / 1000,
            applied_cv / 1000,
            resolution.is_basic
        );
    }

    /// One full evaluation pass, in the fixed order of the design.
    async fn tick(&self, charger: &mut C, gauge: &mut F, port: &mut P) {
        let snapshot = self.read_snapshot(charger, gauge, port).await;
        self.handle_plug_transition(&snapshot);

        if !self.context.borrow().charger_type.is_attached() {
            // Nothing attached: make sure the hardware is off and idle.
            if self.context.borrow().can_charging {
                let _ = charger.enable(false).await;
                self.context.borrow_mut().can_charging = false;
            }
            return;
        }

        // Dynamic MIVR, unless a negotiation plugin owns the bus voltage.
        let algo_running = self
            .algorithms
            .borrow()
            .iter()
            .any(|a| a.state() == AlgoState::Running);
        if !algo_running {
            let target = {
                let ctx = self.context.borrow();
                mivr::select_mivr(snapshot.vbat_mv, &ctx.config.mivr)
            };
            match charger.set_mivr(target).await {
                Ok(_) | Err(ChargerError::NotSupported) => {}
                Err(e) => warn!("set_mivr failed: {:?}", e),
            }
        }

        let fast_available = self.fast_algo_available();
        self.run_probes(charger, &snapshot, fast_available).await;
        self.run_protections(&snapshot);

        // Verdict and resolution.
        let permitted = self
            .context
            .borrow()
            .charging_permitted(snapshot.battery_id_present);
        let resolution = permitted.then(|| {
            let ctx = self.context.borrow();
            resolve_limits(
                &ctx,
                &ResolveInputs {
                    rp_current: snapshot.rp_current,
                    hw_min_charging_current: snapshot.min_charging_current,
                    fast_algo_available: fast_available,
                },
            )
        });

        // Zero resolved limits force-disable charging regardless of verdict.
        let can_charging = permitted
            && resolution
                .map(|r| r.input_current_ua > 0 && r.charging_current_ua > 0)
                .unwrap_or(false);

        let previous = self.context.borrow().can_charging;
        if can_charging != previous {
            info!("charging enabled: {} -> {}", previous, can_charging);
            if let Err(e) = charger.enable(can_charging).await {
                error!("charger enable({}) failed: {:?}", can_charging, e);
            }
        }
        self.context.borrow_mut().can_charging = can_charging;

        if !can_charging {
            // Reflect the not-charging CV in hardware immediately, without
            // waiting for a full resolver pass.
            let battery_cv = self.context.borrow().config.battery_cv;
            let _ = charger.set_constant_voltage(battery_cv).await;
            self.context.borrow_mut().applied_cv = battery_cv;
            self.stop_running_algorithms();
        } else if let Some(resolution) = resolution {
            if resolution.is_basic {
                self.stop_running_algorithms();
            } else {
                self.drive_fast_algorithms(&resolution);
            }
            self.apply_resolution(charger, &resolution).await;
        }

        charger.dump_registers().await;
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use super::*;
    use crate::algorithm::AlgorithmSet;
    use crate::config::ChargerConfig;
    use crate::testutil::{MockCharger, MockGauge, MockPort, RecordingMetrics};
    use charger_device::suspend::NoSuspend;
    use embassy_futures::block_on;
    use embassy_time::Duration;

    type TestService = ChargingService<MockCharger, MockGauge, MockPort, RecordingMetrics, NoSuspend>;

    /// Probe settle times shortened so a test tick is quick.
    fn fast_config() -> ChargerConfig {
        let mut cfg = ChargerConfig::default();
        cfg.invalid_charger.settle = Duration::from_millis(1);
        cfg.power_detect.settle = Duration::from_millis(1);
        cfg
    }

    fn basic_service(cfg: ChargerConfig, metrics: RecordingMetrics) -> TestService {
        ChargingService::with_algorithms(
            cfg,
            MockCharger::default(),
            MockGauge::default(),
            MockPort::default(),
            metrics,
            NoSuspend,
            AlgorithmSet::new(),
        )
    }

    fn run_tick(service: &TestService) {
        block_on(async {
            let mut charger = service.charger.borrow_mut();
            let mut gauge = service.gauge.borrow_mut();
            let mut port = service.port.borrow_mut();
            service.tick(&mut charger, &mut gauge, &mut port).await;
        });
    }

    #[test]
    fn commands_mutate_context() {
        let service = basic_service(fast_config(), RecordingMetrics::default());

        service.handle_command(ChargerCommand::EnableHvCharging(false));
        assert!(!service.with_context(|c| c.hv_charging_enabled));

        service.handle_command(ChargerCommand::SetForceChargingCurrent {
            channel: 0,
            limit: Some(1_000_000),
        });
        assert_eq!(
            service.with_context(|c| c.limits[0].force_charging_limit),
            Some(1_000_000)
        );

        // Out-of-range channels are ignored.
        service.handle_command(ChargerCommand::SetThermalInputLimit {
            channel: 7,
            limit: Some(1),
        });

        service.handle_command(ChargerCommand::ForceDischarge(true));
        assert!(service.with_context(|c| c.discharge_override));
    }

    #[test]
    fn top_off_toggle_emits_metric_once() {
        let metrics = RecordingMetrics::default();
        let service = basic_service(fast_config(), metrics.clone());

        service.handle_command(ChargerCommand::EnableTopOff(true));
        service.handle_command(ChargerCommand::EnableTopOff(true));
        service.handle_command(ChargerCommand::EnableTopOff(false));

        let toggles: std::vec::Vec<_> = metrics
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, MetricsEvent::TopOffMode(_)))
            .copied()
            .collect();
        assert_eq!(
            toggles,
            [MetricsEvent::TopOffMode(true), MetricsEvent::TopOffMode(false)]
        );
    }

    #[test]
    fn pd_notifications_update_contract_state() {
        let service = basic_service(fast_config(), RecordingMetrics::default());

        service.handle_pd_notification(PdNotification::TypeCOnly);
        assert_eq!(service.with_context(|c| c.pd_type), PdType::TypecOnly);

        service.handle_pd_notification(PdNotification::WaterDetected);
        assert!(service.with_context(|c| c.water_detected));

        service.handle_pd_notification(PdNotification::PlugOut);
        assert_eq!(service.with_context(|c| c.pd_type), PdType::None);
        assert_eq!(service.cable_out_cnt.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dcp_plug_in_end_to_end() {
        let mut cfg = fast_config();
        cfg.power_detect.aicl_9w_min_ua = 1_500_000;
        cfg.power_detect.aicl_12w_min_ua = 2_000_000;
        let metrics = RecordingMetrics::default();
        let service = basic_service(cfg, metrics.clone());

        service.charger.borrow().aicl.set(Some(1_800_000));
        service.port.borrow().charger_type.set(ChargerType::Dcp);

        run_tick(&service);

        assert!(service.with_context(|c| c.can_charging));
        assert_eq!(service.with_context(|c| c.charger_type), ChargerType::Dcp);
        assert_eq!(
            service.with_context(|c| c.power_detection.category),
            charger_device::types::AdapterPowerCategory::W9
        );
        // The 9W tier limit capped the DCP default input current.
        assert_eq!(service.with_context(|c| c.limits[0].input_current_limit), 1_800_000);
        {
            let charger = service.charger.borrow();
            assert!(charger.enabled.get());
            assert_eq!(charger.input_ua.get(), 1_800_000);
        }
        assert_eq!(metrics.adapter_power_events(), 1);

        // Detection is once per plug cycle: a second tick adds nothing.
        run_tick(&service);
        assert_eq!(metrics.adapter_power_events(), 1);
    }

    #[test]
    fn plug_out_restores_defaults() {
        let service = basic_service(fast_config(), RecordingMetrics::default());
        service.charger.borrow().aicl.set(Some(2_500_000));
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        run_tick(&service);
        assert!(service.with_context(|c| c.can_charging));
        assert!(service.with_context(|c| c.invalid_charger.done));

        service.notify_cable_out();
        service.port.borrow().charger_type.set(ChargerType::Unknown);
        run_tick(&service);

        assert!(!service.with_context(|c| c.can_charging));
        assert!(!service.charger.borrow().enabled.get());
        assert!(!service.with_context(|c| c.invalid_charger.done));
        assert_eq!(
            service.with_context(|c| c.limits[0].input_current_limit),
            crate::context::DEFAULT_INPUT_CURRENT_UA
        );
        assert_eq!(service.cable_out_cnt.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn fast_algorithm_takes_over_on_dcp() {
        let metrics = RecordingMetrics::default();
        let service = ChargingService::new(
            fast_config(),
            MockCharger::default(),
            MockGauge::default(),
            MockPort::default(),
            metrics.clone(),
            NoSuspend,
        );
        service.port.borrow().charger_type.set(ChargerType::Dcp);

        run_tick(&service);

        // PE 4.0 leads the rotation and owns the adapter.
        {
            let algorithms = service.algorithms.borrow();
            let running: std::vec::Vec<_> = algorithms
                .iter()
                .filter(|a| a.state() == AlgoState::Running)
                .map(|a| a.name())
                .collect();
            assert_eq!(running, ["pe4"]);
        }
        // No basic-mode refinements ran.
        assert_eq!(metrics.adapter_power_events(), 0);
        assert_eq!(service.charger.borrow().aicl_runs.get(), 0);
        assert_eq!(
            service.with_context(|c| c.limits[0].input_current_limit),
            service.with_context(|c| c.config.ac_input_current)
        );
    }

    #[test]
    fn disabling_hv_charging_stops_the_running_plugin() {
        let service = ChargingService::new(
            fast_config(),
            MockCharger::default(),
            MockGauge::default(),
            MockPort::default(),
            RecordingMetrics::default(),
            NoSuspend,
        );
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        run_tick(&service);
        assert!(service
            .algorithms
            .borrow()
            .iter()
            .any(|a| a.state() == AlgoState::Running));

        service.handle_command(ChargerCommand::EnableHvCharging(false));
        run_tick(&service);

        assert!(service
            .algorithms
            .borrow()
            .iter()
            .all(|a| a.state() != AlgoState::Running));
    }

    #[test]
    fn hot_battery_inhibits_charging() {
        let service = basic_service(fast_config(), RecordingMetrics::default());
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        service.gauge.borrow().temp_dc.set(Some(600));

        run_tick(&service);

        assert!(!service.with_context(|c| c.can_charging));
        assert!(!service.charger.borrow().enabled.get());
        assert!(service.with_context(|c| c.notify_code.contains(NotifyCode::BAT_HOT)));
    }

    #[test]
    fn dead_temperature_sense_fails_safe() {
        let service = basic_service(fast_config(), RecordingMetrics::default());
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        service.gauge.borrow().temp_dc.set(None);

        run_tick(&service);

        assert!(!service.with_context(|c| c.can_charging));
        assert!(service.with_context(|c| c.notify_code.contains(NotifyCode::BAT_COLD)));
    }

    #[test]
    fn weak_charger_latches_and_inhibits() {
        let metrics = RecordingMetrics::default();
        let service = basic_service(fast_config(), metrics.clone());
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        service.charger.borrow().indpm.set(charger_device::charger::IndpmState {
            vdpm: true,
            idpm: false,
        });

        run_tick(&service);

        assert!(service.with_context(|c| c.invalid_charger.weak));
        assert!(!service.with_context(|c| c.can_charging));
        assert!(service.with_context(|c| c.notify_code.contains(NotifyCode::INVALID_CHARGER)));
        assert!(metrics
            .events
            .borrow()
            .iter()
            .any(|e| matches!(e, MetricsEvent::InvalidCharger)));
    }

    #[test]
    fn disabled_charging_reflects_default_cv() {
        let service = basic_service(fast_config(), RecordingMetrics::default());
        service.port.borrow().charger_type.set(ChargerType::Dcp);
        run_tick(&service);
        assert!(service.with_context(|c| c.can_charging));

        service.handle_command(ChargerCommand::EnableCharging(false));
        run_tick(&service);

        assert!(!service.with_context(|c| c.can_charging));
        assert!(!service.charger.borrow().enabled.get());
        assert_eq!(
            service.charger.borrow().cv_uv.get(),
            service.with_context(|c| c.config.battery_cv)
        );
    }
}
