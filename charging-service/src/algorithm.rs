//! Fast-charge algorithm plugins.
//!
//! Each negotiation protocol (PE, PE 2.0, PE 4.0, PD) is modeled as a small
//! lifecycle state machine behind a common trait; the negotiation stacks
//! themselves are external collaborators. The service walks a fixed
//! priority-ordered list and hands the bus to the first plugin that reports
//! itself usable.

use charger_device::info;
use charger_device::types::{ChargerType, MicroAmps, MicroVolts, PdType};

use heapless::Vec;

/// Plugin lifecycle state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlgoState {
    /// Preconditions not met (wrong charger type, no contract)
    #[default]
    NotReady,
    /// Preconditions met, not yet started
    Ready,
    /// Negotiation owned by this plugin
    Running,
    /// Negotiation finished for this plug cycle
    Done,
    /// Initialization failed; plugin stays out of rotation
    InitFail,
}

/// Plugin error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlgoError {
    /// `start` called while not in the ready state
    NotReady,
}

/// Events fanned out to every plugin from the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlgoEvent {
    /// Cable attached with the detected type
    PlugIn(ChargerType),
    /// Cable removed
    PlugOut,
    /// PD contract level changed
    PdReady(PdType),
    /// PD hard reset observed
    HardReset,
}

/// Current/voltage ceilings pushed down to a running plugin
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlgoLimits {
    /// Input current ceiling
    pub input_ua: Option<MicroAmps>,
    /// Charge current ceiling
    pub charging_ua: Option<MicroAmps>,
    /// CV ceiling
    pub cv_uv: Option<MicroVolts>,
}

/// Common capability interface for fast-charge plugins.
pub trait ChargeAlgorithm {
    /// Plugin name for logging
    fn name(&self) -> &'static str;
    /// Current lifecycle state
    fn state(&self) -> AlgoState;
    /// Highest bus voltage this plugin may negotiate
    fn max_vbus(&self) -> MicroVolts;
    /// Deliver a plug/contract event
    fn notify(&mut self, event: AlgoEvent);
    /// Push limit ceilings down to the plugin
    fn set_limit(&mut self, limits: AlgoLimits);
    /// Take ownership of negotiation
    fn start(&mut self) -> Result<(), AlgoError>;
    /// Stop negotiation and fall back to 5V
    fn stop(&mut self);
}

/// Shared lifecycle plumbing for the concrete plugins below
#[derive(Debug, Default, Clone, Copy)]
struct PluginCore {
    state: AlgoState,
    limits: AlgoLimits,
}

impl PluginCore {
    fn start(&mut self, name: &'static str) -> Result<(), AlgoError> {
        match self.state {
            AlgoState::Ready => {
                info!(
                    "{}: start (ichg ceiling {:?}uA, cv ceiling {:?}uV)",
                    name, self.limits.charging_ua, self.limits.cv_uv
                );
                self.state = AlgoState::Running;
                Ok(())
            }
            AlgoState::Running => Ok(()),
            _ => Err(AlgoError::NotReady),
        }
    }

    fn stop(&mut self, name: &'static str) {
        if self.state == AlgoState::Running {
            info!("{}: stop", name);
            self.state = AlgoState::Ready;
        }
    }

    fn set_ready(&mut self, ready: bool) {
        // InitFail is terminal for the plug cycle.
        if self.state == AlgoState::InitFail {
            return;
        }
        if ready {
            if self.state == AlgoState::NotReady {
                self.state = AlgoState::Ready;
            }
        } else {
            self.state = AlgoState::NotReady;
        }
    }
}

/// Pump Express family plugin: usable on a dedicated charging port.
/// `PE` negotiates up to 7V, `PE 2.0` to 9V, `PE 4.0` to 11V.
pub struct PumpExpress {
    name: &'static str,
    max_vbus: MicroVolts,
    core: PluginCore,
}

impl PumpExpress {
    /// First-generation Pump Express
    pub fn pe() -> Self {
        Self {
            name: "pe",
            max_vbus: 7_000_000,
            core: PluginCore::default(),
        }
    }

    /// Pump Express 2.0
    pub fn pe2() -> Self {
        Self {
            name: "pe2",
            max_vbus: 9_000_000,
            core: PluginCore::default(),
        }
    }

    /// Pump Express 4.0
    pub fn pe4() -> Self {
        Self {
            name: "pe4",
            max_vbus: 11_000_000,
            core: PluginCore::default(),
        }
    }
}

impl ChargeAlgorithm for PumpExpress {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> AlgoState {
        self.core.state
    }

    fn max_vbus(&self) -> MicroVolts {
        self.max_vbus
    }

    fn notify(&mut self, event: AlgoEvent) {
        match event {
            AlgoEvent::PlugIn(t) => self.core.set_ready(t == ChargerType::Dcp),
            AlgoEvent::PlugOut | AlgoEvent::HardReset => self.core.set_ready(false),
            // A PD-capable source answers PD, not Pump Express.
            AlgoEvent::PdReady(pd) => {
                if pd != PdType::None && pd != PdType::TypecOnly {
                    self.core.set_ready(false);
                }
            }
        }
    }

    fn set_limit(&mut self, limits: AlgoLimits) {
        self.core.limits = limits;
    }

    fn start(&mut self) -> Result<(), AlgoError> {
        self.core.start(self.name)
    }

    fn stop(&mut self) {
        self.core.stop(self.name)
    }
}

/// USB PD plugin: usable once any PD contract is established.
pub struct PdAlgorithm {
    core: PluginCore,
}

impl PdAlgorithm {
    /// PD fixed/PPS negotiation
    pub fn new() -> Self {
        Self {
            core: PluginCore::default(),
        }
    }
}

impl Default for PdAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargeAlgorithm for PdAlgorithm {
    fn name(&self) -> &'static str {
        "pd"
    }

    fn state(&self) -> AlgoState {
        self.core.state
    }

    fn max_vbus(&self) -> MicroVolts {
        9_000_000
    }

    fn notify(&mut self, event: AlgoEvent) {
        match event {
            AlgoEvent::PdReady(PdType::Fixed | PdType::Pd30 | PdType::Apdo) => self.core.set_ready(true),
            AlgoEvent::PdReady(_) | AlgoEvent::PlugOut => self.core.set_ready(false),
            AlgoEvent::HardReset => self.core.set_ready(false),
            AlgoEvent::PlugIn(_) => {}
        }
    }

    fn set_limit(&mut self, limits: AlgoLimits) {
        self.core.limits = limits;
    }

    fn start(&mut self) -> Result<(), AlgoError> {
        self.core.start("pd")
    }

    fn stop(&mut self) {
        self.core.stop("pd")
    }
}

/// Closed set of supported plugins, dispatched by explicit match.
pub enum Algorithm {
    /// Pump Express family member
    PumpExpress(PumpExpress),
    /// USB PD
    Pd(PdAlgorithm),
}

impl ChargeAlgorithm for Algorithm {
    fn name(&self) -> &'static str {
        match self {
            Algorithm::PumpExpress(a) => a.name(),
            Algorithm::Pd(a) => a.name(),
        }
    }

    fn state(&self) -> AlgoState {
        match self {
            Algorithm::PumpExpress(a) => a.state(),
            Algorithm::Pd(a) => a.state(),
        }
    }

    fn max_vbus(&self) -> MicroVolts {
        match self {
            Algorithm::PumpExpress(a) => a.max_vbus(),
            Algorithm::Pd(a) => a.max_vbus(),
        }
    }

    fn notify(&mut self, event: AlgoEvent) {
        match self {
            Algorithm::PumpExpress(a) => a.notify(event),
            Algorithm::Pd(a) => a.notify(event),
        }
    }

    fn set_limit(&mut self, limits: AlgoLimits) {
        match self {
            Algorithm::PumpExpress(a) => a.set_limit(limits),
            Algorithm::Pd(a) => a.set_limit(limits),
        }
    }

    fn start(&mut self) -> Result<(), AlgoError> {
        match self {
            Algorithm::PumpExpress(a) => a.start(),
            Algorithm::Pd(a) => a.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            Algorithm::PumpExpress(a) => a.stop(),
            Algorithm::Pd(a) => a.stop(),
        }
    }
}

/// Most plugins a build carries
pub const MAX_ALGORITHMS: usize = 4;

/// Priority-ordered plugin list
pub type AlgorithmSet = Vec<Algorithm, MAX_ALGORITHMS>;

/// The standard rotation: PE 4.0 > PD > PE 2.0 > PE.
pub fn standard_set() -> AlgorithmSet {
    let mut set = AlgorithmSet::new();
    // Capacity matches the number of pushes.
    let _ = set.push(Algorithm::PumpExpress(PumpExpress::pe4()));
    let _ = set.push(Algorithm::Pd(PdAlgorithm::new()));
    let _ = set.push(Algorithm::PumpExpress(PumpExpress::pe2()));
    let _ = set.push(Algorithm::PumpExpress(PumpExpress::pe()));
    set
}
