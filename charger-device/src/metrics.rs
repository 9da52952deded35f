//! Fire-and-forget metrics sink contract.

use crate::notify::NotifyCode;
use crate::types::{AdapterPowerCategory, MilliAmps};

/// Events emitted by the charging service.
///
/// Currents are already converted to milliamps here; the metrics boundary is
/// the one place micro-units are scaled down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetricsEvent {
    /// Adapter power detection completed
    AdapterPower {
        /// Detected capability tier
        category: AdapterPowerCategory,
        /// Measured AICL result, if the probe ran
        aicl_ma: Option<MilliAmps>,
    },
    /// A charger fault condition latched or cleared
    NotifyCodeChanged(NotifyCode),
    /// The debounced input-power-limited end-of-charge state latched
    DpmEocEntered,
    /// Top-off voltage mode entered or left
    TopOffMode(bool),
    /// Weak or invalid adapter detected
    InvalidCharger,
}

/// Sink for service events. Implementations must not block; the service
/// never waits on the sink.
pub trait MetricsSink {
    /// Emit one event
    fn emit(&self, event: MetricsEvent);
}

/// Sink that drops every event
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn emit(&self, _event: MetricsEvent) {}
}
