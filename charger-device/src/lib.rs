//! Hardware capability contracts for the battery charging control service.
//!
//! Everything the charging policy needs from the platform is expressed here
//! as a small set of traits: the charger IC ([`charger::ChargerController`]),
//! the fuel gauge ([`gauge::FuelGauge`]), the Type-C/PD port
//! ([`port::ChargerPort`]), a fire-and-forget metrics sink
//! ([`metrics::MetricsSink`]) and a suspend blocker
//! ([`suspend::SuspendBlocker`]). The policy crate is generic over these, so
//! real drivers and test mocks plug in the same way.

#![no_std]
#![warn(missing_docs)]

pub mod charger;
pub mod fmt;
pub mod gauge;
pub mod metrics;
pub mod notify;
pub mod port;
pub mod types;
pub mod suspend;
