//! `upgrade_core`: ability upgrade graph and the per-device upgrade process.
//!
//! No IO. Pawns, devices, research and the world are reached through the
//! traits in [`host`]; randomness comes from the passed-in Rng.

pub mod commands;
mod engine;
mod error;
pub mod eligibility;
mod graph;
pub mod host;
pub mod process;
mod types;

pub use commands::{
    available_commands, cancel_upgrade, eject_occupant, select_upgrade, status_line,
    CommandKind, CommandOption,
};
pub use eligibility::{
    check_can_gain, has_descendant, upgradable_abilities, upgrade_options, UpgradeOption,
};
pub use engine::{destroy, tick};
pub use error::Rejection;
pub use graph::UpgradeGraph;
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

#[cfg(test)]
mod tests;
