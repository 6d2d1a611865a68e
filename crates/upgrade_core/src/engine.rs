use rand::Rng;

use crate::commands::apply_commands;
use crate::host::{DeviceHost, SimHost};
use crate::process::{advance_process, on_device_destroyed};
use crate::{CommandEnvelope, DeviceState, EventEnvelope, UpgradeGraph};

/// Advance one device by one tick.
///
/// Order of operations:
/// 1. Apply commands scheduled for the host's current tick.
/// 2. Evaluate the upgrade process (start, complete or interrupt).
///
/// The tick counter belongs to the host and is not advanced here.
/// Returns all events produced this tick.
pub fn tick(
    state: &mut DeviceState,
    commands: &[CommandEnvelope],
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    apply_commands(state, commands, device, host, graph, rng, &mut events);
    advance_process(state, device, host, graph, rng, &mut events);

    events
}

/// Run the device's teardown: any active upgrade is interrupted first.
pub fn destroy(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    on_device_destroyed(state, device, host, graph, rng, &mut events);
    events
}
