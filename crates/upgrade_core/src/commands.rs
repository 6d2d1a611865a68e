//! Player command surface for a device: select, cancel, eject. Each command
//! runs to completion synchronously and either applies fully or is rejected
//! with a reason and no state change.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::eligibility::{upgrade_options, UpgradeOption};
use crate::host::{DeviceHost, Pawn, ResearchGate, SimHost};
use crate::process::interrupt;
use crate::{
    AbilityId, Command, CommandEnvelope, DeviceState, Event, EventEnvelope, InterruptReason,
    Rejection, Selection, UpgradeGraph,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    CancelUpgrade,
    UpgradeAbility,
    EjectOccupant,
}

/// A command the device currently offers, with its menu when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOption {
    pub kind: CommandKind,
    /// Set when the command is shown but cannot be used.
    pub disabled: Option<Rejection>,
    pub menu: Vec<UpgradeOption>,
}

pub(crate) fn apply_commands(
    state: &mut DeviceState,
    commands: &[CommandEnvelope],
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = host.current_tick();

    for envelope in commands {
        if envelope.execute_at_tick != current_tick {
            continue;
        }
        let result = match &envelope.command {
            Command::SelectUpgrade {
                ability,
                edge_index,
            } => select_upgrade(state, ability, *edge_index, &*device, &*host, graph, events),
            Command::CancelUpgrade => cancel_upgrade(state, device, host, graph, rng, events),
            Command::EjectOccupant => eject_occupant(state, device, host, graph, rng, events),
        };
        if let Err(reason) = result {
            tracing::debug!(command = %envelope.id, %reason, "command rejected");
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::CommandRejected {
                    command_id: envelope.id.clone(),
                    reason: reason.to_string(),
                },
            ));
        }
    }
}

/// Record the occupant's choice of upgrade. The process starts on a later
/// evaluation once the fuel pool covers the cost.
pub fn select_upgrade(
    state: &mut DeviceState,
    ability: &AbilityId,
    edge_index: usize,
    device: &impl DeviceHost,
    host: &impl SimHost,
    graph: &UpgradeGraph,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    let pawn = device.occupant().ok_or(Rejection::NoOccupant)?;
    let edge = state
        .process
        .validate_selection(ability, edge_index, pawn, graph, host)?;

    state.process.selection = Some(Selection {
        source: ability.clone(),
        edge_index,
    });
    events.push(crate::emit(
        &mut state.counters,
        host.current_tick(),
        Event::UpgradeSelected {
            device_id: state.id.clone(),
            pawn_id: pawn.id().clone(),
            from: edge.source.clone(),
            to: edge.target.clone(),
        },
    ));
    Ok(())
}

pub fn cancel_upgrade(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    if state.process.selection.is_none() && !state.process.is_active() {
        return Err(Rejection::NothingToCancel);
    }
    interrupt(state, InterruptReason::Cancelled, device, host, graph, rng, events);
    Ok(())
}

/// Interrupt whatever is running, then release the occupant.
pub fn eject_occupant(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    let pawn_id = device
        .occupant()
        .map(|pawn| pawn.id().clone())
        .ok_or(Rejection::NoOccupant)?;
    interrupt(state, InterruptReason::Ejected, device, host, graph, rng, events);
    device.eject_occupant();
    events.push(crate::emit(
        &mut state.counters,
        host.current_tick(),
        Event::OccupantEjected {
            device_id: state.id.clone(),
            pawn_id,
        },
    ));
    Ok(())
}

/// Commands to show for the device right now, in display order.
pub fn available_commands(
    state: &DeviceState,
    device: &impl DeviceHost,
    research: &impl ResearchGate,
    graph: &UpgradeGraph,
) -> Vec<CommandOption> {
    let mut options = Vec::new();
    let occupant = device.occupant();

    if state.process.selection.is_some() {
        options.push(CommandOption {
            kind: CommandKind::CancelUpgrade,
            disabled: None,
            menu: Vec::new(),
        });
    } else if let Some(pawn) = occupant {
        let menu = upgrade_options(pawn, graph, research);
        let disabled = menu
            .is_empty()
            .then(|| Rejection::NoAbilitiesToUpgrade(pawn.id().clone()));
        options.push(CommandOption {
            kind: CommandKind::UpgradeAbility,
            disabled,
            menu,
        });
    }

    if occupant.is_some() {
        options.push(CommandOption {
            kind: CommandKind::EjectOccupant,
            disabled: None,
            menu: Vec::new(),
        });
    }
    options
}

/// One-line inspector text for the device, if there is anything to say.
pub fn status_line(
    state: &DeviceState,
    device: &impl DeviceHost,
    now: u64,
    graph: &UpgradeGraph,
) -> Option<String> {
    let process = &state.process;
    if let Some(progress) = process.progress(now, graph) {
        return Some(format!("Upgrade progress: {:.0}%", progress * 100.0));
    }
    let edge = process.selected_edge(graph)?;
    let queued = format!(
        "Upgrade queued: {} -> {}",
        graph.label(&edge.source),
        graph.label(&edge.target)
    );
    Some(match process.pending_reason(device, graph) {
        Some(reason) => format!("{queued} ({reason})"),
        None => queued,
    })
}
