//! The per-device upgrade state machine.
//!
//! `NotStarted` with a selection waits for fuel; once the pool covers the
//! edge cost the cost is deducted and the process goes `Active` until
//! `finish_tick`. Completion swaps the ability and ejects the pawn.
//! Interruption refunds, penalizes, and leaves the pawn inside.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::eligibility::{has_descendant, is_upgradable};
use crate::host::{DeviceHost, Pawn, ResearchGate, SimHost};
use crate::{
    AbilityId, ClearReason, DeviceState, Event, EventEnvelope, InterruptReason, Refund,
    Rejection, Selection, UpgradeEdge, UpgradeGraph, UpgradeProcess, UpgradeStage,
};

impl UpgradeProcess {
    pub fn is_active(&self) -> bool {
        self.stage == UpgradeStage::Active
    }

    /// The edge the selection points at, if it still resolves.
    pub fn selected_edge<'g>(&self, graph: &'g UpgradeGraph) -> Option<&'g UpgradeEdge> {
        let selection = self.selection.as_ref()?;
        graph.edge(&selection.source, selection.edge_index)
    }

    /// Fraction of the running upgrade that has elapsed, clamped to `[0, 1]`.
    /// `None` unless the process is active and its edge resolves.
    pub fn progress(&self, now: u64, graph: &UpgradeGraph) -> Option<f32> {
        if !self.is_active() {
            return None;
        }
        let edge = self.selected_edge(graph)?;
        if edge.duration == 0 {
            return Some(1.0);
        }
        let remaining = self.finish_tick.saturating_sub(now);
        let elapsed = edge.duration.saturating_sub(remaining);
        Some(elapsed as f32 / edge.duration as f32)
    }

    /// Checks a candidate selection without changing anything.
    pub fn validate_selection<'g>(
        &self,
        source: &AbilityId,
        edge_index: usize,
        pawn: &impl Pawn,
        graph: &'g UpgradeGraph,
        research: &impl ResearchGate,
    ) -> Result<&'g UpgradeEdge, Rejection> {
        if self.is_active() {
            return Err(Rejection::ProcessActive);
        }
        if self.selection.is_some() {
            return Err(Rejection::SelectionPending);
        }
        if !pawn.has_ability(source) {
            return Err(Rejection::AbilityNotHeld(source.clone()));
        }
        let edge = graph
            .edge(source, edge_index)
            .ok_or_else(|| Rejection::UnknownUpgrade {
                ability: source.clone(),
                index: edge_index,
            })?;
        if !is_upgradable(source, pawn, graph) {
            return Err(Rejection::NotUpgradable(source.clone()));
        }
        if let Some(tech) = &edge.prerequisite {
            if !research.is_finished(tech) {
                return Err(Rejection::PrerequisiteNotMet(tech.clone()));
            }
        }
        if has_descendant(&edge.target, pawn, graph) {
            return Err(Rejection::AlreadyUpgraded(edge.target.clone()));
        }
        Ok(edge)
    }

    /// Why a pending selection has not started yet, for display.
    pub fn pending_reason(
        &self,
        device: &impl DeviceHost,
        graph: &UpgradeGraph,
    ) -> Option<Rejection> {
        if self.is_active() {
            return None;
        }
        let edge = self.selected_edge(graph)?;
        if device.occupant().is_none() {
            return Some(Rejection::NoOccupant);
        }
        let available = device.resource_available();
        (available < edge.cost).then_some(Rejection::InsufficientResource {
            needed: edge.cost,
            available,
        })
    }

    /// Re-resolve persisted state against the current graph. A selection that
    /// no longer resolves is dropped, and an active process without a valid
    /// selection falls back to `NotStarted`.
    #[must_use]
    pub fn restore(mut self, graph: &UpgradeGraph) -> Self {
        if let Some(selection) = &self.selection {
            if graph.edge(&selection.source, selection.edge_index).is_none() {
                tracing::warn!(
                    source = %selection.source,
                    edge_index = selection.edge_index,
                    "saved upgrade selection no longer resolves; clearing"
                );
                self.selection = None;
            }
        }
        if self.selection.is_none() {
            self.stage = UpgradeStage::NotStarted;
            self.finish_tick = 0;
        }
        self
    }
}

/// Per-tick evaluation. Starts a pending upgrade once fuel allows, completes
/// an active one at its deadline, and interrupts it on power or occupant loss.
pub fn advance_process(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    match state.process.stage {
        UpgradeStage::NotStarted => try_start(state, device, &*host, graph, events),
        UpgradeStage::Active => advance_active(state, device, host, graph, rng, events),
    }
}

fn try_start(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &impl SimHost,
    graph: &UpgradeGraph,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(selection) = state.process.selection.clone() else {
        return;
    };
    let now = host.current_tick();

    let Some(edge) = graph.edge(&selection.source, selection.edge_index) else {
        clear_selection(state, selection, ClearReason::Stale, now, events);
        return;
    };
    if !device
        .occupant()
        .is_some_and(|pawn| pawn.has_ability(&selection.source))
    {
        clear_selection(state, selection, ClearReason::OccupantChanged, now, events);
        return;
    }
    if device.resource_available() < edge.cost {
        return;
    }

    device.consume_resource(edge.cost);
    state.process.stage = UpgradeStage::Active;
    state.process.finish_tick = now.saturating_add(edge.duration);
    tracing::debug!(
        device = %state.id,
        from = %edge.source,
        to = %edge.target,
        finish_tick = state.process.finish_tick,
        "upgrade started"
    );
    events.push(crate::emit(
        &mut state.counters,
        now,
        Event::UpgradeStarted {
            device_id: state.id.clone(),
            from: edge.source.clone(),
            to: edge.target.clone(),
            cost: edge.cost,
            finish_tick: state.process.finish_tick,
        },
    ));
}

fn advance_active(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let now = host.current_tick();
    let Some(edge) = state.process.selected_edge(graph) else {
        interrupt(state, InterruptReason::StaleSelection, device, host, graph, rng, events);
        return;
    };

    if device.occupant().is_none() {
        interrupt(state, InterruptReason::OccupantLost, device, host, graph, rng, events);
    } else if now >= state.process.finish_tick {
        complete(state, edge, device, now, events);
    } else if !device.has_power() {
        interrupt(state, InterruptReason::PowerLost, device, host, graph, rng, events);
    }
}

fn complete(
    state: &mut DeviceState,
    edge: &UpgradeEdge,
    device: &mut impl DeviceHost,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(pawn) = device.occupant_mut() else {
        return;
    };
    let pawn_id = pawn.id().clone();
    pawn.remove_ability(&edge.source);
    pawn.grant_ability(edge.target.clone());
    device.eject_occupant();

    state.process.stage = UpgradeStage::NotStarted;
    state.process.selection = None;
    tracing::debug!(
        device = %state.id,
        pawn = %pawn_id,
        from = %edge.source,
        to = %edge.target,
        "upgrade completed"
    );

    events.push(crate::emit(
        &mut state.counters,
        now,
        Event::UpgradeCompleted {
            device_id: state.id.clone(),
            pawn_id: pawn_id.clone(),
            from: edge.source.clone(),
            to: edge.target.clone(),
        },
    ));
    events.push(crate::emit(
        &mut state.counters,
        now,
        Event::OccupantEjected {
            device_id: state.id.clone(),
            pawn_id,
        },
    ));
}

/// Abort the process. An active upgrade materializes its refund at the
/// device and applies its penalty to the occupant; the selection is always
/// cleared. The occupant stays inside.
pub fn interrupt(
    state: &mut DeviceState,
    reason: InterruptReason,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    if state.process.is_active() {
        let now = host.current_tick();
        let mut refund = None;
        let mut penalty = None;

        if let Some(edge) = state.process.selected_edge(graph) {
            if let Some(quantity) = edge.refund_if_interrupted {
                if let Some(kind) = graph.refund_kinds().choose(rng) {
                    host.spawn_resource(kind, quantity, device.position());
                    refund = Some(Refund {
                        kind: kind.clone(),
                        quantity,
                    });
                } else {
                    tracing::warn!(quantity, "no refund kinds defined; refund dropped");
                }
            }
            if let Some(def) = &edge.interrupt_penalty {
                if let Some(pawn) = device.occupant_mut() {
                    pawn.adjust_penalty(&def.kind, def.severity);
                    penalty = Some(def.clone());
                }
            }
        }

        state.process.stage = UpgradeStage::NotStarted;
        tracing::debug!(device = %state.id, ?reason, "upgrade interrupted");
        events.push(crate::emit(
            &mut state.counters,
            now,
            Event::UpgradeInterrupted {
                device_id: state.id.clone(),
                reason,
                refund,
                penalty,
            },
        ));
    }
    state.process.selection = None;
}

/// Teardown hook: an active upgrade is interrupted before the device goes away.
pub fn on_device_destroyed(
    state: &mut DeviceState,
    device: &mut impl DeviceHost,
    host: &mut impl SimHost,
    graph: &UpgradeGraph,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    interrupt(state, InterruptReason::Destroyed, device, host, graph, rng, events);
}

fn clear_selection(
    state: &mut DeviceState,
    selection: Selection,
    reason: ClearReason,
    now: u64,
    events: &mut Vec<EventEnvelope>,
) {
    tracing::debug!(
        device = %state.id,
        source = %selection.source,
        edge_index = selection.edge_index,
        ?reason,
        "clearing upgrade selection"
    );
    state.process.selection = None;
    events.push(crate::emit(
        &mut state.counters,
        now,
        Event::SelectionCleared {
            device_id: state.id.clone(),
            source: selection.source,
            edge_index: selection.edge_index,
            reason,
        },
    ));
}
