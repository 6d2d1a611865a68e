//! Type definitions for `upgrade_core`.
//!
//! Content definitions, per-device state, commands and events.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(AbilityId);
string_id!(TechId);
string_id!(PawnId);
string_id!(DeviceId);
string_id!(ResourceKindId);
string_id!(PenaltyKindId);
string_id!(CommandId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Everything loaded from data at startup. Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeContent {
    pub content_version: String,
    pub abilities: Vec<AbilityDef>,
    /// Resource kinds an interruption refund may materialize as.
    pub refund_kinds: Vec<ResourceKindId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: AbilityId,
    pub label: String,
    /// Exists only as an upgrade target; never granted on its own.
    #[serde(default)]
    pub upgrade_only: bool,
    #[serde(default)]
    pub upgrades_to: Vec<UpgradeEdgeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeEdgeDef {
    pub ability: AbilityId,
    pub upgrade_cost: u32,
    pub upgrade_time: u64,
    #[serde(default)]
    pub refund_if_interrupted: Option<u32>,
    #[serde(default)]
    pub interrupt_penalty: Option<PenaltyDef>,
    #[serde(default)]
    pub prerequisite: Option<TechId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyDef {
    pub kind: PenaltyKindId,
    pub severity: f32,
}

/// One resolved edge of the upgrade graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeEdge {
    pub source: AbilityId,
    pub target: AbilityId,
    pub cost: u32,
    /// Ticks from start to completion.
    pub duration: u64,
    pub refund_if_interrupted: Option<u32>,
    pub interrupt_penalty: Option<PenaltyDef>,
    pub prerequisite: Option<TechId>,
}

impl UpgradeEdge {
    pub(crate) fn from_def(source: &AbilityId, def: &UpgradeEdgeDef) -> Self {
        Self {
            source: source.clone(),
            target: def.ability.clone(),
            cost: def.upgrade_cost,
            duration: def.upgrade_time,
            refund_if_interrupted: def.refund_if_interrupted,
            interrupt_penalty: def.interrupt_penalty.clone(),
            prerequisite: def.prerequisite.clone(),
        }
    }
}

/// Map cell of a device; refunds are spawned here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub z: i32,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchState {
    pub finished: HashSet<TechId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpgradeStage {
    #[default]
    NotStarted,
    Active,
}

/// A chosen upgrade: the source ability and the index of the edge in its
/// full (unfiltered) upgrade list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub source: AbilityId,
    pub edge_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeProcess {
    pub stage: UpgradeStage,
    pub selection: Option<Selection>,
    /// Only meaningful while `stage == Active`.
    pub finish_tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

/// Per-device state. Exactly one process per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub id: DeviceId,
    pub process: UpgradeProcess,
    pub counters: Counters,
}

impl DeviceState {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            process: UpgradeProcess::default(),
            counters: Counters::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_tick: u64,
    pub execute_at_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SelectUpgrade {
        ability: AbilityId,
        edge_index: usize,
    },
    CancelUpgrade,
    EjectOccupant,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptReason {
    Cancelled,
    Ejected,
    PowerLost,
    OccupantLost,
    StaleSelection,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearReason {
    /// The selected edge no longer resolves against the graph.
    Stale,
    /// The pawn left the device, or no longer holds the source ability.
    OccupantChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub kind: ResourceKindId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UpgradeSelected {
        device_id: DeviceId,
        pawn_id: PawnId,
        from: AbilityId,
        to: AbilityId,
    },
    UpgradeStarted {
        device_id: DeviceId,
        from: AbilityId,
        to: AbilityId,
        cost: u32,
        finish_tick: u64,
    },
    UpgradeCompleted {
        device_id: DeviceId,
        pawn_id: PawnId,
        from: AbilityId,
        to: AbilityId,
    },
    UpgradeInterrupted {
        device_id: DeviceId,
        reason: InterruptReason,
        refund: Option<Refund>,
        penalty: Option<PenaltyDef>,
    },
    SelectionCleared {
        device_id: DeviceId,
        source: AbilityId,
        edge_index: usize,
        reason: ClearReason,
    },
    OccupantEjected {
        device_id: DeviceId,
        pawn_id: PawnId,
    },
    CommandRejected {
        command_id: CommandId,
        reason: String,
    },
}
