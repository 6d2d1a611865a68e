//! In-memory host: one device, one pawn and a colony that records refunds.
//! Serializable so a run can be saved and resumed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use upgrade_core::host::{DeviceHost, Pawn, ResearchGate, SimHost};
use upgrade_core::{
    AbilityId, CommandEnvelope, DeviceId, DeviceState, EventEnvelope, PawnId, PenaltyKindId,
    Position, ResearchState, ResourceKindId, TechId, UpgradeGraph,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxPawn {
    pub id: PawnId,
    pub abilities: Vec<AbilityId>,
    #[serde(default)]
    pub penalties: BTreeMap<PenaltyKindId, f32>,
}

impl Pawn for SandboxPawn {
    fn id(&self) -> &PawnId {
        &self.id
    }

    fn abilities(&self) -> &[AbilityId] {
        &self.abilities
    }

    fn remove_ability(&mut self, ability: &AbilityId) {
        self.abilities.retain(|held| held != ability);
    }

    fn grant_ability(&mut self, ability: AbilityId) {
        if !self.abilities.contains(&ability) {
            self.abilities.push(ability);
        }
    }

    fn adjust_penalty(&mut self, kind: &PenaltyKindId, severity: f32) {
        *self.penalties.entry(kind.clone()).or_insert(0.0) += severity;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxDevice {
    pub occupant: Option<SandboxPawn>,
    pub fuel: u32,
    pub powered: bool,
    pub position: Position,
    /// Pawns released by the device, most recent last.
    #[serde(default)]
    pub released: Vec<SandboxPawn>,
}

impl DeviceHost for SandboxDevice {
    type Occupant = SandboxPawn;

    fn occupant(&self) -> Option<&SandboxPawn> {
        self.occupant.as_ref()
    }

    fn occupant_mut(&mut self) -> Option<&mut SandboxPawn> {
        self.occupant.as_mut()
    }

    fn resource_available(&self) -> u32 {
        self.fuel
    }

    fn consume_resource(&mut self, amount: u32) {
        self.fuel = self.fuel.saturating_sub(amount);
    }

    fn has_power(&self) -> bool {
        self.powered
    }

    fn eject_occupant(&mut self) {
        if let Some(pawn) = self.occupant.take() {
            tracing::debug!(pawn = %pawn.id, "pawn released from device");
            self.released.push(pawn);
        }
    }

    fn position(&self) -> Position {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedStack {
    pub kind: ResourceKindId,
    pub quantity: u32,
    pub position: Position,
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxColony {
    pub tick: u64,
    pub seed: u64,
    pub content_version: String,
    pub research: ResearchState,
    #[serde(default)]
    pub spawned: Vec<SpawnedStack>,
    pub state: DeviceState,
    pub device: SandboxDevice,
}

impl SandboxColony {
    pub fn spawned_total(&self) -> u32 {
        self.spawned.iter().map(|stack| stack.quantity).sum()
    }

    /// Re-check a saved device against the current graph. Selections that
    /// no longer resolve are dropped.
    pub fn restore(&mut self, graph: &UpgradeGraph) {
        if self.content_version != graph.content_version() {
            tracing::warn!(
                saved = %self.content_version,
                loaded = graph.content_version(),
                "sandbox was saved with different content"
            );
            self.content_version = graph.content_version().to_string();
        }
        let process = std::mem::take(&mut self.state.process);
        self.state.process = process.restore(graph);
    }

    /// Split into device state, device and the rest of the world so all
    /// three can be borrowed mutably at once.
    pub fn split(&mut self) -> (&mut DeviceState, &mut SandboxDevice, ColonyHost<'_>) {
        let host = ColonyHost {
            tick: self.tick,
            research: &self.research,
            spawned: &mut self.spawned,
        };
        (&mut self.state, &mut self.device, host)
    }

    /// Run one device tick at the colony's current tick, then advance the clock.
    pub fn step(
        &mut self,
        commands: &[CommandEnvelope],
        graph: &UpgradeGraph,
        rng: &mut impl Rng,
    ) -> Vec<EventEnvelope> {
        let (state, device, mut host) = self.split();
        let events = upgrade_core::tick(state, commands, device, &mut host, graph, rng);
        self.tick += 1;
        events
    }

    /// Tear the device down, interrupting any running upgrade.
    pub fn destroy_device(
        &mut self,
        graph: &UpgradeGraph,
        rng: &mut impl Rng,
    ) -> Vec<EventEnvelope> {
        let (state, device, mut host) = self.split();
        upgrade_core::destroy(state, device, &mut host, graph, rng)
    }
}

/// Borrowed view of the colony that implements [`SimHost`].
pub struct ColonyHost<'a> {
    tick: u64,
    research: &'a ResearchState,
    spawned: &'a mut Vec<SpawnedStack>,
}

impl ResearchGate for ColonyHost<'_> {
    fn is_finished(&self, tech: &TechId) -> bool {
        self.research.is_finished(tech)
    }
}

impl SimHost for ColonyHost<'_> {
    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn spawn_resource(&mut self, kind: &ResourceKindId, quantity: u32, at: Position) {
        tracing::debug!(%kind, quantity, x = at.x, z = at.z, "spawning refund");
        self.spawned.push(SpawnedStack {
            kind: kind.clone(),
            quantity,
            position: at,
            tick: self.tick,
        });
    }
}

/// A colony with one powered device holding a pawn with `abilities`.
pub fn build_sandbox(
    graph: &UpgradeGraph,
    abilities: &[AbilityId],
    fuel: u32,
    research: HashSet<TechId>,
    seed: u64,
) -> SandboxColony {
    SandboxColony {
        tick: 0,
        seed,
        content_version: graph.content_version().to_string(),
        research: ResearchState { finished: research },
        spawned: Vec::new(),
        state: DeviceState::new(DeviceId("reshaper_0001".to_string())),
        device: SandboxDevice {
            occupant: Some(SandboxPawn {
                id: PawnId("pawn_0001".to_string()),
                abilities: abilities.to_vec(),
                penalties: BTreeMap::new(),
            }),
            fuel,
            powered: true,
            position: Position { x: 0, z: 0 },
            released: Vec::new(),
        },
    }
}
