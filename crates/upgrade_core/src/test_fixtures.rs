//! Shared test fixtures for upgrade_core and downstream crates.
//!
//! `base_content()` is a small psycast-style tree with a branch, a chain,
//! a research-gated edge and an ability with no upgrades. `TestPawn`,
//! `TestDevice` and `TestHost` are in-memory implementations of the host
//! traits that record what the core did to them.

use crate::host::{DeviceHost, Pawn, ResearchGate, SimHost};
use crate::{
    AbilityDef, AbilityId, DeviceId, DeviceState, PawnId, PenaltyDef, PenaltyKindId, Position,
    ResearchState, ResourceKindId, TechId, UpgradeContent, UpgradeEdgeDef, UpgradeGraph,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

pub fn aid(id: &str) -> AbilityId {
    AbilityId(id.to_string())
}

pub fn tech(id: &str) -> TechId {
    TechId(id.to_string())
}

pub fn edge(target: &str, cost: u32, time: u64) -> UpgradeEdgeDef {
    UpgradeEdgeDef {
        ability: aid(target),
        upgrade_cost: cost,
        upgrade_time: time,
        refund_if_interrupted: None,
        interrupt_penalty: None,
        prerequisite: None,
    }
}

pub fn ability(id: &str, upgrades_to: Vec<UpgradeEdgeDef>) -> AbilityDef {
    AbilityDef {
        id: aid(id),
        label: id.replace('_', " "),
        upgrade_only: false,
        upgrades_to,
    }
}

pub fn upgrade_only(id: &str, upgrades_to: Vec<UpgradeEdgeDef>) -> AbilityDef {
    AbilityDef {
        upgrade_only: true,
        ..ability(id, upgrades_to)
    }
}

/// skip -> {skip_far, skip_group}, skip_far -> skip_mass,
/// berserk -> berserk_mass (gated on `tech_mass_psychics`), painblock has no upgrades.
///
/// skip -> skip_far costs 10 over 100 ticks, refunds 5 and inflicts
/// `psychic_shock` 2.0 when interrupted.
pub fn base_content() -> UpgradeContent {
    UpgradeContent {
        content_version: "test".to_string(),
        abilities: vec![
            ability(
                "skip",
                vec![
                    UpgradeEdgeDef {
                        refund_if_interrupted: Some(5),
                        interrupt_penalty: Some(PenaltyDef {
                            kind: PenaltyKindId("psychic_shock".to_string()),
                            severity: 2.0,
                        }),
                        ..edge("skip_far", 10, 100)
                    },
                    edge("skip_group", 20, 200),
                ],
            ),
            upgrade_only("skip_far", vec![edge("skip_mass", 30, 300)]),
            upgrade_only("skip_group", vec![]),
            upgrade_only("skip_mass", vec![]),
            ability(
                "berserk",
                vec![UpgradeEdgeDef {
                    prerequisite: Some(tech("tech_mass_psychics")),
                    ..edge("berserk_mass", 10, 50)
                }],
            ),
            upgrade_only("berserk_mass", vec![]),
            ability("painblock", vec![]),
        ],
        refund_kinds: vec![ResourceKindId("trainer_skip".to_string())],
    }
}

pub fn base_graph() -> UpgradeGraph {
    UpgradeGraph::from_content(&base_content())
}

pub fn base_device_state() -> DeviceState {
    DeviceState::new(DeviceId("reshaper_0001".to_string()))
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestPawn {
    pub id: PawnId,
    pub abilities: Vec<AbilityId>,
    pub penalties: HashMap<PenaltyKindId, f32>,
}

impl TestPawn {
    pub fn with_abilities(abilities: &[&str]) -> Self {
        Self {
            id: PawnId("pawn_0001".to_string()),
            abilities: abilities.iter().map(|id| aid(id)).collect(),
            penalties: HashMap::new(),
        }
    }

    pub fn penalty(&self, kind: &str) -> f32 {
        self.penalties
            .get(&PenaltyKindId(kind.to_string()))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Pawn for TestPawn {
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

#[derive(Debug, Clone)]
pub struct TestDevice {
    pub occupant: Option<TestPawn>,
    pub fuel: u32,
    /// `None` means the device has no power connection at all.
    pub powered: Option<bool>,
    pub ejected: Vec<TestPawn>,
    pub position: Position,
}

impl TestDevice {
    pub fn occupied_by(pawn: TestPawn, fuel: u32) -> Self {
        Self {
            occupant: Some(pawn),
            fuel,
            powered: Some(true),
            ejected: Vec::new(),
            position: Position { x: 12, z: 7 },
        }
    }
}

impl DeviceHost for TestDevice {
    type Occupant = TestPawn;

    fn occupant(&self) -> Option<&TestPawn> {
        self.occupant.as_ref()
    }

    fn occupant_mut(&mut self) -> Option<&mut TestPawn> {
        self.occupant.as_mut()
    }

    fn resource_available(&self) -> u32 {
        self.fuel
    }

    fn consume_resource(&mut self, amount: u32) {
        self.fuel = self.fuel.saturating_sub(amount);
    }

    fn has_power(&self) -> bool {
        self.powered.unwrap_or(true)
    }

    fn eject_occupant(&mut self) {
        if let Some(pawn) = self.occupant.take() {
            self.ejected.push(pawn);
        }
    }

    fn position(&self) -> Position {
        self.position
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestHost {
    pub tick: u64,
    pub research: ResearchState,
    pub spawned: Vec<(ResourceKindId, u32, Position)>,
}

impl TestHost {
    pub fn at_tick(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn spawned_total(&self) -> u32 {
        self.spawned.iter().map(|(_, quantity, _)| quantity).sum()
    }
}

impl ResearchGate for TestHost {
    fn is_finished(&self, tech: &TechId) -> bool {
        self.research.is_finished(tech)
    }
}

impl SimHost for TestHost {
    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn spawn_resource(&mut self, kind: &ResourceKindId, quantity: u32, at: Position) {
        self.spawned.push((kind.clone(), quantity, at));
    }
}
