//! Interfaces the core calls into. The host simulation implements these;
//! the core never owns pawns, devices or the world.

use crate::{AbilityId, PawnId, PenaltyKindId, Position, ResearchState, ResourceKindId, TechId};

pub trait Pawn {
    fn id(&self) -> &PawnId;

    /// Held abilities in the order the host presents them.
    fn abilities(&self) -> &[AbilityId];

    fn has_ability(&self, ability: &AbilityId) -> bool {
        self.abilities().contains(ability)
    }

    fn remove_ability(&mut self, ability: &AbilityId);

    fn grant_ability(&mut self, ability: AbilityId);

    /// Add `severity` to the pawn's condition of the given kind.
    fn adjust_penalty(&mut self, kind: &PenaltyKindId, severity: f32);
}

/// The building that holds the pawn and the fuel pool.
pub trait DeviceHost {
    type Occupant: Pawn;

    fn occupant(&self) -> Option<&Self::Occupant>;

    fn occupant_mut(&mut self) -> Option<&mut Self::Occupant>;

    fn resource_available(&self) -> u32;

    fn consume_resource(&mut self, amount: u32);

    /// Devices without a power connection are always considered powered.
    fn has_power(&self) -> bool {
        true
    }

    fn eject_occupant(&mut self);

    fn position(&self) -> Position;
}

pub trait ResearchGate {
    fn is_finished(&self, tech: &TechId) -> bool;
}

impl ResearchGate for ResearchState {
    fn is_finished(&self, tech: &TechId) -> bool {
        self.finished.contains(tech)
    }
}

/// The surrounding simulation: clock, research and world spawning.
pub trait SimHost: ResearchGate {
    fn current_tick(&self) -> u64;

    fn spawn_resource(&mut self, kind: &ResourceKindId, quantity: u32, at: Position);
}
