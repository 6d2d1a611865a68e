use thiserror::Error;

use crate::{AbilityId, PawnId, TechId};

/// Why a player action was refused. The `Display` text is shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no pawn is stored in the device")]
    NoOccupant,

    #[error("an upgrade is already in progress")]
    ProcessActive,

    #[error("an upgrade is already selected")]
    SelectionPending,

    #[error("there is no upgrade to cancel")]
    NothingToCancel,

    #[error("pawn does not have ability {0}")]
    AbilityNotHeld(AbilityId),

    #[error("ability {0} cannot be upgraded")]
    NotUpgradable(AbilityId),

    #[error("ability {ability} has no upgrade option {index}")]
    UnknownUpgrade { ability: AbilityId, index: usize },

    #[error("requires research {0}")]
    PrerequisiteNotMet(TechId),

    #[error("pawn already has ability {0}")]
    AlreadyHeld(AbilityId),

    #[error("pawn already has an upgraded form of {0}")]
    AlreadyUpgraded(AbilityId),

    #[error("{0} has no abilities to upgrade")]
    NoAbilitiesToUpgrade(PawnId),

    #[error("not enough fuel: need {needed}, have {available}")]
    InsufficientResource { needed: u32, available: u32 },
}
