//! Content loading and the sandbox host shared between upgrade_cli and tests.

mod sandbox;

pub use sandbox::{
    build_sandbox, ColonyHost, SandboxColony, SandboxDevice, SandboxPawn, SpawnedStack,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use upgrade_core::{AbilityDef, AbilityId, ResourceKindId, UpgradeContent, UpgradeGraph};

#[derive(Deserialize)]
struct AbilitiesFile {
    content_version: String,
    abilities: Vec<AbilityDef>,
}

#[derive(Deserialize)]
struct ResourcesFile {
    refund_kinds: Vec<ResourceKindId>,
}

/// Validates cross-references in loaded content, panicking on any authoring error.
///
/// Catches mistakes like: an upgrade pointing at an unknown ability, two
/// abilities sharing an id, or a refund with no resource kind to spawn.
/// Edge cycles are logged rather than rejected; the resolver tolerates them.
pub fn validate_content(content: &UpgradeContent) {
    let mut ability_ids: HashSet<&AbilityId> = HashSet::new();
    for ability in &content.abilities {
        assert!(!ability.id.0.is_empty(), "ability with empty id");
        assert!(
            ability_ids.insert(&ability.id),
            "ability '{}' is defined more than once",
            ability.id,
        );
    }

    let mut targeted: HashSet<&AbilityId> = HashSet::new();
    for ability in &content.abilities {
        for edge in &ability.upgrades_to {
            assert!(
                ability_ids.contains(&edge.ability),
                "ability '{}' upgrades to unknown ability '{}'",
                ability.id,
                edge.ability,
            );
            if edge.refund_if_interrupted.is_some() {
                assert!(
                    !content.refund_kinds.is_empty(),
                    "ability '{}' refunds on interrupt but no refund kinds are defined",
                    ability.id,
                );
            }
            if let Some(penalty) = &edge.interrupt_penalty {
                assert!(
                    penalty.severity.is_finite() && penalty.severity >= 0.0,
                    "ability '{}' -> '{}' has invalid penalty severity {}",
                    ability.id,
                    edge.ability,
                    penalty.severity,
                );
            }
            targeted.insert(&edge.ability);
        }
    }

    for ability in &content.abilities {
        if ability.upgrade_only && !targeted.contains(&ability.id) {
            tracing::warn!(ability = %ability.id, "upgrade-only ability is not the target of any upgrade");
        }
    }

    let cycles = UpgradeGraph::from_content(content).find_cycles();
    if !cycles.is_empty() {
        let names: Vec<&str> = cycles.iter().map(|id| id.0.as_str()).collect();
        tracing::warn!(abilities = ?names, "upgrade graph contains cycles");
    }
}

pub fn load_content(content_dir: &str) -> Result<UpgradeContent> {
    let dir = Path::new(content_dir);
    let abilities_file: AbilitiesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("abilities.json")).context("reading abilities.json")?,
    )
    .context("parsing abilities.json")?;
    let resources_file: ResourcesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("resources.json")).context("reading resources.json")?,
    )
    .context("parsing resources.json")?;
    let content = UpgradeContent {
        content_version: abilities_file.content_version,
        abilities: abilities_file.abilities,
        refund_kinds: resources_file.refund_kinds,
    };
    validate_content(&content);
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use upgrade_core::test_fixtures::{ability, base_content, edge};

    fn write_content(dir: &Path, abilities: &str, resources: &str) {
        std::fs::write(dir.join("abilities.json"), abilities).unwrap();
        std::fs::write(dir.join("resources.json"), resources).unwrap();
    }

    #[test]
    fn fixture_content_is_valid() {
        validate_content(&base_content());
    }

    #[test]
    #[should_panic(expected = "upgrades to unknown ability 'ghost'")]
    fn unknown_target_panics() {
        let mut content = base_content();
        content.abilities.push(ability("haunt", vec![edge("ghost", 1, 1)]));
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "defined more than once")]
    fn duplicate_ability_panics() {
        let mut content = base_content();
        content.abilities.push(ability("skip", vec![]));
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "no refund kinds are defined")]
    fn refund_without_kinds_panics() {
        let mut content = base_content();
        content.refund_kinds.clear();
        validate_content(&content);
    }

    #[test]
    fn cycles_are_tolerated() {
        let mut content = base_content();
        content.abilities = vec![
            ability("a", vec![edge("b", 1, 1)]),
            ability("b", vec![edge("a", 1, 1)]),
        ];
        validate_content(&content);
    }

    #[test]
    fn loads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_content(
            dir.path(),
            r#"{
                "content_version": "0.1",
                "abilities": [
                    { "id": "skip", "label": "Skip", "upgrades_to": [
                        { "ability": "skip_far", "upgrade_cost": 10, "upgrade_time": 100,
                          "refund_if_interrupted": 5,
                          "interrupt_penalty": { "kind": "psychic_shock", "severity": 0.5 } }
                    ] },
                    { "id": "skip_far", "label": "Far skip", "upgrade_only": true }
                ]
            }"#,
            r#"{ "refund_kinds": ["trainer_skip"] }"#,
        );
        let content = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(content.content_version, "0.1");
        assert_eq!(content.abilities.len(), 2);
        assert!(content.abilities[1].upgrades_to.is_empty());
        let edge = &content.abilities[0].upgrades_to[0];
        assert_eq!(edge.refund_if_interrupted, Some(5));
        assert!(edge.prerequisite.is_none());
    }

    #[test]
    fn missing_file_reports_which_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("abilities.json"),
            r#"{ "content_version": "0.1", "abilities": [] }"#,
        )
        .unwrap();
        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("reading resources.json"));
    }

    #[test]
    fn malformed_json_reports_parse_context() {
        let dir = tempfile::tempdir().unwrap();
        write_content(dir.path(), "{ not json", r#"{ "refund_kinds": [] }"#);
        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing abilities.json"));
    }
}
