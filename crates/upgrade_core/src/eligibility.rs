use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::host::{Pawn, ResearchGate};
use crate::{AbilityId, Rejection, UpgradeGraph};

/// One entry of the device's upgrade menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOption {
    pub source: AbilityId,
    /// Index into the source's full edge list; pass back to `SelectUpgrade`.
    pub edge_index: usize,
    pub target: AbilityId,
    pub cost: u32,
    pub duration: u64,
}

/// Held abilities that have at least one upgrade and whose direct successors
/// the pawn does not already hold. Order follows the pawn's ability list.
pub fn upgradable_abilities(pawn: &impl Pawn, graph: &UpgradeGraph) -> Vec<AbilityId> {
    pawn.abilities()
        .iter()
        .filter(|ability| is_upgradable(ability, pawn, graph))
        .cloned()
        .collect()
}

pub(crate) fn is_upgradable(ability: &AbilityId, pawn: &impl Pawn, graph: &UpgradeGraph) -> bool {
    let edges = graph.all_edges_from(ability);
    !edges.is_empty() && !edges.iter().any(|edge| pawn.has_ability(&edge.target))
}

/// Whether the pawn holds any ability reachable from `ability` through one
/// or more edges. Edges that lead back onto the current walk are treated as
/// malformed data: logged and skipped.
pub fn has_descendant(ability: &AbilityId, pawn: &impl Pawn, graph: &UpgradeGraph) -> bool {
    let mut on_path = AHashSet::new();
    let mut explored = AHashSet::new();
    on_path.insert(ability.clone());
    descendant_held(ability, pawn, graph, &mut on_path, &mut explored)
}

fn descendant_held(
    ability: &AbilityId,
    pawn: &impl Pawn,
    graph: &UpgradeGraph,
    on_path: &mut AHashSet<AbilityId>,
    explored: &mut AHashSet<AbilityId>,
) -> bool {
    for edge in graph.all_edges_from(ability) {
        let target = &edge.target;
        if on_path.contains(target) {
            tracing::warn!(
                source = %ability,
                target = %target,
                "upgrade graph contains a cycle; ignoring edge"
            );
            continue;
        }
        if pawn.has_ability(target) {
            return true;
        }
        if !explored.insert(target.clone()) {
            continue;
        }
        on_path.insert(target.clone());
        let found = descendant_held(target, pawn, graph, on_path, explored);
        on_path.remove(target);
        if found {
            return true;
        }
    }
    false
}

/// The flattened menu: every usable edge out of every upgradable ability.
/// Edges whose target (or something beyond it) the pawn already holds are
/// left out.
pub fn upgrade_options(
    pawn: &impl Pawn,
    graph: &UpgradeGraph,
    research: &impl ResearchGate,
) -> Vec<UpgradeOption> {
    let mut options = Vec::new();
    for source in upgradable_abilities(pawn, graph) {
        for (edge_index, edge) in graph.edges_from(&source, research) {
            if has_descendant(&edge.target, pawn, graph) {
                continue;
            }
            options.push(UpgradeOption {
                source: source.clone(),
                edge_index,
                target: edge.target.clone(),
                cost: edge.cost,
                duration: edge.duration,
            });
        }
    }
    options
}

/// Guard for granting `ability` outside the device (trainers, rewards).
/// Blocks handing a base ability to a pawn that already holds an upgrade of it.
pub fn check_can_gain(
    ability: &AbilityId,
    pawn: &impl Pawn,
    graph: &UpgradeGraph,
) -> Result<(), Rejection> {
    if pawn.has_ability(ability) {
        return Err(Rejection::AlreadyHeld(ability.clone()));
    }
    if has_descendant(ability, pawn, graph) {
        return Err(Rejection::AlreadyUpgraded(ability.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{ability, aid, base_content, base_graph, edge, TestHost, TestPawn};

    fn cyclic_graph() -> UpgradeGraph {
        let mut content = base_content();
        content.abilities = vec![
            ability("a", vec![edge("b", 1, 1)]),
            ability("b", vec![edge("a", 1, 1), edge("c", 1, 1)]),
            ability("c", vec![edge("c", 1, 1)]),
        ];
        UpgradeGraph::from_content(&content)
    }

    #[test]
    fn base_ability_is_upgradable() {
        let pawn = TestPawn::with_abilities(&["skip", "painblock"]);
        let upgradable = upgradable_abilities(&pawn, &base_graph());
        assert_eq!(upgradable, vec![aid("skip")]);
    }

    #[test]
    fn ability_with_taken_successor_is_not_offered() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["skip", "skip_group", "skip_far"]);
        let upgradable = upgradable_abilities(&pawn, &graph);
        assert!(!upgradable.contains(&aid("skip")));
        assert_eq!(upgradable, vec![aid("skip_far")]);
    }

    #[test]
    fn descendant_found_through_chain() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["skip_mass"]);
        assert!(has_descendant(&aid("skip"), &pawn, &graph));
        assert!(has_descendant(&aid("skip_far"), &pawn, &graph));
        assert!(!has_descendant(&aid("berserk"), &pawn, &graph));
    }

    #[test]
    fn ability_is_not_its_own_descendant() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["skip"]);
        assert!(!has_descendant(&aid("skip"), &pawn, &graph));
    }

    #[test]
    fn descendant_search_terminates_on_cycle() {
        let graph = cyclic_graph();
        let holds_root = TestPawn::with_abilities(&["a"]);
        assert!(!has_descendant(&aid("a"), &holds_root, &graph));

        let holds_leaf = TestPawn::with_abilities(&["c"]);
        assert!(has_descendant(&aid("a"), &holds_leaf, &graph));
        assert!(!has_descendant(&aid("c"), &holds_leaf, &graph));
    }

    #[test]
    fn menu_lists_every_usable_edge_in_order() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["painblock", "skip", "berserk"]);
        let host = TestHost::default();
        let options = upgrade_options(&pawn, &graph, &host);
        let pairs: Vec<(&str, usize, &str)> = options
            .iter()
            .map(|opt| (opt.source.0.as_str(), opt.edge_index, opt.target.0.as_str()))
            .collect();
        assert_eq!(pairs, vec![("skip", 0, "skip_far"), ("skip", 1, "skip_group")]);
    }

    #[test]
    fn finished_research_unlocks_menu_entry() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["berserk"]);
        let mut host = TestHost::default();
        assert!(upgrade_options(&pawn, &graph, &host).is_empty());

        host.research
            .finished
            .insert(crate::TechId("tech_mass_psychics".to_string()));
        let options = upgrade_options(&pawn, &graph, &host);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].target, aid("berserk_mass"));
        assert_eq!(options[0].cost, 10);
    }

    #[test]
    fn menu_skips_edge_whose_descendant_is_held() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["skip", "skip_mass"]);
        let options = upgrade_options(&pawn, &graph, &TestHost::default());
        let targets: Vec<&str> = options.iter().map(|opt| opt.target.0.as_str()).collect();
        assert_eq!(targets, vec!["skip_group"]);
    }

    #[test]
    fn cannot_gain_base_after_upgrading() {
        let graph = base_graph();
        let pawn = TestPawn::with_abilities(&["skip_far"]);
        assert_eq!(
            check_can_gain(&aid("skip"), &pawn, &graph),
            Err(Rejection::AlreadyUpgraded(aid("skip")))
        );
        assert_eq!(check_can_gain(&aid("berserk"), &pawn, &graph), Ok(()));
        assert_eq!(
            check_can_gain(&aid("skip_far"), &pawn, &graph),
            Err(Rejection::AlreadyHeld(aid("skip_far")))
        );
    }
}
