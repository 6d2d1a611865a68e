use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::host::ResearchGate;
use crate::{AbilityId, ResourceKindId, UpgradeContent, UpgradeEdge};

type EdgeList = SmallVec<[UpgradeEdge; 2]>;

/// Directed ability-upgrade graph, resolved once from content and read-only
/// afterwards. Edge order per source ability is preserved from the data.
#[derive(Debug, Clone, Default)]
pub struct UpgradeGraph {
    content_version: String,
    /// Ability ids in content order.
    abilities: Vec<AbilityId>,
    labels: AHashMap<AbilityId, String>,
    edges: AHashMap<AbilityId, EdgeList>,
    upgrade_only: AHashSet<AbilityId>,
    refund_kinds: Vec<ResourceKindId>,
}

impl UpgradeGraph {
    pub fn from_content(content: &UpgradeContent) -> Self {
        let mut graph = Self {
            content_version: content.content_version.clone(),
            refund_kinds: content.refund_kinds.clone(),
            ..Self::default()
        };
        for def in &content.abilities {
            graph.abilities.push(def.id.clone());
            graph.labels.insert(def.id.clone(), def.label.clone());
            if def.upgrade_only {
                graph.upgrade_only.insert(def.id.clone());
            }
            if !def.upgrades_to.is_empty() {
                let edges: EdgeList = def
                    .upgrades_to
                    .iter()
                    .map(|edge| UpgradeEdge::from_def(&def.id, edge))
                    .collect();
                graph.edges.insert(def.id.clone(), edges);
            }
        }
        graph
    }

    pub fn content_version(&self) -> &str {
        &self.content_version
    }

    pub fn abilities(&self) -> &[AbilityId] {
        &self.abilities
    }

    pub fn label<'a>(&'a self, ability: &'a AbilityId) -> &'a str {
        self.labels.get(ability).map_or(ability.0.as_str(), String::as_str)
    }

    pub fn refund_kinds(&self) -> &[ResourceKindId] {
        &self.refund_kinds
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(SmallVec::len).sum()
    }

    /// Every defined edge out of `ability`, ignoring prerequisites.
    pub fn all_edges_from(&self, ability: &AbilityId) -> &[UpgradeEdge] {
        self.edges
            .get(ability)
            .map(SmallVec::as_slice)
            .unwrap_or_default()
    }

    /// Edges out of `ability` whose prerequisite is absent or finished, each
    /// paired with its index in the full edge list. Prerequisites are checked
    /// on every call since research can complete mid-session.
    pub fn edges_from(
        &self,
        ability: &AbilityId,
        research: &impl ResearchGate,
    ) -> Vec<(usize, &UpgradeEdge)> {
        self.all_edges_from(ability)
            .iter()
            .enumerate()
            .filter(|(_, edge)| {
                edge.prerequisite
                    .as_ref()
                    .is_none_or(|tech| research.is_finished(tech))
            })
            .collect()
    }

    pub fn edge(&self, ability: &AbilityId, index: usize) -> Option<&UpgradeEdge> {
        self.all_edges_from(ability).get(index)
    }

    pub fn has_upgrades(&self, ability: &AbilityId) -> bool {
        !self.all_edges_from(ability).is_empty()
    }

    pub fn is_upgrade_only(&self, ability: &AbilityId) -> bool {
        self.upgrade_only.contains(ability)
    }

    /// Abilities that may be granted on their own (trainers, rewards, ...).
    /// Upgrade-only abilities are reachable solely through a device.
    pub fn grantable_abilities(&self) -> impl Iterator<Item = &AbilityId> {
        self.abilities
            .iter()
            .filter(|ability| !self.upgrade_only.contains(*ability))
    }

    /// Abilities that sit on at least one edge cycle, in content order.
    pub fn find_cycles(&self) -> Vec<AbilityId> {
        let mut in_cycle = AHashSet::new();
        let mut finished = AHashSet::new();
        let mut path = Vec::new();
        for root in &self.abilities {
            self.walk_cycles(root, &mut path, &mut finished, &mut in_cycle);
        }
        self.abilities
            .iter()
            .filter(|ability| in_cycle.contains(*ability))
            .cloned()
            .collect()
    }

    fn walk_cycles<'a>(
        &'a self,
        node: &'a AbilityId,
        path: &mut Vec<&'a AbilityId>,
        finished: &mut AHashSet<&'a AbilityId>,
        in_cycle: &mut AHashSet<AbilityId>,
    ) {
        if finished.contains(node) {
            return;
        }
        if let Some(pos) = path.iter().position(|on_path| *on_path == node) {
            in_cycle.extend(path[pos..].iter().map(|ability| (*ability).clone()));
            return;
        }
        path.push(node);
        for edge in self.all_edges_from(node) {
            self.walk_cycles(&edge.target, path, finished, in_cycle);
        }
        path.pop();
        finished.insert(node);
    }
}
