//! Two-level paper graph, abstract store and failure bookkeeping
//!
//! Level 0 holds seed titles, level 1 their references, level 2 the
//! references of expanded level-1 entries. Keys keep insertion order and
//! values live in a separate table, so states can be rewritten while the
//! key order is walked.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lifecycle of a level-1 reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceState {
    /// Known from its parent, not yet expanded
    Unresolved,
    /// Expanded; level-2 titles in source order, duplicates removed
    Expanded(Vec<String>),
    /// Expansion attempted and every source failed
    Failed,
}

impl ReferenceState {
    /// Level-2 titles, if this entry was expanded
    pub fn children(&self) -> Option<&[String]> {
        match self {
            ReferenceState::Expanded(children) => Some(children),
            _ => None,
        }
    }
}

/// Ordered level-1 references of one seed
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    order: Vec<String>,
    states: HashMap<String, ReferenceState>,
}

impl ReferenceSet {
    /// Build from reference titles; repeated titles keep their first position
    pub fn from_titles(titles: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::default();
        for title in titles {
            if !set.states.contains_key(&title) {
                set.states.insert(title.clone(), ReferenceState::Unresolved);
                set.order.push(title);
            }
        }
        set
    }

    /// Titles and states in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReferenceState)> {
        self.order
            .iter()
            .filter_map(|title| self.states.get(title).map(|state| (title.as_str(), state)))
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn state(&self, title: &str) -> Option<&ReferenceState> {
        self.states.get(title)
    }

    /// Titles still waiting for expansion, in insertion order
    pub fn pending(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, state)| **state == ReferenceState::Unresolved)
            .map(|(title, _)| title.to_string())
            .collect()
    }

    /// Replace the state of an existing entry. Unknown titles are ignored.
    pub(crate) fn set_state(&mut self, title: &str, state: ReferenceState) -> bool {
        match self.states.get_mut(title) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Seed title → level-1 references
#[derive(Debug, Clone, Default)]
pub struct PaperGraph {
    order: Vec<String>,
    nodes: HashMap<String, ReferenceSet>,
}

impl PaperGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolved seed. Returns false if the seed is already present.
    pub(crate) fn insert_seed(&mut self, title: String, references: Vec<String>) -> bool {
        if self.nodes.contains_key(&title) {
            return false;
        }
        self.nodes.insert(title.clone(), ReferenceSet::from_titles(references));
        self.order.push(title);
        true
    }

    /// Seed titles in insertion order
    pub fn seeds(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains_seed(&self, title: &str) -> bool {
        self.nodes.contains_key(title)
    }

    pub fn references(&self, seed: &str) -> Option<&ReferenceSet> {
        self.nodes.get(seed)
    }

    pub(crate) fn references_mut(&mut self, seed: &str) -> Option<&mut ReferenceSet> {
        self.nodes.get_mut(seed)
    }

    pub fn seed_count(&self) -> usize {
        self.order.len()
    }

    /// Number of level-1 entries across all seeds
    pub fn reference_count(&self) -> usize {
        self.nodes.values().map(ReferenceSet::len).sum()
    }

    /// Number of level-2 entries across all expanded references
    pub fn second_level_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|set| set.iter())
            .filter_map(|(_, state)| state.children())
            .map(<[String]>::len)
            .sum()
    }

    /// Nested-mapping view: unexpanded and failed level-1 entries are null,
    /// expanded entries map each level-2 title to null. Keys keep insertion
    /// order.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for seed in self.seeds() {
            let mut level1 = Map::new();
            if let Some(set) = self.references(seed) {
                for (title, state) in set.iter() {
                    let value = match state.children() {
                        Some(children) => Value::Object(
                            children.iter().map(|child| (child.clone(), Value::Null)).collect(),
                        ),
                        None => Value::Null,
                    };
                    level1.insert(title.to_string(), value);
                }
            }
            root.insert(seed.to_string(), Value::Object(level1));
        }
        Value::Object(root)
    }
}

/// Title → abstract, shared across all graph positions
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AbstractStore {
    abstracts: BTreeMap<String, String>,
}

impl AbstractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an abstract. The first write for a title wins.
    pub(crate) fn insert(&mut self, title: &str, abstract_text: &str) -> bool {
        if self.abstracts.contains_key(title) {
            return false;
        }
        self.abstracts.insert(title.to_string(), abstract_text.to_string());
        true
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.abstracts.get(title).map(String::as_str)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.abstracts.contains_key(title)
    }

    pub fn len(&self) -> usize {
        self.abstracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abstracts.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.abstracts
    }
}

/// Titles no source could resolve, by pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureRecord {
    seeds: Vec<String>,
    references: Vec<String>,
}

impl FailureRecord {
    pub(crate) fn record_seed(&mut self, title: &str) {
        push_unique(&mut self.seeds, title);
    }

    pub(crate) fn record_reference(&mut self, title: &str) {
        push_unique(&mut self.references, title);
    }

    /// Seed failures in order of first failure
    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// Reference failures in order of first failure
    pub fn references(&self) -> &[String] {
        &self.references
    }
}

fn push_unique(list: &mut Vec<String>, title: &str) {
    if !list.iter().any(|existing| existing == title) {
        list.push(title.to_string());
    }
}

/// Remove repeated titles, keeping first occurrences in order
pub fn dedup_titles(titles: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    titles
        .iter()
        .filter(|title| seen.insert(title.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reference_set_keeps_first_position() {
        let set = ReferenceSet::from_titles(titles(&["B", "C", "B", "D"]));
        assert_eq!(set.titles().collect::<Vec<_>>(), vec!["B", "C", "D"]);
        assert_eq!(set.pending(), titles(&["B", "C", "D"]));
    }

    #[test]
    fn test_set_state_does_not_reorder() {
        let mut set = ReferenceSet::from_titles(titles(&["B", "C", "D"]));
        assert!(set.set_state("C", ReferenceState::Expanded(titles(&["E"]))));
        assert!(set.set_state("B", ReferenceState::Failed));
        assert!(!set.set_state("Z", ReferenceState::Failed));

        assert_eq!(set.titles().collect::<Vec<_>>(), vec!["B", "C", "D"]);
        assert_eq!(set.pending(), titles(&["D"]));
        assert_eq!(set.state("C").and_then(ReferenceState::children), Some(&titles(&["E"])[..]));
    }

    #[test]
    fn test_graph_json_view() {
        let mut graph = PaperGraph::new();
        assert!(graph.insert_seed("A".into(), titles(&["B", "C"])));
        assert!(!graph.insert_seed("A".into(), titles(&["X"])));

        let set = graph.references_mut("A").unwrap();
        set.set_state("B", ReferenceState::Expanded(titles(&["D"])));
        set.set_state("C", ReferenceState::Failed);

        assert_eq!(graph.to_json(), json!({ "A": { "B": { "D": null }, "C": null } }));
        assert_eq!(graph.seed_count(), 1);
        assert_eq!(graph.reference_count(), 2);
        assert_eq!(graph.second_level_count(), 1);
    }

    #[test]
    fn test_abstract_store_first_write_wins() {
        let mut store = AbstractStore::new();
        assert!(store.insert("A", "first"));
        assert!(!store.insert("A", "second"));
        assert_eq!(store.get("A"), Some("first"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failure_record_dedups() {
        let mut failures = FailureRecord::default();
        failures.record_reference("C");
        failures.record_reference("E");
        failures.record_reference("C");
        failures.record_seed("S");
        assert_eq!(failures.references(), &titles(&["C", "E"])[..]);
        assert_eq!(failures.seeds(), &titles(&["S"])[..]);
    }

    #[test]
    fn test_dedup_titles() {
        assert_eq!(dedup_titles(&titles(&["x", "y", "x"])), titles(&["x", "y"]));
    }
}
