//! Immutable skill and domain graph snapshots.
//!
//! Arena layout: nodes live in a `Vec`, ids map to indices, and edges are
//! index pairs. Snapshots are immutable within a request and shared via
//! `Arc`; hierarchy cycles are rejected at build time.

use std::collections::{HashMap, HashSet};

use super::store::GraphError;

// ============================================================================
// Skill graph
// ============================================================================

/// A correlation edge between two skills.
#[derive(Debug, Clone)]
pub struct CorrelationEdge {
    pub to: usize,
    pub strength: f64,
    /// Edge kind as stored in the graph ("complementary", "alternative", …).
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    pub category_id: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub correlations: Vec<CorrelationEdge>,
}

#[derive(Debug, Default)]
pub struct SkillGraph {
    nodes: Vec<SkillNode>,
    index: HashMap<String, usize>,
    /// Normalized display name → id.
    names: HashMap<String, String>,
    /// Normalized synonym → canonical id (`:SkillSynonym-[:ALIAS_FOR]->:Skill`).
    synonyms: HashMap<String, String>,
}

impl SkillGraph {
    pub fn node(&self, idx: usize) -> &SkillNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&SkillNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn id_by_name(&self, normalized_name: &str) -> Option<&str> {
        self.names.get(normalized_name).map(String::as_str)
    }

    pub fn id_by_synonym(&self, normalized_alias: &str) -> Option<&str> {
        self.synonyms.get(normalized_alias).map(String::as_str)
    }

    /// All (normalized name, id) pairs, for fuzzy scanning.
    pub fn name_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(name, id)| (name.as_str(), id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf skill ids under `id`, self included when the node is itself a
    /// leaf. A category node expands to every leaf below it.
    pub fn leaf_ids_under(&self, id: &str) -> Vec<String> {
        let Some(root) = self.index_of(id) else {
            return Vec::new();
        };
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.children.is_empty() {
                leaves.push(node.id.clone());
            } else {
                stack.extend(node.children.iter().copied());
            }
        }
        leaves.sort();
        leaves
    }

    /// Is `descendant` reachable from `ancestor` via CHILD_OF edges?
    pub fn is_descendant_of(&self, descendant: &str, ancestor: &str) -> bool {
        if descendant == ancestor {
            return false;
        }
        let Some(mut idx) = self.index_of(descendant) else {
            return false;
        };
        while let Some(parent) = self.nodes[idx].parent {
            if self.nodes[parent].id == ancestor {
                return true;
            }
            idx = parent;
        }
        false
    }

    pub fn same_category(&self, a: &str, b: &str) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(na), Some(nb)) => match (&na.category_id, &nb.category_id) {
                (Some(ca), Some(cb)) => ca == cb,
                _ => false,
            },
            _ => false,
        }
    }

    pub fn share_parent(&self, a: &str, b: &str) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(na), Some(nb)) => match (na.parent, nb.parent) {
                (Some(pa), Some(pb)) => pa == pb,
                _ => false,
            },
            _ => false,
        }
    }

    /// Correlation strength of the strongest edge between `a` and `b`, in
    /// either direction.
    pub fn correlation_between(&self, a: &str, b: &str) -> Option<f64> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        let forward = self.nodes[ia]
            .correlations
            .iter()
            .filter(|e| e.to == ib)
            .map(|e| e.strength);
        let backward = self.nodes[ib]
            .correlations
            .iter()
            .filter(|e| e.to == ia)
            .map(|e| e.strength);
        forward.chain(backward).fold(None, |best, s| match best {
            Some(b) if b >= s => Some(b),
            _ => Some(s),
        })
    }
}

/// Builder used by the loader; finishing runs the cycle check.
#[derive(Default)]
pub struct SkillGraphBuilder {
    nodes: Vec<SkillNode>,
    index: HashMap<String, usize>,
    names: HashMap<String, String>,
    synonyms: HashMap<String, String>,
    parents: Vec<Option<String>>,
    correlations: Vec<(String, String, f64, String)>,
}

impl SkillGraphBuilder {
    pub fn add_skill(
        &mut self,
        id: &str,
        name: &str,
        normalized_name: String,
        category_id: Option<String>,
        parent_id: Option<String>,
    ) {
        if self.index.contains_key(id) {
            return;
        }
        let idx = self.nodes.len();
        self.nodes.push(SkillNode {
            id: id.to_string(),
            name: name.to_string(),
            category_id,
            parent: None,
            children: Vec::new(),
            correlations: Vec::new(),
        });
        self.index.insert(id.to_string(), idx);
        self.names.insert(normalized_name, id.to_string());
        self.parents.push(parent_id);
    }

    pub fn add_synonym(&mut self, normalized_alias: String, skill_id: &str) {
        if self.index.contains_key(skill_id) {
            self.synonyms.insert(normalized_alias, skill_id.to_string());
        }
    }

    pub fn add_correlation(&mut self, from: &str, to: &str, strength: f64, kind: &str) {
        self.correlations
            .push((from.to_string(), to.to_string(), strength, kind.to_string()));
    }

    pub fn finish(mut self) -> Result<SkillGraph, GraphError> {
        // Wire parent/child edges.
        for idx in 0..self.nodes.len() {
            if let Some(parent_id) = self.parents[idx].clone()
                && let Some(&parent_idx) = self.index.get(&parent_id)
            {
                self.nodes[idx].parent = Some(parent_idx);
                self.nodes[parent_idx].children.push(idx);
            }
        }
        // Wire correlation edges.
        for (from, to, strength, kind) in std::mem::take(&mut self.correlations) {
            if let (Some(&fi), Some(&ti)) = (self.index.get(&from), self.index.get(&to)) {
                self.nodes[fi]
                    .correlations
                    .push(CorrelationEdge { to: ti, strength, kind });
            }
        }
        let parents: Vec<Option<usize>> = self.nodes.iter().map(|n| n.parent).collect();
        detect_cycle(&parents, |idx| self.nodes[idx].id.clone(), "CHILD_OF")?;
        Ok(SkillGraph {
            nodes: self.nodes,
            index: self.index,
            names: self.names,
            synonyms: self.synonyms,
        })
    }
}

// ============================================================================
// Domain graph
// ============================================================================

#[derive(Debug, Clone)]
pub struct DomainNode {
    pub id: String,
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// For composite technical domains: the domains this one encompasses.
    pub encompasses: Vec<usize>,
    /// Skill category ids that imply experience in this domain.
    pub implied_by_categories: Vec<String>,
}

/// One side of the domain graph (business or technical).
#[derive(Debug, Default)]
pub struct DomainArena {
    nodes: Vec<DomainNode>,
    index: HashMap<String, usize>,
    names: HashMap<String, String>,
}

impl DomainArena {
    pub fn get(&self, id: &str) -> Option<&DomainNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn id_by_name(&self, normalized_name: &str) -> Option<&str> {
        self.names.get(normalized_name).map(String::as_str)
    }

    pub fn name_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(name, id)| (name.as_str(), id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Expanded id set under `id`: the node itself, its hierarchy
    /// descendants, and (transitively) everything it encompasses.
    pub fn expanded_ids(&self, id: &str) -> Vec<String> {
        let Some(&root) = self.index.get(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            let node = &self.nodes[idx];
            out.push(node.id.clone());
            stack.extend(node.children.iter().copied());
            stack.extend(node.encompasses.iter().copied());
        }
        out.sort();
        out
    }

    pub fn share_parent(&self, a: &str, b: &str) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(na), Some(nb)) => match (na.parent, nb.parent) {
                (Some(pa), Some(pb)) => pa == pb,
                _ => false,
            },
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DomainGraph {
    pub business: DomainArena,
    pub technical: DomainArena,
}

/// Builder for one domain arena.
#[derive(Default)]
pub struct DomainArenaBuilder {
    nodes: Vec<DomainNode>,
    index: HashMap<String, usize>,
    names: HashMap<String, String>,
    parents: Vec<Option<String>>,
    encompasses: Vec<(String, String)>,
}

impl DomainArenaBuilder {
    pub fn add_domain(
        &mut self,
        id: &str,
        name: &str,
        normalized_name: String,
        parent_id: Option<String>,
        implied_by_categories: Vec<String>,
    ) {
        if self.index.contains_key(id) {
            return;
        }
        let idx = self.nodes.len();
        self.nodes.push(DomainNode {
            id: id.to_string(),
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            encompasses: Vec::new(),
            implied_by_categories,
        });
        self.index.insert(id.to_string(), idx);
        self.names.insert(normalized_name, id.to_string());
        self.parents.push(parent_id);
    }

    pub fn add_encompasses(&mut self, composite: &str, member: &str) {
        self.encompasses.push((composite.to_string(), member.to_string()));
    }

    pub fn finish(mut self) -> Result<DomainArena, GraphError> {
        for idx in 0..self.nodes.len() {
            if let Some(parent_id) = self.parents[idx].clone()
                && let Some(&parent_idx) = self.index.get(&parent_id)
            {
                self.nodes[idx].parent = Some(parent_idx);
                self.nodes[parent_idx].children.push(idx);
            }
        }
        for (composite, member) in std::mem::take(&mut self.encompasses) {
            if let (Some(&ci), Some(&mi)) = (self.index.get(&composite), self.index.get(&member)) {
                self.nodes[ci].encompasses.push(mi);
            }
        }
        let parents: Vec<Option<usize>> = self.nodes.iter().map(|n| n.parent).collect();
        detect_cycle(&parents, |idx| self.nodes[idx].id.clone(), "CHILD_OF")?;
        self.detect_encompasses_cycle()?;
        Ok(DomainArena { nodes: self.nodes, index: self.index, names: self.names })
    }

    fn detect_encompasses_cycle(&self) -> Result<(), GraphError> {
        // Colors: 0 = unvisited, 1 = on stack, 2 = done.
        let mut color = vec![0u8; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if color[start] != 0 {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            color[start] = 1;
            while let Some(top) = stack.last_mut() {
                let (idx, edge) = *top;
                let node = &self.nodes[idx];
                if edge < node.encompasses.len() {
                    top.1 += 1;
                    let next = node.encompasses[edge];
                    match color[next] {
                        0 => {
                            color[next] = 1;
                            stack.push((next, 0));
                        }
                        1 => {
                            return Err(GraphError::CyclicHierarchy {
                                relation: "ENCOMPASSES".into(),
                                node_id: self.nodes[next].id.clone(),
                            });
                        }
                        _ => {}
                    }
                } else {
                    color[idx] = 2;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

/// Walk parent chains; a chain longer than the node count means a cycle.
fn detect_cycle<F: Fn(usize) -> String>(
    parents: &[Option<usize>],
    id_of: F,
    relation: &str,
) -> Result<(), GraphError> {
    for start in 0..parents.len() {
        let mut idx = start;
        let mut hops = 0usize;
        while let Some(parent) = parents[idx] {
            idx = parent;
            hops += 1;
            if hops > parents.len() {
                return Err(GraphError::CyclicHierarchy {
                    relation: relation.to_string(),
                    node_id: id_of(start),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_tree() -> SkillGraphBuilder {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("skill_backend", "Backend", "backend".into(), None, None);
        b.add_skill(
            "skill_python",
            "Python",
            "python".into(),
            Some("cat_languages".into()),
            Some("skill_backend".into()),
        );
        b.add_skill(
            "skill_django",
            "Django",
            "django".into(),
            Some("cat_frameworks".into()),
            Some("skill_python".into()),
        );
        b.add_skill(
            "skill_flask",
            "Flask",
            "flask".into(),
            Some("cat_frameworks".into()),
            Some("skill_python".into()),
        );
        b
    }

    #[test]
    fn leaf_expansion_includes_only_leaves() {
        let graph = builder_with_tree().finish().unwrap();
        assert_eq!(
            graph.leaf_ids_under("skill_backend"),
            vec!["skill_django".to_string(), "skill_flask".to_string()]
        );
        // A leaf expands to itself.
        assert_eq!(graph.leaf_ids_under("skill_django"), vec!["skill_django".to_string()]);
    }

    #[test]
    fn descendant_check_is_transitive() {
        let graph = builder_with_tree().finish().unwrap();
        assert!(graph.is_descendant_of("skill_django", "skill_backend"));
        assert!(graph.is_descendant_of("skill_django", "skill_python"));
        assert!(!graph.is_descendant_of("skill_backend", "skill_django"));
        assert!(!graph.is_descendant_of("skill_django", "skill_django"));
    }

    #[test]
    fn sibling_and_category_relations() {
        let graph = builder_with_tree().finish().unwrap();
        assert!(graph.share_parent("skill_django", "skill_flask"));
        assert!(graph.same_category("skill_django", "skill_flask"));
        assert!(!graph.same_category("skill_python", "skill_django"));
    }

    #[test]
    fn correlation_takes_the_strongest_direction() {
        let mut b = builder_with_tree();
        b.add_correlation("skill_django", "skill_flask", 0.6, "alternative");
        b.add_correlation("skill_flask", "skill_django", 0.8, "alternative");
        let graph = b.finish().unwrap();
        assert_eq!(graph.correlation_between("skill_django", "skill_flask"), Some(0.8));
        assert_eq!(graph.correlation_between("skill_django", "skill_backend"), None);
    }

    #[test]
    fn child_of_cycle_is_refused() {
        let mut b = SkillGraphBuilder::default();
        b.add_skill("a", "A", "a".into(), None, Some("b".into()));
        b.add_skill("b", "B", "b".into(), None, Some("a".into()));
        let err = b.finish().unwrap_err();
        assert!(matches!(err, GraphError::CyclicHierarchy { .. }));
    }

    #[test]
    fn encompasses_cycle_is_refused() {
        let mut b = DomainArenaBuilder::default();
        b.add_domain("d1", "One", "one".into(), None, vec![]);
        b.add_domain("d2", "Two", "two".into(), None, vec![]);
        b.add_encompasses("d1", "d2");
        b.add_encompasses("d2", "d1");
        assert!(matches!(b.finish(), Err(GraphError::CyclicHierarchy { .. })));
    }

    #[test]
    fn domain_expansion_follows_children_and_encompasses() {
        let mut b = DomainArenaBuilder::default();
        b.add_domain("dom_web", "Web", "web".into(), None, vec![]);
        b.add_domain("dom_frontend", "Frontend", "frontend".into(), Some("dom_web".into()), vec![]);
        b.add_domain("dom_fullstack", "Full Stack", "full_stack".into(), None, vec![]);
        b.add_encompasses("dom_fullstack", "dom_web");
        let arena = b.finish().unwrap();
        assert_eq!(
            arena.expanded_ids("dom_fullstack"),
            vec!["dom_frontend".to_string(), "dom_fullstack".to_string(), "dom_web".to_string()]
        );
    }
}
