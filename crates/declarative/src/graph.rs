//! Dependency graph builder - turns declarations into an ordered plan
//!
//! Edge semantics:
//! - `A requires B` ⇒ B converges before A
//! - `A notifies C` ⇒ A converges before C, and C is refreshed if A changes
//!
//! Both edge sets order the plan but are stored separately, since only
//! notify edges trigger refreshes.

use crate::error::{Error, Result};
use crate::resource::{Declaration, Resource};
use crate::types::ResourceKey;
use std::collections::{BTreeSet, HashMap};

/// A validated, acyclic set of declarations with a stable topological order
#[derive(Debug)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    order: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) decl: Declaration,
    /// Indices this node requires
    pub(crate) requires: Vec<usize>,
    /// Indices this node notifies
    pub(crate) notifies: Vec<usize>,
    /// Every index that must finish before this node (requires ∪ notifiers)
    pub(crate) dependencies: BTreeSet<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

impl ResourceGraph {
    /// Validate declarations and build the graph
    ///
    /// Fails on the first invalid resource, duplicate key, dangling edge,
    /// or cycle. Nothing about the host is touched.
    pub fn build(declarations: Vec<Declaration>) -> Result<Self> {
        let mut index: HashMap<ResourceKey, usize> = HashMap::with_capacity(declarations.len());

        for (i, decl) in declarations.iter().enumerate() {
            let key = decl.key();
            decl.resource
                .validate()
                .map_err(|message| Error::validation(key.clone(), message))?;
            if index.insert(key.clone(), i).is_some() {
                return Err(Error::DuplicateResource(key));
            }
        }

        let resolve = |from: &ResourceKey, targets: &[ResourceKey]| -> Result<Vec<usize>> {
            targets
                .iter()
                .map(|t| {
                    index
                        .get(t)
                        .copied()
                        .ok_or_else(|| Error::UnresolvedReference {
                            from: from.clone(),
                            target: t.clone(),
                        })
                })
                .collect()
        };

        let mut nodes = Vec::with_capacity(declarations.len());
        for decl in declarations {
            let key = decl.key();
            let requires = resolve(&key, &decl.requires)?;
            let notifies = resolve(&key, &decl.notifies)?;
            nodes.push(Node {
                dependencies: requires.iter().copied().collect(),
                decl,
                requires,
                notifies,
            });
        }

        for i in 0..nodes.len() {
            for target in nodes[i].notifies.clone() {
                nodes[target].dependencies.insert(i);
            }
        }

        if let Some(cycle) = find_cycle(&nodes) {
            return Err(Error::Cycle(
                cycle.into_iter().map(|i| nodes[i].decl.key()).collect(),
            ));
        }

        let order = topological_order(&nodes);
        log::debug!("Built plan with {} resources", order.len());

        Ok(Self { nodes, order })
    }

    /// Total number of resources in the plan
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resources in convergence order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Resource> {
        self.order.iter().map(|&i| self.nodes[i].decl.resource.as_ref())
    }

    /// Keys in convergence order
    pub fn plan(&self) -> Vec<ResourceKey> {
        self.iter().map(Resource::key).collect()
    }

    /// Look up a resource by key
    pub fn get(&self, key: &ResourceKey) -> Option<&dyn Resource> {
        self.index_of(key).map(|i| self.nodes[i].decl.resource.as_ref())
    }

    /// Position of `key` in the convergence order
    pub fn position(&self, key: &ResourceKey) -> Option<usize> {
        let i = self.index_of(key)?;
        self.order.iter().position(|&o| o == i)
    }

    /// Declared `require` targets of `key`, in declaration order
    pub fn requires_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        self.index_of(key)
            .map(|i| self.keys(&self.nodes[i].requires))
            .unwrap_or_default()
    }

    /// Declared `notify` targets of `key`, in declaration order
    pub fn notifies_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        self.index_of(key)
            .map(|i| self.keys(&self.nodes[i].notifies))
            .unwrap_or_default()
    }

    fn keys(&self, indices: &[usize]) -> Vec<ResourceKey> {
        indices.iter().map(|&i| self.nodes[i].decl.key()).collect()
    }

    /// Group the plan into waves whose members share no dependency path
    ///
    /// Every resource sits one wave after its deepest dependency. Within a
    /// wave, plan order is kept.
    pub fn waves(&self) -> Vec<Vec<ResourceKey>> {
        self.wave_indices()
            .into_iter()
            .map(|wave| wave.into_iter().map(|i| self.nodes[i].decl.key()).collect())
            .collect()
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn wave_indices(&self) -> Vec<Vec<usize>> {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut waves: Vec<Vec<usize>> = Vec::new();
        for &i in &self.order {
            let d = self.nodes[i]
                .dependencies
                .iter()
                .map(|&dep| depth[dep] + 1)
                .max()
                .unwrap_or(0);
            depth[i] = d;
            if waves.len() <= d {
                waves.resize_with(d + 1, Vec::new);
            }
            waves[d].push(i);
        }
        waves
    }

    fn index_of(&self, key: &ResourceKey) -> Option<usize> {
        self.nodes.iter().position(|n| &n.decl.key() == key)
    }
}

/// Depth-first search with visiting/visited marks over dependency edges
///
/// Returns the cycle as a closed path (first == last) if one exists.
fn find_cycle(nodes: &[Node]) -> Option<Vec<usize>> {
    fn visit(
        i: usize,
        nodes: &[Node],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[i] = Mark::Visiting;
        stack.push(i);
        for &dep in &nodes[i].dependencies {
            match marks[dep] {
                Mark::Visiting => {
                    let start = stack.iter().position(|&s| s == dep).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(dep, nodes, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Visited => {}
            }
        }
        stack.pop();
        marks[i] = Mark::Visited;
        None
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut stack = Vec::new();
    for i in 0..nodes.len() {
        if marks[i] == Mark::Unvisited
            && let Some(cycle) = visit(i, nodes, &mut marks, &mut stack)
        {
            return Some(cycle);
        }
    }
    None
}

/// Kahn's algorithm; among ready nodes the earliest declaration wins
fn topological_order(nodes: &[Node]) -> Vec<usize> {
    let mut pending: Vec<usize> = nodes.iter().map(|n| n.dependencies.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for &dep in &node.dependencies {
            dependents[dep].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(d);
            }
        }
    }

    order
}
