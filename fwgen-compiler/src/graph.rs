// Instance ordering
// Prerequisites come from id references, kind-level `depends_on` and
// `auto_load`; core instances precede everything else. Kahn's algorithm runs
// level by level; inside a level the document order decides.

use crate::registry::ComponentRegistry;
use crate::session::Session;
use fwgen_diagnostics::{ConfigPath, Diagnostic, ErrorKind};
use fwgen_schema::InstanceId;
use log::{debug, trace};
use std::collections::{BTreeSet, VecDeque};

/// Prerequisite sets, indexed by instance: `requires[a]` must precede `a`
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    requires: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn build(session: &Session, registry: &ComponentRegistry) -> Self {
        let count = session.instances().len();
        let mut requires = vec![BTreeSet::new(); count];

        for &(referrer, referent) in session.edges() {
            if referrer.0 < count && referent.0 < count {
                requires[referrer.0].insert(referent.0);
            }
        }

        let is_core = |kind: &str| registry.get(kind).is_some_and(|k| k.core);
        let core: Vec<usize> = session
            .instances()
            .iter()
            .filter(|i| is_core(&i.kind))
            .map(|i| i.id.0)
            .collect();

        for instance in session.instances() {
            let Some(kind) = registry.get(&instance.kind) else {
                continue;
            };
            if !kind.core {
                requires[instance.id.0].extend(core.iter().copied());
            }
            let prerequisites = kind.depends_on.iter().chain(kind.auto_load.iter());
            for target in prerequisites.filter(|t| **t != instance.kind) {
                for other in session.instances().iter().filter(|o| &o.kind == target) {
                    trace!("{} requires {} ({})", instance.path, other.path, target);
                    requires[instance.id.0].insert(other.id.0);
                }
            }
        }

        Self { requires }
    }

    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    pub fn requires(&self, id: InstanceId) -> impl Iterator<Item = InstanceId> + '_ {
        self.requires
            .get(id.0)
            .into_iter()
            .flatten()
            .map(|&i| InstanceId(i))
    }

    /// Topological order, or the remaining nodes when a cycle blocks it
    fn kahn(&self) -> Result<Vec<InstanceId>, Vec<usize>> {
        let count = self.requires.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut pending: Vec<usize> = vec![0; count];
        for (node, prerequisites) in self.requires.iter().enumerate() {
            pending[node] = prerequisites.len();
            for &p in prerequisites {
                dependents[p].push(node);
            }
        }

        let mut order = Vec::with_capacity(count);
        let mut level: Vec<usize> = (0..count).filter(|&n| pending[n] == 0).collect();
        while !level.is_empty() {
            level.sort_unstable();
            let mut next = Vec::new();
            for &node in &level {
                order.push(InstanceId(node));
                for &dependent in &dependents[node] {
                    pending[dependent] -= 1;
                    if pending[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            level = next;
        }

        if order.len() == count {
            Ok(order)
        } else {
            Err((0..count).filter(|&n| pending[n] > 0).collect())
        }
    }

    /// Shortest cycle through any of `blocked`, as a closed walk
    fn shortest_cycle(&self, blocked: &[usize]) -> Vec<usize> {
        let mut best: Option<Vec<usize>> = None;
        for &start in blocked {
            let Some(cycle) = self.cycle_through(start) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                best = Some(cycle);
            }
        }
        best.unwrap_or_default()
    }

    fn cycle_through(&self, start: usize) -> Option<Vec<usize>> {
        let count = self.requires.len();
        let mut parent: Vec<Option<usize>> = vec![None; count];
        let mut seen = vec![false; count];
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &next in &self.requires[node] {
                if next == start {
                    let mut inner = Vec::new();
                    let mut cursor = node;
                    while cursor != start {
                        inner.push(cursor);
                        cursor = parent[cursor]?;
                    }
                    inner.reverse();
                    let mut walk = Vec::with_capacity(inner.len() + 2);
                    walk.push(start);
                    walk.extend(inner);
                    walk.push(start);
                    return Some(walk);
                }
                if !seen[next] {
                    seen[next] = true;
                    parent[next] = Some(node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

/// Emission order for every instance of `session`
pub fn order(session: &Session, registry: &ComponentRegistry) -> Result<Vec<InstanceId>, Diagnostic> {
    let graph = DependencyGraph::build(session, registry);
    match graph.kahn() {
        Ok(order) => {
            debug!(
                "emission order: {}",
                order
                    .iter()
                    .map(|id| session.label(*id))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Ok(order)
        }
        Err(blocked) => {
            let cycle = graph.shortest_cycle(&blocked);
            let names: Vec<String> = cycle.iter().map(|&n| session.label(InstanceId(n))).collect();
            let path = cycle
                .first()
                .and_then(|&n| session.instance(InstanceId(n)))
                .map_or_else(ConfigPath::root, |i| i.path.clone());
            Err(Diagnostic::new(
                ErrorKind::CircularDependency,
                format!("Circular dependency: {}", names.join(" → ")),
                path,
            ))
        }
    }
}
