//! Deterministic dependency ordering
//!
//! Kahn's algorithm over the declared dependency graph, with a lexicographic
//! tie-break so unrelated mods always order the same way. Cycle members are
//! identified exactly; mods merely downstream of a cycle still receive an
//! order position and are failed later by resolution instead.

use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct OrderingResult {
    /// Every non-cyclic mod id, dependencies before dependents, ties broken
    /// by id
    pub order: Vec<String>,
    /// Exactly the ids participating in a dependency cycle
    pub cyclic: BTreeSet<String>,
}

impl OrderingResult {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|entry| entry == id)
    }
}

/// Compute the total order for `graph`, mapping each mod id to its declared
/// dependency ids. Dependencies on unknown ids are ignored here; presence
/// checks belong to resolution.
pub fn compute_order(graph: &HashMap<String, Vec<String>>) -> OrderingResult {
    let present_deps: HashMap<&str, Vec<&str>> = graph
        .iter()
        .map(|(id, deps)| {
            let deps: Vec<&str> = deps
                .iter()
                .filter(|dep| *dep != id && graph.contains_key(*dep))
                .map(|dep| dep.as_str())
                .collect();
            (id.as_str(), deps)
        })
        .collect();

    let leftover = kahn(&present_deps, &HashSet::new()).1;
    let cyclic: BTreeSet<String> = if leftover.is_empty() {
        BTreeSet::new()
    } else {
        cycle_members(&present_deps, &leftover)
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    };

    let excluded: HashSet<&str> = cyclic.iter().map(|id| id.as_str()).collect();
    let (order, _) = kahn(&present_deps, &excluded);

    OrderingResult {
        order: order.into_iter().map(|id| id.to_string()).collect(),
        cyclic,
    }
}

/// Kahn's algorithm with a sorted ready set. Returns the emitted order and
/// the ids left unprocessed (cycle members and their dependents).
fn kahn<'a>(
    deps_of: &HashMap<&'a str, Vec<&'a str>>,
    excluded: &HashSet<&str>,
) -> (Vec<&'a str>, HashSet<&'a str>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (&id, deps) in deps_of {
        if excluded.contains(id) {
            continue;
        }
        let live_deps = deps.iter().filter(|dep| !excluded.contains(*dep)).count();
        in_degree.insert(id, live_deps);

        for &dep in deps {
            if !excluded.contains(dep) {
                dependents.entry(dep).or_default().push(id);
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id);

        if let Some(children) = dependents.get(id) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
    }

    let emitted: HashSet<&str> = order.iter().copied().collect();
    let leftover: HashSet<&str> = in_degree
        .keys()
        .filter(|id| !emitted.contains(*id))
        .copied()
        .collect();

    (order, leftover)
}

/// A leftover id is a cycle member iff it can reach itself through dependency
/// edges within the leftover subgraph. Leftovers that merely depend on a
/// cycle cannot.
fn cycle_members<'a>(
    deps_of: &HashMap<&'a str, Vec<&'a str>>,
    leftover: &HashSet<&'a str>,
) -> HashSet<&'a str> {
    let mut members = HashSet::new();

    for &start in leftover {
        let mut stack: Vec<&str> = deps_of
            .get(start)
            .map(|deps| {
                deps.iter()
                    .filter(|dep| leftover.contains(*dep))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == start {
                members.insert(start);
                break;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = deps_of.get(current) {
                stack.extend(deps.iter().filter(|dep| leftover.contains(*dep)).copied());
            }
        }
    }

    members
}
