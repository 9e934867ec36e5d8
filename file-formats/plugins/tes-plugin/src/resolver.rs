//! Master dependency resolution across a load order
//!
//! Plugins form a directed graph with an edge from each master to every
//! plugin that declares it. [`normalize`] walks that graph in topological
//! order (Kahn's algorithm, ties broken by load index) and produces one
//! [`FormIdContext`] per plugin whose masters all resolved.
//!
//! Resolution never aborts: a plugin that cannot be resolved is listed in
//! [`Resolution::rejected`] and every plugin that depends on it is rejected
//! in turn with [`Error::MissingMaster`].

use crate::formid::{FormIdContext, PluginName};
use crate::load_order::LoadOrder;
use crate::{Error, Result};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// Outcome of resolving a load order
#[derive(Debug, Default)]
pub struct Resolution {
    contexts: HashMap<PluginName, FormIdContext>,
    ancestors: HashMap<PluginName, BTreeSet<PluginName>>,
    order: Vec<PluginName>,
    /// Plugins that could not be resolved, in load order
    pub rejected: Vec<(PluginName, Error)>,
}

impl Resolution {
    /// Context of a resolved plugin
    pub fn context(&self, plugin: &PluginName) -> Option<&FormIdContext> {
        self.contexts.get(plugin)
    }

    /// Whether a plugin resolved
    pub fn is_resolved(&self, plugin: &PluginName) -> bool {
        self.contexts.contains_key(plugin)
    }

    /// Resolved plugins in the order they were resolved (masters first)
    pub fn order(&self) -> &[PluginName] {
        &self.order
    }

    /// Direct and indirect masters of a resolved plugin
    pub fn ancestors(&self, plugin: &PluginName) -> Option<&BTreeSet<PluginName>> {
        self.ancestors.get(plugin)
    }

    /// Whether `master` is a direct or indirect master of `plugin`
    pub fn depends_on(&self, plugin: &PluginName, master: &PluginName) -> bool {
        self.ancestors
            .get(plugin)
            .is_some_and(|set| set.contains(master))
    }

    /// Rejection cause for a plugin
    pub fn rejection(&self, plugin: &PluginName) -> Option<&Error> {
        self.rejected
            .iter()
            .find(|(name, _)| name == plugin)
            .map(|(_, err)| err)
    }
}

/// Resolve every plugin of `load_order` against the declared master lists
///
/// `master_lists` maps each plugin to its masters in file order. A plugin of
/// the load order without an entry (for example one that failed to load) is
/// rejected with [`Error::PluginNotFound`].
pub fn normalize(
    load_order: &LoadOrder,
    master_lists: &HashMap<PluginName, Vec<PluginName>>,
) -> Resolution {
    let count = load_order.len();
    let mut early: Vec<Option<Error>> = (0..count).map(|_| None).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree = vec![0usize; count];

    for (index, plugin) in load_order.iter().enumerate() {
        let Some(masters) = master_lists.get(plugin) else {
            early[index] = Some(Error::PluginNotFound(plugin.clone()));
            continue;
        };
        for master in masters {
            let problem = match load_order.position(master) {
                Some(position) if position < index => {
                    dependents[position].push(index);
                    indegree[index] += 1;
                    continue;
                }
                Some(_) => Error::MasterOrderViolation {
                    plugin: plugin.clone(),
                    master: master.clone(),
                },
                None => Error::MissingMaster {
                    plugin: plugin.clone(),
                    master: master.clone(),
                },
            };
            if early[index].is_none() {
                early[index] = Some(problem);
            }
        }
    }

    let mut resolution = Resolution::default();
    let mut failed: Vec<Option<Error>> = (0..count).map(|_| None).collect();
    let mut visited = vec![false; count];
    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&i| indegree[i] == 0)
        .map(Reverse)
        .collect();

    while let Some(Reverse(index)) = ready.pop() {
        visited[index] = true;
        let plugin = &load_order.plugins()[index];
        let outcome = match early[index].take() {
            Some(err) => Err(err),
            None => {
                let masters = master_lists.get(plugin).map_or(&[][..], Vec::as_slice);
                resolve_one(plugin, masters, &mut resolution)
            }
        };
        if let Err(err) = outcome {
            log::warn!("Cannot resolve {plugin}: {err}");
            failed[index] = Some(err);
        }

        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    // Only reachable through a cycle; every edge points forward, so this is
    // a safety net for inconsistent input.
    for (index, seen) in visited.iter().enumerate() {
        if !seen {
            let plugin = load_order.plugins()[index].clone();
            let master = master_lists
                .get(&plugin)
                .and_then(|m| m.first().cloned())
                .unwrap_or_else(|| plugin.clone());
            failed[index] = Some(Error::MasterOrderViolation { plugin, master });
        }
    }

    for (index, err) in failed.into_iter().enumerate() {
        if let Some(err) = err {
            resolution
                .rejected
                .push((load_order.plugins()[index].clone(), err));
        }
    }
    log::debug!(
        "Resolved {} of {} plugins",
        resolution.order.len(),
        load_order.len()
    );
    resolution
}

// Every master was popped before `plugin`, so an unresolved one has failed.
fn resolve_one(
    plugin: &PluginName,
    masters: &[PluginName],
    resolution: &mut Resolution,
) -> Result<()> {
    let mut ancestors = BTreeSet::new();
    for master in masters {
        let Some(set) = resolution.ancestors.get(master) else {
            return Err(Error::MissingMaster {
                plugin: plugin.clone(),
                master: master.clone(),
            });
        };
        ancestors.extend(set.iter().cloned());
        ancestors.insert(master.clone());
    }
    resolution.contexts.insert(
        plugin.clone(),
        FormIdContext::new(plugin.clone(), masters.to_vec()),
    );
    resolution.ancestors.insert(plugin.clone(), ancestors);
    resolution.order.push(plugin.clone());
    Ok(())
}
