//! Field-level deltas along a contribution chain

use crate::formid::PluginName;
use crate::records::{FieldMap, FieldValue};

/// Change one contributor made to one field relative to its baseline
#[derive(Debug, Clone, PartialEq)]
enum Delta {
    /// New or changed scalar value
    Set(FieldValue),
    /// Field dropped
    Removed,
    /// Elements added to and removed from a list
    ListEdit {
        added: Vec<FieldValue>,
        removed: Vec<FieldValue>,
        /// The contributor's whole list, bounding how often an addition repeats
        after: Vec<FieldValue>,
    },
}

/// One contribution's fields
#[derive(Debug)]
pub(crate) struct Layer<'a> {
    pub(crate) plugin: &'a PluginName,
    pub(crate) fields: FieldMap,
}

fn as_list(value: Option<&FieldValue>) -> Option<&[FieldValue]> {
    match value {
        Some(FieldValue::Array(items)) => Some(items),
        None => Some(&[]),
        Some(_) => None,
    }
}

/// Elements of `from` left after taking out one match per element of `take`
fn multiset_minus(from: &[FieldValue], take: &[FieldValue]) -> Vec<FieldValue> {
    let mut used = vec![false; take.len()];
    from.iter()
        .filter(|item| {
            match take
                .iter()
                .enumerate()
                .position(|(i, other)| !used[i] && other == *item)
            {
                Some(i) => {
                    used[i] = true;
                    false
                }
                None => true,
            }
        })
        .cloned()
        .collect()
}

fn diff(
    before: &FieldMap,
    after: &FieldMap,
    in_scope: &dyn Fn(&str) -> bool,
) -> Vec<(String, Delta)> {
    let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
    names.sort();
    names.dedup();

    let mut deltas = Vec::new();
    for name in names.into_iter().filter(|name| in_scope(name)) {
        let old = before.get(name);
        let new = after.get(name);
        if old == new {
            continue;
        }
        let is_list = matches!(old, Some(FieldValue::Array(_)))
            || matches!(new, Some(FieldValue::Array(_)));
        let delta = match (as_list(old), as_list(new)) {
            (Some(old_items), Some(new_items)) if is_list => Delta::ListEdit {
                added: multiset_minus(new_items, old_items),
                removed: multiset_minus(old_items, new_items),
                after: new_items.to_vec(),
            },
            _ => match new {
                Some(value) => Delta::Set(value.clone()),
                None => Delta::Removed,
            },
        };
        deltas.push((name.clone(), delta));
    }
    deltas
}

fn apply(merged: &mut FieldMap, name: String, delta: Delta) {
    match delta {
        Delta::Set(value) => {
            merged.insert(name, value);
        }
        Delta::Removed => {
            merged.remove(&name);
        }
        Delta::ListEdit {
            added,
            removed,
            after,
        } => {
            let existed = merged.contains_key(&name);
            let mut items = match merged.remove(&name) {
                Some(FieldValue::Array(items)) => items,
                // a scalar cannot be edited element-wise; the list replaces it
                Some(_) | None => Vec::new(),
            };
            for item in &removed {
                if let Some(pos) = items.iter().position(|i| i == item) {
                    items.remove(pos);
                }
            }
            for item in added {
                let have = items.iter().filter(|i| **i == item).count();
                let want = after.iter().filter(|i| **i == item).count();
                if have < want {
                    items.push(item);
                }
            }
            if existed || !items.is_empty() {
                merged.insert(name, FieldValue::Array(items));
            }
        }
    }
}

/// Merge a chain of contributions, earliest first
///
/// Fields accepted by `in_scope` take each contributor's changes relative to
/// its baseline: the latest earlier layer from one of its masters, or the
/// previous layer when none is. All other fields come from the last layer.
pub(crate) fn merge_chain(
    layers: &[Layer<'_>],
    is_master: &dyn Fn(&PluginName, &PluginName) -> bool,
    in_scope: &dyn Fn(&str) -> bool,
) -> FieldMap {
    let Some((winner, _)) = layers.split_last() else {
        return FieldMap::new();
    };
    let mut merged = layers[0].fields.clone();
    for (i, layer) in layers.iter().enumerate().skip(1) {
        let baseline = (0..i)
            .rev()
            .find(|&j| layers[j].plugin == layer.plugin || is_master(layer.plugin, layers[j].plugin))
            .unwrap_or(i - 1);
        for (name, delta) in diff(&layers[baseline].fields, &layer.fields, in_scope) {
            log::trace!(
                "{} changes {name} relative to {}",
                layer.plugin,
                layers[baseline].plugin
            );
            apply(&mut merged, name, delta);
        }
    }

    let mut out: FieldMap = winner
        .fields
        .iter()
        .filter(|(name, _)| !in_scope(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    out.extend(merged.into_iter().filter(|(name, _)| in_scope(name)));
    out
}
