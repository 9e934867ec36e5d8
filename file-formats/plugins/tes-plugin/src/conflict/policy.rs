//! Merge configuration and bash tags

use crate::records::{self, FieldGroup};
use crate::signature::Signature;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// How overrides of one record category are combined
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CategoryPolicy {
    /// The last contributor in load order wins outright
    #[default]
    Override,
    /// Listed field groups take the latest change; the rest follow the winner
    Selective(BTreeSet<FieldGroup>),
}

impl CategoryPolicy {
    /// Field groups merged under this policy
    pub fn groups(&self) -> BTreeSet<FieldGroup> {
        match self {
            CategoryPolicy::Override => BTreeSet::new(),
            CategoryPolicy::Selective(groups) => groups.clone(),
        }
    }
}

/// Whether bash tags in plugin descriptions take part in the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TagMode {
    /// Only the category policies apply
    #[default]
    Ignore,
    /// Tags add or remove groups on top of the category policy
    Honor,
}

/// Merge settings for a patch build
///
/// # Examples
///
/// ```
/// use tes_plugin::conflict::{MergeConfig, TagMode};
/// use tes_plugin::records::FieldGroup;
/// use tes_plugin::signature::sigs;
///
/// let config = MergeConfig::new()
///     .selective(sigs::MISC, [FieldGroup::Names, FieldGroup::Stats])
///     .tag_mode(TagMode::Honor);
/// assert!(config.validate().is_ok());
/// assert!(config.policy(sigs::MISC).groups().contains(&FieldGroup::Stats));
/// assert!(config.policy(sigs::GLOB).groups().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeConfig {
    /// Policy per category signature; absent categories use `Override`
    pub categories: BTreeMap<Signature, CategoryPolicy>,
    /// Bash tag handling
    pub tags: TagMode,
}

impl MergeConfig {
    /// Plain override for every category, tags ignored
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy of one category
    pub fn category(mut self, signature: Signature, policy: CategoryPolicy) -> Self {
        self.categories.insert(signature, policy);
        self
    }

    /// Merge `groups` of one category selectively
    pub fn selective<I>(self, signature: Signature, groups: I) -> Self
    where
        I: IntoIterator<Item = FieldGroup>,
    {
        self.category(
            signature,
            CategoryPolicy::Selective(groups.into_iter().collect()),
        )
    }

    /// Set the bash tag mode
    pub fn tag_mode(mut self, mode: TagMode) -> Self {
        self.tags = mode;
        self
    }

    /// Policy for `signature`
    pub fn policy(&self, signature: Signature) -> CategoryPolicy {
        self.categories.get(&signature).cloned().unwrap_or_default()
    }

    /// Reject policies for categories without a typed layout
    pub fn validate(&self) -> Result<()> {
        for (signature, policy) in &self.categories {
            if !records::is_supported(*signature) {
                return Err(Error::InvalidConfig(format!(
                    "no typed layout for {signature} records"
                )));
            }
            if matches!(policy, CategoryPolicy::Selective(groups) if groups.is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "selective policy for {signature} names no field groups"
                )));
            }
        }
        Ok(())
    }
}

/// Merge requests a plugin embeds in its description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BashTags {
    /// Groups the plugin asks to have merged
    pub merge: BTreeSet<FieldGroup>,
    /// Groups the plugin asks to win outright (`-Tag`)
    pub replace: BTreeSet<FieldGroup>,
}

impl BashTags {
    /// Parse every `{{BASH:...}}` block of a description
    ///
    /// Unknown tag names are skipped. `Relev` and `Delev` are accepted as
    /// names for [`FieldGroup::Entries`]. A group named both ways ends up in
    /// `replace`.
    ///
    /// ```
    /// use tes_plugin::conflict::BashTags;
    /// use tes_plugin::records::FieldGroup;
    ///
    /// let tags = BashTags::parse("Better gems {{BASH:Names, Relev,-Stats}}");
    /// assert!(tags.merge.contains(&FieldGroup::Names));
    /// assert!(tags.merge.contains(&FieldGroup::Entries));
    /// assert!(tags.replace.contains(&FieldGroup::Stats));
    /// ```
    pub fn parse(description: &str) -> Self {
        let mut tags = Self::default();
        let mut rest = description;
        while let Some(start) = rest.find("{{BASH:") {
            let body = &rest[start + "{{BASH:".len()..];
            let Some(end) = body.find("}}") else {
                log::debug!("Unterminated bash tag block in {description:?}");
                break;
            };
            for raw in body[..end].split(',') {
                let raw = raw.trim();
                let (name, replace) = match raw.strip_prefix('-') {
                    Some(name) => (name.trim(), true),
                    None => (raw, false),
                };
                let group = match name.to_ascii_lowercase().as_str() {
                    "relev" | "delev" => Ok(FieldGroup::Entries),
                    _ => name.parse::<FieldGroup>(),
                };
                match group {
                    Ok(group) if replace => {
                        tags.merge.remove(&group);
                        tags.replace.insert(group);
                    }
                    Ok(group) if !tags.replace.contains(&group) => {
                        tags.merge.insert(group);
                    }
                    Ok(_) => {}
                    Err(_) if name.is_empty() => {}
                    Err(_) => log::debug!("Ignoring unknown bash tag {name:?}"),
                }
            }
            rest = &body[end + 2..];
        }
        tags
    }

    /// Whether no tag was found
    pub fn is_empty(&self) -> bool {
        self.merge.is_empty() && self.replace.is_empty()
    }
}
