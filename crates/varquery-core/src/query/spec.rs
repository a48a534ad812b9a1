//! The canonical, validated search specification.

use super::criteria::{CriteriaKind, CriteriaSet};
use super::flags::VarFlags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How variable names are matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum NameMatch {
    /// Unanchored regular expression search over the name.
    Regex(String),
    /// Exact name equality.
    Exact(String),
}

impl NameMatch {
    /// The pattern text, as supplied by the caller.
    pub fn pattern(&self) -> &str {
        match self {
            NameMatch::Regex(p) | NameMatch::Exact(p) => p,
        }
    }
}

/// Flags test applied to each variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagsFilter {
    /// Sent as raw bits, so bits without a flag name are not lost.
    #[serde(with = "mask_bits")]
    pub mask: VarFlags,
    /// Select variables carrying none of `mask` instead of all of it.
    #[serde(default)]
    pub negate: bool,
}

impl FlagsFilter {
    pub fn matches(&self, flags: VarFlags) -> bool {
        if self.negate {
            !flags.intersects(self.mask)
        } else {
            flags.contains(self.mask)
        }
    }
}

mod mask_bits {
    use super::VarFlags;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mask: &VarFlags, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(mask.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VarFlags, D::Error> {
        u32::deserialize(deserializer).map(VarFlags::from_bits_retain)
    }
}

/// Comma separated list of tag tokens, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSpec(String);

impl TagSpec {
    pub(crate) fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The non-empty tag tokens.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').filter(|t| !t.is_empty())
    }
}

/// Owning-instance identifier. `0` means "no specific instance".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u32);

impl InstanceId {
    pub const UNQUALIFIED: InstanceId = InstanceId(0);

    pub fn is_unqualified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated search.
///
/// Each filter has its own typed payload; an absent payload means the
/// filter is off. With no filter set the search matches every entry.
///
/// Built by [`super::build`] or [`super::SearchBuilder`]. Immutable once
/// built; iteration position lives in a separate [`crate::registry::Cursor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SearchSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<NameMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) flags: Option<FlagsFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tags: Option<TagSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) instance: Option<InstanceId>,
    #[serde(default)]
    pub(crate) show_value: bool,
    #[serde(default)]
    pub(crate) tag_filter_dropped: bool,
}

impl SearchSpecification {
    /// A specification with no filters: an unrestricted scan.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&NameMatch> {
        self.name.as_ref()
    }

    pub fn flags(&self) -> Option<&FlagsFilter> {
        self.flags.as_ref()
    }

    pub fn tags(&self) -> Option<&TagSpec> {
        self.tags.as_ref()
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    pub fn show_value(&self) -> bool {
        self.show_value
    }

    /// Whether a tag filter was requested but dropped for being too long.
    ///
    /// The search still runs, without the tag filter.
    pub fn tag_filter_dropped(&self) -> bool {
        self.tag_filter_dropped
    }

    /// Whether no filter is active.
    pub fn is_unrestricted(&self) -> bool {
        self.name.is_none() && self.flags.is_none() && self.tags.is_none() && self.instance.is_none()
    }

    /// The criteria kinds in effect, as a set.
    pub fn criteria(&self) -> CriteriaSet {
        let mut set = CriteriaSet::empty();
        match &self.name {
            Some(NameMatch::Regex(_)) => set |= CriteriaKind::NameRegex.as_set(),
            Some(NameMatch::Exact(_)) => set |= CriteriaKind::NameExact.as_set(),
            None => {}
        }
        if let Some(flags) = &self.flags {
            set |= CriteriaSet::FLAGS_MATCH;
            if flags.negate {
                set |= CriteriaSet::NEGATE_FLAGS;
            }
        }
        if self.tags.is_some() {
            set |= CriteriaSet::TAGS_MATCH;
        }
        if self.instance.is_some() {
            set |= CriteriaSet::INSTANCE_ID_MATCH;
        }
        if self.show_value {
            set |= CriteriaSet::SHOW_VALUE;
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_has_no_filters() {
        let spec = SearchSpecification::unrestricted();
        assert!(spec.is_unrestricted());
        assert_eq!(spec.criteria(), CriteriaSet::empty());
    }

    #[test]
    fn test_flags_filter_positive_requires_all_bits() {
        let filter = FlagsFilter {
            mask: VarFlags::VOLATILE | VarFlags::READONLY,
            negate: false,
        };
        assert!(filter.matches(VarFlags::all()));
        assert!(!filter.matches(VarFlags::VOLATILE));
    }

    #[test]
    fn test_flags_filter_negated_rejects_any_bit() {
        let filter = FlagsFilter {
            mask: VarFlags::HIDDEN,
            negate: true,
        };
        assert!(filter.matches(VarFlags::VOLATILE));
        assert!(!filter.matches(VarFlags::HIDDEN | VarFlags::VOLATILE));
    }

    #[test]
    fn test_tag_tokens_skip_empty() {
        let tags = TagSpec::new("net,,config,");
        assert_eq!(tags.tags().collect::<Vec<_>>(), vec!["net", "config"]);
    }

    #[test]
    fn test_specification_wire_shape() {
        let spec = SearchSpecification {
            name: Some(NameMatch::Regex("^sys".into())),
            show_value: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["name"]["kind"], "regex");
        assert_eq!(json["name"]["pattern"], "^sys");
        assert!(json.get("tags").is_none());

        let parsed: SearchSpecification = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_flags_mask_keeps_unnamed_bits_on_the_wire() {
        let spec = SearchSpecification {
            flags: Some(FlagsFilter {
                mask: VarFlags::from_bits_retain(1 << 5 | 1),
                negate: false,
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["flags"]["mask"], 33);

        let parsed: SearchSpecification = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, spec);
        assert!(!parsed.flags().unwrap().matches(VarFlags::all()));
    }
}
