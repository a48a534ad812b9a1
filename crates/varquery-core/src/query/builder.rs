//! Assembly of search specifications from caller criteria.

use super::criteria::CriteriaSet;
use super::flags::VarFlags;
use super::spec::{FlagsFilter, InstanceId, NameMatch, SearchSpecification, TagSpec};
use crate::config::QueryConfig;
use crate::{Result, VarQueryError};
use tracing::warn;

/// Build a search specification from a raw criteria mask and its payloads.
///
/// Payloads whose criteria kind is not enabled are ignored. Pattern and tag
/// text are copied verbatim; an empty pattern is not rejected here, the
/// registry refuses it when the search runs.
///
/// A tag spec that does not fit the registry's buffer
/// ([`QueryConfig::MAX_TAGSPEC_LEN`]) is dropped rather than rejected: the
/// search runs without a tag filter and
/// [`SearchSpecification::tag_filter_dropped`] reports it.
///
/// # Errors
///
/// Returns [`VarQueryError::InvalidCriteria`] when `criteria` carries
/// unrecognized bits, or enables both name-matching kinds at once.
pub fn build(
    criteria: u32,
    name_pattern: Option<&str>,
    tag_spec: Option<&str>,
    instance_id: u32,
    flags_mask: u32,
) -> Result<SearchSpecification> {
    let set = CriteriaSet::from_bits(criteria).ok_or_else(|| VarQueryError::InvalidCriteria {
        bits: criteria,
        reason: format!(
            "unrecognized criteria bits {:#x}",
            criteria & !CriteriaSet::all().bits()
        ),
    })?;

    if set.contains(CriteriaSet::NAME_REGEX | CriteriaSet::NAME_EXACT) {
        return Err(VarQueryError::InvalidCriteria {
            bits: criteria,
            reason: "regex and exact name matching are mutually exclusive".to_string(),
        });
    }

    let pattern = name_pattern.unwrap_or_default();
    let name = if set.contains(CriteriaSet::NAME_REGEX) {
        Some(NameMatch::Regex(pattern.to_string()))
    } else if set.contains(CriteriaSet::NAME_EXACT) {
        Some(NameMatch::Exact(pattern.to_string()))
    } else {
        None
    };

    let flags = set
        .intersects(CriteriaSet::FLAGS_MATCH | CriteriaSet::NEGATE_FLAGS)
        .then(|| FlagsFilter {
            mask: VarFlags::from_bits_retain(flags_mask),
            negate: set.contains(CriteriaSet::NEGATE_FLAGS),
        });

    let mut tag_filter_dropped = false;
    let tags = if set.contains(CriteriaSet::TAGS_MATCH) {
        let spec = tag_spec.unwrap_or_default();
        if spec.len() < QueryConfig::MAX_TAGSPEC_LEN {
            Some(TagSpec::new(spec))
        } else {
            warn!(
                "Tag spec of {} bytes exceeds limit of {}, searching without tag filter",
                spec.len(),
                QueryConfig::MAX_TAGSPEC_LEN - 1
            );
            tag_filter_dropped = true;
            None
        }
    } else {
        None
    };

    let instance = set
        .contains(CriteriaSet::INSTANCE_ID_MATCH)
        .then_some(InstanceId(instance_id));

    Ok(SearchSpecification {
        name,
        flags,
        tags,
        instance,
        show_value: set.contains(CriteriaSet::SHOW_VALUE),
        tag_filter_dropped,
    })
}

/// Builder for search specifications with typed inputs.
///
/// # Example
///
/// ```rust
/// use varquery::query::{SearchBuilder, VarFlags};
///
/// let spec = SearchBuilder::new()
///     .name_regex("^sys\\.")
///     .flags(VarFlags::VOLATILE)
///     .show_value(true)
///     .build()
///     .unwrap();
/// assert!(spec.show_value());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchBuilder {
    criteria: CriteriaSet,
    name_pattern: Option<String>,
    tag_spec: Option<String>,
    instance_id: u32,
    flags: VarFlags,
}

impl SearchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match names against a regular expression. Replaces any exact match.
    pub fn name_regex(mut self, pattern: impl Into<String>) -> Self {
        self.criteria.remove(CriteriaSet::NAME_EXACT);
        self.criteria.insert(CriteriaSet::NAME_REGEX);
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Match names exactly. Replaces any regex match.
    pub fn name_exact(mut self, name: impl Into<String>) -> Self {
        self.criteria.remove(CriteriaSet::NAME_REGEX);
        self.criteria.insert(CriteriaSet::NAME_EXACT);
        self.name_pattern = Some(name.into());
        self
    }

    /// Select variables carrying every flag in `flags`.
    pub fn flags(mut self, flags: VarFlags) -> Self {
        self.criteria.insert(CriteriaSet::FLAGS_MATCH);
        self.criteria.remove(CriteriaSet::NEGATE_FLAGS);
        self.flags = flags;
        self
    }

    /// Select variables carrying none of the flags in `flags`.
    pub fn without_flags(mut self, flags: VarFlags) -> Self {
        self.criteria
            .insert(CriteriaSet::FLAGS_MATCH | CriteriaSet::NEGATE_FLAGS);
        self.flags = flags;
        self
    }

    /// Select variables carrying every tag in the comma separated `spec`.
    pub fn tags(mut self, spec: impl Into<String>) -> Self {
        self.criteria.insert(CriteriaSet::TAGS_MATCH);
        self.tag_spec = Some(spec.into());
        self
    }

    pub fn instance(mut self, instance_id: u32) -> Self {
        self.criteria.insert(CriteriaSet::INSTANCE_ID_MATCH);
        self.instance_id = instance_id;
        self
    }

    pub fn show_value(mut self, enable: bool) -> Self {
        self.criteria.set(CriteriaSet::SHOW_VALUE, enable);
        self
    }

    /// Build the specification.
    pub fn build(&self) -> Result<SearchSpecification> {
        build(
            self.criteria.bits(),
            self.name_pattern.as_deref(),
            self.tag_spec.as_deref(),
            self.instance_id,
            self.flags.bits(),
        )
    }
}
