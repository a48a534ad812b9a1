//! Criteria kinds and the set type used to select them.

/// One dimension of a search, or the value-rendering modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriteriaKind {
    /// Match names against a regular expression.
    NameRegex,
    /// Match names exactly.
    NameExact,
    /// Match on variable flags.
    FlagsMatch,
    /// Match on variable tags.
    TagsMatch,
    /// Match on the owning instance identifier.
    InstanceIdMatch,
    /// Render each match's value after its name.
    ShowValue,
    /// Invert the flags test. Implies [`CriteriaKind::FlagsMatch`].
    NegateFlags,
}

bitflags::bitflags! {
    /// A set of enabled criteria kinds.
    ///
    /// The bit values are the raw mask accepted at the caller boundary.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CriteriaSet: u32 {
        const NAME_REGEX = 1 << 0;
        const NAME_EXACT = 1 << 1;
        const FLAGS_MATCH = 1 << 2;
        const TAGS_MATCH = 1 << 3;
        const INSTANCE_ID_MATCH = 1 << 4;
        const SHOW_VALUE = 1 << 5;
        const NEGATE_FLAGS = 1 << 6;
    }
}

impl CriteriaKind {
    /// Returns the bitflag for this kind.
    pub const fn as_set(self) -> CriteriaSet {
        match self {
            Self::NameRegex => CriteriaSet::NAME_REGEX,
            Self::NameExact => CriteriaSet::NAME_EXACT,
            Self::FlagsMatch => CriteriaSet::FLAGS_MATCH,
            Self::TagsMatch => CriteriaSet::TAGS_MATCH,
            Self::InstanceIdMatch => CriteriaSet::INSTANCE_ID_MATCH,
            Self::ShowValue => CriteriaSet::SHOW_VALUE,
            Self::NegateFlags => CriteriaSet::NEGATE_FLAGS,
        }
    }

    /// Whether this kind restricts the result set.
    pub const fn is_filter(self) -> bool {
        !matches!(self, Self::ShowValue)
    }
}

impl From<CriteriaKind> for CriteriaSet {
    fn from(kind: CriteriaKind) -> Self {
        kind.as_set()
    }
}

impl FromIterator<CriteriaKind> for CriteriaSet {
    fn from_iter<I: IntoIterator<Item = CriteriaKind>>(iter: I) -> Self {
        let mut set = CriteriaSet::empty();
        for kind in iter {
            set |= kind.as_set();
        }
        set
    }
}

impl CriteriaSet {
    /// Check whether a kind is enabled.
    pub fn has(self, kind: CriteriaKind) -> bool {
        self.contains(kind.as_set())
    }

    /// The enabled filter kinds, excluding rendering modifiers.
    pub fn filters(self) -> CriteriaSet {
        self - CriteriaSet::SHOW_VALUE
    }
}
