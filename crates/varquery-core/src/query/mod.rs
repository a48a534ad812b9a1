//! Search specifications.
//!
//! This module provides:
//! - Criteria kinds and the set type that selects them
//! - Variable flags and their comma separated text form
//! - The validated, immutable [`SearchSpecification`] and its builders

mod builder;
mod criteria;
mod flags;
mod spec;

pub use builder::{build, SearchBuilder};
pub use criteria::{CriteriaKind, CriteriaSet};
pub use flags::VarFlags;
pub use spec::{FlagsFilter, InstanceId, NameMatch, SearchSpecification, TagSpec};
