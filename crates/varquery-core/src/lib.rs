//! varquery - search a live variable server registry.
//!
//! A caller describes what to look for (name pattern, flags, tags, owning
//! instance) and the crate walks the registry one match at a time through its
//! cursor protocol, writing one formatted line per match to an output sink.
//!
//! The registry itself is an external collaborator behind the [`Registry`]
//! trait. This crate ships an in-process [`MemoryRegistry`] and a
//! [`RemoteRegistry`] reaching a registry served over local IPC.
//!
//! # Example
//!
//! ```rust
//! use varquery::query::SearchBuilder;
//! use varquery::registry::{MemoryRegistry, VarEntry, VarValue};
//! use varquery::search::{self, SearchOutcome};
//!
//! let registry = MemoryRegistry::from_entries([
//!     VarEntry::new("count", VarValue::U32(42)),
//!     VarEntry::new("label", VarValue::Str("hi".into())).with_instance(3),
//! ])?;
//!
//! let spec = SearchBuilder::new().show_value(true).build()?;
//! let mut out = Vec::new();
//! let outcome = search::run(&registry, &spec, &mut out)?;
//!
//! assert_eq!(outcome, SearchOutcome::Matched { count: 2 });
//! assert_eq!(String::from_utf8(out).unwrap(), "count=42\n[3]label=hi\n");
//! # Ok::<(), varquery::VarQueryError>(())
//! ```

pub mod config;
pub mod error;
pub mod ipc;
pub mod query;
pub mod registry;
pub mod search;

// Re-export commonly used types
pub use error::{ErrorKind, Result, VarQueryError};
pub use ipc::{RegistryServer, RegistryServerHandle, RemoteRegistry};
pub use query::{CriteriaKind, CriteriaSet, SearchBuilder, SearchSpecification, VarFlags};
pub use registry::{MemoryRegistry, Registry, VarMatch};
pub use search::{run, search, MatchStream, ResultCode, SearchOutcome};
