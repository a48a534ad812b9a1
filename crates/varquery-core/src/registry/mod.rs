//! The registry collaborator searched by this crate.
//!
//! A registry enumerates its variables through a cursor protocol: `get_first`
//! starts a walk for a specification, `get_next` continues it from an opaque
//! [`Cursor`]. Both return either one match together with the cursor for the
//! following step, or [`Advance::Exhausted`]. The registry owns enumeration
//! order and is responsible for serializing access to its own state.
//!
//! Implementations:
//! - [`MemoryRegistry`]: in-process registry, used for fixtures and serving
//! - [`crate::ipc::RemoteRegistry`]: a registry served over local IPC

mod memory;

pub use memory::{MemoryRegistry, VarEntry, VarValue};

use crate::query::{InstanceId, SearchSpecification};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// Opaque handle used to ask the registry for a variable's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarHandle(pub u32);

/// Iteration position within one walk.
///
/// Only meaningful to the registry that issued it, and only for the
/// specification it was issued with. Not `Clone`: a cursor is consumed by
/// the advance call it is passed to.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    /// Wrap a registry-defined position. For registry implementations.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The registry-defined position. For registry implementations.
    pub fn into_raw(self) -> u64 {
        self.0
    }
}

/// One registry entry satisfying a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarMatch {
    pub name: String,
    pub instance: InstanceId,
    pub handle: VarHandle,
}

/// Result of one cursor advance.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advance {
    /// A match, and the cursor to continue from.
    Found(VarMatch, Cursor),
    /// No further entries match.
    Exhausted,
}

/// A searchable variable registry session.
///
/// Calls block until the registry answers. Errors are reported as
/// [`crate::VarQueryError::RegistryInvalidArgument`] when the registry
/// refuses the specification or handle, and as
/// [`crate::VarQueryError::Transport`] when it cannot be reached.
pub trait Registry {
    /// Start a walk and return the first match.
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance>;

    /// Continue a walk from `cursor`.
    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance>;

    /// Write the current value of a variable to `sink` as text.
    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()>;
}

impl<R: Registry + ?Sized> Registry for &R {
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance> {
        (**self).get_first(spec)
    }

    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance> {
        (**self).get_next(spec, cursor)
    }

    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()> {
        (**self).render_value(handle, sink)
    }
}

impl<R: Registry + ?Sized> Registry for Arc<R> {
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance> {
        (**self).get_first(spec)
    }

    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance> {
        (**self).get_next(spec, cursor)
    }

    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()> {
        (**self).render_value(handle, sink)
    }
}

impl<R: Registry + ?Sized> Registry for Box<R> {
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance> {
        (**self).get_first(spec)
    }

    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance> {
        (**self).get_next(spec, cursor)
    }

    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()> {
        (**self).render_value(handle, sink)
    }
}
