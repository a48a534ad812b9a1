//! In-process variable registry.
//!
//! Entries are kept in insertion order, which is also enumeration order.
//! Removed entries leave a vacant slot so that outstanding cursors and
//! handles keep pointing at the same positions.

use super::{Advance, Cursor, Registry, VarHandle, VarMatch};
use crate::config::QueryConfig;
use crate::query::{InstanceId, NameMatch, SearchSpecification, VarFlags};
use crate::{Result, VarQueryError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// Typed value of a registry variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum VarValue {
    #[serde(rename = "uint16")]
    U16(u16),
    #[serde(rename = "int16")]
    I16(i16),
    #[serde(rename = "uint32")]
    U32(u32),
    #[serde(rename = "int32")]
    I32(i32),
    #[serde(rename = "uint64")]
    U64(u64),
    #[serde(rename = "int64")]
    I64(i64),
    #[serde(rename = "float")]
    Float(f32),
    #[serde(rename = "str")]
    Str(String),
}

impl VarValue {
    /// Registry type name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            VarValue::U16(_) => "uint16",
            VarValue::I16(_) => "int16",
            VarValue::U32(_) => "uint32",
            VarValue::I32(_) => "int32",
            VarValue::U64(_) => "uint64",
            VarValue::I64(_) => "int64",
            VarValue::Float(_) => "float",
            VarValue::Str(_) => "str",
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarValue::U16(v) => write!(f, "{}", v),
            VarValue::I16(v) => write!(f, "{}", v),
            VarValue::U32(v) => write!(f, "{}", v),
            VarValue::I32(v) => write!(f, "{}", v),
            VarValue::U64(v) => write!(f, "{}", v),
            VarValue::I64(v) => write!(f, "{}", v),
            VarValue::Float(v) => write!(f, "{}", v),
            VarValue::Str(v) => f.write_str(v),
        }
    }
}

/// A variable definition, as stored by the registry and read from fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarEntry {
    pub name: String,
    #[serde(default)]
    pub instance: InstanceId,
    #[serde(default)]
    pub flags: VarFlags,
    #[serde(default)]
    pub tags: Vec<String>,
    pub value: VarValue,
}

impl VarEntry {
    pub fn new(name: impl Into<String>, value: VarValue) -> Self {
        Self {
            name: name.into(),
            instance: InstanceId::UNQUALIFIED,
            flags: VarFlags::empty(),
            tags: Vec::new(),
            value,
        }
    }

    pub fn with_instance(mut self, instance: u32) -> Self {
        self.instance = InstanceId(instance);
        self
    }

    pub fn with_flags(mut self, flags: VarFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Compiled form of a specification's filters.
struct Matcher<'a> {
    spec: &'a SearchSpecification,
    regex: Option<Regex>,
}

impl<'a> Matcher<'a> {
    fn compile(spec: &'a SearchSpecification, registry: &MemoryRegistry) -> Result<Self> {
        let regex = match spec.name() {
            Some(name) if name.pattern().is_empty() => {
                return Err(VarQueryError::invalid_argument("empty name pattern"));
            }
            Some(NameMatch::Regex(pattern)) => Some(registry.compiled_regex(pattern)?),
            _ => None,
        };

        if spec.instance().is_some_and(InstanceId::is_unqualified) {
            return Err(VarQueryError::invalid_argument(
                "instance 0 is not a valid search target",
            ));
        }

        Ok(Self { spec, regex })
    }

    fn matches(&self, entry: &VarEntry) -> bool {
        let name_ok = match (self.spec.name(), &self.regex) {
            (Some(NameMatch::Exact(name)), _) => entry.name == *name,
            (Some(NameMatch::Regex(_)), Some(re)) => re.is_match(&entry.name),
            _ => true,
        };

        name_ok
            && self
                .spec
                .flags()
                .map_or(true, |filter| filter.matches(entry.flags))
            && self.spec.tags().map_or(true, |tags| {
                tags.tags().all(|tag| entry.tags.iter().any(|t| t == tag))
            })
            && self
                .spec
                .instance()
                .map_or(true, |instance| entry.instance == instance)
    }
}

/// Registry held in process memory.
///
/// Safe to share between threads; readers and writers are serialized by an
/// internal lock, held only for the duration of one call.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    slots: RwLock<Vec<Option<VarEntry>>>,
    /// Last compiled name regex, reused by every advance of a walk.
    regex_cache: Mutex<Option<(String, Regex)>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `entries`, in order.
    pub fn from_entries(entries: impl IntoIterator<Item = VarEntry>) -> Result<Self> {
        let registry = Self::new();
        for entry in entries {
            registry.insert(entry)?;
        }
        Ok(registry)
    }

    /// Create a registry from a JSON array of [`VarEntry`].
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<VarEntry> =
            serde_json::from_str(json).map_err(|e| VarQueryError::Validation {
                field: "fixture".to_string(),
                message: format!("malformed fixture: {}", e),
            })?;
        Self::from_entries(entries)
    }

    /// Load a JSON fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| VarQueryError::Validation {
            field: "fixture".to_string(),
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    /// Add a variable. Fails if the same name and instance already exist.
    pub fn insert(&self, entry: VarEntry) -> Result<VarHandle> {
        if entry.name.is_empty() || entry.name.len() > QueryConfig::MAX_NAME_LEN {
            return Err(VarQueryError::Validation {
                field: "name".to_string(),
                message: format!(
                    "variable name must be 1 to {} bytes, got {}",
                    QueryConfig::MAX_NAME_LEN,
                    entry.name.len()
                ),
            });
        }

        let mut slots = self.write_slots()?;
        let duplicate = slots
            .iter()
            .flatten()
            .any(|e| e.name == entry.name && e.instance == entry.instance);
        if duplicate {
            return Err(VarQueryError::Validation {
                field: "name".to_string(),
                message: format!("variable [{}]{} already exists", entry.instance, entry.name),
            });
        }

        let handle = VarHandle(slots.len() as u32);
        slots.push(Some(entry));
        Ok(handle)
    }

    /// Replace a variable's value. The type must not change.
    pub fn set_value(&self, handle: VarHandle, value: VarValue) -> Result<()> {
        let mut slots = self.write_slots()?;
        let entry = slots
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| unknown_handle(handle))?;

        if entry.flags.contains(VarFlags::READONLY) {
            return Err(VarQueryError::Validation {
                field: "value".to_string(),
                message: format!("{} is readonly", entry.name),
            });
        }
        if entry.value.type_name() != value.type_name() {
            return Err(VarQueryError::Validation {
                field: "value".to_string(),
                message: format!(
                    "{} holds {}, got {}",
                    entry.name,
                    entry.value.type_name(),
                    value.type_name()
                ),
            });
        }

        entry.value = value;
        Ok(())
    }

    /// Remove a variable, returning its definition.
    pub fn remove(&self, handle: VarHandle) -> Result<VarEntry> {
        let mut slots = self.write_slots()?;
        slots
            .get_mut(handle.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| unknown_handle(handle))
    }

    /// Number of live variables.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .map(|slots| slots.iter().flatten().count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the first match at or after slot `start`.
    fn scan_from(&self, spec: &SearchSpecification, start: u64) -> Result<Advance> {
        let matcher = Matcher::compile(spec, self)?;
        let slots = self.slots.read().map_err(|_| poisoned())?;

        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let found = slots
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|entry| matcher.matches(entry))
                    .map(|entry| (index, entry))
            });

        Ok(match found {
            Some((index, entry)) => {
                debug!("Registry match at slot {}: {}", index, entry.name);
                Advance::Found(
                    VarMatch {
                        name: entry.name.clone(),
                        instance: entry.instance,
                        handle: VarHandle(index as u32),
                    },
                    Cursor::from_raw(index as u64 + 1),
                )
            }
            None => Advance::Exhausted,
        })
    }

    fn compiled_regex(&self, pattern: &str) -> Result<Regex> {
        let mut cache = self.regex_cache.lock().map_err(|_| poisoned())?;
        if let Some((cached, regex)) = cache.as_ref() {
            if cached == pattern {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)
            .map_err(|e| VarQueryError::invalid_argument(format!("bad name regex: {}", e)))?;
        *cache = Some((pattern.to_string(), regex.clone()));
        Ok(regex)
    }

    fn write_slots(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Option<VarEntry>>>> {
        self.slots.write().map_err(|_| poisoned())
    }
}

fn unknown_handle(handle: VarHandle) -> VarQueryError {
    VarQueryError::invalid_argument(format!("unknown variable handle {}", handle.0))
}

fn poisoned() -> VarQueryError {
    VarQueryError::Transport {
        message: "registry lock poisoned".to_string(),
        source: None,
    }
}

impl Registry for MemoryRegistry {
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance> {
        self.scan_from(spec, 0)
    }

    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance> {
        self.scan_from(spec, cursor.into_raw())
    }

    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()> {
        let slots = self.slots.read().map_err(|_| poisoned())?;
        let entry = slots
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| unknown_handle(handle))?;
        write!(sink, "{}", entry.value)?;
        Ok(())
    }
}
