//! Cursor-driven search and result rendering.
//!
//! A search walks the registry one match at a time and writes one line per
//! match to the output sink as it goes:
//!
//! ```text
//! name            instance 0
//! [3]name         instance 3
//! name=value      with show-value enabled
//! ```
//!
//! Nothing is buffered beyond the current line. If the walk fails midway the
//! lines already written stay written.

use crate::error::ErrorKind;
use crate::query::{self, SearchSpecification};
use crate::registry::{Advance, Cursor, Registry, VarMatch};
use crate::Result;
use std::io::Write;
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// Successful end of a search.
///
/// A search that matched nothing is a success, reported as `Empty` rather
/// than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchOutcome {
    /// The registry reported no matching entries. Nothing was written.
    Empty,
    /// `count` lines were written.
    Matched { count: usize },
}

impl SearchOutcome {
    pub fn count(self) -> usize {
        match self {
            SearchOutcome::Empty => 0,
            SearchOutcome::Matched { count } => count,
        }
    }
}

/// Caller-facing status of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    /// Zero matches. Not a fault.
    NoMatches,
    /// Criteria were rejected before the registry was queried.
    InvalidCriteria,
    /// The registry rejected the specification.
    InvalidArguments,
    TransportFailure,
    OutputFailure,
}

impl ResultCode {
    pub fn from_result(result: &Result<SearchOutcome>) -> Self {
        match result {
            Ok(SearchOutcome::Matched { .. }) => ResultCode::Success,
            Ok(SearchOutcome::Empty) => ResultCode::NoMatches,
            Err(e) => match e.kind() {
                ErrorKind::Validation => ResultCode::InvalidCriteria,
                ErrorKind::RegistryInvalidArgument => ResultCode::InvalidArguments,
                ErrorKind::Transport => ResultCode::TransportFailure,
                ErrorKind::Output => ResultCode::OutputFailure,
            },
        }
    }

    /// Whether the search completed, with or without matches.
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::NoMatches)
    }
}

enum StreamState {
    Init,
    Streaming(Cursor),
    Done,
}

/// Iterator over the matches of one search.
///
/// Each call to `next` performs exactly one registry advance. The stream
/// ends after the registry reports exhaustion or after the first error,
/// which is yielded once.
pub struct MatchStream<'a, R: Registry + ?Sized> {
    registry: &'a R,
    spec: &'a SearchSpecification,
    state: StreamState,
}

impl<'a, R: Registry + ?Sized> MatchStream<'a, R> {
    pub fn new(registry: &'a R, spec: &'a SearchSpecification) -> Self {
        Self {
            registry,
            spec,
            state: StreamState::Init,
        }
    }
}

impl<R: Registry + ?Sized> Iterator for MatchStream<'_, R> {
    type Item = Result<VarMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = match std::mem::replace(&mut self.state, StreamState::Done) {
            StreamState::Init => self.registry.get_first(self.spec),
            StreamState::Streaming(cursor) => self.registry.get_next(self.spec, cursor),
            StreamState::Done => return None,
        };

        match step {
            Ok(Advance::Found(found, cursor)) => {
                self.state = StreamState::Streaming(cursor);
                Some(Ok(found))
            }
            Ok(Advance::Exhausted) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: Registry + ?Sized> FusedIterator for MatchStream<'_, R> {}

/// Render one match as a complete line, newline included.
pub fn render_match<R: Registry + ?Sized>(
    registry: &R,
    spec: &SearchSpecification,
    found: &VarMatch,
    out: &mut dyn Write,
) -> Result<()> {
    if found.instance.is_unqualified() {
        out.write_all(found.name.as_bytes())?;
    } else {
        write!(out, "[{}]{}", found.instance, found.name)?;
    }

    if spec.show_value() {
        out.write_all(b"=")?;
        registry.render_value(found.handle, out)?;
    }

    out.write_all(b"\n")?;
    Ok(())
}

/// Run a search and stream its results to `sink`.
///
/// Lines appear in registry enumeration order. Each line is assembled
/// before it is written, so a failure while rendering a value does not
/// leave half a line behind; earlier lines are never retracted.
pub fn run<R, W>(registry: &R, spec: &SearchSpecification, sink: &mut W) -> Result<SearchOutcome>
where
    R: Registry + ?Sized,
    W: Write + ?Sized,
{
    let mut count = 0;
    let mut line = Vec::new();

    for found in MatchStream::new(registry, spec) {
        let written = found.and_then(|found| {
            line.clear();
            render_match(registry, spec, &found, &mut line)?;
            sink.write_all(&line)?;
            Ok(())
        });
        if let Err(e) = written {
            warn!("Search failed after {} matches: {}", count, e);
            return Err(e);
        }
        count += 1;
    }

    sink.flush()?;
    debug!("Search complete: {} matches", count);

    Ok(match count {
        0 => SearchOutcome::Empty,
        count => SearchOutcome::Matched { count },
    })
}

/// Build a specification from raw criteria and run it.
///
/// See [`query::build`] for how the criteria are interpreted and
/// [`run`] for the streaming behavior.
pub fn search<R, W>(
    registry: &R,
    criteria: u32,
    name_pattern: Option<&str>,
    tag_spec: Option<&str>,
    instance_id: u32,
    flags_mask: u32,
    sink: &mut W,
) -> Result<SearchOutcome>
where
    R: Registry + ?Sized,
    W: Write + ?Sized,
{
    let spec = query::build(criteria, name_pattern, tag_spec, instance_id, flags_mask)?;
    run(registry, &spec, sink)
}
