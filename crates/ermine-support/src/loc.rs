use std::fmt::{self, Display, Formatter};
use std::ops::Range;

/// Identifies a source file registered with the driver.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SourceId(pub usize);

/// A source and a byte range within it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SourceRange {
    pub range: Range<usize>,
    pub source: SourceId,
}

impl SourceRange {
    pub fn new(source: SourceId, range: Range<usize>) -> SourceRange {
        SourceRange { range, source }
    }
}

/// Where a piece of syntax came from.
///
/// Provenance only exists to be reported. Nothing in the core inspects it, and
/// two terms that differ only in provenance are the same term.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Provenance {
    /// Synthesized by the compiler, with no source text behind it.
    #[default]
    Generated,
    /// Written by the user.
    Source(SourceRange),
}

impl Provenance {
    pub fn source(source: SourceId, range: Range<usize>) -> Provenance {
        Provenance::Source(SourceRange::new(source, range))
    }

    pub fn source_range(&self) -> Option<&SourceRange> {
        match self {
            Provenance::Generated => None,
            Provenance::Source(range) => Some(range),
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Generated => write!(f, "<generated>"),
            Provenance::Source(SourceRange { range, source }) => {
                write!(f, "#{}:{}..{}", source.0, range.start, range.end)
            }
        }
    }
}

/// A value that may remember where it came from.
pub trait HasProvenance {
    fn provenance(&self) -> Option<&Provenance>;
}

/// A value that has an associated range of source text.
pub trait HasRange {
    fn range(&self) -> Option<Range<usize>>;
}

impl<T> HasRange for T
where
    T: HasProvenance,
{
    fn range(&self) -> Option<Range<usize>> {
        self.provenance()
            .and_then(Provenance::source_range)
            .map(|r| r.range.clone())
    }
}
