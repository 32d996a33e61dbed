use serde::{Deserialize, Serialize};
use std::{
    convert::From,
    fmt::{self, Display, Formatter},
};

/// A binder counted from the outside in: level 0 is the outermost binder.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Level(usize);

impl Level {
    pub fn new(x: usize) -> Level {
        Level(x)
    }

    pub fn to_index(self, depth: usize) -> Index {
        Index(depth - self.0 - 1)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl From<usize> for Level {
    fn from(x: usize) -> Level {
        Level(x)
    }
}

/// A binder counted from the inside out: index 0 is the innermost binder.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Index(pub usize);

impl Index {
    pub fn new(x: usize) -> Index {
        Index(x)
    }

    pub fn to_level(self, depth: usize) -> Level {
        Level(depth - self.0 - 1)
    }

    pub fn to_usize(self) -> usize {
        self.0
    }

    pub fn raise(self, amount: usize) -> Index {
        Index(self.0 + amount)
    }

    pub fn lower(self, amount: usize) -> Index {
        Index(self.0 - amount)
    }

    /// Is this index bound by one of `depth` enclosing binders?
    pub fn is_bound(self, depth: usize) -> bool {
        self.0 < depth
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl From<usize> for Index {
    fn from(x: usize) -> Index {
        Index(x)
    }
}

/// The position of a variable within the binder that introduces it.
///
/// Every binder in a term stores its slots in this one representation. The
/// typed view of a particular binder is given by a [`ScopeSlot`].
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Slot {
    /// The n-th variable of a single-pattern or let binder.
    Var(usize),
    /// Variable `var` of argument pattern `pattern` in a clause.
    Pattern { pattern: usize, var: usize },
    /// The n-th binding of the group a clause belongs to.
    Binding(usize),
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Var(i) | Slot::Binding(i) => write!(f, "{}", i),
            Slot::Pattern { pattern, var } => write!(f, "{}.{}", pattern, var),
        }
    }
}

/// The slot type of a clause body: either a variable bound by one of the
/// clause's patterns, or a sibling in the enclosing binding group.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum BodySlot {
    Pattern { pattern: usize, var: usize },
    Binding(usize),
}

/// A typed view of [`Slot`].
pub trait ScopeSlot: Copy {
    fn into_slot(self) -> Slot;
    fn from_slot(slot: Slot) -> Option<Self>;
}

impl ScopeSlot for usize {
    fn into_slot(self) -> Slot {
        Slot::Var(self)
    }

    fn from_slot(slot: Slot) -> Option<usize> {
        match slot {
            Slot::Var(i) => Some(i),
            _ => None,
        }
    }
}

impl ScopeSlot for BodySlot {
    fn into_slot(self) -> Slot {
        match self {
            BodySlot::Pattern { pattern, var } => Slot::Pattern { pattern, var },
            BodySlot::Binding(i) => Slot::Binding(i),
        }
    }

    fn from_slot(slot: Slot) -> Option<BodySlot> {
        match slot {
            Slot::Var(_) => None,
            Slot::Pattern { pattern, var } => Some(BodySlot::Pattern { pattern, var }),
            Slot::Binding(i) => Some(BodySlot::Binding(i)),
        }
    }
}

/// A reference to a bound variable: which binder, and which slot within it.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct BoundVar {
    pub index: Index,
    pub slot: Slot,
}

impl BoundVar {
    pub fn new(index: Index, slot: Slot) -> BoundVar {
        BoundVar { index, slot }
    }

    pub fn raise(self, amount: usize) -> BoundVar {
        BoundVar {
            index: self.index.raise(amount),
            ..self
        }
    }

    pub fn lower(self, amount: usize) -> BoundVar {
        BoundVar {
            index: self.index.lower(amount),
            ..self
        }
    }
}

impl Display for BoundVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.slot)
    }
}
