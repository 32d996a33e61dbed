use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// A literal value.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Byte(i8),
    Short(i16),
    Char(char),
    String(Rc<str>),
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(x) => write!(f, "{}", x),
            Literal::Long(x) => write!(f, "{}L", x),
            Literal::Byte(x) => write!(f, "{}b", x),
            Literal::Short(x) => write!(f, "{}s", x),
            Literal::Char(c) => write!(f, "{:?}", c),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A primitive the front end knows by construction. Compared structurally.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum Prim {
    Literal(Literal),
    /// A data constructor, by its global name.
    Constructor(Rc<str>),
    /// The tuple constructor of the given arity.
    Tuple(usize),
    /// A reference to a top-level definition.
    Global(Rc<str>),
}

impl Prim {
    pub fn int(x: i32) -> Prim {
        Prim::Literal(Literal::Int(x))
    }

    pub fn string(s: &str) -> Prim {
        Prim::Literal(Literal::String(s.into()))
    }

    pub fn constructor(name: &str) -> Prim {
        Prim::Constructor(name.into())
    }

    pub fn global(name: &str) -> Prim {
        Prim::Global(name.into())
    }
}

impl Display for Prim {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Prim::Literal(lit) => lit.fmt(f),
            Prim::Constructor(name) => write!(f, "{}", name),
            Prim::Tuple(arity) => write!(f, "({})", ",".repeat(arity.saturating_sub(1))),
            Prim::Global(name) => write!(f, "@{}", name),
        }
    }
}

/// An atomic terminal value.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum HardTerm {
    Prim(Prim),
    /// A typed hole.
    Hole,
}

impl Display for HardTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HardTerm::Prim(prim) => prim.fmt(f),
            HardTerm::Hole => write!(f, "?"),
        }
    }
}

/// Types that can carry atomic terminal values.
pub trait Terminal: Sized {
    fn from_hard_term(hard: HardTerm) -> Self;

    /// The terminal this value is, if it is one. Wrappers are not looked through.
    fn try_as_hard_term(&self) -> Option<&HardTerm>;

    fn from_primitive(prim: Prim) -> Self {
        Self::from_hard_term(HardTerm::Prim(prim))
    }

    fn hole() -> Self {
        Self::from_hard_term(HardTerm::Hole)
    }

    fn is_hole(&self) -> bool {
        matches!(self.try_as_hard_term(), Some(HardTerm::Hole))
    }
}

impl Terminal for HardTerm {
    fn from_hard_term(hard: HardTerm) -> HardTerm {
        hard
    }

    fn try_as_hard_term(&self) -> Option<&HardTerm> {
        Some(self)
    }
}
