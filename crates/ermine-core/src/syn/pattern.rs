use crate::syn::Literal;
use crate::traverse::{KindVars, TypeVars};
use std::convert::Infallible;
use std::fmt::{self, Display, Formatter, Write};
use std::rc::Rc;

/// A pattern, annotated with types of type `T`.
///
/// A pattern binds zero or more variables. They are numbered in the order they
/// are introduced, reading the pattern left to right, and a scope under the
/// pattern refers to them by that number.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum Pattern<T> {
    /// Binds the matched value.
    Var,
    /// Binds the matched value at an annotated type.
    Sig(T),
    Wildcard,
    /// Binds the matched value, then continues matching it.
    As(Box<Pattern<T>>),
    Strict(Box<Pattern<T>>),
    Lazy(Box<Pattern<T>>),
    Literal(Literal),
    Constructor(Rc<str>, Vec<Pattern<T>>),
    Tuple(Vec<Pattern<T>>),
}

impl<T> Pattern<T> {
    pub fn sig(ty: T) -> Pattern<T> {
        Pattern::Sig(ty)
    }

    pub fn as_pattern(inner: Pattern<T>) -> Pattern<T> {
        Pattern::As(Box::new(inner))
    }

    pub fn strict(inner: Pattern<T>) -> Pattern<T> {
        Pattern::Strict(Box::new(inner))
    }

    pub fn lazy(inner: Pattern<T>) -> Pattern<T> {
        Pattern::Lazy(Box::new(inner))
    }

    pub fn constructor(name: &str, args: Vec<Pattern<T>>) -> Pattern<T> {
        Pattern::Constructor(name.into(), args)
    }

    /// The number of variables this pattern binds.
    pub fn bound_count(&self) -> usize {
        match self {
            Pattern::Var | Pattern::Sig(_) => 1,
            Pattern::Wildcard | Pattern::Literal(_) => 0,
            Pattern::As(inner) => 1 + inner.bound_count(),
            Pattern::Strict(inner) | Pattern::Lazy(inner) => inner.bound_count(),
            Pattern::Constructor(_, args) | Pattern::Tuple(args) => {
                args.iter().map(Pattern::bound_count).sum()
            }
        }
    }

    /// Rebuild the pattern with every annotation passed through `f`, left to right.
    pub fn try_map_annotations<U, E, F>(&self, f: &mut F) -> Result<Pattern<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(match self {
            Pattern::Var => Pattern::Var,
            Pattern::Sig(ty) => Pattern::Sig(f(ty)?),
            Pattern::Wildcard => Pattern::Wildcard,
            Pattern::As(inner) => Pattern::As(Box::new(inner.try_map_annotations(f)?)),
            Pattern::Strict(inner) => Pattern::Strict(Box::new(inner.try_map_annotations(f)?)),
            Pattern::Lazy(inner) => Pattern::Lazy(Box::new(inner.try_map_annotations(f)?)),
            Pattern::Literal(lit) => Pattern::Literal(lit.clone()),
            Pattern::Constructor(name, args) => {
                Pattern::Constructor(name.clone(), try_map_all(args, f)?)
            }
            Pattern::Tuple(args) => Pattern::Tuple(try_map_all(args, f)?),
        })
    }

    pub fn map_annotations<U, F>(&self, mut f: F) -> Pattern<U>
    where
        F: FnMut(&T) -> U,
    {
        match self.try_map_annotations(&mut |t| Ok::<U, Infallible>(f(t))) {
            Ok(pattern) => pattern,
            Err(never) => match never {},
        }
    }

    /// Every annotation in the pattern, left to right.
    pub fn annotations(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_annotations(&mut out);
        out
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Pattern::Sig(ty) => out.push(ty),
            Pattern::As(inner) | Pattern::Strict(inner) | Pattern::Lazy(inner) => {
                inner.collect_annotations(out)
            }
            Pattern::Constructor(_, args) | Pattern::Tuple(args) => {
                for arg in args {
                    arg.collect_annotations(out);
                }
            }
            Pattern::Var | Pattern::Wildcard | Pattern::Literal(_) => {}
        }
    }
}

fn try_map_all<T, U, E, F>(patterns: &[Pattern<T>], f: &mut F) -> Result<Vec<Pattern<U>>, E>
where
    F: FnMut(&T) -> Result<U, E>,
{
    patterns.iter().map(|p| p.try_map_annotations(f)).collect()
}

impl<T, K, K2> KindVars<K, K2> for Pattern<T>
where
    T: KindVars<K, K2>,
{
    type Output = Pattern<T::Output>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        self.try_map_annotations(&mut |t: &T| t.try_traverse_kind_vars(&mut *f))
    }
}

impl<T, V, V2> TypeVars<V, V2> for Pattern<T>
where
    T: TypeVars<V, V2>,
{
    type Output = Pattern<T::Output>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        self.try_map_annotations(&mut |t: &T| t.try_traverse_type_vars(&mut *f))
    }
}

impl<T: Display> Pattern<T> {
    /// Write the pattern, naming its variables `{prefix}{n}` in introduction order.
    pub(crate) fn write_named<W: Write>(
        &self,
        w: &mut W,
        prefix: &str,
        next: &mut usize,
    ) -> fmt::Result {
        let mut fresh = |w: &mut W| {
            let n = *next;
            *next += 1;
            write!(w, "{}{}", prefix, n)
        };
        match self {
            Pattern::Var => fresh(w),
            Pattern::Sig(ty) => {
                w.write_str("(")?;
                fresh(w)?;
                write!(w, " : {})", ty)
            }
            Pattern::Wildcard => w.write_str("_"),
            Pattern::As(inner) => {
                fresh(w)?;
                w.write_str("@")?;
                inner.write_named(w, prefix, next)
            }
            Pattern::Strict(inner) => {
                w.write_str("!")?;
                inner.write_named(w, prefix, next)
            }
            Pattern::Lazy(inner) => {
                w.write_str("~")?;
                inner.write_named(w, prefix, next)
            }
            Pattern::Literal(lit) => write!(w, "{}", lit),
            Pattern::Constructor(name, args) if args.is_empty() => write!(w, "{}", name),
            Pattern::Constructor(name, args) => {
                write!(w, "({}", name)?;
                for arg in args {
                    w.write_str(" ")?;
                    arg.write_named(w, prefix, next)?;
                }
                w.write_str(")")
            }
            Pattern::Tuple(args) => {
                w.write_str("(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        w.write_str(", ")?;
                    }
                    arg.write_named(w, prefix, next)?;
                }
                w.write_str(")")
            }
        }
    }
}

impl<T: Display> Display for Pattern<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_named(f, "#", &mut 0)
    }
}
