use crate::traverse::KindVars;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// The kind of a type annotation, over kind variables `K`.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum Kind<K> {
    Var(K),
    Star,
    Constraint,
    Arrow(Rc<Kind<K>>, Rc<Kind<K>>),
}

impl<K> Kind<K> {
    pub fn arrow(source: Kind<K>, target: Kind<K>) -> Kind<K> {
        Kind::Arrow(Rc::new(source), Rc::new(target))
    }
}

impl<K, K2> KindVars<K, K2> for Kind<K> {
    type Output = Kind<K2>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Kind<K2>, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        Ok(match self {
            Kind::Var(k) => Kind::Var(f(k)?),
            Kind::Star => Kind::Star,
            Kind::Constraint => Kind::Constraint,
            Kind::Arrow(source, target) => {
                let source = (**source).try_traverse_kind_vars(f)?;
                let target = (**target).try_traverse_kind_vars(f)?;
                Kind::arrow(source, target)
            }
        })
    }
}

impl<K: Display> Display for Kind<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Var(k) => k.fmt(f),
            Kind::Star => write!(f, "*"),
            Kind::Constraint => write!(f, "Constraint"),
            Kind::Arrow(source, target) => match &**source {
                Kind::Arrow(..) => write!(f, "({}) -> {}", source, target),
                _ => write!(f, "{} -> {}", source, target),
            },
        }
    }
}
