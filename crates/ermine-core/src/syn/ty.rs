use crate::syn::Kind;
use crate::traverse::{KindVars, TypeVars};
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// A type annotation over kind variables `K` and type variables `V`.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum Type<K, V> {
    Var(V),
    /// A type constructor with its kind.
    Con(Rc<str>, Kind<K>),
    App(Rc<Type<K, V>>, Rc<Type<K, V>>),
}

impl<K, V> Type<K, V> {
    pub fn con(name: &str, kind: Kind<K>) -> Type<K, V> {
        Type::Con(name.into(), kind)
    }

    pub fn app(function: Type<K, V>, argument: Type<K, V>) -> Type<K, V> {
        Type::App(Rc::new(function), Rc::new(argument))
    }
}

impl<K, K2, V: Clone> KindVars<K, K2> for Type<K, V> {
    type Output = Type<K2, V>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Type<K2, V>, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        Ok(match self {
            Type::Var(v) => Type::Var(v.clone()),
            Type::Con(name, kind) => Type::Con(name.clone(), kind.try_traverse_kind_vars(f)?),
            Type::App(function, argument) => {
                let function = (**function).try_traverse_kind_vars(f)?;
                let argument = (**argument).try_traverse_kind_vars(f)?;
                Type::app(function, argument)
            }
        })
    }
}

impl<K: Clone, V, V2> TypeVars<V, V2> for Type<K, V> {
    type Output = Type<K, V2>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Type<K, V2>, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        Ok(match self {
            Type::Var(v) => Type::Var(f(v)?),
            Type::Con(name, kind) => Type::Con(name.clone(), kind.clone()),
            Type::App(function, argument) => {
                let function = (**function).try_traverse_type_vars(f)?;
                let argument = (**argument).try_traverse_type_vars(f)?;
                Type::app(function, argument)
            }
        })
    }
}

impl<K, V: Display> Display for Type<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => v.fmt(f),
            Type::Con(name, _) => write!(f, "{}", name),
            Type::App(function, argument) => match &**argument {
                Type::App(..) => write!(f, "{} ({})", function, argument),
                _ => write!(f, "{} {}", function, argument),
            },
        }
    }
}
