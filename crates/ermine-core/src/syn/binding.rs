use crate::common::BodySlot;
use crate::subst::{rewrite_alt, rewrite_binding, rewrite_body, MapAnnotations, Relabel};
use crate::syn::{Pattern, Scope};
use crate::traverse::{KindVars, TermVars, TypeVars};
use ermine_support::{HasProvenance, Provenance};
use std::convert::Infallible;

/// Whether a binding was given a type, or is left for inference.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone)]
pub enum BindingType<T> {
    Explicit(T),
    Implicit,
}

impl<T> BindingType<T> {
    pub fn annotation(&self) -> Option<&T> {
        match self {
            BindingType::Explicit(ty) => Some(ty),
            BindingType::Implicit => None,
        }
    }

    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<BindingType<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(match self {
            BindingType::Explicit(ty) => BindingType::Explicit(f(ty)?),
            BindingType::Implicit => BindingType::Implicit,
        })
    }

    pub fn map<U, F>(&self, mut f: F) -> BindingType<U>
    where
        F: FnMut(&T) -> U,
    {
        match self.try_map(|t| Ok::<U, Infallible>(f(t))) {
            Ok(bt) => bt,
            Err(never) => match never {},
        }
    }
}

impl<T, K, K2> KindVars<K, K2> for BindingType<T>
where
    T: KindVars<K, K2>,
{
    type Output = BindingType<T::Output>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        self.try_map(|t| t.try_traverse_kind_vars(&mut *f))
    }
}

impl<T, V, V2> TypeVars<V, V2> for BindingType<T>
where
    T: TypeVars<V, V2>,
{
    type Output = BindingType<T::Output>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        self.try_map(|t| t.try_traverse_type_vars(&mut *f))
    }
}

/// One clause of a binding: its argument patterns, and a right-hand side that
/// sees both the variables those patterns bind and every binding of the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body<T, A> {
    pub patterns: Vec<Pattern<T>>,
    pub scope: Scope<BodySlot, T, A>,
}

impl<T, A> Body<T, A> {
    pub fn new(patterns: Vec<Pattern<T>>, scope: Scope<BodySlot, T, A>) -> Body<T, A> {
        Body { patterns, scope }
    }

    pub fn arity(&self) -> usize {
        self.patterns.len()
    }
}

/// A definition: possibly annotated, possibly defined by several clauses.
#[derive(Debug, Clone)]
pub struct Binding<T, A> {
    pub provenance: Provenance,
    pub binding_type: BindingType<T>,
    pub bodies: Vec<Body<T, A>>,
}

impl<T, A> Binding<T, A> {
    pub fn new(
        provenance: Provenance,
        binding_type: BindingType<T>,
        bodies: Vec<Body<T, A>>,
    ) -> Binding<T, A> {
        Binding {
            provenance,
            binding_type,
            bodies,
        }
    }

    pub fn implicit(bodies: Vec<Body<T, A>>) -> Binding<T, A> {
        Binding::new(Provenance::Generated, BindingType::Implicit, bodies)
    }

    pub fn explicit(ty: T, bodies: Vec<Body<T, A>>) -> Binding<T, A> {
        Binding::new(Provenance::Generated, BindingType::Explicit(ty), bodies)
    }
}

impl<T, A> HasProvenance for Binding<T, A> {
    fn provenance(&self) -> Option<&Provenance> {
        Some(&self.provenance)
    }
}

/// Bindings are equal when their types and clauses are; provenance is ignored.
impl<T: PartialEq, A: PartialEq> PartialEq for Binding<T, A> {
    fn eq(&self, other: &Binding<T, A>) -> bool {
        self.binding_type == other.binding_type && self.bodies == other.bodies
    }
}

impl<T: Eq, A: Eq> Eq for Binding<T, A> {}

/// A case alternative. The scope binds the pattern's variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alt<T, A> {
    pub pattern: Pattern<T>,
    pub scope: Scope<usize, T, A>,
}

impl<T, A> Alt<T, A> {
    pub fn new(pattern: Pattern<T>, scope: Scope<usize, T, A>) -> Alt<T, A> {
        Alt { pattern, scope }
    }
}

// Bodies, bindings and alternatives are rewritten by the same walk as terms,
// starting outside their scopes.
macro_rules! variable_capabilities {
    ($node:ident, $rewrite:ident) => {
        impl<T, A: Clone, K, K2> KindVars<K, K2> for $node<T, A>
        where
            T: KindVars<K, K2>,
        {
            type Output = $node<T::Output, A>;

            fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
            where
                F: FnMut(&K) -> Result<K2, E>,
            {
                let mut annotation = |t: &T| t.try_traverse_kind_vars(&mut *f);
                $rewrite(self, 0, &mut MapAnnotations::new(&mut annotation))
            }
        }

        impl<T, A: Clone, V, V2> TypeVars<V, V2> for $node<T, A>
        where
            T: TypeVars<V, V2>,
        {
            type Output = $node<T::Output, A>;

            fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
            where
                F: FnMut(&V) -> Result<V2, E>,
            {
                let mut annotation = |t: &T| t.try_traverse_type_vars(&mut *f);
                $rewrite(self, 0, &mut MapAnnotations::new(&mut annotation))
            }
        }

        impl<T: Clone, A, B> TermVars<A, B> for $node<T, A> {
            type Output = $node<T, B>;

            fn try_traverse_term_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
            where
                F: FnMut(&A) -> Result<B, E>,
            {
                $rewrite(self, 0, &mut Relabel::new(f))
            }
        }
    };
}

variable_capabilities!(Body, rewrite_body);
variable_capabilities!(Binding, rewrite_binding);
variable_capabilities!(Alt, rewrite_alt);
