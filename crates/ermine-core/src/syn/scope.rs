use crate::common::ScopeSlot;
use crate::subst::{self, Abstract, Instantiate, MapAnnotations, Relabel, Subst};
use crate::syn::{RcTerm, Term};
use crate::traverse::{infallible, KindVars, TermVars, TypeVars};
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// A term with some variables bound, each at a slot of type `S`.
///
/// The body is locally nameless. Free variables are `Term::Var`, and a
/// variable bound here is a `Term::Bound` whose index counts the binders
/// between it and this scope (zero when no other binder intervenes).
pub struct Scope<S, T, A> {
    pub(crate) body: RcTerm<T, A>,
    slot: PhantomData<S>,
}

impl<S, T, A> Scope<S, T, A> {
    /// Wrap a body that is already in locally nameless form.
    pub fn from_body(body: RcTerm<T, A>) -> Scope<S, T, A> {
        Scope {
            body,
            slot: PhantomData,
        }
    }

    pub fn body(&self) -> &RcTerm<T, A> {
        &self.body
    }
}

impl<S: ScopeSlot, T: Clone, A: Clone> Scope<S, T, A> {
    /// Bind every free variable that `slot_of` maps to a slot. The rest stay free.
    ///
    /// Subterms of `term` that mention none of the newly bound variables, and
    /// no index escaping `term`, are shared with it.
    pub fn abstract_with<F>(term: &Term<T, A>, slot_of: F) -> Scope<S, T, A>
    where
        F: FnMut(&A) -> Option<S>,
    {
        let mut abs = Abstract::new(slot_of);
        let root = Rc::new(term.clone());
        Scope::from_body(infallible(subst::rewrite_shared(&root, 0, &mut abs)))
    }

    /// Replace each bound occurrence by the replacement for its slot. Subterms
    /// that mention no variable of this scope or beyond are shared with the body.
    pub fn instantiate<F>(&self, replacements: F) -> RcTerm<T, A>
    where
        F: FnMut(S) -> Term<T, A>,
    {
        let mut inst = Instantiate::new(replacements);
        infallible(subst::rewrite_shared(&self.body, 0, &mut inst))
    }

    /// Substitute through the scope, leaving its own bound variables alone.
    pub fn bind_scope<T2, B, F, G>(&self, mut f: F, mut g: G) -> Scope<S, T2, B>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> T2,
        G: FnMut(&A) -> Term<T2, B>,
    {
        let mut sub = Subst::new(|t: &T| Ok::<T2, Infallible>(f(t)), |a: &A| Ok(g(a)));
        Scope::from_body(infallible(subst::rewrite_term(&self.body, 1, &mut sub)))
    }

    pub fn map_free<B: Clone, F>(&self, f: F) -> Scope<S, T, B>
    where
        F: FnMut(&A) -> B,
    {
        self.map_term_vars(f)
    }

    /// Relabel the free variables, performing the effects of `f` in order of occurrence.
    pub fn try_traverse_free<B: Clone, E, F>(&self, mut f: F) -> Result<Scope<S, T, B>, E>
    where
        F: FnMut(&A) -> Result<B, E>,
    {
        self.try_traverse_term_vars(&mut f)
    }
}

impl<T: Clone, A: Clone> Scope<usize, T, A> {
    /// Instantiate slot `i` with `replacements[i]`.
    ///
    /// # Panics
    ///
    /// If the body refers to a slot with no replacement. Scopes never contain
    /// such slots unless their producer is broken.
    pub fn instantiate_all(&self, replacements: &[RcTerm<T, A>]) -> RcTerm<T, A> {
        self.instantiate(|slot| match replacements.get(slot) {
            Some(term) => (**term).clone(),
            None => panic!(
                "bound slot {} out of range for {} replacements",
                slot,
                replacements.len()
            ),
        })
    }
}

impl<S, T: Clone, A, B: Clone> TermVars<A, B> for Scope<S, T, A> {
    type Output = Scope<S, T, B>;

    fn try_traverse_term_vars<E, F>(&self, f: &mut F) -> Result<Scope<S, T, B>, E>
    where
        F: FnMut(&A) -> Result<B, E>,
    {
        let mut relabel = Relabel::new(f);
        subst::rewrite_term(&self.body, 1, &mut relabel).map(Scope::from_body)
    }
}

impl<S, T, A: Clone, K, K2> KindVars<K, K2> for Scope<S, T, A>
where
    T: KindVars<K, K2>,
{
    type Output = Scope<S, T::Output, A>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        let mut annotation = |t: &T| t.try_traverse_kind_vars(&mut *f);
        subst::rewrite_term(&self.body, 1, &mut MapAnnotations::new(&mut annotation))
            .map(Scope::from_body)
    }
}

impl<S, T, A: Clone, V, V2> TypeVars<V, V2> for Scope<S, T, A>
where
    T: TypeVars<V, V2>,
{
    type Output = Scope<S, T::Output, A>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        let mut annotation = |t: &T| t.try_traverse_type_vars(&mut *f);
        subst::rewrite_term(&self.body, 1, &mut MapAnnotations::new(&mut annotation))
            .map(Scope::from_body)
    }
}

impl<S, T, A> Clone for Scope<S, T, A> {
    fn clone(&self) -> Self {
        Scope::from_body(Rc::clone(&self.body))
    }
}

impl<S, T: PartialEq, A: PartialEq> PartialEq for Scope<S, T, A> {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl<S, T: Eq, A: Eq> Eq for Scope<S, T, A> {}

impl<S, T: fmt::Debug, A: fmt::Debug> fmt::Debug for Scope<S, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scope").field(&self.body).finish()
    }
}
