//! Namespace-directed traversals.
//!
//! Terms mention three kinds of variables: kind variables and type variables
//! inside their annotations, and term variables. Each gets a capability trait
//! here, so that a pass can rewrite one namespace without knowing anything
//! about the shape of the syntax it walks. [`Traversable`] lifts any of them
//! over a container of terms.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;

pub(crate) fn infallible<X>(result: Result<X, Infallible>) -> X {
    match result {
        Ok(x) => x,
        Err(never) => match never {},
    }
}

/// Values mentioning kind variables of type `K`.
pub trait KindVars<K, K2> {
    /// `Self` with every `K` replaced by a `K2`.
    type Output;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>;

    fn map_kind_vars<F>(&self, mut f: F) -> Self::Output
    where
        F: FnMut(&K) -> K2,
    {
        infallible(self.try_traverse_kind_vars(&mut |k| Ok(f(k))))
    }
}

/// Values mentioning type variables of type `V`.
pub trait TypeVars<V, V2> {
    /// `Self` with every `V` replaced by a `V2`.
    type Output;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>;

    fn map_type_vars<F>(&self, mut f: F) -> Self::Output
    where
        F: FnMut(&V) -> V2,
    {
        infallible(self.try_traverse_type_vars(&mut |v| Ok(f(v))))
    }
}

/// Values mentioning free term variables of type `A`.
///
/// Only free variables are visited. Variables bound inside the value are not.
pub trait TermVars<A, B> {
    /// `Self` with every free `A` replaced by a `B`.
    type Output;

    fn try_traverse_term_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&A) -> Result<B, E>;

    fn map_term_vars<F>(&self, mut f: F) -> Self::Output
    where
        F: FnMut(&A) -> B,
    {
        infallible(self.try_traverse_term_vars(&mut |a| Ok(f(a))))
    }
}

impl<X: KindVars<K, K2>, K, K2> KindVars<K, K2> for Rc<X> {
    type Output = Rc<X::Output>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        (**self).try_traverse_kind_vars(f).map(Rc::new)
    }
}

impl<X: TypeVars<V, V2>, V, V2> TypeVars<V, V2> for Rc<X> {
    type Output = Rc<X::Output>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        (**self).try_traverse_type_vars(f).map(Rc::new)
    }
}

impl<X: TermVars<A, B>, A, B> TermVars<A, B> for Rc<X> {
    type Output = Rc<X::Output>;

    fn try_traverse_term_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&A) -> Result<B, E>,
    {
        (**self).try_traverse_term_vars(f).map(Rc::new)
    }
}

/// A container whose elements can be visited in order and rebuilt into a
/// container of the same shape.
pub trait Traversable {
    type Item;
    type Rebuilt<U>;

    fn try_traverse<U, E, F>(&self, f: F) -> Result<Self::Rebuilt<U>, E>
    where
        F: FnMut(&Self::Item) -> Result<U, E>;
}

impl<X> Traversable for Rc<X> {
    type Item = X;
    type Rebuilt<U> = Rc<U>;

    fn try_traverse<U, E, F>(&self, mut f: F) -> Result<Rc<U>, E>
    where
        F: FnMut(&X) -> Result<U, E>,
    {
        f(self.as_ref()).map(Rc::new)
    }
}

impl<X> Traversable for Vec<X> {
    type Item = X;
    type Rebuilt<U> = Vec<U>;

    fn try_traverse<U, E, F>(&self, f: F) -> Result<Vec<U>, E>
    where
        F: FnMut(&X) -> Result<U, E>,
    {
        self.iter().map(f).collect()
    }
}

impl<X> Traversable for Option<X> {
    type Item = X;
    type Rebuilt<U> = Option<U>;

    fn try_traverse<U, E, F>(&self, f: F) -> Result<Option<U>, E>
    where
        F: FnMut(&X) -> Result<U, E>,
    {
        self.as_ref().map(f).transpose()
    }
}

impl<K: Ord + Clone, X> Traversable for BTreeMap<K, X> {
    type Item = X;
    type Rebuilt<U> = BTreeMap<K, U>;

    fn try_traverse<U, E, F>(&self, mut f: F) -> Result<BTreeMap<K, U>, E>
    where
        F: FnMut(&X) -> Result<U, E>,
    {
        self.iter()
            .map(|(k, x)| f(x).map(|u| (k.clone(), u)))
            .collect()
    }
}

impl<K: Eq + Hash + Clone, X, S: BuildHasher + Clone> Traversable for HashMap<K, X, S> {
    type Item = X;
    type Rebuilt<U> = HashMap<K, U, S>;

    fn try_traverse<U, E, F>(&self, mut f: F) -> Result<HashMap<K, U, S>, E>
    where
        F: FnMut(&X) -> Result<U, E>,
    {
        let mut out = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (k, x) in self {
            out.insert(k.clone(), f(x)?);
        }
        Ok(out)
    }
}

/// Traverse the kind variables of every element of a container.
pub fn try_traverse_kind_vars_in<C, K, K2, E, F>(
    container: &C,
    f: &mut F,
) -> Result<C::Rebuilt<<C::Item as KindVars<K, K2>>::Output>, E>
where
    C: Traversable,
    C::Item: KindVars<K, K2>,
    F: FnMut(&K) -> Result<K2, E>,
{
    container.try_traverse(|item| item.try_traverse_kind_vars(&mut *f))
}

/// Traverse the type variables of every element of a container.
pub fn try_traverse_type_vars_in<C, V, V2, E, F>(
    container: &C,
    f: &mut F,
) -> Result<C::Rebuilt<<C::Item as TypeVars<V, V2>>::Output>, E>
where
    C: Traversable,
    C::Item: TypeVars<V, V2>,
    F: FnMut(&V) -> Result<V2, E>,
{
    container.try_traverse(|item| item.try_traverse_type_vars(&mut *f))
}

/// Traverse the free term variables of every element of a container.
pub fn try_traverse_term_vars_in<C, A, B, E, F>(
    container: &C,
    f: &mut F,
) -> Result<C::Rebuilt<<C::Item as TermVars<A, B>>::Output>, E>
where
    C: Traversable,
    C::Item: TermVars<A, B>,
    F: FnMut(&A) -> Result<B, E>,
{
    container.try_traverse(|item| item.try_traverse_term_vars(&mut *f))
}

pub fn map_kind_vars_in<C, K, K2, F>(
    container: &C,
    mut f: F,
) -> C::Rebuilt<<C::Item as KindVars<K, K2>>::Output>
where
    C: Traversable,
    C::Item: KindVars<K, K2>,
    F: FnMut(&K) -> K2,
{
    infallible(try_traverse_kind_vars_in(container, &mut |k| Ok(f(k))))
}

pub fn map_type_vars_in<C, V, V2, F>(
    container: &C,
    mut f: F,
) -> C::Rebuilt<<C::Item as TypeVars<V, V2>>::Output>
where
    C: Traversable,
    C::Item: TypeVars<V, V2>,
    F: FnMut(&V) -> V2,
{
    infallible(try_traverse_type_vars_in(container, &mut |v| Ok(f(v))))
}

pub fn map_term_vars_in<C, A, B, F>(
    container: &C,
    mut f: F,
) -> C::Rebuilt<<C::Item as TermVars<A, B>>::Output>
where
    C: Traversable,
    C::Item: TermVars<A, B>,
    F: FnMut(&A) -> B,
{
    infallible(try_traverse_term_vars_in(container, &mut |a| Ok(f(a))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syn::{Kind, Pattern, Scope, Term, Type};

    type Ty = Type<&'static str, &'static str>;
    type Tm = Term<Ty, &'static str>;

    // λ(x : List a). f x (y : F b), where F has kind variable k
    fn sample() -> Tm {
        let list = Type::app(
            Type::con("List", Kind::arrow(Kind::Star, Kind::Star)),
            Type::Var("a"),
        );
        let annotation = Type::app(Type::con("F", Kind::Var("k")), Type::Var("b"));
        let body = Tm::apps(
            Tm::var_rc("f"),
            vec![Tm::var_rc("x"), Tm::sig_rc(Tm::var_rc("y"), annotation)],
        );
        let scope = Scope::abstract_with(&*body, |a: &&str| (*a == "x").then_some(0));
        Tm::lam(Pattern::sig(list), scope)
    }

    #[test]
    fn test_term_vars_in_vec_visits_free_variables_in_order() {
        let terms = vec![sample(), Tm::var("z")];
        let mut seen = Vec::new();
        let renamed = map_term_vars_in(&terms, |a: &&str| {
            seen.push(*a);
            a.to_uppercase()
        });
        assert_eq!(seen, vec!["f", "y", "z"]);
        assert_eq!(renamed.len(), 2);
        assert_eq!(renamed[1], Term::<Ty, String>::var("Z".to_string()));
    }

    #[test]
    fn test_type_vars_pattern_before_body() {
        let mut seen = Vec::new();
        let mapped = sample().map_type_vars(|v: &&str| {
            seen.push(*v);
            v.len()
        });
        assert_eq!(seen, vec!["a", "b"]);
        let Term::Lam(pattern, _) = &mapped else {
            panic!("expected a lambda, got {:?}", mapped);
        };
        assert_eq!(pattern.annotations().len(), 1);
    }

    #[test]
    fn test_kind_vars() {
        let mut seen = Vec::new();
        sample().map_kind_vars(|k: &&str| seen.push(*k));
        assert_eq!(seen, vec!["k"]);
    }

    #[test]
    fn test_btree_map_keeps_keys() {
        let mut defs = BTreeMap::new();
        defs.insert("first", Rc::new(Tm::var("x")));
        defs.insert("second", Rc::new(sample()));
        let mapped = map_term_vars_in(&defs, |a: &&str| a.len());
        assert_eq!(mapped.keys().copied().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(*mapped["first"], Term::<Ty, usize>::var(1));
    }

    #[test]
    fn test_hash_map_keeps_keys() {
        let mut defs: HashMap<u32, Tm> = HashMap::new();
        defs.insert(1, Tm::var("x"));
        defs.insert(2, Tm::var("yy"));
        let mapped = map_term_vars_in(&defs, |a: &&str| a.len());
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[&1], Term::<Ty, usize>::var(1));
        assert_eq!(mapped[&2], Term::<Ty, usize>::var(2));
    }

    #[test]
    fn test_failure_stops_the_traversal() {
        let terms = vec![Tm::var("a"), Tm::var("b"), Tm::var("c")];
        let mut seen = Vec::new();
        let result = try_traverse_term_vars_in(&terms, &mut |a: &&str| {
            seen.push(*a);
            if *a == "b" {
                Err(format!("no {}", a))
            } else {
                Ok(*a)
            }
        });
        assert_eq!(result.unwrap_err(), "no b");
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_option_and_rc_containers() {
        let some = Some(Tm::var("x"));
        assert_eq!(map_term_vars_in(&some, |a: &&str| a.len()), Some(Term::<Ty, usize>::var(1)));
        let none: Option<Tm> = None;
        assert_eq!(map_term_vars_in(&none, |a: &&str| a.len()), None);
        let shared = Rc::new(Tm::var("abc"));
        assert_eq!(*map_term_vars_in(&shared, |a: &&str| a.len()), Term::<Ty, usize>::var(3));
    }
}
