//! Substitution and the other rewrites of a term's variables.
//!
//! Substituting, relabelling, opening and closing scopes, and shifting indices
//! are all the same walk over a term, differing only in what happens at the
//! leaves. The walk is driven by an explicit work list instead of recursion, so
//! deeply nested terms cannot overflow the call stack.
//!
//! Terms are locally nameless. A free variable is a `Term::Var`, and anything a
//! substitution puts in its place is lifted over the binders it lands under, so
//! no replacement is ever captured.

use crate::common::{BoundVar, Index, ScopeSlot};
use crate::syn::{Alt, Binding, BindingType, Body, Pattern, RcTerm, Scope, Term};
use crate::traverse::infallible;
use ermine_support::Provenance;
use std::cmp::Ordering;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::rc::Rc;

/// What a rewrite does at the leaves of a term. `depth` is the number of
/// binders between the leaf and the point the rewrite started from.
///
/// A leaf rewritten to `None` is left as it was. Rewrites that keep the
/// annotation and variable types set `SHARES`, and then every subterm they
/// leave alone is shared with the input rather than rebuilt. Such rewrites
/// must also leave annotations alone. The others must return `Some` from
/// `free`.
pub(crate) trait Rewrite<T, A> {
    type Ann;
    type Var;
    type Error;

    const SHARES: bool = false;

    fn annotation(&mut self, ann: &T) -> Result<Self::Ann, Self::Error>;

    fn free(
        &mut self,
        var: &A,
        depth: usize,
    ) -> Result<Option<RcTerm<Self::Ann, Self::Var>>, Self::Error>;

    fn bound(
        &mut self,
        var: BoundVar,
        depth: usize,
    ) -> Result<Option<RcTerm<Self::Ann, Self::Var>>, Self::Error> {
        let _ = (var, depth);
        Ok(None)
    }

    /// The input subterm, as it appears in the output.
    fn keep(&self, term: &RcTerm<T, A>) -> Option<RcTerm<Self::Ann, Self::Var>> {
        let _ = term;
        None
    }
}

macro_rules! shares_unchanged_subterms {
    () => {
        const SHARES: bool = true;

        fn keep(&self, term: &RcTerm<T, A>) -> Option<RcTerm<T, A>> {
            Some(Rc::clone(term))
        }
    };
}

enum Task<'t, T, A> {
    Term(&'t Term<T, A>, usize),
    Pattern(&'t Pattern<T>),
    Annotation(&'t T),
    BindingType(&'t BindingType<T>),
    Body(&'t Body<T, A>, usize),
    Binding(&'t Binding<T, A>, usize),
    Alt(&'t Alt<T, A>, usize),
    Build(Frame<'t, T, A>),
}

/// A node waiting for its rewritten children, holding the input children that
/// an unchanged result is shared from.
enum Frame<'t, T, A> {
    App(&'t RcTerm<T, A>, &'t RcTerm<T, A>),
    Sig,
    Lam,
    Case(&'t RcTerm<T, A>, usize),
    Let(&'t RcTerm<T, A>, usize),
    Loc(&'t Provenance),
    Remember(usize),
    Body(&'t RcTerm<T, A>, usize),
    Binding(&'t Provenance, usize),
    Alt(&'t RcTerm<T, A>),
}

/// Rewritten terms are `None` when unchanged. Bodies, bindings and
/// alternatives are always rebuilt, but remember whether anything in them
/// changed.
struct Machine<'t, T, A, T2, B> {
    tasks: Vec<Task<'t, T, A>>,
    terms: Vec<Option<RcTerm<T2, B>>>,
    patterns: Vec<Pattern<T2>>,
    annotations: Vec<T2>,
    binding_types: Vec<BindingType<T2>>,
    bodies: Vec<(Body<T2, B>, bool)>,
    bindings: Vec<(Binding<T2, B>, bool)>,
    alts: Vec<(Alt<T2, B>, bool)>,
    steps: usize,
    peak: usize,
}

fn pop<X>(stack: &mut Vec<X>) -> X {
    match stack.pop() {
        Some(x) => x,
        None => unreachable!("rewrite result stack underflow"),
    }
}

fn pop_n<X>(stack: &mut Vec<X>, n: usize) -> Vec<X> {
    match stack.len().checked_sub(n) {
        Some(at) => stack.split_off(at),
        None => unreachable!("rewrite result stack underflow"),
    }
}

/// The rewritten child, or the input child when it was left alone.
fn settle<T, A, R>(
    rw: &R,
    rewritten: Option<RcTerm<R::Ann, R::Var>>,
    original: &RcTerm<T, A>,
) -> RcTerm<R::Ann, R::Var>
where
    R: Rewrite<T, A>,
{
    match rewritten.or_else(|| rw.keep(original)) {
        Some(term) => term,
        None => unreachable!("rewrite left a subterm alone without sharing it"),
    }
}

/// Split off the last `n` entries, and whether all of them are unchanged.
fn pop_kept<X>(stack: &mut Vec<(X, bool)>, n: usize) -> (Vec<X>, bool) {
    let mut kept = true;
    let items = pop_n(stack, n)
        .into_iter()
        .map(|(x, k)| {
            kept &= k;
            x
        })
        .collect();
    (items, kept)
}

impl<'t, T, A, T2, B> Machine<'t, T, A, T2, B> {
    fn new(first: Task<'t, T, A>) -> Self {
        Machine {
            tasks: vec![first],
            terms: Vec::new(),
            patterns: Vec::new(),
            annotations: Vec::new(),
            binding_types: Vec::new(),
            bodies: Vec::new(),
            bindings: Vec::new(),
            alts: Vec::new(),
            steps: 0,
            peak: 1,
        }
    }

    fn run<R>(&mut self, rw: &mut R) -> Result<(), R::Error>
    where
        R: Rewrite<T, A, Ann = T2, Var = B>,
    {
        // Children are pushed in reverse so that they are visited left to right.
        while let Some(task) = self.tasks.pop() {
            self.steps += 1;
            match task {
                Task::Term(term, depth) => self.term(term, depth, rw)?,
                Task::Pattern(pattern) => {
                    let pattern = pattern.try_map_annotations(&mut |t| rw.annotation(t))?;
                    self.patterns.push(pattern);
                }
                Task::Annotation(ann) => {
                    let ann = rw.annotation(ann)?;
                    self.annotations.push(ann);
                }
                Task::BindingType(binding_type) => {
                    let binding_type = binding_type.try_map(|t| rw.annotation(t))?;
                    self.binding_types.push(binding_type);
                }
                Task::Body(body, depth) => {
                    let rhs = body.scope.body();
                    self.tasks.push(Task::Build(Frame::Body(rhs, body.patterns.len())));
                    self.tasks.push(Task::Term(&**rhs, depth + 1));
                    for pattern in body.patterns.iter().rev() {
                        self.tasks.push(Task::Pattern(pattern));
                    }
                }
                Task::Binding(binding, depth) => {
                    self.tasks.push(Task::Build(Frame::Binding(
                        &binding.provenance,
                        binding.bodies.len(),
                    )));
                    for body in binding.bodies.iter().rev() {
                        self.tasks.push(Task::Body(body, depth));
                    }
                    self.tasks.push(Task::BindingType(&binding.binding_type));
                }
                Task::Alt(alt, depth) => {
                    let rhs = alt.scope.body();
                    self.tasks.push(Task::Build(Frame::Alt(rhs)));
                    self.tasks.push(Task::Term(&**rhs, depth + 1));
                    self.tasks.push(Task::Pattern(&alt.pattern));
                }
                Task::Build(frame) => self.build(frame, rw),
            }
            self.peak = self.peak.max(self.tasks.len());
        }
        log::trace!(
            "rewrite finished after {} steps, work list peaked at {}",
            self.steps,
            self.peak
        );
        Ok(())
    }

    /// Push a rewritten leaf. Rewrites that cannot share get a fresh copy of
    /// a leaf they left alone.
    fn leaf<R, F>(&mut self, rewritten: Option<RcTerm<T2, B>>, fresh: F)
    where
        R: Rewrite<T, A, Ann = T2, Var = B>,
        F: FnOnce() -> Term<T2, B>,
    {
        let term = match rewritten {
            None if !R::SHARES => Some(Rc::new(fresh())),
            rewritten => rewritten,
        };
        self.terms.push(term);
    }

    fn term<R>(&mut self, term: &'t Term<T, A>, depth: usize, rw: &mut R) -> Result<(), R::Error>
    where
        R: Rewrite<T, A, Ann = T2, Var = B>,
    {
        match term {
            Term::Var(var) => {
                let term = rw.free(var, depth)?;
                self.terms.push(term);
            }
            Term::Bound(var) => {
                let term = rw.bound(*var, depth)?;
                self.leaf::<R, _>(term, || Term::Bound(*var));
            }
            Term::HardTerm(hard) => self.leaf::<R, _>(None, || Term::HardTerm(hard.clone())),
            Term::App(function, argument) => {
                self.tasks.push(Task::Build(Frame::App(function, argument)));
                self.tasks.push(Task::Term(argument, depth));
                self.tasks.push(Task::Term(function, depth));
            }
            Term::Sig(term, ann) => {
                self.tasks.push(Task::Build(Frame::Sig));
                self.tasks.push(Task::Annotation(ann));
                self.tasks.push(Task::Term(term, depth));
            }
            Term::Lam(pattern, scope) => {
                self.tasks.push(Task::Build(Frame::Lam));
                self.tasks.push(Task::Term(&**scope.body(), depth + 1));
                self.tasks.push(Task::Pattern(pattern));
            }
            Term::Case(scrutinee, alts) => {
                self.tasks.push(Task::Build(Frame::Case(scrutinee, alts.len())));
                for alt in alts.iter().rev() {
                    self.tasks.push(Task::Alt(alt, depth));
                }
                self.tasks.push(Task::Term(scrutinee, depth));
            }
            Term::Let(bindings, scope) => {
                self.tasks.push(Task::Build(Frame::Let(scope.body(), bindings.len())));
                self.tasks.push(Task::Term(&**scope.body(), depth + 1));
                for binding in bindings.iter().rev() {
                    self.tasks.push(Task::Binding(binding, depth));
                }
            }
            Term::Loc(provenance, term) => {
                self.tasks.push(Task::Build(Frame::Loc(provenance)));
                self.tasks.push(Task::Term(term, depth));
            }
            Term::Remember(hole, term) => {
                self.tasks.push(Task::Build(Frame::Remember(*hole)));
                self.tasks.push(Task::Term(term, depth));
            }
        }
        Ok(())
    }

    fn build<R>(&mut self, frame: Frame<'t, T, A>, rw: &R)
    where
        R: Rewrite<T, A, Ann = T2, Var = B>,
    {
        // Annotations of a sharing rewrite never change, so whether a node
        // changed is decided by its subterms alone.
        let term = match frame {
            Frame::App(function, argument) => {
                let new_argument = pop(&mut self.terms);
                let new_function = pop(&mut self.terms);
                if new_function.is_none() && new_argument.is_none() {
                    None
                } else {
                    Some(Term::App(
                        settle(rw, new_function, function),
                        settle(rw, new_argument, argument),
                    ))
                }
            }
            Frame::Sig => {
                let ann = pop(&mut self.annotations);
                pop(&mut self.terms).map(|term| Term::Sig(term, ann))
            }
            Frame::Lam => {
                let pattern = pop(&mut self.patterns);
                pop(&mut self.terms).map(|body| Term::Lam(pattern, Scope::from_body(body)))
            }
            Frame::Case(scrutinee, n) => {
                let (alts, alts_kept) = pop_kept(&mut self.alts, n);
                let new_scrutinee = pop(&mut self.terms);
                if new_scrutinee.is_none() && alts_kept {
                    None
                } else {
                    Some(Term::Case(settle(rw, new_scrutinee, scrutinee), alts))
                }
            }
            Frame::Let(body, n) => {
                let new_body = pop(&mut self.terms);
                let (bindings, bindings_kept) = pop_kept(&mut self.bindings, n);
                if new_body.is_none() && bindings_kept {
                    None
                } else {
                    Some(Term::Let(bindings, Scope::from_body(settle(rw, new_body, body))))
                }
            }
            Frame::Loc(provenance) => {
                pop(&mut self.terms).map(|term| Term::Loc(provenance.clone(), term))
            }
            Frame::Remember(hole) => pop(&mut self.terms).map(|term| Term::Remember(hole, term)),
            Frame::Body(rhs, n) => {
                let new_rhs = pop(&mut self.terms);
                let patterns = pop_n(&mut self.patterns, n);
                let kept = new_rhs.is_none();
                let scope = Scope::from_body(settle(rw, new_rhs, rhs));
                self.bodies.push((Body::new(patterns, scope), kept));
                return;
            }
            Frame::Binding(provenance, n) => {
                let (bodies, kept) = pop_kept(&mut self.bodies, n);
                let binding_type = pop(&mut self.binding_types);
                self.bindings
                    .push((Binding::new(provenance.clone(), binding_type, bodies), kept));
                return;
            }
            Frame::Alt(rhs) => {
                let new_rhs = pop(&mut self.terms);
                let pattern = pop(&mut self.patterns);
                let kept = new_rhs.is_none();
                let scope = Scope::from_body(settle(rw, new_rhs, rhs));
                self.alts.push((Alt::new(pattern, scope), kept));
                return;
            }
        };
        self.terms.push(term.map(Rc::new));
    }
}

pub(crate) fn rewrite_term<T, A, R>(
    term: &Term<T, A>,
    depth: usize,
    rw: &mut R,
) -> Result<RcTerm<R::Ann, R::Var>, R::Error>
where
    R: Rewrite<T, A>,
{
    let mut machine = Machine::new(Task::Term(term, depth));
    machine.run(rw)?;
    match pop(&mut machine.terms) {
        Some(term) => Ok(term),
        None => unreachable!("a sharing rewrite must start from a shared term"),
    }
}

/// Rewrite a shared term, returning the same allocation if nothing in it
/// changed.
pub(crate) fn rewrite_shared<T, A, R>(
    term: &RcTerm<T, A>,
    depth: usize,
    rw: &mut R,
) -> Result<RcTerm<T, A>, R::Error>
where
    R: Rewrite<T, A, Ann = T, Var = A>,
{
    let mut machine = Machine::new(Task::Term(&**term, depth));
    machine.run(rw)?;
    Ok(pop(&mut machine.terms).unwrap_or_else(|| Rc::clone(term)))
}

pub(crate) fn rewrite_body<T, A, R>(
    body: &Body<T, A>,
    depth: usize,
    rw: &mut R,
) -> Result<Body<R::Ann, R::Var>, R::Error>
where
    R: Rewrite<T, A>,
{
    let mut machine = Machine::new(Task::Body(body, depth));
    machine.run(rw)?;
    Ok(pop(&mut machine.bodies).0)
}

pub(crate) fn rewrite_binding<T, A, R>(
    binding: &Binding<T, A>,
    depth: usize,
    rw: &mut R,
) -> Result<Binding<R::Ann, R::Var>, R::Error>
where
    R: Rewrite<T, A>,
{
    let mut machine = Machine::new(Task::Binding(binding, depth));
    machine.run(rw)?;
    Ok(pop(&mut machine.bindings).0)
}

pub(crate) fn rewrite_alt<T, A, R>(
    alt: &Alt<T, A>,
    depth: usize,
    rw: &mut R,
) -> Result<Alt<R::Ann, R::Var>, R::Error>
where
    R: Rewrite<T, A>,
{
    let mut machine = Machine::new(Task::Alt(alt, depth));
    machine.run(rw)?;
    Ok(pop(&mut machine.alts).0)
}

/// Substitution proper: annotations through one function, free variables
/// through another, bound variables untouched.
pub(crate) struct Subst<F, G, T2, B, E> {
    annotation: F,
    var: G,
    marker: PhantomData<fn() -> (T2, B, E)>,
}

impl<F, G, T2, B, E> Subst<F, G, T2, B, E> {
    pub(crate) fn new<T, A>(annotation: F, var: G) -> Self
    where
        F: FnMut(&T) -> Result<T2, E>,
        G: FnMut(&A) -> Result<Term<T2, B>, E>,
    {
        Subst {
            annotation,
            var,
            marker: PhantomData,
        }
    }
}

impl<T, A, T2, B, E, F, G> Rewrite<T, A> for Subst<F, G, T2, B, E>
where
    T2: Clone,
    B: Clone,
    F: FnMut(&T) -> Result<T2, E>,
    G: FnMut(&A) -> Result<Term<T2, B>, E>,
{
    type Ann = T2;
    type Var = B;
    type Error = E;

    fn annotation(&mut self, ann: &T) -> Result<T2, E> {
        (self.annotation)(ann)
    }

    fn free(&mut self, var: &A, depth: usize) -> Result<Option<RcTerm<T2, B>>, E> {
        let replacement = Rc::new((self.var)(var)?);
        Ok(Some(lift(&replacement, depth)))
    }
}

/// Rename free variables, keeping annotations.
pub(crate) struct Relabel<'f, F, B, E> {
    f: &'f mut F,
    marker: PhantomData<fn() -> (B, E)>,
}

impl<'f, F, B, E> Relabel<'f, F, B, E> {
    pub(crate) fn new(f: &'f mut F) -> Self {
        Relabel {
            f,
            marker: PhantomData,
        }
    }
}

impl<T: Clone, A, B, E, F> Rewrite<T, A> for Relabel<'_, F, B, E>
where
    F: FnMut(&A) -> Result<B, E>,
{
    type Ann = T;
    type Var = B;
    type Error = E;

    fn annotation(&mut self, ann: &T) -> Result<T, E> {
        Ok(ann.clone())
    }

    fn free(&mut self, var: &A, _depth: usize) -> Result<Option<RcTerm<T, B>>, E> {
        Ok(Some(Rc::new(Term::Var((self.f)(var)?))))
    }
}

/// Rewrite annotations, keeping variables.
pub(crate) struct MapAnnotations<'f, F, T2, E> {
    f: &'f mut F,
    marker: PhantomData<fn() -> (T2, E)>,
}

impl<'f, F, T2, E> MapAnnotations<'f, F, T2, E> {
    pub(crate) fn new(f: &'f mut F) -> Self {
        MapAnnotations {
            f,
            marker: PhantomData,
        }
    }
}

impl<T, A: Clone, T2, E, F> Rewrite<T, A> for MapAnnotations<'_, F, T2, E>
where
    F: FnMut(&T) -> Result<T2, E>,
{
    type Ann = T2;
    type Var = A;
    type Error = E;

    fn annotation(&mut self, ann: &T) -> Result<T2, E> {
        (self.f)(ann)
    }

    fn free(&mut self, var: &A, _depth: usize) -> Result<Option<RcTerm<T2, A>>, E> {
        Ok(Some(Rc::new(Term::Var(var.clone()))))
    }
}

/// Close a term over the free variables `slot_of` assigns a slot, producing
/// the body of a new outermost scope.
pub(crate) struct Abstract<F, S> {
    slot_of: F,
    marker: PhantomData<fn() -> S>,
}

impl<F, S> Abstract<F, S> {
    pub(crate) fn new(slot_of: F) -> Self {
        Abstract {
            slot_of,
            marker: PhantomData,
        }
    }
}

impl<T: Clone, A: Clone, S: ScopeSlot, F> Rewrite<T, A> for Abstract<F, S>
where
    F: FnMut(&A) -> Option<S>,
{
    type Ann = T;
    type Var = A;
    type Error = Infallible;

    shares_unchanged_subterms!();

    fn annotation(&mut self, ann: &T) -> Result<T, Infallible> {
        Ok(ann.clone())
    }

    fn free(&mut self, var: &A, depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        Ok((self.slot_of)(var)
            .map(|slot| Rc::new(Term::Bound(BoundVar::new(Index(depth), slot.into_slot())))))
    }

    fn bound(&mut self, var: BoundVar, depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        // Indices that already escape now also pass the new scope.
        if var.index.is_bound(depth) {
            Ok(None)
        } else {
            Ok(Some(Rc::new(Term::Bound(var.raise(1)))))
        }
    }
}

/// Open the outermost scope of a term, replacing the variables it binds.
pub(crate) struct Instantiate<F, S> {
    replacements: F,
    marker: PhantomData<fn(S)>,
}

impl<F, S> Instantiate<F, S> {
    pub(crate) fn new(replacements: F) -> Self {
        Instantiate {
            replacements,
            marker: PhantomData,
        }
    }
}

impl<T: Clone, A: Clone, S: ScopeSlot, F> Rewrite<T, A> for Instantiate<F, S>
where
    F: FnMut(S) -> Term<T, A>,
{
    type Ann = T;
    type Var = A;
    type Error = Infallible;

    shares_unchanged_subterms!();

    fn annotation(&mut self, ann: &T) -> Result<T, Infallible> {
        Ok(ann.clone())
    }

    fn free(&mut self, _var: &A, _depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        Ok(None)
    }

    fn bound(&mut self, var: BoundVar, depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        Ok(match var.index.0.cmp(&depth) {
            Ordering::Less => None,
            Ordering::Equal => {
                let Some(slot) = S::from_slot(var.slot) else {
                    panic!("{} is not a slot of the scope being instantiated", var.slot);
                };
                Some(lift(&Rc::new((self.replacements)(slot)), depth))
            }
            // The opened scope is gone, so outer binders are one closer.
            Ordering::Greater => Some(Rc::new(Term::Bound(var.lower(1)))),
        })
    }
}

struct Lift {
    amount: usize,
}

impl<T: Clone, A: Clone> Rewrite<T, A> for Lift {
    type Ann = T;
    type Var = A;
    type Error = Infallible;

    shares_unchanged_subterms!();

    fn annotation(&mut self, ann: &T) -> Result<T, Infallible> {
        Ok(ann.clone())
    }

    fn free(&mut self, _var: &A, _depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        Ok(None)
    }

    fn bound(&mut self, var: BoundVar, depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        if var.index.is_bound(depth) {
            Ok(None)
        } else {
            Ok(Some(Rc::new(Term::Bound(var.raise(self.amount)))))
        }
    }
}

/// Substitution that keeps the variable type, replacing only the variables
/// `var` picks out.
struct Substitute<G> {
    var: G,
}

impl<T: Clone, A: Clone, G> Rewrite<T, A> for Substitute<G>
where
    G: FnMut(&A) -> Option<Term<T, A>>,
{
    type Ann = T;
    type Var = A;
    type Error = Infallible;

    shares_unchanged_subterms!();

    fn annotation(&mut self, ann: &T) -> Result<T, Infallible> {
        Ok(ann.clone())
    }

    fn free(&mut self, var: &A, depth: usize) -> Result<Option<RcTerm<T, A>>, Infallible> {
        Ok((self.var)(var).map(|replacement| lift(&Rc::new(replacement), depth)))
    }
}

/// Prepare `term` to be placed under `amount` additional binders, by raising
/// every index that escapes it.
///
/// Subterms with nothing to raise are shared with `term`, and a locally
/// closed term is returned as is.
pub fn lift<T: Clone, A: Clone>(term: &RcTerm<T, A>, amount: usize) -> RcTerm<T, A> {
    if amount == 0 || term.is_locally_closed() {
        return Rc::clone(term);
    }
    infallible(rewrite_shared(term, 0, &mut Lift { amount }))
}

/// Replace each free variable `a` for which `g(a)` is `Some`, leaving the
/// others in place. Unlike [`Term::bind`], the result shares every subterm
/// that contains no replaced variable with `term`.
pub fn substitute<T, A, G>(term: &RcTerm<T, A>, g: G) -> RcTerm<T, A>
where
    T: Clone,
    A: Clone,
    G: FnMut(&A) -> Option<Term<T, A>>,
{
    infallible(rewrite_shared(term, 0, &mut Substitute { var: g }))
}

impl<T, A> Term<T, A> {
    /// Substitute `g(a)` for every free variable `a`, and `f(t)` for every
    /// annotation `t`. Effects happen left to right, with the annotations of a
    /// node's patterns visited before its body.
    pub fn try_bind_term<T2, B, E, F, G>(&self, f: F, g: G) -> Result<RcTerm<T2, B>, E>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> Result<T2, E>,
        G: FnMut(&A) -> Result<Term<T2, B>, E>,
    {
        rewrite_term(self, 0, &mut Subst::new(f, g))
    }

    /// Substitute `g(a)` for every free variable `a`, and `f(t)` for every
    /// annotation `t`.
    pub fn bind_term<T2, B, F, G>(&self, mut f: F, mut g: G) -> RcTerm<T2, B>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> T2,
        G: FnMut(&A) -> Term<T2, B>,
    {
        infallible(self.try_bind_term(|t| Ok(f(t)), |a| Ok(g(a))))
    }

    /// Monadic bind: substitution that keeps the annotations.
    pub fn bind<B, G>(&self, g: G) -> RcTerm<T, B>
    where
        T: Clone,
        B: Clone,
        G: FnMut(&A) -> Term<T, B>,
    {
        self.bind_term(|t: &T| t.clone(), g)
    }

    pub fn try_bind<B, E, G>(&self, g: G) -> Result<RcTerm<T, B>, E>
    where
        T: Clone,
        B: Clone,
        G: FnMut(&A) -> Result<Term<T, B>, E>,
    {
        self.try_bind_term(|t: &T| Ok(t.clone()), g)
    }
}

impl<T, A> Body<T, A> {
    pub fn try_bind_body<T2, B, E, F, G>(&self, f: F, g: G) -> Result<Body<T2, B>, E>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> Result<T2, E>,
        G: FnMut(&A) -> Result<Term<T2, B>, E>,
    {
        rewrite_body(self, 0, &mut Subst::new(f, g))
    }

    /// Substitute through the patterns' annotations and the right-hand side.
    pub fn bind_body<T2, B, F, G>(&self, mut f: F, mut g: G) -> Body<T2, B>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> T2,
        G: FnMut(&A) -> Term<T2, B>,
    {
        infallible(self.try_bind_body(|t| Ok(f(t)), |a| Ok(g(a))))
    }
}

impl<T, A> Binding<T, A> {
    pub fn try_bind_binding<T2, B, E, F, G>(&self, f: F, g: G) -> Result<Binding<T2, B>, E>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> Result<T2, E>,
        G: FnMut(&A) -> Result<Term<T2, B>, E>,
    {
        rewrite_binding(self, 0, &mut Subst::new(f, g))
    }

    /// Substitute through the binding's type and every one of its bodies.
    /// The provenance is kept.
    pub fn bind_binding<T2, B, F, G>(&self, mut f: F, mut g: G) -> Binding<T2, B>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> T2,
        G: FnMut(&A) -> Term<T2, B>,
    {
        infallible(self.try_bind_binding(|t| Ok(f(t)), |a| Ok(g(a))))
    }
}

impl<T, A> Alt<T, A> {
    pub fn try_bind_alt<T2, B, E, F, G>(&self, f: F, g: G) -> Result<Alt<T2, B>, E>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> Result<T2, E>,
        G: FnMut(&A) -> Result<Term<T2, B>, E>,
    {
        rewrite_alt(self, 0, &mut Subst::new(f, g))
    }

    pub fn bind_alt<T2, B, F, G>(&self, mut f: F, mut g: G) -> Alt<T2, B>
    where
        T2: Clone,
        B: Clone,
        F: FnMut(&T) -> T2,
        G: FnMut(&A) -> Term<T2, B>,
    {
        infallible(self.try_bind_alt(|t| Ok(f(t)), |a| Ok(g(a))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BodySlot, Slot};
    use crate::syn::{HardTerm, Prim, Terminal};
    use proptest::prelude::*;
    use std::cell::RefCell;

    type Tm = Term<&'static str, &'static str>;

    fn one() -> Tm {
        Tm::from_primitive(Prim::int(1))
    }

    fn x_to_one(a: &&'static str) -> Tm {
        if *a == "x" {
            one()
        } else {
            Tm::var(*a)
        }
    }

    fn same(t: &&'static str) -> &'static str {
        t
    }

    fn lam_x(body: &Tm) -> RcTerm<&'static str, &'static str> {
        Tm::lam_rc(
            Pattern::Var,
            Scope::abstract_with(body, |a: &&str| (*a == "x").then_some(0)),
        )
    }

    #[test]
    fn test_bind_replaces_free_variable() {
        let term = Tm::app(Tm::var_rc("f"), Tm::var_rc("x"));
        let result = term.bind_term(same, x_to_one);
        assert_eq!(*result, Tm::app(Tm::var_rc("f"), Rc::new(one())));
    }

    #[test]
    fn test_bind_leaves_closed_lambda_alone() {
        let term = lam_x(&Tm::var("x"));
        let result = term.bind_term(same, |_| Tm::var("clobbered"));
        assert_eq!(*result, *term);
        assert_eq!(
            *result,
            Tm::lam(
                Pattern::Var,
                Scope::from_body(Tm::bound_rc(Index(0), Slot::Var(0)))
            )
        );
    }

    #[test]
    fn test_bind_binding_maps_type_and_bodies() {
        let body = Body::new(
            vec![Pattern::sig("Int")],
            Scope::from_body(Tm::app_rc(
                Tm::bound_rc(Index(0), Slot::Pattern { pattern: 0, var: 0 }),
                Tm::var_rc("x"),
            )),
        );
        let binding = Binding::explicit("T1", vec![body.clone()]);
        let rename = |t: &&'static str| if *t == "T1" { "T2" } else { "Integer" };

        let result = binding.bind_binding(rename, x_to_one);
        assert_eq!(result.binding_type, BindingType::Explicit("T2"));
        assert_eq!(result.bodies, vec![body.bind_body(rename, x_to_one)]);
        assert_eq!(result.bodies[0].patterns, vec![Pattern::sig("Integer")]);
        assert_eq!(
            **result.bodies[0].scope.body(),
            Tm::app(
                Tm::bound_rc(Index(0), Slot::Pattern { pattern: 0, var: 0 }),
                Rc::new(one()),
            )
        );
    }

    #[test]
    fn test_bind_does_not_capture() {
        // λx. y, then y := x. The new x must stay free.
        let term = lam_x(&Tm::var("y"));
        let result = term.bind(|a| if *a == "y" { Tm::var("x") } else { Tm::var(*a) });
        assert_eq!(*result, *lam_x(&Tm::var("z")).bind(|_| Tm::var("x")));
        let Term::Lam(_, scope) = &*result else {
            panic!("expected a lambda, got {:?}", result);
        };
        assert_eq!(**scope.body(), Tm::var("x"));
    }

    #[test]
    fn test_bind_lifts_open_replacement() {
        // Substituting a term with a dangling index under a binder raises it.
        let term = lam_x(&Tm::var("y"));
        let dangling = Tm::bound(Index(0), Slot::Var(3));
        let result = term.bind(|_| dangling.clone());
        let expected = Tm::lam(
            Pattern::Var,
            Scope::from_body(Tm::bound_rc(Index(1), Slot::Var(3))),
        );
        assert_eq!(*result, expected);
    }

    #[test]
    fn test_annotations_visited_before_right_hand_side() {
        // (λ(x : A). f (y : B)) z
        let body = Tm::app(
            Tm::var_rc("f"),
            Tm::sig_rc(Tm::var_rc("y"), "B"),
        );
        let lam = Tm::lam_rc(
            Pattern::sig("A"),
            Scope::abstract_with(&body, |a: &&str| (*a == "x").then_some(0)),
        );
        let term = Tm::app(lam, Tm::var_rc("z"));

        let seen = RefCell::new(Vec::new());
        let result: Result<_, ()> = term.try_bind_term(
            |t| {
                seen.borrow_mut().push(format!("ann {}", t));
                Ok(*t)
            },
            |a| {
                seen.borrow_mut().push(format!("var {}", a));
                Ok(Tm::var(*a))
            },
        );
        assert!(result.is_ok());
        assert_eq!(
            seen.into_inner(),
            vec!["ann A", "var f", "var y", "ann B", "var z"]
        );
    }

    #[test]
    fn test_try_bind_stops_at_first_error() {
        let term = Tm::apps(
            Tm::var_rc("f"),
            vec![Tm::var_rc("a"), Tm::var_rc("b"), Tm::var_rc("c")],
        );
        let mut seen = Vec::new();
        let result = term.try_bind(|a| {
            seen.push(*a);
            if *a == "b" {
                Err(format!("unbound {}", a))
            } else {
                Ok(Tm::var(*a))
            }
        });
        assert_eq!(result.unwrap_err(), "unbound b");
        assert_eq!(seen, vec!["f", "a", "b"]);
    }

    #[test]
    fn test_let_group_and_body_depths() {
        // let f = λ_. g ; in f y, where g and y are free
        let rhs = Scope::from_body(Tm::app_rc(
            Tm::bound_rc(Index(0), Slot::Binding(0)),
            Tm::var_rc("g"),
        ));
        let binding = Binding::implicit(vec![Body::new(vec![Pattern::Wildcard], rhs)]);
        let body = Scope::from_body(Tm::app_rc(
            Tm::bound_rc(Index(0), Slot::Var(0)),
            Tm::var_rc("y"),
        ));
        let term = Tm::let_in(vec![binding], body);

        let open = Tm::bound(Index(0), Slot::Var(7));
        let result = term.bind(|_| open.clone());
        let Term::Let(bindings, body) = &*result else {
            panic!("expected a let, got {:?}", result);
        };
        assert_eq!(
            **bindings[0].bodies[0].scope.body(),
            Tm::app(
                Tm::bound_rc(Index(0), Slot::Binding(0)),
                Tm::bound_rc(Index(1), Slot::Var(7)),
            )
        );
        assert_eq!(
            **body.body(),
            Tm::app(
                Tm::bound_rc(Index(0), Slot::Var(0)),
                Tm::bound_rc(Index(1), Slot::Var(7)),
            )
        );
    }

    #[test]
    fn test_wrappers_survive_rewrite() {
        let provenance = Provenance::source(ermine_support::SourceId(3), 4..9);
        let term = Tm::loc(provenance.clone(), Tm::remember_rc(2, Tm::var_rc("x")));
        let result = term.bind_term(same, x_to_one);
        let Term::Loc(kept, inner) = &*result else {
            panic!("expected a located term, got {:?}", result);
        };
        assert_eq!(*kept, provenance);
        assert!(matches!(&**inner, Term::Remember(2, _)));
    }

    #[test]
    fn test_bind_alt() {
        let alt = Alt::new(
            Pattern::constructor("Just", vec![Pattern::Var]),
            Scope::abstract_with(
                &Tm::app(Tm::var_rc("n"), Tm::var_rc("x")),
                |a: &&str| (*a == "n").then_some(0),
            ),
        );
        let result = alt.bind_alt(same, x_to_one);
        assert_eq!(result.pattern, alt.pattern);
        assert_eq!(
            **result.scope.body(),
            Tm::app(Tm::bound_rc(Index(0), Slot::Var(0)), Rc::new(one()))
        );
    }

    #[test]
    fn test_instantiate_lowers_outer_indices() {
        // The body of a scope nested one binder deep refers past its own scope.
        let scope: Scope<usize, &str, &str> = Scope::from_body(Tm::app_rc(
            Tm::bound_rc(Index(0), Slot::Var(0)),
            Tm::bound_rc(Index(1), Slot::Var(0)),
        ));
        let result = scope.instantiate(|_| Tm::var("v"));
        assert_eq!(
            *result,
            Tm::app(Tm::var_rc("v"), Tm::bound_rc(Index(0), Slot::Var(0)))
        );
    }

    #[test]
    #[should_panic(expected = "is not a slot of the scope being instantiated")]
    fn test_instantiate_rejects_foreign_slot() {
        let scope: Scope<usize, &str, &str> =
            Scope::from_body(Tm::bound_rc(Index(0), Slot::Binding(0)));
        scope.instantiate(|_| Tm::var("v"));
    }

    #[test]
    fn test_lift_shares_closed_terms() {
        let closed = lam_x(&Tm::var("x"));
        assert!(Rc::ptr_eq(&lift(&closed, 3), &closed));
        let open = Tm::bound_rc(Index(0), Slot::Var(0));
        assert!(Rc::ptr_eq(&lift(&open, 0), &open));
        assert_eq!(*lift(&open, 2), Tm::bound(Index(2), Slot::Var(0)));
    }

    #[test]
    fn test_lift_shares_subterms_without_escaping_indices() {
        let closed = Tm::app_rc(Rc::new(one()), Tm::hard_rc(HardTerm::Hole));
        let open = Tm::app_rc(Rc::clone(&closed), Tm::bound_rc(Index(0), Slot::Var(0)));
        let lifted = lift(&open, 2);
        let Term::App(function, argument) = &*lifted else {
            panic!("expected an application, got {:?}", lifted);
        };
        assert!(Rc::ptr_eq(function, &closed));
        assert_eq!(**argument, Tm::bound(Index(2), Slot::Var(0)));
    }

    #[test]
    fn test_substitute_shares_untouched_subterms() {
        let closed = Tm::app_rc(Rc::new(one()), Tm::hard_rc(HardTerm::Hole));
        let term = Tm::app_rc(Rc::clone(&closed), Tm::var_rc("x"));
        let result = substitute(&term, |a| (*a == "x").then(|| Tm::var("y")));
        let Term::App(function, argument) = &*result else {
            panic!("expected an application, got {:?}", result);
        };
        assert!(Rc::ptr_eq(function, &closed));
        assert_eq!(**argument, Tm::var("y"));

        assert!(Rc::ptr_eq(&substitute(&term, |_| None), &term));
    }

    #[test]
    fn test_substitute_shares_through_binders() {
        // λx. x (f y): substituting y rebuilds the spine but keeps `f`.
        let f = Tm::var_rc("f");
        let body = Tm::app(Tm::var_rc("x"), Tm::app_rc(Rc::clone(&f), Tm::var_rc("y")));
        let term = lam_x(&body);
        let open = Tm::bound(Index(0), Slot::Var(5));
        let result = substitute(&term, |a| (*a == "y").then(|| open.clone()));
        assert_eq!(*result, *term.bind(|a| if *a == "y" { open.clone() } else { Tm::var(*a) }));
        let Term::Lam(_, scope) = &*result else {
            panic!("expected a lambda, got {:?}", result);
        };
        let Term::App(_, argument) = &**scope.body() else {
            panic!("expected an application, got {:?}", scope.body());
        };
        let Term::App(function, replaced) = &**argument else {
            panic!("expected an application, got {:?}", argument);
        };
        assert!(Rc::ptr_eq(function, &f));
        assert_eq!(**replaced, Tm::bound(Index(1), Slot::Var(5)));
    }

    #[test]
    fn test_deep_term_does_not_overflow() {
        let mut term = Tm::var_rc("x");
        for _ in 0..100_000 {
            term = Tm::app_rc(Tm::var_rc("f"), term);
        }
        let result = term.bind_term(same, x_to_one);
        let mut spine = &*result;
        let mut depth = 0;
        while let Term::App(_, argument) = spine {
            spine = &**argument;
            depth += 1;
        }
        assert_eq!(depth, 100_000);
        assert!(spine.try_as_hard_term().is_some());
    }

    type Small = Term<u32, u8>;

    fn group_slot(a: &u8) -> Option<BodySlot> {
        match *a {
            0 => Some(BodySlot::Pattern { pattern: 0, var: 0 }),
            1 => Some(BodySlot::Binding(0)),
            _ => None,
        }
    }

    /// A pattern binding exactly one variable, annotated or not.
    fn arb_pattern() -> impl Strategy<Value = Pattern<u32>> {
        prop_oneof![Just(Pattern::Var), any::<u32>().prop_map(Pattern::sig)]
    }

    fn arb_term() -> impl Strategy<Value = RcTerm<u32, u8>> {
        let leaf = prop_oneof![
            (0u8..4).prop_map(Small::var_rc),
            any::<i32>().prop_map(|n| Small::hard_rc(HardTerm::Prim(Prim::int(n)))),
        ];
        leaf.prop_recursive(5, 48, 3, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(f, x)| Small::app_rc(f, x)),
                (inner.clone(), any::<u32>()).prop_map(|(t, ty)| Small::sig_rc(t, ty)),
                (inner.clone(), 0u8..4, arb_pattern()).prop_map(|(body, v, pattern)| {
                    let scope = Scope::abstract_with(&body, move |a: &u8| (*a == v).then_some(0));
                    Small::lam_rc(pattern, scope)
                }),
                (inner.clone(), prop::collection::vec((inner.clone(), arb_pattern()), 1..3))
                    .prop_map(|(scrutinee, rhss)| {
                        let alts = rhss
                            .iter()
                            .map(|(rhs, pattern)| {
                                let scope =
                                    Scope::abstract_with(&**rhs, |a: &u8| (*a == 2).then_some(0));
                                Alt::new(pattern.clone(), scope)
                            })
                            .collect();
                        Small::case_rc(scrutinee, alts)
                    }),
                (inner.clone(), inner.clone(), arb_pattern(), prop::option::of(any::<u32>()))
                    .prop_map(|(rhs, body, pattern, ty)| {
                        let clause =
                            Body::new(vec![pattern], Scope::abstract_with(&rhs, group_slot));
                        let binding = match ty {
                            Some(ty) => Binding::explicit(ty, vec![clause]),
                            None => Binding::implicit(vec![clause]),
                        };
                        let scope = Scope::abstract_with(&body, |a: &u8| (*a == 1).then_some(0));
                        Small::let_in_rc(vec![binding], scope)
                    }),
                (inner.clone(), 0usize..4).prop_map(|(t, hole)| Small::remember_rc(hole, t)),
                inner.prop_map(|t| Small::loc_rc(Provenance::Generated, t)),
            ]
        })
    }

    /// A replacement with an annotated binder of its own and a free variable underneath.
    fn wrap(a: &u8) -> Small {
        let body = Small::app(Small::var_rc(a.wrapping_add(1) % 4), Small::var_rc(9));
        Small::lam(
            Pattern::sig(u32::from(*a)),
            Scope::abstract_with(&body, |v: &u8| (*v == 9).then_some(0)),
        )
    }

    fn constant(a: &u8) -> Small {
        if *a % 2 == 0 {
            Small::sig(
                Small::hard_rc(HardTerm::Prim(Prim::int(i32::from(*a)))),
                u32::from(*a),
            )
        } else {
            Small::var(*a)
        }
    }

    fn double(t: &u32) -> u32 {
        t.wrapping_mul(2)
    }

    fn succ(t: &u32) -> u32 {
        t.wrapping_add(1)
    }

    proptest! {
        #[test]
        fn test_bind_pure_is_identity(term in arb_term()) {
            prop_assert_eq!(&*term.bind(|a| Small::pure(*a)), &*term);
            prop_assert_eq!(&*term.bind_term(|t| *t, |a| Small::pure(*a)), &*term);
        }

        #[test]
        fn test_bind_composes(term in arb_term()) {
            let sequential = term.bind(wrap).bind(constant);
            let fused = term.bind(|a| (*wrap(a).bind(constant)).clone());
            prop_assert_eq!(&*sequential, &*fused);
        }

        #[test]
        fn test_bind_term_composes_annotations(term in arb_term()) {
            let sequential = term.bind_term(double, wrap).bind_term(succ, constant);
            let fused = term.bind_term(
                |t| succ(&double(t)),
                |a| (*wrap(a).bind_term(succ, constant)).clone(),
            );
            prop_assert_eq!(&*sequential, &*fused);
        }

        #[test]
        fn test_bind_term_maps_every_annotation(term in arb_term()) {
            let mut before = 0;
            let _ = term.bind_term(|t| { before += 1; *t }, |a| Small::pure(*a));
            let mut after = 0;
            let _ = term.bind_term(double, |a| Small::pure(*a)).bind_term(
                |t| { after += 1; *t },
                |a| Small::pure(*a),
            );
            prop_assert_eq!(before, after);
        }

        #[test]
        fn test_bind_preserves_scoping(term in arb_term()) {
            prop_assert!(term.check_well_scoped().is_ok());
            prop_assert!(term.bind(wrap).check_well_scoped().is_ok());
        }

        #[test]
        fn test_instantiate_inverts_abstract(term in arb_term(), v in 0u8..4) {
            let scope: Scope<usize, u32, u8> =
                Scope::abstract_with(&term, |a: &u8| (*a == v).then_some(0));
            prop_assert_eq!(&*scope.instantiate(|_| Small::var(v)), &*term);
        }

        #[test]
        fn test_substitute_agrees_with_bind(term in arb_term()) {
            let pick = |a: &u8| (*a % 2 == 0).then(|| wrap(a));
            let shared = substitute(&term, pick);
            let rebuilt = term.bind(|a| pick(a).unwrap_or_else(|| Small::var(*a)));
            prop_assert_eq!(&*shared, &*rebuilt);
        }
    }
}
