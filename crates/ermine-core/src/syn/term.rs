use crate::common::{BoundVar, Index, Slot};
use crate::subst::{rewrite_term, MapAnnotations, Relabel};
use crate::syn::{Alt, Binding, HardTerm, Pattern, Scope, Terminal};
use crate::traverse::{KindVars, TermVars, TypeVars};
use ermine_support::{HasProvenance, Provenance};
use std::rc::Rc;

pub type RcTerm<T, A> = Rc<Term<T, A>>;

/// An expression, annotated with types of type `T`, over term variables of type `A`.
///
/// Terms are immutable. Rewriting one always builds a new term and shares the
/// untouched parts of the old one, so a pass may keep using the version it was
/// handed while another pass works on its successor.
#[derive(Debug, Clone)]
pub enum Term<T, A> {
    /// A free variable.
    Var(A),
    /// A variable bound by an enclosing binder.
    Bound(BoundVar),
    App(RcTerm<T, A>, RcTerm<T, A>),
    HardTerm(HardTerm),
    /// A term with a type annotation.
    Sig(RcTerm<T, A>, T),
    Lam(Pattern<T>, Scope<usize, T, A>),
    Case(RcTerm<T, A>, Vec<Alt<T, A>>),
    /// A group of mutually recursive bindings, and a body that refers to them by position.
    Let(Vec<Binding<T, A>>, Scope<usize, T, A>),
    /// A term with its source location.
    Loc(Provenance, RcTerm<T, A>),
    /// A term remembered as the solution of the numbered hole.
    Remember(usize, RcTerm<T, A>),
}

impl<T, A> Term<T, A> {
    pub fn var(a: A) -> Term<T, A> {
        Term::Var(a)
    }

    pub fn var_rc(a: A) -> RcTerm<T, A> {
        Rc::new(Term::var(a))
    }

    pub fn bound(index: Index, slot: Slot) -> Term<T, A> {
        Term::Bound(BoundVar::new(index, slot))
    }

    pub fn bound_rc(index: Index, slot: Slot) -> RcTerm<T, A> {
        Rc::new(Term::bound(index, slot))
    }

    pub fn app(function: RcTerm<T, A>, argument: RcTerm<T, A>) -> Term<T, A> {
        Term::App(function, argument)
    }

    pub fn app_rc(function: RcTerm<T, A>, argument: RcTerm<T, A>) -> RcTerm<T, A> {
        Rc::new(Term::app(function, argument))
    }

    /// Apply `function` to each argument in turn.
    pub fn apps<I>(function: RcTerm<T, A>, arguments: I) -> RcTerm<T, A>
    where
        I: IntoIterator<Item = RcTerm<T, A>>,
    {
        arguments
            .into_iter()
            .fold(function, |f, x| Term::app_rc(f, x))
    }

    pub fn hard(hard: HardTerm) -> Term<T, A> {
        Term::HardTerm(hard)
    }

    pub fn hard_rc(hard: HardTerm) -> RcTerm<T, A> {
        Rc::new(Term::hard(hard))
    }

    pub fn sig(term: RcTerm<T, A>, ty: T) -> Term<T, A> {
        Term::Sig(term, ty)
    }

    pub fn sig_rc(term: RcTerm<T, A>, ty: T) -> RcTerm<T, A> {
        Rc::new(Term::sig(term, ty))
    }

    pub fn lam(pattern: Pattern<T>, body: Scope<usize, T, A>) -> Term<T, A> {
        Term::Lam(pattern, body)
    }

    pub fn lam_rc(pattern: Pattern<T>, body: Scope<usize, T, A>) -> RcTerm<T, A> {
        Rc::new(Term::lam(pattern, body))
    }

    pub fn case(scrutinee: RcTerm<T, A>, alts: Vec<Alt<T, A>>) -> Term<T, A> {
        Term::Case(scrutinee, alts)
    }

    pub fn case_rc(scrutinee: RcTerm<T, A>, alts: Vec<Alt<T, A>>) -> RcTerm<T, A> {
        Rc::new(Term::case(scrutinee, alts))
    }

    pub fn let_in(bindings: Vec<Binding<T, A>>, body: Scope<usize, T, A>) -> Term<T, A> {
        Term::Let(bindings, body)
    }

    pub fn let_in_rc(bindings: Vec<Binding<T, A>>, body: Scope<usize, T, A>) -> RcTerm<T, A> {
        Rc::new(Term::let_in(bindings, body))
    }

    pub fn loc(provenance: Provenance, term: RcTerm<T, A>) -> Term<T, A> {
        Term::Loc(provenance, term)
    }

    pub fn loc_rc(provenance: Provenance, term: RcTerm<T, A>) -> RcTerm<T, A> {
        Rc::new(Term::loc(provenance, term))
    }

    pub fn remember(hole: usize, term: RcTerm<T, A>) -> Term<T, A> {
        Term::Remember(hole, term)
    }

    pub fn remember_rc(hole: usize, term: RcTerm<T, A>) -> RcTerm<T, A> {
        Rc::new(Term::remember(hole, term))
    }

    /// The unit of substitution.
    pub fn pure(a: A) -> Term<T, A> {
        Term::Var(a)
    }

    /// Look through any `Loc` and `Remember` wrappers.
    pub fn unlocated(&self) -> &Term<T, A> {
        let mut term = self;
        while let Term::Loc(_, inner) | Term::Remember(_, inner) = term {
            term = &**inner;
        }
        term
    }
}

impl<T, A> Terminal for Term<T, A> {
    fn from_hard_term(hard: HardTerm) -> Term<T, A> {
        Term::HardTerm(hard)
    }

    fn try_as_hard_term(&self) -> Option<&HardTerm> {
        match self {
            Term::HardTerm(hard) => Some(hard),
            _ => None,
        }
    }
}

impl<T, A> HasProvenance for Term<T, A> {
    /// The provenance of the outermost `Loc`, if the term is located at all.
    fn provenance(&self) -> Option<&Provenance> {
        let mut term = self;
        loop {
            match term {
                Term::Loc(provenance, _) => return Some(provenance),
                Term::Remember(_, inner) => term = &**inner,
                _ => return None,
            }
        }
    }
}

impl<T, A, K, K2> KindVars<K, K2> for Term<T, A>
where
    T: KindVars<K, K2>,
    T::Output: Clone,
    A: Clone,
{
    type Output = Term<T::Output, A>;

    fn try_traverse_kind_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&K) -> Result<K2, E>,
    {
        let mut annotation = |t: &T| t.try_traverse_kind_vars(&mut *f);
        rewrite_term(self, 0, &mut MapAnnotations::new(&mut annotation)).map(Rc::unwrap_or_clone)
    }
}

impl<T, A, V, V2> TypeVars<V, V2> for Term<T, A>
where
    T: TypeVars<V, V2>,
    T::Output: Clone,
    A: Clone,
{
    type Output = Term<T::Output, A>;

    fn try_traverse_type_vars<E, F>(&self, f: &mut F) -> Result<Self::Output, E>
    where
        F: FnMut(&V) -> Result<V2, E>,
    {
        let mut annotation = |t: &T| t.try_traverse_type_vars(&mut *f);
        rewrite_term(self, 0, &mut MapAnnotations::new(&mut annotation)).map(Rc::unwrap_or_clone)
    }
}

/// Visits free variables only, in order of occurrence.
impl<T: Clone, A, B: Clone> TermVars<A, B> for Term<T, A> {
    type Output = Term<T, B>;

    fn try_traverse_term_vars<E, F>(&self, f: &mut F) -> Result<Term<T, B>, E>
    where
        F: FnMut(&A) -> Result<B, E>,
    {
        rewrite_term(self, 0, &mut Relabel::new(f)).map(Rc::unwrap_or_clone)
    }
}

/// Equality up to provenance and hole memoization: `Loc` and `Remember` are
/// invisible to it.
impl<T: PartialEq, A: PartialEq> PartialEq for Term<T, A> {
    fn eq(&self, other: &Term<T, A>) -> bool {
        let mut work: Vec<(&Term<T, A>, &Term<T, A>)> = vec![(self, other)];
        while let Some((lhs, rhs)) = work.pop() {
            match (lhs.unlocated(), rhs.unlocated()) {
                (Term::Var(a), Term::Var(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (Term::Bound(a), Term::Bound(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (Term::HardTerm(a), Term::HardTerm(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (Term::App(f, x), Term::App(g, y)) => {
                    work.push((&**x, &**y));
                    work.push((&**f, &**g));
                }
                (Term::Sig(a, s), Term::Sig(b, t)) => {
                    if s != t {
                        return false;
                    }
                    work.push((&**a, &**b));
                }
                (Term::Lam(p, a), Term::Lam(q, b)) => {
                    if p != q {
                        return false;
                    }
                    work.push((&**a.body(), &**b.body()));
                }
                (Term::Case(s, alts), Term::Case(t, blts)) => {
                    if alts.len() != blts.len() {
                        return false;
                    }
                    for (a, b) in alts.iter().zip(blts) {
                        if a.pattern != b.pattern {
                            return false;
                        }
                        work.push((&**a.scope.body(), &**b.scope.body()));
                    }
                    work.push((&**s, &**t));
                }
                (Term::Let(bs, a), Term::Let(cs, b)) => {
                    if bs.len() != cs.len() {
                        return false;
                    }
                    for (x, y) in bs.iter().zip(cs) {
                        if x.binding_type != y.binding_type || x.bodies.len() != y.bodies.len() {
                            return false;
                        }
                        for (u, v) in x.bodies.iter().zip(&y.bodies) {
                            if u.patterns != v.patterns {
                                return false;
                            }
                            work.push((&**u.scope.body(), &**v.scope.body()));
                        }
                    }
                    work.push((&**a.body(), &**b.body()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl<T: Eq, A: Eq> Eq for Term<T, A> {}

impl<T, A> Term<T, A> {
    /// Move every uniquely owned child out into `out`, leaving holes behind.
    fn hollow(&mut self, out: &mut Vec<Term<T, A>>) {
        let mut take = |child: &mut RcTerm<T, A>| {
            if let Some(inner) = Rc::get_mut(child) {
                out.push(std::mem::replace(inner, Term::HardTerm(HardTerm::Hole)));
            }
        };
        match self {
            Term::Var(_) | Term::Bound(_) | Term::HardTerm(_) => {}
            Term::App(function, argument) => {
                take(function);
                take(argument);
            }
            Term::Sig(term, _) | Term::Loc(_, term) | Term::Remember(_, term) => take(term),
            Term::Lam(_, scope) => take(&mut scope.body),
            Term::Case(scrutinee, alts) => {
                take(scrutinee);
                for alt in alts {
                    take(&mut alt.scope.body);
                }
            }
            Term::Let(bindings, scope) => {
                for binding in bindings {
                    for body in &mut binding.bodies {
                        take(&mut body.scope.body);
                    }
                }
                take(&mut scope.body);
            }
        }
    }
}

// Dropping a term frees its spine with a work list rather than the call stack.
impl<T, A> Drop for Term<T, A> {
    fn drop(&mut self) {
        let mut work = Vec::new();
        self.hollow(&mut work);
        while let Some(mut term) = work.pop() {
            term.hollow(&mut work);
        }
    }
}
