//! Well-scopedness checking.
//!
//! The substitution engine assumes every bound variable names a binder that
//! encloses it, and a slot that binder actually provides. Terms built through
//! `Scope::abstract_with` satisfy this by construction. Producers that build
//! locally nameless bodies by hand can check their output here.

use crate::common::{BoundVar, Slot};
use crate::syn::{Binding, Body, Pattern, Term};
use thiserror::Error;

#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeError {
    #[error("bound variable {0} refers past every enclosing binder")]
    Dangling(BoundVar),
    #[error("bound variable {var} names a slot its binder does not provide")]
    UnknownSlot { var: BoundVar },
}

/// The slots one binder provides.
#[derive(Debug)]
enum Binder {
    /// A lambda or case alternative, binding this many pattern variables.
    Pattern(usize),
    /// The body of a let, binding this many group members.
    Group(usize),
    /// A clause of a binding: the variable count of each of its patterns,
    /// and the size of the group it belongs to.
    Clause(Vec<usize>, usize),
}

impl Binder {
    fn clause<T, A>(body: &Body<T, A>, group: usize) -> Binder {
        Binder::Clause(body.patterns.iter().map(Pattern::bound_count).collect(), group)
    }

    fn provides(&self, slot: Slot) -> bool {
        match (self, slot) {
            (Binder::Pattern(n) | Binder::Group(n), Slot::Var(i)) => i < *n,
            (Binder::Clause(patterns, _), Slot::Pattern { pattern, var }) => {
                patterns.get(pattern).is_some_and(|n| var < *n)
            }
            (Binder::Clause(_, group), Slot::Binding(i)) => i < *group,
            _ => false,
        }
    }
}

/// Which checks to make at each bound variable.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Only that the index lands on some binder.
    Closed,
    /// That, and that the binder provides the slot.
    Scoped,
}

enum Step<'t, T, A> {
    Visit(&'t Term<T, A>),
    Enter(Binder),
    Leave,
}

fn under<'t, T, A>(work: &mut Vec<Step<'t, T, A>>, binder: Binder, body: &'t Term<T, A>) {
    work.push(Step::Leave);
    work.push(Step::Visit(body));
    work.push(Step::Enter(binder));
}

/// Walk `root` under `binders`, innermost last.
fn walk<T, A>(root: &Term<T, A>, mut binders: Vec<Binder>, mode: Mode) -> Result<(), ScopeError> {
    let mut work = vec![Step::Visit(root)];
    while let Some(step) = work.pop() {
        let term = match step {
            Step::Visit(term) => term,
            Step::Enter(binder) => {
                binders.push(binder);
                continue;
            }
            Step::Leave => {
                binders.pop();
                continue;
            }
        };
        match term {
            Term::Var(_) | Term::HardTerm(_) => {}
            Term::Bound(var) => check_bound(&binders, *var, mode)?,
            Term::App(function, argument) => {
                work.push(Step::Visit(&**argument));
                work.push(Step::Visit(&**function));
            }
            Term::Sig(term, _) | Term::Loc(_, term) | Term::Remember(_, term) => {
                work.push(Step::Visit(&**term));
            }
            Term::Lam(pattern, scope) => {
                under(&mut work, Binder::Pattern(pattern.bound_count()), &**scope.body());
            }
            Term::Case(scrutinee, alts) => {
                for alt in alts.iter().rev() {
                    let binder = Binder::Pattern(alt.pattern.bound_count());
                    under(&mut work, binder, &**alt.scope.body());
                }
                work.push(Step::Visit(&**scrutinee));
            }
            Term::Let(bindings, scope) => {
                let group = bindings.len();
                under(&mut work, Binder::Group(group), &**scope.body());
                for binding in bindings.iter().rev() {
                    for body in binding.bodies.iter().rev() {
                        under(&mut work, Binder::clause(body, group), &**body.scope.body());
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_bound(binders: &[Binder], var: BoundVar, mode: Mode) -> Result<(), ScopeError> {
    let index = var.index.to_usize();
    let Some(binder) = binders.len().checked_sub(index + 1).map(|at| &binders[at]) else {
        return Err(ScopeError::Dangling(var));
    };
    if mode == Mode::Scoped && !binder.provides(var.slot) {
        return Err(ScopeError::UnknownSlot { var });
    }
    Ok(())
}

fn report<X>(what: &str, result: Result<X, ScopeError>) -> Result<X, ScopeError> {
    if let Err(error) = &result {
        log::debug!("ill-scoped {}: {}", what, error);
    }
    result
}

impl<T, A> Term<T, A> {
    /// Does every bound variable land on an enclosing binder?
    pub fn is_locally_closed(&self) -> bool {
        walk(self, Vec::new(), Mode::Closed).is_ok()
    }

    /// Check that every bound variable names an enclosing binder, and a slot
    /// that binder provides.
    pub fn check_well_scoped(&self) -> Result<(), ScopeError> {
        report("term", walk(self, Vec::new(), Mode::Scoped))
    }
}

impl<T, A> Binding<T, A> {
    /// Check the binding as a member of a let group of `group_size` bindings.
    pub fn check_well_scoped(&self, group_size: usize) -> Result<(), ScopeError> {
        let result = self.bodies.iter().try_for_each(|body| {
            let binders = vec![Binder::clause(body, group_size)];
            walk(&**body.scope.body(), binders, Mode::Scoped)
        });
        report("binding", result)
    }
}
