use crate::common::BoundVar;
use crate::syn::{Binding, BindingType, Pattern, Term};
use elegance::{Io, Printer, Render};
use std::fmt::{self, Display, Formatter};

const INDENT: isize = 2;
const COLUMNS: usize = 80;

/// Terms nested deeper than this are elided as `…`. The printer recurses.
const MAX_NESTING: usize = 256;

const NO_PREC: Option<usize> = None;
const SIG_LHS: Option<usize> = Some(2);
const SIG_RHS: Option<usize> = Some(2);
const LAMBDA_LHS: Option<usize> = NO_PREC;
const LAMBDA_RHS: Option<usize> = Some(3);
const APP_LHS: Option<usize> = Some(4);
const APP_RHS: Option<usize> = Some(5);

pub fn dump_term<T: Display, A: Display>(term: &Term<T, A>) {
    let mut p = Printer::new(Io(std::io::stdout()), COLUMNS);
    let st = State::new();
    let _ = term.print(st, &mut p);
    let _ = p.hard_break();
    let _ = p.finish();
}

pub fn print_term_to_string<T: Display, A: Display>(term: &Term<T, A>) -> String {
    let mut p = Printer::new(String::new(), COLUMNS);
    let st = State::new();
    let _ = term.print(st, &mut p);
    p.finish().unwrap_or_default()
}

impl<T: Display, A: Display> Display for Term<T, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&print_term_to_string(self))
    }
}

#[derive(Clone, Copy)]
struct State {
    /// Ambient binder depth.
    depth: usize,
    /// How many terms enclose this one.
    nesting: usize,
    // The parent precedence.
    precedence: (Option<usize>, Option<usize>),
}

impl State {
    fn new() -> State {
        State {
            depth: 0,
            nesting: 0,
            precedence: (None, None),
        }
    }

    fn set_lhs_prec(self, prec: Option<usize>) -> State {
        State {
            precedence: (prec, self.precedence.1),
            ..self
        }
    }

    fn set_rhs_prec(self, prec: Option<usize>) -> State {
        State {
            precedence: (self.precedence.0, prec),
            ..self
        }
    }

    fn nest(self) -> State {
        State {
            nesting: self.nesting + 1,
            ..self
        }
    }

    fn inc_depth(self) -> State {
        State {
            depth: self.depth + 1,
            ..self
        }
    }
}

fn print_left_subterm<T, A, R>(
    st: State,
    p: &mut Printer<R>,
    x: &Term<T, A>,
    lhs_prec: Option<usize>,
) -> Result<(), R::Error>
where
    T: Display,
    A: Display,
    R: Render,
{
    x.print(st.set_rhs_prec(lhs_prec), p)
}

fn print_right_subterm<T, A, R>(
    st: State,
    p: &mut Printer<R>,
    x: &Term<T, A>,
    rhs_prec: Option<usize>,
) -> Result<(), R::Error>
where
    T: Display,
    A: Display,
    R: Render,
{
    x.print(st.set_lhs_prec(rhs_prec), p)
}

fn print_internal_subterm<T, A, R>(
    st: State,
    p: &mut Printer<R>,
    x: &Term<T, A>,
) -> Result<(), R::Error>
where
    T: Display,
    A: Display,
    R: Render,
{
    x.print(st.set_lhs_prec(NO_PREC).set_rhs_prec(NO_PREC), p)
}

fn with_prec<F, R>(
    st: State,
    p: &mut Printer<R>,
    lhs_prec: Option<usize>,
    rhs_prec: Option<usize>,
    f: F,
) -> Result<(), R::Error>
where
    F: FnOnce(State, &mut Printer<R>) -> Result<(), R::Error>,
    R: Render,
{
    // If the parent binds tighter, or if equal, then we need parens to ensure
    // that this subexpression would be parsed together as an atomic expression.
    let mut need_parens = false;
    if let Some(left_prec) = lhs_prec {
        if let Some(left_parent) = st.precedence.0 {
            need_parens |= left_parent >= left_prec;
        }
    }
    if let Some(right_prec) = rhs_prec {
        if let Some(right_parent) = st.precedence.1 {
            need_parens |= right_parent >= right_prec;
        }
    }
    if need_parens {
        p.igroup(INDENT, |p| {
            p.text("(")?;
            f(st.set_lhs_prec(NO_PREC).set_rhs_prec(NO_PREC), p)?;
            p.text(")")
        })
    } else {
        f(st, p)
    }
}

/// A bound variable is shown by the level of its binder and its slot there, or
/// as `!n` when it points `n` binders past the term being printed.
fn print_bound<R: Render>(st: State, p: &mut Printer<R>, var: BoundVar) -> Result<(), R::Error> {
    if var.index.is_bound(st.depth) {
        let level = var.index.to_level(st.depth).to_usize();
        p.text_owned(format!("%{}.{}", level, var.slot))
    } else {
        let negative_level = var.index.to_usize() - st.depth;
        p.text_owned(format!("!{}.{}", negative_level, var.slot))
    }
}

/// Print a pattern whose variables are named `{prefix}{n}`.
fn print_pattern<T, R>(p: &mut Printer<R>, pattern: &Pattern<T>, prefix: &str) -> Result<(), R::Error>
where
    T: Display,
    R: Render,
{
    let mut out = String::new();
    // Writing to a string cannot fail.
    let _ = pattern.write_named(&mut out, prefix, &mut 0);
    p.text_owned(out)
}

fn separator<R: Render>(p: &mut Printer<R>, first: &mut bool) -> Result<(), R::Error> {
    if !*first {
        p.text(";")?;
    }
    *first = false;
    p.space()
}

impl<T: Display, A: Display> Binding<T, A> {
    /// Print the binding as member `i` of a group bound at `st.depth`.
    fn print<R: Render>(
        &self,
        st: State,
        p: &mut Printer<R>,
        i: usize,
        first: &mut bool,
    ) -> Result<(), R::Error> {
        let name = format!("%{}.{}", st.depth, i);
        if let BindingType::Explicit(ty) = &self.binding_type {
            separator(p, first)?;
            p.text_owned(format!("{} : {}", name, ty))?;
        }
        for body in &self.bodies {
            separator(p, first)?;
            p.cgroup(INDENT, |p| {
                p.text_owned(name.clone())?;
                for (j, pattern) in body.patterns.iter().enumerate() {
                    p.text(" ")?;
                    print_pattern(p, pattern, &format!("%{}.{}.", st.depth, j))?;
                }
                p.text(" =")?;
                p.space()?;
                print_internal_subterm(st.inc_depth(), p, &**body.scope.body())
            })?;
        }
        Ok(())
    }
}

impl<T: Display, A: Display> Term<T, A> {
    fn print<R: Render>(&self, st: State, p: &mut Printer<R>) -> Result<(), R::Error> {
        if st.nesting >= MAX_NESTING {
            return p.text("…");
        }
        let st = st.nest();
        match self {
            Term::Var(a) => p.text_owned(a.to_string()),
            Term::Bound(var) => print_bound(st, p, *var),
            Term::HardTerm(hard) => p.text_owned(hard.to_string()),
            Term::App(function, argument) => with_prec(st, p, APP_LHS, APP_RHS, |st, p| {
                p.cgroup(0, |p| {
                    print_left_subterm(st, p, &**function, APP_LHS)?;
                    p.space()?;
                    print_right_subterm(st, p, &**argument, APP_RHS)
                })
            }),
            Term::Sig(term, ty) => with_prec(st, p, SIG_LHS, SIG_RHS, |st, p| {
                p.igroup(0, |p| {
                    print_left_subterm(st, p, &**term, SIG_LHS)?;
                    p.text(" :")?;
                    p.space()?;
                    p.text_owned(ty.to_string())
                })
            }),
            Term::Lam(..) => self.print_lambda(st, p),
            Term::Case(scrutinee, alts) => p.cgroup(INDENT, |p| {
                p.text("case ")?;
                print_internal_subterm(st, p, &**scrutinee)?;
                p.text(" of {")?;
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        p.text(";")?;
                    }
                    p.space()?;
                    print_pattern(p, &alt.pattern, &format!("%{}.", st.depth))?;
                    p.text(" →")?;
                    p.space()?;
                    print_internal_subterm(st.inc_depth(), p, &**alt.scope.body())?;
                }
                p.space()?;
                p.text("}")
            }),
            Term::Let(bindings, scope) => with_prec(st, p, LAMBDA_LHS, LAMBDA_RHS, |st, p| {
                p.cgroup(0, |p| {
                    p.text("let {")?;
                    p.cgroup(INDENT, |p| {
                        let mut first = true;
                        for (i, binding) in bindings.iter().enumerate() {
                            binding.print(st, p, i, &mut first)?;
                        }
                        Ok(())
                    })?;
                    p.space()?;
                    p.text("} in")?;
                    p.space()?;
                    print_right_subterm(st.inc_depth(), p, &**scope.body(), LAMBDA_RHS)
                })
            }),
            Term::Loc(_, term) | Term::Remember(_, term) => term.print(st, p),
        }
    }

    fn print_lambda<R: Render>(&self, st: State, p: &mut Printer<R>) -> Result<(), R::Error> {
        with_prec(st, p, LAMBDA_LHS, LAMBDA_RHS, |st, p| {
            p.cgroup(2, |p| {
                let mut next = self;
                let mut st = st;
                p.cgroup(0, |p| {
                    p.text("λ ")?;
                    while let Term::Lam(pattern, scope) = next {
                        if !std::ptr::eq(next, self) {
                            p.space()?;
                        }
                        print_pattern(p, pattern, &format!("%{}.", st.depth))?;
                        st = st.inc_depth();
                        next = &**scope.body();
                    }
                    p.space()?;
                    p.text("→")
                })?;
                p.space()?;
                print_right_subterm(st, p, next, LAMBDA_RHS)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Index, Slot};
    use crate::syn::{Alt, Body, HardTerm, Prim, RcTerm, Scope, Terminal};
    use ermine_support::Provenance;
    use insta::assert_snapshot;
    use std::rc::Rc;

    type Tm = Term<&'static str, &'static str>;

    fn bound(index: usize, slot: usize) -> RcTerm<&'static str, &'static str> {
        Tm::bound_rc(Index(index), Slot::Var(slot))
    }

    fn lam(body: RcTerm<&'static str, &'static str>) -> Tm {
        Tm::lam(Pattern::Var, Scope::from_body(body))
    }

    #[test]
    fn test_print_term_to_string() {
        // Application: f x
        assert_snapshot!(
            print_term_to_string(&Tm::app(Tm::var_rc("f"), Tm::var_rc("x"))),
            @"f x"
        );

        // Literals and holes
        assert_snapshot!(
            print_term_to_string(&Tm::app(
                Rc::new(Tm::from_primitive(Prim::global("plus"))),
                Tm::hard_rc(HardTerm::Hole)
            )),
            @"@plus ?"
        );

        // Lambda: λ %0.0 → %0.0
        assert_snapshot!(print_term_to_string(&lam(bound(0, 0))), @"λ %0.0 → %0.0");

        // Nested lambda: λ %0.0 %1.0 → %0.0 %1.0
        assert_snapshot!(
            print_term_to_string(&lam(Rc::new(lam(Tm::app_rc(bound(1, 0), bound(0, 0)))))),
            @"λ %0.0 %1.0 → %0.0 %1.0"
        );

        // Dangling variable under a lambda: λ %0.0 → !1.0
        assert_snapshot!(print_term_to_string(&lam(bound(2, 0))), @"λ %0.0 → !1.0");

        // Lambda in function position needs parentheses.
        assert_snapshot!(
            print_term_to_string(&Tm::app(Rc::new(lam(bound(0, 0))), Tm::var_rc("y"))),
            @"(λ %0.0 → %0.0) y"
        );

        // Nested application on the right needs parentheses.
        assert_snapshot!(
            print_term_to_string(&Tm::app(
                Tm::var_rc("f"),
                Tm::app_rc(Tm::var_rc("g"), Tm::var_rc("x"))
            )),
            @"f (g x)"
        );

        // Signature: x : Int
        assert_snapshot!(
            print_term_to_string(&Tm::sig(Tm::var_rc("x"), "Int")),
            @"x : Int"
        );

        // Locations and remembered holes are invisible.
        assert_snapshot!(
            print_term_to_string(&Tm::loc(
                Provenance::Generated,
                Tm::remember_rc(0, Tm::var_rc("x"))
            )),
            @"x"
        );
    }

    #[test]
    fn test_print_case() {
        let just = Alt::new(
            Pattern::constructor("Just", vec![Pattern::Var]),
            Scope::from_body(bound(0, 0)),
        );
        let nothing = Alt::new(Pattern::Wildcard, Scope::from_body(Tm::var_rc("n")));
        assert_snapshot!(
            print_term_to_string(&Tm::case(Tm::var_rc("s"), vec![just, nothing])),
            @"case s of { (Just %0.0) → %0.0; _ → n }"
        );
    }

    #[test]
    fn test_print_let() {
        let rhs = Tm::app_rc(
            Tm::bound_rc(Index(0), Slot::Binding(0)),
            Tm::bound_rc(Index(0), Slot::Pattern { pattern: 0, var: 0 }),
        );
        let clause = Body::new(vec![Pattern::Var], Scope::from_body(rhs));
        let binding = Binding::explicit("Int", vec![clause]);
        let term = Tm::let_in(
            vec![binding],
            Scope::from_body(Tm::app_rc(bound(0, 0), Tm::var_rc("x"))),
        );
        assert_snapshot!(
            print_term_to_string(&term),
            @"let { %0.0 : Int; %0.0 %0.0.0 = %0.0 %0.0.0 } in %0.0 x"
        );
        assert_eq!(term.to_string(), print_term_to_string(&term));
    }

    #[test]
    fn test_print_elides_deep_nesting() {
        let mut shallow = Tm::var_rc("x");
        for _ in 0..10 {
            shallow = Tm::app_rc(Tm::var_rc("f"), shallow);
        }
        assert!(!print_term_to_string(&shallow).contains('…'));

        let mut deep = Tm::var_rc("x");
        for _ in 0..200_000 {
            deep = Tm::app_rc(Tm::var_rc("f"), deep);
        }
        let printed = print_term_to_string(&deep);
        assert!(printed.starts_with('f'));
        assert!(printed.contains('…'));
        assert!(!printed.contains('x'));
        assert_eq!(printed.matches('(').count(), printed.matches(')').count());
    }
}
