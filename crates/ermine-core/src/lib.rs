//! The term language of the Ermine front end, and the machinery for rewriting
//! its variables.

pub mod check;
pub mod common;
pub mod subst;
pub mod syn;
pub mod traverse;

pub use check::ScopeError;
