pub mod binding;
pub mod hard;
pub mod kind;
pub mod pattern;
pub mod print;
pub mod scope;
pub mod term;
pub mod ty;

pub use binding::*;
pub use hard::*;
pub use kind::*;
pub use pattern::*;
pub use print::{dump_term, print_term_to_string};
pub use scope::*;
pub use term::*;
pub use ty::*;
