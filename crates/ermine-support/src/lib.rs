pub mod loc;

pub use loc::*;
