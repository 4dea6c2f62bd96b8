// Rule parsing and evaluation

pub mod eval;
pub mod parser;

pub use eval::eval;
pub use parser::{parse, Expr, Op};
