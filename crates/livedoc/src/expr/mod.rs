//! Attribute expressions and text macros.

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{BinaryOp, Expr, PathSegment, RefPath, Reference, UnaryOp};
pub use eval::evaluate;
pub use parser::{ParseFailure, TemplatePart, parse_expression, parse_reference, parse_template};
