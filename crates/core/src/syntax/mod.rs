//! Lexer and parser for the restricted descriptor language

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, Stmt, StmtKind};
pub use parser::parse_module;
