//! AST types and recursive-descent parser for the tsr compiler.
//!
//! The AST is arena-allocated: nodes live in typed vectors inside
//! [`ast::Arena`] and reference each other through integer-id handles
//! (`ExprId`, `StmtId`, `TypeNodeId`, ...). The tree is immutable after
//! parse; back-references are ids, never ownership edges.

pub mod ast;
pub mod parser;
pub mod printer;

pub use ast::{
    Arena, ClassId, ExprId, FuncId, InterfaceId, SourceModule, StmtId, TypeNodeId,
};
pub use parser::{Parser, parse_module};
