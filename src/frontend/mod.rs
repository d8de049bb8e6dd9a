//! 编译器前端

pub mod ast;
pub mod check;
pub mod lexer;
pub mod parser;
