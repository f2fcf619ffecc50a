pub mod builder;
pub mod compiler;
pub mod document;
pub mod lexer;
pub mod parser;
pub mod repository;
pub mod traversal;
pub mod validator;
