//! Java host for the callweave engine: project enumeration, version tokens
//! and tree-sitter based call extraction

pub mod analyzer;
pub mod parser_pool;
pub mod project;
pub mod syntax;

#[cfg(test)]
pub mod test_utils;


pub use analyzer::JavaAnalyzer;
pub use parser_pool::{ParseRequest, ParseResult, ParserPool, create_parser_pool};
pub use project::{JavaProject, ProjectError, is_java_path, is_test_unit};
