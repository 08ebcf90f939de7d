//! DSL compiler — source text → tokens → AST → sorted event stream.

pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod swing;
pub mod token;

pub use ast::*;
pub use compile::{CompiledSong, DEFAULT_VELOCITY};
pub use error::{CompileError, ErrorKind};
pub use swing::apply_swing;

use compile::compile_program;
use lexer::Lexer;
use parser::Parser;

/// The DSL compiler facade.
///
/// Runs source text through lexer → parser → compiler. All stages abort at
/// the first error, which carries a 1-based line and column.
pub struct Compiler;

impl Compiler {
    /// Parse DSL source into a [`Program`] AST.
    pub fn parse(source: &str) -> Result<Program, CompileError> {
        let tokens = Lexer::new(source).tokenize()?;
        Parser::new(tokens).parse()
    }

    /// Parse and compile DSL source into a [`CompiledSong`].
    pub fn compile(source: &str) -> Result<CompiledSong, CompileError> {
        let program = Self::parse(source)?;
        compile_program(&program)
    }
}
