//! Error types shared across the pipeline.
//!
//! Anything that can go wrong while running a program funnels into
//! [`LoxError`], which keeps one `Result<T>` alias usable end to end and
//! lets the binary hand leftovers to `anyhow`.  Only the stages that
//! unwind on failure carry an error value: the scanner yields `Lex` items
//! from its iterator, the parser throws `Parse` to reach its
//! synchronization point, and the evaluator propagates `Runtime` up to
//! the driver.  Resolver diagnostics never unwind anything, so they go
//! straight to the [`ErrorReporter`] and no variant exists for them.
//!
//! Formatting and printing diagnostics is the reporter's job; it also
//! owns the per-run flags the driver checks between stages.

use std::io;

use log::debug;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// The scanner hit a malformed lexeme on `line`.
    #[error("[line {line}] Error : {message}")]
    Lex { message: String, line: usize },

    /// The parser rejected the token stream; used to unwind to the
    /// nearest synchronization point.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Evaluation failed, attributed to the offending token's line.
    #[error("{message}\n [Line {line}]")]
    Runtime { message: String, line: usize },

    /// A control-flow signal escaped its construct.  Indicates a bug in
    /// the resolver or parser, not in the user's program.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Scanner error at `line`.
    pub fn lex(line: usize, message: impl Into<String>) -> Self {
        let message: String = message.into();

        debug!("lex error at line {}: {}", line, message);

        LoxError::Lex { message, line }
    }

    /// Parser error at `line`.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        let message: String = message.into();

        debug!("parse error at line {}: {}", line, message);

        LoxError::Parse { message, line }
    }

    /// Evaluation error at `line`.
    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        let message: String = message.into();

        debug!("runtime error at line {}: {}", line, message);

        LoxError::Runtime { message, line }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Collects and prints diagnostics for one interpreter run.
///
/// The reporter is threaded through the scanner/parser/resolver stages in
/// place of global error flags: each stage reports into it, and the driver
/// inspects [`had_error`](ErrorReporter::had_error) between stages to
/// decide whether to continue.  Formatted diagnostics are retained so
/// embedders and tests can inspect them after the fact.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    had_error: bool,
    had_runtime_error: bool,
    diagnostics: Vec<String>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an error with no token context (scanner errors).
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Report an error at a specific token (parser and resolver errors).
    pub fn error_at(&mut self, token: &Token, message: &str) {
        if token.token_type == TokenType::EOF {
            self.report(token.line, "at end", message);
        } else {
            self.report(token.line, &format!("at '{}'", token.lexeme), message);
        }
    }

    /// Report a scanner error carried as a [`LoxError::Lex`] value.
    pub fn scan_error(&mut self, error: &LoxError) {
        match error {
            LoxError::Lex { message, line } => self.error(*line, message),

            other => {
                let text: String = other.to_string();
                eprintln!("\n{}", text);
                self.diagnostics.push(text);
                self.had_error = true;
            }
        }
    }

    /// Report a runtime error in the `MESSAGE\n [Line N]` form.
    pub fn runtime_error(&mut self, error: &LoxError) {
        let text: String = error.to_string();

        eprintln!("\n{}", text);

        self.diagnostics.push(text);
        self.had_runtime_error = true;
    }

    fn report(&mut self, line: usize, location: &str, message: &str) {
        let text: String = format!("[line {}] Error {}: {}", line, location, message);

        eprintln!("\n{}", text);

        self.diagnostics.push(text);
        self.had_error = true;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Formatted diagnostics recorded since the last reset.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Clear flags and recorded diagnostics between REPL lines so one bad
    /// line does not poison the next.
    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
        self.diagnostics.clear();
    }
}
