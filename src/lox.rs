//! API to control the interpreter.
//!
//! [`Lox`] owns the pipeline: it scans, parses, resolves and evaluates a
//! source string, reporting diagnostics through an [`ErrorReporter`] and
//! writing program output to the sink it was constructed with.  The
//! interpreter state persists across [`run`](Lox::run) calls, which is
//! what makes the REPL work: a function defined on one line is callable
//! on the next.

use std::io::Write;

use log::debug;

use crate::error::ErrorReporter;
use crate::expr::ExprId;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Tree-walk interpreter driver.
///
/// # Example
///
/// Run a source fragment and capture its output:
///
/// ```
/// use loxide::lox::Lox;
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut lox = Lox::new(&mut output);
///
/// lox.run("print 1 + 2;");
/// assert!(!lox.had_error());
///
/// drop(lox);
/// assert_eq!(output, b"3\n");
/// ```
pub struct Lox<'a, W: Write> {
    interpreter: Interpreter<'a, W>,
    reporter: ErrorReporter,
    next_expr_id: ExprId,
}

impl<'a, W: Write> Lox<'a, W> {
    pub fn new(output: &'a mut W) -> Self {
        Lox {
            interpreter: Interpreter::new(output),
            reporter: ErrorReporter::new(),
            next_expr_id: 0,
        }
    }

    /// Run one source string through the full pipeline.
    ///
    /// Any scan, parse or resolve error suppresses evaluation; a runtime
    /// error aborts the current statement list.  Either way the outcome
    /// is recorded on the reporter rather than returned, mirroring how
    /// the CLI decides its exit code after the fact.
    pub fn run(&mut self, source: &str) {
        let scanner: Scanner = Scanner::new(source);

        let mut tokens: Vec<Token> = Vec::new();
        for result in scanner {
            match result {
                Ok(token) => tokens.push(token),

                Err(error) => self.reporter.scan_error(&error),
            }
        }

        let mut parser: Parser = Parser::new(tokens, self.next_expr_id, &mut self.reporter);
        let statements = parser.parse();
        self.next_expr_id = parser.next_expr_id();

        if self.reporter.had_error() {
            debug!("Skipping resolution after syntax error(s)");
            return;
        }

        let mut resolver = Resolver::new(&mut self.interpreter, &mut self.reporter);
        resolver.resolve(&statements);

        if self.reporter.had_error() {
            debug!("Skipping evaluation after resolve error(s)");
            return;
        }

        if let Err(error) = self.interpreter.interpret(&statements) {
            self.reporter.runtime_error(&error);
        }
    }

    pub fn had_error(&self) -> bool {
        self.reporter.had_error()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.reporter.had_runtime_error()
    }

    /// Diagnostics recorded since the last [`reset`](Lox::reset).
    pub fn diagnostics(&self) -> &[String] {
        self.reporter.diagnostics()
    }

    /// Clear error state between REPL lines.
    pub fn reset(&mut self) {
        self.reporter.reset();
    }
}
