#[cfg(test)]
mod parser_tests {
    use loxide as lox;

    use lox::ast_printer::AstPrinter;
    use lox::error::ErrorReporter;
    use lox::parser::Parser;
    use lox::scanner::Scanner;
    use lox::stmt::Stmt;
    use lox::token::Token;

    fn parse_source(source: &str) -> (Vec<Stmt>, ErrorReporter) {
        let mut reporter = ErrorReporter::new();

        let mut tokens: Vec<Token> = Vec::new();
        for result in Scanner::new(source) {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => reporter.scan_error(&error),
            }
        }

        let mut parser = Parser::new(tokens, 0, &mut reporter);
        let statements = parser.parse();

        (statements, reporter)
    }

    fn printed(source: &str) -> String {
        let (statements, reporter) = parse_source(source);

        assert!(
            !reporter.had_error(),
            "unexpected parse error: {:?}",
            reporter.diagnostics()
        );

        match &statements[0] {
            Stmt::Expression(expr) | Stmt::Print(expr) => AstPrinter::print(expr),
            other => panic!("expected an expression statement, got {:?}", other),
        }
    }

    fn diagnostics_contain(reporter: &ErrorReporter, needle: &str) -> bool {
        reporter.diagnostics().iter().any(|d| d.contains(needle))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(printed("1 + 2 * 3;"), "(+ 1.0 (* 2.0 3.0))");
    }

    #[test]
    fn grouping_overrides_precedence() {
        assert_eq!(printed("(1 + 2) * 3;"), "(* (group (+ 1.0 2.0)) 3.0)");
    }

    #[test]
    fn unary_is_right_associative() {
        assert_eq!(printed("!!true;"), "(! (! true))");
    }

    #[test]
    fn comparison_chains_left_associatively() {
        assert_eq!(printed("1 < 2 == true;"), "(== (< 1.0 2.0) true)");
    }

    #[test]
    fn ternary_selects_branches() {
        assert_eq!(printed("a ? b : c;"), "(?: a b c)");
    }

    #[test]
    fn comma_operator_sequences_expressions() {
        assert_eq!(printed("1, 2;"), "(, 1.0 2.0)");
    }

    #[test]
    fn assignment_nests_in_ternary_branches() {
        assert_eq!(printed("a = b = 1;"), "(= a (= b 1.0))");
    }

    #[test]
    fn property_access_and_calls_chain() {
        assert_eq!(printed("a.b(1).c;"), "(. (call (. a b) 1.0) c)");
    }

    #[test]
    fn stable_under_reprinting() {
        // Printing is a pure function of the tree: a tree printed twice
        // gives the same text, and distinct precedence levels never
        // collapse into the same rendering.
        let first: String = printed("1 + 2 * 3 - 4 / -5;");
        let second: String = printed("1 + 2 * 3 - 4 / -5;");

        assert_eq!(first, second);
        assert_ne!(printed("(1 + 2) * 3;"), printed("1 + 2 * 3;"));
    }

    #[test]
    fn invalid_assignment_target_is_reported_without_unwinding() {
        let (statements, reporter) = parse_source("1 = 2; print 3;");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(&reporter, "Invalid assignment target."));

        // The parser kept going: both statements are present.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn leading_binary_operator_reports_missing_operand() {
        let (_, reporter) = parse_source("* 3;");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(&reporter, "Missing left-hand operand."));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let (_, reporter) = parse_source("break;");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(
            &reporter,
            "Must be inside a loop to use 'break'."
        ));
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        let (_, reporter) = parse_source("continue;");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(
            &reporter,
            "Must be inside a loop to use 'continue'."
        ));
    }

    #[test]
    fn function_bodies_reset_loop_context() {
        // The function is lexically inside the loop, but its own body
        // contains no loop to break out of.
        let (_, reporter) = parse_source("while (true) { fun f() { break; } }");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(
            &reporter,
            "Must be inside a loop to use 'break'."
        ));
    }

    #[test]
    fn break_inside_loop_parses() {
        let (_, reporter) = parse_source("while (true) { break; }");

        assert!(!reporter.had_error());
    }

    #[test]
    fn for_desugars_into_block_and_while() {
        let (statements, reporter) =
            parse_source("for (var i = 0; i < 3; i = i + 1) print i;");

        assert!(!reporter.had_error());
        assert_eq!(statements.len(), 1);

        let Stmt::Block(inner) = &statements[0] else {
            panic!("expected the initializer block, got {:?}", statements[0]);
        };

        assert!(matches!(inner[0], Stmt::Var { .. }));
        assert!(matches!(
            inner[1],
            Stmt::While {
                increment: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn for_without_clauses_still_desugars() {
        let (statements, reporter) = parse_source("for (;;) break;");

        assert!(!reporter.had_error());
        assert!(matches!(
            statements[0],
            Stmt::While {
                increment: None,
                ..
            }
        ));
    }

    #[test]
    fn plain_while_carries_no_increment() {
        let (statements, reporter) = parse_source("while (true) break;");

        assert!(!reporter.had_error());
        assert!(matches!(
            statements[0],
            Stmt::While {
                increment: None,
                ..
            }
        ));
    }

    #[test]
    fn synchronization_recovers_at_statement_boundary() {
        let (statements, reporter) = parse_source("var = 1; print 2;");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(&reporter, "Expect variable name."));

        // The bad declaration is dropped, the next statement survives.
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }

    #[test]
    fn class_bodies_separate_instance_and_class_methods() {
        let (statements, reporter) = parse_source(
            "class Math { class square(n) { return n * n; } identity(n) { return n; } }",
        );

        assert!(!reporter.had_error());

        let Stmt::Class {
            methods,
            class_methods,
            superclass,
            ..
        } = &statements[0]
        else {
            panic!("expected a class declaration, got {:?}", statements[0]);
        };

        assert!(superclass.is_none());
        assert_eq!(methods.len(), 1);
        assert_eq!(class_methods.len(), 1);
        assert_eq!(methods[0].name.lexeme, "identity");
        assert_eq!(class_methods[0].name.lexeme, "square");
    }

    #[test]
    fn superclass_clause_parses() {
        let (statements, reporter) =
            parse_source("class B < A { test() { return super.test; } }");

        assert!(!reporter.had_error());
        assert!(matches!(
            statements[0],
            Stmt::Class {
                superclass: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn too_many_arguments_is_reported_but_parsing_continues() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source: String = format!("f({});", args.join(", "));

        let (statements, reporter) = parse_source(&source);

        assert!(reporter.had_error());
        assert!(diagnostics_contain(
            &reporter,
            "Can't have more than 255 arguments."
        ));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn eof_errors_point_at_end() {
        let (_, reporter) = parse_source("print 1");

        assert!(reporter.had_error());
        assert!(diagnostics_contain(&reporter, "at end"));
    }
}
