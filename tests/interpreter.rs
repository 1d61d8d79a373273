#[cfg(test)]
mod interpreter_tests {
    use loxide::lox::Lox;

    struct Outcome {
        stdout: String,
        diagnostics: Vec<String>,
        had_error: bool,
        had_runtime_error: bool,
    }

    fn run_program(source: &str) -> Outcome {
        let mut raw_output: Vec<u8> = Vec::new();

        let mut lox = Lox::new(&mut raw_output);
        lox.run(source);

        let diagnostics: Vec<String> = lox.diagnostics().to_vec();
        let had_error: bool = lox.had_error();
        let had_runtime_error: bool = lox.had_runtime_error();

        drop(lox);

        Outcome {
            stdout: String::from_utf8(raw_output).expect("output is not UTF-8"),
            diagnostics,
            had_error,
            had_runtime_error,
        }
    }

    fn expect_output(source: &str, expected: &str) {
        let outcome: Outcome = run_program(source);

        assert!(
            !outcome.had_error && !outcome.had_runtime_error,
            "unexpected error for {:?}: {:?}",
            source,
            outcome.diagnostics
        );
        assert_eq!(outcome.stdout, expected);
    }

    fn expect_runtime_error(source: &str, message: &str) {
        let outcome: Outcome = run_program(source);

        assert!(
            outcome.had_runtime_error,
            "expected a runtime error for {:?}",
            source
        );
        assert!(
            outcome.diagnostics.iter().any(|d| d.contains(message)),
            "expected {:?} in {:?}",
            message,
            outcome.diagnostics
        );
    }

    // ── arithmetic, logic, printing ──────────────────────────────────

    #[test]
    fn arithmetic_precedence() {
        expect_output("print 1 + 2 * 3;", "7\n");
    }

    #[test]
    fn whole_numbers_print_without_decimal_point() {
        expect_output("print 4 / 2;", "2\n");
        expect_output("print 2.5;", "2.5\n");
        expect_output("print -0.5 * 2;", "-1\n");
    }

    #[test]
    fn string_concatenation_stringifies_either_side() {
        expect_output("print \"a\" + 1;", "a1\n");
        expect_output("print 1 + \"a\";", "1a\n");
        expect_output("print \"a\" + \"b\";", "ab\n");
    }

    #[test]
    fn logical_operators_short_circuit_to_operand_values() {
        expect_output("print \"hi\" or 2;", "hi\n");
        expect_output("print nil or \"yes\";", "yes\n");
        expect_output("print nil and 1;", "nil\n");
        expect_output("print 1 and 2;", "2\n");
    }

    #[test]
    fn zero_and_empty_string_are_truthy() {
        expect_output("print !0;", "false\n");
        expect_output("print !\"\";", "false\n");
        expect_output("print !nil;", "true\n");
        expect_output("print !false;", "true\n");
    }

    #[test]
    fn equality_follows_value_rules() {
        expect_output("print nil == nil;", "true\n");
        expect_output("print 1 == \"1\";", "false\n");
        expect_output("print \"x\" == \"x\";", "true\n");
        expect_output("print 1 != 2;", "true\n");
    }

    #[test]
    fn ternary_returns_the_selected_branch_unrestricted() {
        expect_output("print true ? false : 1;", "false\n");
        expect_output("print false ? 1 : nil;", "nil\n");
        expect_output("print 1 < 2 ? \"yes\" : \"no\";", "yes\n");
    }

    #[test]
    fn comma_operator_yields_the_right_operand() {
        expect_output("print (1, 2);", "2\n");
        expect_output("var a = 0; print (a = 5, a + 1);", "6\n");
    }

    // ── variables, scope, closures ───────────────────────────────────

    #[test]
    fn closures_see_mutations_to_captured_variables() {
        expect_output(
            "var x = \"global\";\n\
             fun outer() {\n\
               var x = \"outer\";\n\
               fun inner() { print x; }\n\
               inner();\n\
               x = \"changed\";\n\
               inner();\n\
             }\n\
             outer();",
            "outer\nchanged\n",
        );
    }

    #[test]
    fn closures_keep_their_frame_after_the_scope_exits() {
        expect_output(
            "fun makeCounter() {\n\
               var n = 0;\n\
               fun count() { n = n + 1; return n; }\n\
               return count;\n\
             }\n\
             var counter = makeCounter();\n\
             print counter();\n\
             print counter();",
            "1\n2\n",
        );
    }

    #[test]
    fn resolved_references_ignore_later_shadowing() {
        expect_output(
            "var a = \"global\";\n\
             {\n\
               fun show() { print a; }\n\
               show();\n\
               var a = \"block\";\n\
               show();\n\
             }",
            "global\nglobal\n",
        );
    }

    #[test]
    fn assignment_is_an_expression() {
        expect_output("var a = 1; print a = 2;", "2\n");
    }

    // ── control flow ─────────────────────────────────────────────────

    #[test]
    fn break_and_continue_inside_while() {
        expect_output(
            "var i = 0;\n\
             while (true) {\n\
               i = i + 1;\n\
               if (i == 3) continue;\n\
               if (i == 5) break;\n\
               print i;\n\
             }",
            "1\n2\n4\n",
        );
    }

    #[test]
    fn continue_in_a_for_loop_still_increments() {
        expect_output(
            "for (var i = 0; i < 5; i = i + 1) {\n\
               if (i == 2) continue;\n\
               print i;\n\
             }",
            "0\n1\n3\n4\n",
        );
    }

    #[test]
    fn break_exits_a_for_loop() {
        expect_output(
            "for (var i = 0;; i = i + 1) {\n\
               if (i == 3) break;\n\
               print i;\n\
             }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn return_unwinds_out_of_a_loop() {
        expect_output(
            "fun first() {\n\
               var i = 0;\n\
               while (true) {\n\
                 i = i + 1;\n\
                 if (i == 3) return i;\n\
               }\n\
             }\n\
             print first();",
            "3\n",
        );
    }

    #[test]
    fn recursion() {
        expect_output(
            "fun fib(n) {\n\
               if (n < 2) return n;\n\
               return fib(n - 1) + fib(n - 2);\n\
             }\n\
             print fib(10);",
            "55\n",
        );
    }

    // ── classes ──────────────────────────────────────────────────────

    #[test]
    fn init_and_method_calls() {
        expect_output(
            "class Counter {\n\
               init(start) { this.n = start; }\n\
               bump() { this.n = this.n + 1; return this.n; }\n\
             }\n\
             var c = Counter(10);\n\
             print c.bump();\n\
             print c.bump();",
            "11\n12\n",
        );
    }

    #[test]
    fn fields_shadow_methods_and_set_always_writes_fields() {
        expect_output(
            "class P {}\n\
             var p = P();\n\
             p.x = 3;\n\
             print p.x;\n\
             p.x = p.x + 1;\n\
             print p.x;",
            "3\n4\n",
        );
    }

    #[test]
    fn calling_a_class_without_init_takes_no_arguments() {
        expect_output("class A {} print A();", "A instance\n");
    }

    #[test]
    fn initializer_returns_the_instance_even_when_recalled() {
        expect_output(
            "class Foo {\n\
               init() { this.n = 0; return; }\n\
             }\n\
             var foo = Foo();\n\
             print foo.init();",
            "Foo instance\n",
        );
    }

    #[test]
    fn methods_bound_to_an_instance_remember_this() {
        expect_output(
            "class Greeter {\n\
               init(name) { this.name = name; }\n\
               greet() { print \"hi \" + this.name; }\n\
             }\n\
             var m = Greeter(\"ada\").greet;\n\
             m();",
            "hi ada\n",
        );
    }

    #[test]
    fn methods_are_inherited_through_the_superclass_chain() {
        expect_output(
            "class A { hi() { print \"hi\"; } }\n\
             class B < A {}\n\
             B().hi();",
            "hi\n",
        );
    }

    #[test]
    fn super_calls_the_superclass_method() {
        expect_output(
            "class A { method() { print \"A method\"; } }\n\
             class B < A {\n\
               method() { print \"B method\"; }\n\
               test() { super.method(); }\n\
             }\n\
             B().test();",
            "A method\n",
        );
    }

    #[test]
    fn init_is_inherited() {
        expect_output(
            "class A { init(n) { this.n = n; } }\n\
             class B < A {}\n\
             var b = B(5);\n\
             print b.n;",
            "5\n",
        );
    }

    #[test]
    fn class_methods_are_called_on_the_class_value() {
        expect_output(
            "class Math {\n\
               class square(n) { return n * n; }\n\
             }\n\
             print Math.square(3);",
            "9\n",
        );
    }

    #[test]
    fn class_methods_are_inherited() {
        expect_output(
            "class A { class make() { return \"made\"; } }\n\
             class B < A {}\n\
             print B.make();",
            "made\n",
        );
    }

    // ── stringification ──────────────────────────────────────────────

    #[test]
    fn callables_stringify_by_kind() {
        expect_output("fun f() {} print f;", "<fn f>\n");
        expect_output("class C {} print C;", "C\n");
        expect_output("print clock;", "<native fn>\n");
    }

    #[test]
    fn clock_returns_a_number() {
        expect_output("print clock() > 0;", "true\n");
    }

    // ── runtime errors ───────────────────────────────────────────────

    #[test]
    fn type_error_reports_message_and_line() {
        let outcome: Outcome = run_program("print \"a\" - 1;");

        assert!(outcome.had_runtime_error);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.contains("Operands must be numbers.")));
        assert!(outcome.diagnostics.iter().any(|d| d.contains("[Line 1]")));
        assert!(outcome.stdout.is_empty());
    }

    #[test]
    fn runtime_error_aborts_the_rest_of_the_program() {
        let outcome: Outcome = run_program("print 1;\nprint -\"a\";\nprint 3;");

        assert!(outcome.had_runtime_error);
        assert_eq!(outcome.stdout, "1\n");
    }

    #[test]
    fn unary_minus_requires_a_number() {
        expect_runtime_error("print -\"a\";", "Operand must be a number.");
    }

    #[test]
    fn plus_rejects_mixed_non_string_operands() {
        expect_runtime_error(
            "print true + 1;",
            "Operands must be two numbers or a combination of numbers and strings.",
        );
    }

    #[test]
    fn division_by_zero() {
        expect_runtime_error("print 1 / 0;", "Division by zero.");
    }

    #[test]
    fn undefined_variable() {
        expect_runtime_error("print missing;", "Undefined variable 'missing'.");
    }

    #[test]
    fn assigning_an_undefined_variable() {
        expect_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    }

    #[test]
    fn calling_a_non_callable() {
        expect_runtime_error("\"x\"();", "Can only call functions and classes.");
    }

    #[test]
    fn arity_mismatch() {
        expect_runtime_error("fun f(a) {} f(1, 2);", "Expected 1 arguments, but got 2.");
    }

    #[test]
    fn native_arity_is_checked_too() {
        expect_runtime_error("clock(1);", "Expected 0 arguments, but got 1.");
    }

    #[test]
    fn property_access_on_a_non_instance() {
        expect_runtime_error("print 4.x;", "Only instances have properties.");
    }

    #[test]
    fn setting_a_field_on_a_non_instance() {
        expect_runtime_error("4.x = 1;", "Only instances have fields.");
    }

    #[test]
    fn undefined_property() {
        expect_runtime_error("class P {} print P().missing;", "Undefined property 'missing'.");
    }

    #[test]
    fn superclass_must_be_a_class() {
        expect_runtime_error(
            "var NotAClass = 1; class B < NotAClass {}",
            "Superclass must be a class.",
        );
    }
}
