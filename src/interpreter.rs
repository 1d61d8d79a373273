use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};

/// How a statement finished.
///
/// `return`, `break` and `continue` are not errors: they travel up the
/// evaluator as ordinary values until the construct that handles them
/// unwinds them (the function call for `Return`, the enclosing `while`
/// for the other two).
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Tree-walking evaluator over a resolved statement list.
///
/// Program output goes through the `W` sink so embedders and tests can
/// capture it; the CLI passes stdout.
pub struct Interpreter<'a, W: Write> {
    output: &'a mut W,
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
}

impl<'a, W: Write> Interpreter<'a, W> {
    pub fn new(output: &'a mut W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );

        info!("Interpreter initialized with native 'clock'");

        Interpreter {
            output,
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Record a resolved scope distance for a variable-referencing node.
    /// Called by the resolver; nodes without an entry resolve against
    /// globals.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Execute a top-level statement list.  A control-flow signal
    /// reaching this level means the parser or resolver let one through
    /// a construct that should have stopped it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}

                flow => {
                    return Err(LoxError::Internal(format!(
                        "control-flow signal {:?} escaped to top level",
                        flow
                    )))
                }
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Flow::Break => return Ok(Flow::Normal),

                        Flow::Normal | Flow::Continue => {}

                        returning @ Flow::Return(_) => return Ok(returning),
                    }

                    // Desugared `for` increment; runs even when the body
                    // ended in `continue`.
                    if let Some(increment) = increment {
                        self.evaluate(increment)?;
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break => Ok(Flow::Break),

            Stmt::Continue => Ok(Flow::Continue),

            Stmt::Function(declaration) => {
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, class_methods),
        }
    }

    /// Run `statements` with `environment` as the current frame,
    /// restoring the previous frame on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        self.environment = environment;

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for statement in statements {
            match self.execute(statement) {
                Ok(Flow::Normal) => {}

                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        class_methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        // Two-phase definition so methods can refer to the class by name.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    return Err(LoxError::runtime(
                        name.line,
                        "Superclass must be a class.",
                    ))
                }
            },

            None => None,
        };

        // Class methods close over the declaration environment; instance
        // methods additionally see `super` when there is a superclass.
        let mut statics: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        for declaration in class_methods {
            let function =
                LoxFunction::new(Rc::clone(declaration), Rc::clone(&self.environment), false);
            statics.insert(declaration.name.lexeme.clone(), Rc::new(function));
        }

        let method_closure: Rc<RefCell<Environment>> = match &superclass {
            Some(class) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                environment
                    .borrow_mut()
                    .define("super", Value::Class(Rc::clone(class)));

                environment
            }

            None => Rc::clone(&self.environment),
        };

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        for declaration in methods {
            let is_initializer: bool = declaration.name.lexeme == "init";

            let function = LoxFunction::new(
                Rc::clone(declaration),
                Rc::clone(&method_closure),
                is_initializer,
            );

            method_map.insert(declaration.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass, method_map, statics);

        debug!("Defined class '{}'", name.lexeme);

        self.environment.borrow_mut().assign(
            &name.lexeme,
            Value::Class(Rc::new(class)),
            name.line,
        )?;

        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(Rc::clone(s)),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                if operator.token_type == TokenType::OR {
                    if is_truthy(&left_val) {
                        return Ok(left_val);
                    }
                } else if !is_truthy(&left_val) {
                    return Ok(left_val);
                }

                self.evaluate(right)
            }

            // The selected branch's value is returned as-is, whatever its
            // type.
            Expr::Ternary {
                test,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(test)?) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => self.globals.borrow_mut().assign(
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),

                Value::Class(class) => match class.find_class_method(&name.lexeme) {
                    Some(method) => Ok(Value::Function(method)),

                    None => Err(LoxError::runtime(
                        name.line,
                        format!("Undefined property '{}'.", name.lexeme),
                    )),
                },

                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value = self.evaluate(value)?;
                    instance.set(name, value.clone());
                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, &name.lexeme, name.line)
            }

            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::Internal(format!(
                "invalid unary operator '{}'",
                operator.lexeme
            ))),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;

        // The comma operator evaluates both sides for effect and yields
        // the right-hand value.
        if operator.token_type == TokenType::COMMA {
            return self.evaluate(right);
        }

        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                _ if matches!(left_val, Value::String(_))
                    || matches!(right_val, Value::String(_)) =>
                {
                    Ok(Value::String(Rc::from(
                        format!("{}{}", left_val, right_val).as_str(),
                    )))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or a combination of numbers and strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;

                if b == 0.0 {
                    Err(LoxError::runtime(operator.line, "Division by zero."))
                } else {
                    Ok(Value::Number(a / b))
                }
            }

            TokenType::GREATER => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = check_number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::Internal(format!(
                "invalid binary operator '{}'",
                operator.lexeme
            ))),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee_val: Value = self.evaluate(callee)?;

        let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match callee_val {
            Value::Function(function) => {
                check_arity(function.arity(), args.len(), paren)?;
                function.call(self, args)
            }

            Value::Class(class) => {
                check_arity(class.arity(), args.len(), paren)?;
                LoxClass::call(&class, self, args)
            }

            Value::NativeFunction { arity, func, .. } => {
                check_arity(arity, args.len(), paren)?;
                func(&args)
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = *self.locals.get(&id).ok_or_else(|| {
            LoxError::Internal("'super' expression missing a resolved distance".to_string())
        })?;

        let superclass: Value =
            Environment::get_at(&self.environment, distance, "super", keyword.line)?;

        // `this` always sits one frame inside the one holding `super`.
        let object: Value =
            Environment::get_at(&self.environment, distance - 1, "this", keyword.line)?;

        let (Value::Class(superclass), Value::Instance(instance)) = (superclass, object) else {
            return Err(LoxError::Internal(
                "'super' resolved to a non-class binding".to_string(),
            ));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),

            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }
}

/// Only `nil` and `false` are falsey.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn check_number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

        _ => Err(LoxError::runtime(
            operator.line,
            "Operands must be numbers.",
        )),
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<()> {
    if expected == got {
        return Ok(());
    }

    Err(LoxError::runtime(
        paren.line,
        format!("Expected {} arguments, but got {}.", expected, got),
    ))
}

fn clock_native(_args: &[Value]) -> Result<Value> {
    let millis: u128 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::Internal(format!("system clock error: {}", e)))?
        .as_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}
