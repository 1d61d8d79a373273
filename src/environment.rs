use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One scope frame: a name→value map plus an optional parent frame.
///
/// Frames are shared (`Rc`) because closures retain the frame that was
/// current at their declaration even after the owning block exits, and
/// mutated through `RefCell` because assignment writes into frames that
/// other handles can still read.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Create or overwrite a binding in this frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Read a binding, walking the parent chain.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// Write to an existing binding, walking the parent chain.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// Read from the frame exactly `distance` parents up, without
    /// searching the chain.  Callers pass distances computed by the
    /// resolver.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        let target: Rc<RefCell<Environment>> = Self::ancestor(env, distance);

        let result: Option<Value> = target.borrow().values.get(name).cloned();

        result.ok_or_else(|| undefined_variable(name, line))
    }

    /// Write to the frame exactly `distance` parents up.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let target: Rc<RefCell<Environment>> = Self::ancestor(env, distance);

        let mut target = target.borrow_mut();

        if target.values.contains_key(name) {
            target.values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(undefined_variable(name, line))
        }
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let next: Rc<RefCell<Environment>> = current
                .borrow()
                .enclosing
                .as_ref()
                .map(Rc::clone)
                .unwrap_or_else(|| Rc::clone(&current));
            current = next;
        }

        current
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn undefined_variable(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}
