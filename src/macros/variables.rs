//! Caller-supplied variables
//!
//! Variables passed to `run` or `run_all` are pushed onto a
//! [`VariableScope`] that travels with the evaluation, so macros invoked
//! from other macros see them too. Newer frames shadow older ones.

use std::collections::HashMap;

use serde_json::Value;

/// A source of named values
pub trait Variables {
    /// The value of `name`, if defined
    fn get(&self, name: &str) -> Option<Value>;

    fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// [`Variables`] held in a map
#[derive(Debug, Clone, Default)]
pub struct MapVariables {
    values: HashMap<String, Value>,
}

impl MapVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }
}

impl Variables for MapVariables {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}

impl Variables for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }
}

/// Stack of variable frames for one top-level call
#[derive(Default)]
pub struct VariableScope<'a> {
    frames: Vec<&'a dyn Variables>,
}

impl<'a> VariableScope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope with a single frame
    pub fn with(variables: &'a dyn Variables) -> Self {
        Self {
            frames: vec![variables],
        }
    }

    pub fn push(&mut self, variables: &'a dyn Variables) {
        self.frames.push(variables);
    }

    pub fn pop(&mut self) -> Option<&'a dyn Variables> {
        self.frames.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Look `name` up, newest frame first
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}
