use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::task::{TaskBody, TaskError, TaskFn};
use crate::unit::Invocation;

/// Named task functions an execution unit can reconstruct bodies from.
pub struct FunctionRegistry {
    functions: HashMap<String, TaskFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function. Returns error if name already registered.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&mut Invocation) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.functions.insert(name, Arc::new(f));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<TaskFn> {
        self.functions.get(name).cloned()
    }

    /// Turn a body into something callable.
    pub fn resolve(&self, body: &TaskBody) -> Result<TaskFn, TaskError> {
        match body {
            TaskBody::Function(f) => Ok(Arc::clone(f)),
            TaskBody::Named(name) => self
                .get(name)
                .ok_or_else(|| TaskError::UnknownFunction(name.clone())),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Function with name '{0}' is already registered")]
    DuplicateName(String),
}
