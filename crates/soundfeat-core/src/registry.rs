//! Transform Registry for Dynamic Transform Creation
//!
//! Maps transform names to constructors so pipelines can be described with
//! strings (feature chains, config files) instead of concrete types. The
//! registry is filled once at startup and then passed by reference to every
//! pipeline builder.

use crate::format::BufferFormat;
use crate::parameter::{ParameterSpec, TransformParams};
use crate::transform::{
    BatchKernel, ElementKernel, Execute, Kernel, PerBatch, PerElement, Stage, Transform,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Function that constructs a transform from parameters
pub type TransformConstructor =
    Arc<dyn Fn(&TransformParams) -> Result<Box<dyn Transform>> + Send + Sync>;

/// Static description of a registered transform.
#[derive(Debug, Clone)]
pub struct TransformInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input: String,
    pub output: String,
    pub parallel: bool,
    pub parameters: &'static [ParameterSpec],
}

impl fmt::Display for TransformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  {}", self.description)?;
        writeln!(f, "  {} -> {}", self.input, self.output)?;
        if self.parallel {
            writeln!(f, "  parallel")?;
        }
        for parameter in self.parameters {
            writeln!(
                f,
                "  {} = {}: {}",
                parameter.name, parameter.default, parameter.description
            )?;
        }
        Ok(())
    }
}

struct Entry {
    info: TransformInfo,
    constructor: TransformConstructor,
}

/// Registry of transform constructors
#[derive(Default)]
pub struct TransformRegistry {
    entries: HashMap<String, Entry>,
}

impl TransformRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel under its `NAME` with execution mode `E`.
    ///
    /// Parameters are applied in name order, so cross-parameter checks belong
    /// in [`Kernel::on_input_format_changed`].
    pub fn register<K, E>(&mut self)
    where
        K: Kernel + Default,
        E: Execute<K>,
    {
        let info = TransformInfo {
            name: K::NAME,
            description: K::DESCRIPTION,
            input: K::Input::default().id().to_string(),
            output: K::Output::default().id().to_string(),
            parallel: K::PARALLEL,
            parameters: K::parameters(),
        };
        let constructor: TransformConstructor = Arc::new(|params: &TransformParams| -> Result<Box<dyn Transform>> {
            let mut stage = Stage::<K, E>::new(K::default());
            let mut names: Vec<&String> = params.keys().collect();
            names.sort();
            for name in names {
                stage.set_parameter(name, &params[name])?;
            }
            Ok(Box::new(stage))
        });

        if self.entries.contains_key(K::NAME) {
            tracing::warn!(transform = K::NAME, "Replacing registered transform");
        }
        self.entries
            .insert(K::NAME.to_string(), Entry { info, constructor });
    }

    /// Register an element-wise kernel.
    pub fn register_element<K: ElementKernel + Default>(&mut self) {
        self.register::<K, PerElement>();
    }

    /// Register a whole-batch kernel.
    pub fn register_batch<K: BatchKernel + Default>(&mut self) {
        self.register::<K, PerBatch>();
    }

    /// Create a transform from registered name and parameters
    ///
    /// # Example
    /// ```ignore
    /// let window = registry.create("Window", &params! { "length" => 512 })?;
    /// ```
    pub fn create(&self, name: &str, params: &TransformParams) -> Result<Box<dyn Transform>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownTransform(name.to_string()))?;
        (entry.constructor)(params)
    }

    /// List all registered transform names, sorted.
    pub fn list_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a type is registered
    pub fn has_type(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn describe(&self, name: &str) -> Result<&TransformInfo> {
        self.entries
            .get(name)
            .map(|entry| &entry.info)
            .ok_or_else(|| Error::UnknownTransform(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}
