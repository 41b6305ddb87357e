//! Ordered registry of overlay processor factories.

use std::sync::Arc;

use super::pipeline::ProcessorPipeline;
use super::trait_def::OutlineProcessor;

/// Builds a fresh, unloaded processor.
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn OutlineProcessor> + Send + Sync>;

/// The processors a facade runs, in order.
///
/// Order matters: when two processors write the same field for the same key,
/// the later one wins. The registry is passed to the facade explicitly; there
/// is no process-wide list.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    entries: Vec<(String, ProcessorFactory)>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, appended after the existing ones.
    ///
    /// Registering an existing name replaces its factory in place (keeping its
    /// position) and returns the previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Option<ProcessorFactory>
    where
        F: Fn() -> Box<dyn OutlineProcessor> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: ProcessorFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, factory)),
            None => {
                self.entries.push((name, factory));
                None
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn OutlineProcessor> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Names of the registered processors, in run order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build one fresh processor per entry, for a single request.
    pub fn instantiate(&self) -> ProcessorPipeline {
        let mut pipeline = ProcessorPipeline::new();
        for (name, factory) in &self.entries {
            pipeline.push(name.clone(), factory());
        }
        pipeline
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}
