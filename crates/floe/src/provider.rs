use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::{Error, IdGenerator, Result};

/// A concurrent registry of named generators.
///
/// Generators are created lazily per name via
/// [`get_or_register_with`](Self::get_or_register_with) and live until
/// removed. Looking up a name that was never registered is an error rather
/// than a silent `None`, so misconfigured callers fail loudly.
#[derive(Default)]
pub struct IdGeneratorProvider {
    generators: RwLock<HashMap<String, Arc<dyn IdGenerator>>>,
}

impl IdGeneratorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `generator` under its own name, returning any generator it
    /// displaced.
    pub fn register(&self, generator: Arc<dyn IdGenerator>) -> Option<Arc<dyn IdGenerator>> {
        let name = generator.name().to_owned();
        info!(%name, kind = %generator.kind(), "registering id generator");
        self.generators.write().insert(name, generator)
    }

    /// Looks up the generator registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Uninitialized`] if no generator was registered under
    /// that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn IdGenerator>> {
        self.generators
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Uninitialized {
                name: name.to_owned(),
            })
    }

    /// Returns the generator registered under `name`, creating and
    /// registering it with `create` on first use.
    ///
    /// Creation runs under the registry's write lock, so concurrent callers
    /// asking for the same name observe exactly one creation.
    pub fn get_or_register_with(
        &self,
        name: &str,
        create: impl FnOnce() -> Result<Arc<dyn IdGenerator>>,
    ) -> Result<Arc<dyn IdGenerator>> {
        if let Some(generator) = self.generators.read().get(name) {
            return Ok(Arc::clone(generator));
        }
        let mut generators = self.generators.write();
        if let Some(generator) = generators.get(name) {
            return Ok(Arc::clone(generator));
        }
        let generator = create()?;
        info!(%name, kind = %generator.kind(), "registering id generator");
        generators.insert(name.to_owned(), Arc::clone(&generator));
        Ok(generator)
    }

    /// Removes and returns the generator registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn IdGenerator>> {
        self.generators.write().remove(name)
    }

    /// The names currently registered.
    pub fn names(&self) -> Vec<String> {
        self.generators.read().keys().cloned().collect()
    }
}
