use chronoml_core::{ChronoError, Result};
use rand::Rng;
use std::any::TypeId;
use std::collections::BTreeMap;
use tracing::debug;

use crate::params::{sample_space, Args, Params};
use crate::plugin::{AnyPlugin, Category, Estimator, PluginSpec, Transformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Transformer,
    Estimator,
}

/// Registration record of one plugin type.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    category: Category,
    name: &'static str,
    kind: PluginKind,
    type_id: TypeId,
    space: fn() -> Vec<Params>,
    constructor: fn(&Args) -> Result<AnyPlugin>,
}

impl PluginEntry {
    pub fn id(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    pub fn hyperparameter_space(&self) -> Vec<Params> {
        (self.space)()
    }

    /// Fresh, unfitted instance configured with `args`.
    pub fn build(&self, args: &Args) -> Result<AnyPlugin> {
        (self.constructor)(args)
    }
}

fn build_estimator<P>(args: &Args) -> Result<AnyPlugin>
where
    P: PluginSpec + Estimator + 'static,
{
    Ok(AnyPlugin::Estimator(Box::new(P::from_args(args)?)))
}

fn build_transformer<P>(args: &Args) -> Result<AnyPlugin>
where
    P: PluginSpec + Transformer + 'static,
{
    Ok(AnyPlugin::Transformer(Box::new(P::from_args(args)?)))
}

/// Map from `"<category>.<name>"` to constructible plugin types.
///
/// A registry is an ordinary value: build one, register types into it and
/// pass it to whoever resolves plugins by name.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entries: BTreeMap<String, PluginEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_estimator<P>(&mut self) -> Result<()>
    where
        P: PluginSpec + Estimator + 'static,
    {
        self.insert(PluginEntry {
            category: P::CATEGORY,
            name: P::NAME,
            kind: PluginKind::Estimator,
            type_id: TypeId::of::<P>(),
            space: <P as PluginSpec>::hyperparameter_space,
            constructor: build_estimator::<P>,
        })
    }

    pub fn register_transformer<P>(&mut self) -> Result<()>
    where
        P: PluginSpec + Transformer + 'static,
    {
        self.insert(PluginEntry {
            category: P::CATEGORY,
            name: P::NAME,
            kind: PluginKind::Transformer,
            type_id: TypeId::of::<P>(),
            space: <P as PluginSpec>::hyperparameter_space,
            constructor: build_transformer::<P>,
        })
    }

    fn insert(&mut self, entry: PluginEntry) -> Result<()> {
        let id = entry.id();
        if let Some(existing) = self.entries.get(&id) {
            if existing.type_id == entry.type_id {
                return Ok(());
            }
            return Err(ChronoError::Registration(id));
        }
        debug!(plugin = %id, "registered plugin");
        self.entries.insert(id, entry);
        Ok(())
    }

    pub fn entry(&self, id: &str) -> Result<&PluginEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| ChronoError::UnknownPlugin(id.to_string()))
    }

    /// A new instance of `id` configured with `args`.
    pub fn get(&self, id: &str, args: &Args) -> Result<AnyPlugin> {
        self.entry(id)?.build(args)
    }

    pub fn get_estimator(&self, id: &str, args: &Args) -> Result<Box<dyn Estimator>> {
        self.get(id, args)?.into_estimator()
    }

    pub fn get_transformer(&self, id: &str, args: &Args) -> Result<Box<dyn Transformer>> {
        self.get(id, args)?.into_transformer()
    }

    /// Every registered identifier, sorted.
    pub fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Short names registered under `category`, sorted.
    pub fn list_category(&self, category: Category) -> Vec<&'static str> {
        self.entries
            .values()
            .filter(|e| e.category == category)
            .map(|e| e.name)
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn hyperparameter_space(&self, id: &str) -> Result<Vec<Params>> {
        Ok(self.entry(id)?.hyperparameter_space())
    }

    pub fn sample_hyperparameters<R: Rng + ?Sized>(&self, id: &str, rng: &mut R) -> Result<Args> {
        Ok(sample_space(&self.hyperparameter_space(id)?, rng))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
