// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registry holding the set of discovered plugins.
//!
//! Discovery builds a complete new set off to the side and swaps it in only
//! when every manifest entry was constructed and initialized. Readers always
//! see either the previous set or the new one, never a partial set.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use postblend_core::{PlatformPlugin, PluginDescriptor, PluginInstance, PostblendError};
use tracing::{debug, info};

use crate::discovery;
use crate::factory::{PluginContext, PluginFactory};

/// An immutable snapshot of loaded plugins, in discovery order.
#[derive(Debug, Default)]
pub struct PluginSet {
    plugins: Vec<PluginInstance>,
    index: HashMap<String, usize>,
}

impl PluginSet {
    /// Build a set, rejecting duplicate ids.
    ///
    /// Ids that differ only in ASCII case count as duplicates, since they
    /// would name the same table.
    pub fn new(plugins: Vec<PluginInstance>) -> Result<Self, PostblendError> {
        let mut index = HashMap::with_capacity(plugins.len());
        let mut folded = HashSet::with_capacity(plugins.len());
        for (i, plugin) in plugins.iter().enumerate() {
            if !folded.insert(plugin.id().to_ascii_lowercase()) {
                return Err(PostblendError::Discovery(format!(
                    "duplicate plugin id `{}`",
                    plugin.id()
                )));
            }
            index.insert(plugin.id().to_string(), i);
        }
        Ok(Self { plugins, index })
    }

    pub fn get(&self, id: &str) -> Option<&PluginInstance> {
        self.index.get(id).map(|&i| &self.plugins[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginInstance> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Registry of plugin factories and the currently loaded plugins.
pub struct PluginRegistry {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
    plugins: ArcSwap<PluginSet>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create a registry with no factories and no plugins.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            plugins: ArcSwap::from_pointee(PluginSet::default()),
        }
    }

    /// Add a factory to the static factory table. A factory with the same
    /// name replaces the previous one.
    pub fn register_factory(&mut self, factory: Arc<dyn PluginFactory>) {
        let name = factory.name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            debug!(factory = %name, "replaced plugin factory");
        }
    }

    /// Builder-style [`PluginRegistry::register_factory`].
    pub fn with_factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.register_factory(factory);
        self
    }

    /// Registered factory names, sorted.
    pub fn factory_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Scan `root` for manifests, build and initialize every entry, and
    /// replace the held set. Returns the number of plugins now loaded.
    ///
    /// Any failure aborts the call and leaves the previous set in place.
    pub async fn discover(&self, root: &Path, ctx: &PluginContext) -> Result<usize, PostblendError> {
        let sources = discovery::scan(root)?;

        let mut loaded = Vec::new();
        for source in &sources {
            for entry in &source.entries {
                let factory = self.factories.get(&entry.factory).ok_or_else(|| {
                    PostblendError::Discovery(format!(
                        "{}: plugin `{}` names unknown factory `{}`",
                        source.path.display(),
                        entry.id,
                        entry.factory
                    ))
                })?;
                if loaded
                    .iter()
                    .any(|p: &PluginInstance| p.id().eq_ignore_ascii_case(&entry.id))
                {
                    return Err(PostblendError::Discovery(format!(
                        "{}: duplicate plugin id `{}`",
                        source.path.display(),
                        entry.id
                    )));
                }

                let expected = factory.capability();
                let instance = factory.create(entry.descriptor(expected), ctx)?;
                if instance.capability() != expected || instance.id() != entry.id {
                    return Err(PostblendError::Discovery(format!(
                        "factory `{}` built {:?} for plugin `{}`, expected a {expected} plugin",
                        entry.factory,
                        instance,
                        entry.id
                    )));
                }
                instance.initialize().await?;
                debug!(plugin_id = %entry.id, factory = %entry.factory, "plugin initialized");
                loaded.push(instance);
            }
        }

        let set = PluginSet::new(loaded)?;
        let count = set.len();
        self.plugins.store(Arc::new(set));
        info!(root = %root.display(), plugins = count, "plugin discovery complete");
        Ok(count)
    }

    /// Replace the held set wholesale.
    pub fn replace_all(&self, plugins: Vec<PluginInstance>) -> Result<(), PostblendError> {
        self.plugins.store(Arc::new(PluginSet::new(plugins)?));
        Ok(())
    }

    /// Current snapshot of loaded plugins.
    pub fn snapshot(&self) -> Arc<PluginSet> {
        self.plugins.load_full()
    }

    pub fn get(&self, id: &str) -> Option<PluginInstance> {
        self.plugins.load().get(id).cloned()
    }

    /// Descriptors of every loaded plugin, in discovery order.
    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.plugins
            .load()
            .iter()
            .map(|p| p.descriptor().clone())
            .collect()
    }

    /// Loaded plugins that implement the platform contract, in discovery order.
    pub fn platform_plugins(&self) -> Vec<Arc<dyn PlatformPlugin>> {
        self.plugins
            .load()
            .iter()
            .filter_map(|p| p.as_platform().cloned())
            .collect()
    }

    /// The platform plugin with `id`, or why it cannot be used.
    pub fn platform(&self, id: &str) -> Result<Arc<dyn PlatformPlugin>, PostblendError> {
        let plugin = self
            .get(id)
            .ok_or_else(|| PostblendError::PluginNotFound(id.to_string()))?;
        plugin.as_platform().cloned().ok_or_else(|| {
            PostblendError::plugin(id, "not a platform plugin")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use postblend_core::{Capability, Plugin};
    use postblend_storage::{Database, DynamicTables};
    use tempfile::tempdir;

    use super::*;

    struct Inert {
        descriptor: PluginDescriptor,
        fail_init: bool,
    }

    #[async_trait]
    impl Plugin for Inert {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn initialize(&self) -> Result<(), PostblendError> {
            if self.fail_init {
                Err(PostblendError::plugin(&self.descriptor.id, "init failed"))
            } else {
                Ok(())
            }
        }
    }

    struct InertFactory {
        name: &'static str,
        fail_init: bool,
        created: AtomicUsize,
    }

    impl InertFactory {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                fail_init: false,
                created: AtomicUsize::new(0),
            }
        }
    }

    impl PluginFactory for InertFactory {
        fn name(&self) -> &str {
            self.name
        }

        fn capability(&self) -> Capability {
            Capability::Generic
        }

        fn create(
            &self,
            descriptor: PluginDescriptor,
            _ctx: &PluginContext,
        ) -> Result<PluginInstance, PostblendError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(PluginInstance::Generic(Arc::new(Inert {
                descriptor,
                fail_init: self.fail_init,
            })))
        }
    }

    async fn ctx() -> PluginContext {
        PluginContext::new(DynamicTables::new(Database::open_in_memory().await.unwrap()))
    }

    fn write(dir: &Path, file: &str, body: &str) {
        std::fs::write(dir.join(file), body).unwrap();
    }

    #[tokio::test]
    async fn discover_loads_entries_in_traversal_order() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "plugins.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n\n\
             [[plugin]]\nid = \"two\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n",
        );
        let registry = PluginRegistry::new().with_factory(Arc::new(InertFactory::new("inert")));

        let count = registry.discover(dir.path(), &ctx().await).await.unwrap();
        assert_eq!(count, 2);
        let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["one", "two"]);
        assert!(registry.get("one").is_some());
        assert!(registry.platform_plugins().is_empty());
        assert!(matches!(
            registry.platform("one"),
            Err(PostblendError::Plugin { .. })
        ));
        assert!(matches!(
            registry.platform("ghost"),
            Err(PostblendError::PluginNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_factory_aborts_and_keeps_previous_set() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n",
        );
        let registry = PluginRegistry::new().with_factory(Arc::new(InertFactory::new("inert")));
        let ctx = ctx().await;
        registry.discover(dir.path(), &ctx).await.unwrap();

        write(
            dir.path(),
            "b.toml",
            "[[plugin]]\nid = \"two\"\nfactory = \"missing\"\nversion = \"0.1.0\"\n",
        );
        let err = registry.discover(dir.path(), &ctx).await.unwrap_err();
        assert!(matches!(err, PostblendError::Discovery(_)));
        let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["one"]);
    }

    #[tokio::test]
    async fn duplicate_id_aborts() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(
            dir.path(),
            "a.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n",
        );
        write(
            &dir.path().join("nested"),
            "b.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"inert\"\nversion = \"0.2.0\"\n",
        );
        let registry = PluginRegistry::new().with_factory(Arc::new(InertFactory::new("inert")));
        assert!(registry.discover(dir.path(), &ctx().await).await.is_err());
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn ids_differing_only_in_case_abort() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.toml",
            "[[plugin]]\nid = \"echo\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n\n\
             [[plugin]]\nid = \"Echo\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n",
        );
        let factory = Arc::new(InertFactory::new("inert"));
        let registry = PluginRegistry::new().with_factory(factory.clone());
        let err = registry.discover(dir.path(), &ctx().await).await.unwrap_err();
        assert!(matches!(err, PostblendError::Discovery(_)));
        assert!(registry.list().is_empty());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn initialization_failure_aborts() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"flaky\"\nversion = \"0.1.0\"\n",
        );
        let factory = InertFactory {
            fail_init: true,
            ..InertFactory::new("flaky")
        };
        let registry = PluginRegistry::new().with_factory(Arc::new(factory));
        let err = registry.discover(dir.path(), &ctx().await).await.unwrap_err();
        assert!(matches!(err, PostblendError::Plugin { .. }));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn rediscovery_replaces_set_with_same_ids() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.toml",
            "[[plugin]]\nid = \"one\"\nfactory = \"inert\"\nversion = \"0.1.0\"\n",
        );
        let factory = Arc::new(InertFactory::new("inert"));
        let registry = PluginRegistry::new().with_factory(factory.clone());
        let ctx = ctx().await;

        registry.discover(dir.path(), &ctx).await.unwrap();
        let first = registry.snapshot();
        registry.discover(dir.path(), &ctx).await.unwrap();
        let second = registry.snapshot();

        assert!(!Arc::ptr_eq(&first, &second));
        let ids = |set: &PluginSet| set.iter().map(|p| p.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn plugin_set_rejects_duplicates() {
        let make = |id: &str| {
            PluginInstance::Generic(Arc::new(Inert {
                descriptor: PluginDescriptor::new(id, id, Capability::Generic),
                fail_init: false,
            }))
        };
        assert!(PluginSet::new(vec![make("a"), make("a")]).is_err());
        assert!(PluginSet::new(vec![make("echo"), make("Echo")]).is_err());
        let set = PluginSet::new(vec![make("a"), make("b")]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get("b").is_some());
    }
}
