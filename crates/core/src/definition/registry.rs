use crate::definition::ComponentDefinition;
use crate::enhance::ComponentInstance;
use crate::errors::BootstrapError;
use crate::processor::InstanceExtension;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Opaque identity token minted once per registry
///
/// Stored by [`ProcessedIdentitySet`] instead of relying on memory-address
/// identity, so re-entrancy guards survive moves and clones of references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryToken(uuid::Uuid);

impl RegistryToken {
    fn mint() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for RegistryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered mapping from unique name to component definition
///
/// The single shared mutable resource of the bootstrap pipeline. Also carries
/// the singleton side-store and the active instance-hook list consumed by the
/// instantiation engine after bootstrap completes.
pub struct DefinitionRegistry {
    token: RegistryToken,
    definitions: HashMap<String, ComponentDefinition>,
    order: Vec<String>,
    allow_overriding: bool,
    singletons: HashMap<String, ComponentInstance>,
    instance_extensions: Vec<Arc<dyn InstanceExtension>>,
    merged_cache: HashMap<String, Arc<ComponentDefinition>>,
}

impl DefinitionRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            token: RegistryToken::mint(),
            definitions: HashMap::new(),
            order: Vec::new(),
            allow_overriding: true,
            singletons: HashMap::new(),
            instance_extensions: Vec::new(),
            merged_cache: HashMap::new(),
        }
    }

    /// Set whether registering under an existing name overwrites or fails
    pub fn with_allow_overriding(mut self, allow: bool) -> Self {
        self.allow_overriding = allow;
        self
    }

    /// Get the identity token of this registry
    pub fn token(&self) -> RegistryToken {
        self.token
    }

    /// Register a definition under a unique name
    ///
    /// Overwriting an existing name is allowed by default (with a warning);
    /// scoped-proxy creation relies on it. The overwritten name keeps its
    /// original position in the enumeration order.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Result<(), BootstrapError> {
        let name = name.into();
        if self.definitions.contains_key(&name) {
            if !self.allow_overriding {
                return Err(BootstrapError::DefinitionOverrideNotAllowed { name });
            }
            tracing::warn!("Overriding component definition '{}'", name);
        } else {
            self.order.push(name.clone());
        }
        self.merged_cache.remove(&name);
        self.definitions.insert(name, definition);
        Ok(())
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Result<&ComponentDefinition, BootstrapError> {
        self.definitions
            .get(name)
            .ok_or_else(|| BootstrapError::definition_not_found(name))
    }

    /// Look up a definition for in-place mutation
    pub fn get_mut(&mut self, name: &str) -> Result<&mut ComponentDefinition, BootstrapError> {
        self.merged_cache.remove(name);
        self.definitions
            .get_mut(name)
            .ok_or_else(|| BootstrapError::definition_not_found(name))
    }

    /// Check whether a definition is registered under the given name
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Remove a definition, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<ComponentDefinition> {
        let removed = self.definitions.remove(name);
        if removed.is_some() {
            self.order.retain(|n| n != name);
            self.merged_cache.remove(name);
        }
        removed
    }

    /// Snapshot of all registered names in insertion order
    ///
    /// Returns an owned copy so callers may mutate the registry while
    /// iterating a previously taken snapshot.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered definitions
    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// Check whether the registry holds no definitions
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Register a singleton value under a name
    ///
    /// Used by the enhanced factory dispatch to memoize constructed
    /// components, and to publish pipeline-internal singletons such as the
    /// import registry.
    pub fn register_singleton(&mut self, name: impl Into<String>, instance: ComponentInstance) {
        self.singletons.insert(name.into(), instance);
    }

    /// Get a singleton value by name
    pub fn get_singleton(&self, name: &str) -> Option<ComponentInstance> {
        self.singletons.get(name).cloned()
    }

    /// Check whether a singleton value exists under the given name
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains_key(name)
    }

    /// Number of singleton values currently tracked
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Append an instance extension to the active hook list
    pub fn add_instance_extension(&mut self, extension: Arc<dyn InstanceExtension>) {
        self.instance_extensions.push(extension);
    }

    /// Active instance-hook list, in installation order
    pub fn instance_extensions(&self) -> &[Arc<dyn InstanceExtension>] {
        &self.instance_extensions
    }

    /// Number of installed instance extensions
    pub fn instance_extension_count(&self) -> usize {
        self.instance_extensions.len()
    }

    /// Get a cached finalized view of a definition
    ///
    /// The view is a snapshot; it goes stale if post-processors mutate the
    /// raw definition afterwards, which is why the orchestrator invalidates
    /// the cache after every post-processing pass.
    pub fn merged(&mut self, name: &str) -> Result<Arc<ComponentDefinition>, BootstrapError> {
        if let Some(cached) = self.merged_cache.get(name) {
            return Ok(Arc::clone(cached));
        }
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| BootstrapError::definition_not_found(name))?;
        let merged = Arc::new(definition.clone());
        self.merged_cache
            .insert(name.to_string(), Arc::clone(&merged));
        Ok(merged)
    }

    /// Invalidate all cached finalized definition views
    pub fn clear_merged_cache(&mut self) {
        self.merged_cache.clear();
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("token", &self.token)
            .field("definition_count", &self.definitions.len())
            .field("singleton_count", &self.singletons.len())
            .field("instance_extension_count", &self.instance_extensions.len())
            .field("allow_overriding", &self.allow_overriding)
            .finish()
    }
}

/// Per-pass record of registry identities already subjected to an extension pass
///
/// Rejects accidental double invocation by failing fast, never by silently
/// skipping: idempotence cannot be assumed for extensions that mutate
/// external resources.
#[derive(Debug, Default)]
pub struct ProcessedIdentitySet {
    seen: HashSet<RegistryToken>,
}

impl ProcessedIdentitySet {
    /// Create an empty identity set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a registry identity as processed, failing if it already was
    pub fn mark(&mut self, token: RegistryToken, subject: &str) -> Result<(), BootstrapError> {
        if !self.seen.insert(token) {
            return Err(BootstrapError::already_processed(format!(
                "{} for registry {}",
                subject, token
            )));
        }
        Ok(())
    }

    /// Check whether a registry identity has been processed
    pub fn contains(&self, token: RegistryToken) -> bool {
        self.seen.contains(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = DefinitionRegistry::new();
        assert!(registry.is_empty());

        registry
            .register("a", ComponentDefinition::new())
            .unwrap();
        registry
            .register("b", ComponentDefinition::new().with_primary(true))
            .unwrap();

        assert_eq!(registry.count(), 2);
        assert!(registry.contains("a"));
        assert!(registry.get("b").unwrap().primary);
        assert!(registry.get("missing").is_err());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_override_allowed_keeps_order() {
        let mut registry = DefinitionRegistry::new();
        registry.register("a", ComponentDefinition::new()).unwrap();
        registry.register("b", ComponentDefinition::new()).unwrap();

        registry
            .register("a", ComponentDefinition::new().with_lazy_init(true))
            .unwrap();

        assert_eq!(registry.count(), 2);
        assert!(registry.get("a").unwrap().lazy_init);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_override_denied() {
        let mut registry = DefinitionRegistry::new().with_allow_overriding(false);
        registry.register("a", ComponentDefinition::new()).unwrap();

        let err = registry
            .register("a", ComponentDefinition::new())
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::DefinitionOverrideNotAllowed { .. }
        ));
    }

    #[test]
    fn test_names_snapshot_is_stable() {
        let mut registry = DefinitionRegistry::new();
        registry.register("a", ComponentDefinition::new()).unwrap();

        let snapshot = registry.names();
        registry.register("b", ComponentDefinition::new()).unwrap();
        registry.remove("a");

        // Mutations after the snapshot must not affect it
        assert_eq!(snapshot, vec!["a"]);
        assert_eq!(registry.names(), vec!["b"]);
    }

    #[test]
    fn test_merged_cache_invalidation() {
        let mut registry = DefinitionRegistry::new();
        registry.register("a", ComponentDefinition::new()).unwrap();

        let merged = registry.merged("a").unwrap();
        assert!(!merged.lazy_init);

        registry.get_mut("a").unwrap().lazy_init = true;
        let merged = registry.merged("a").unwrap();
        assert!(merged.lazy_init);

        registry.clear_merged_cache();
        assert!(registry.merged("a").is_ok());
    }

    #[test]
    fn test_singleton_store() {
        let mut registry = DefinitionRegistry::new();
        assert!(!registry.contains_singleton("a"));

        registry.register_singleton("a", Arc::new(7usize));
        assert!(registry.contains_singleton("a"));

        let value = registry.get_singleton("a").unwrap();
        assert_eq!(*value.downcast::<usize>().unwrap(), 7);
    }

    #[test]
    fn test_processed_identity_set() {
        let registry = DefinitionRegistry::new();
        let other = DefinitionRegistry::new();
        let mut set = ProcessedIdentitySet::new();

        set.mark(registry.token(), "expansion").unwrap();
        assert!(set.contains(registry.token()));
        assert!(!set.contains(other.token()));

        let err = set.mark(registry.token(), "expansion").unwrap_err();
        assert!(err.is_already_processed());

        set.mark(other.token(), "expansion").unwrap();
    }
}
