use crate::definition::{DefinitionRegistry, ProcessedIdentitySet};
use crate::enhance::ComponentInstance;
use crate::errors::BootstrapError;
use crate::processor::extension::{
    ExtensionHandle, FactoryExtension, InstanceExtension, OrderingCapability, RegistryExtension,
    SuppliedExtension,
};
use std::collections::HashSet;
use std::sync::Arc;

/// One extension discovered in the registry, with its declared capability
struct Discovered<T> {
    name: String,
    capability: OrderingCapability,
    extension: T,
}

/// A discovered extension that participates in the factory-level pass
enum FactoryCapable {
    Registry(Arc<dyn RegistryExtension>),
    Factory(Arc<dyn FactoryExtension>),
}

impl FactoryCapable {
    fn post_process_factory(&self, registry: &mut DefinitionRegistry) -> Result<(), BootstrapError> {
        match self {
            FactoryCapable::Registry(ext) => ext.post_process_factory(registry),
            FactoryCapable::Factory(ext) => ext.post_process_factory(registry),
        }
    }

    fn name(&self) -> &str {
        match self {
            FactoryCapable::Registry(ext) => ext.name(),
            FactoryCapable::Factory(ext) => ext.name(),
        }
    }
}

/// Stable sort by declared order value; ties keep discovery order
fn sort_discovered<T>(discovered: &mut [Discovered<T>]) {
    discovered.sort_by_key(|d| d.capability.order_value());
}

/// Invokes the extension families against a registry in three priority tiers
///
/// Registry extensions run first and may register further extensions, which
/// the re-entrant third tier absorbs. Factory extensions run against the
/// expanded registry afterwards. Instance extensions are only sorted and
/// installed, never invoked here. Each pass may run at most once per
/// registry identity.
#[derive(Debug, Default)]
pub struct Orchestrator {
    registry_passes: ProcessedIdentitySet,
    install_passes: ProcessedIdentitySet,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new() -> Self {
        Self::default()
    }

    /// Run registry extensions, then factory extensions, against the registry
    ///
    /// `supplied` extensions are invoked ahead of anything discovered in the
    /// registry, in the order given. A second call against the same registry
    /// identity is a fatal programming error.
    pub fn invoke_registry_extensions(
        &mut self,
        registry: &mut DefinitionRegistry,
        supplied: Vec<SuppliedExtension>,
    ) -> Result<(), BootstrapError> {
        self.registry_passes
            .mark(registry.token(), "registry extension invocation")?;

        let mut processed: HashSet<String> = HashSet::new();
        let mut invoked_registry_extensions: Vec<Arc<dyn RegistryExtension>> = Vec::new();
        let mut supplied_factory: Vec<Arc<dyn FactoryExtension>> = Vec::new();

        // Supplied registry-capable extensions run immediately, in supplied
        // order; plain factory ones wait for the factory-level pass
        for extension in supplied {
            match extension {
                SuppliedExtension::Registry(ext) => {
                    tracing::debug!("Invoking supplied registry extension '{}'", ext.name());
                    ext.post_process_registry(registry)?;
                    invoked_registry_extensions.push(ext);
                }
                SuppliedExtension::Factory(ext) => supplied_factory.push(ext),
            }
        }

        // Tier 1: priority-ordered registry extensions
        let mut current = discover_registry(registry, &processed, |c| c.is_priority_ordered())?;
        sort_discovered(&mut current);
        invoke_registry_batch(registry, current, &mut processed, &mut invoked_registry_extensions)?;

        // Tier 2: fresh scan; tier 1 may have registered ordered extensions
        let mut current = discover_registry(registry, &processed, |c| c.is_ordered())?;
        sort_discovered(&mut current);
        invoke_registry_batch(registry, current, &mut processed, &mut invoked_registry_extensions)?;

        // Tier 3: re-scan until nothing new turns up, absorbing extensions
        // that register further extensions
        loop {
            let mut current = discover_registry(registry, &processed, |_| true)?;
            if current.is_empty() {
                break;
            }
            sort_discovered(&mut current);
            invoke_registry_batch(
                registry,
                current,
                &mut processed,
                &mut invoked_registry_extensions,
            )?;
        }

        // Factory-level hook of every registry extension invoked so far, in
        // invocation order, then the supplied plain factory extensions
        for extension in &invoked_registry_extensions {
            extension.post_process_factory(registry)?;
        }
        for extension in &supplied_factory {
            tracing::debug!("Invoking supplied factory extension '{}'", extension.name());
            extension.post_process_factory(registry)?;
        }

        // Factory extensions discovered in the registry, same three tiers;
        // the scan for the later tiers is taken fresh after tier 1 to catch
        // extensions registered as one of its side effects
        let mut tier = discover_factory(registry, &processed, |c| c.is_priority_ordered())?;
        sort_discovered(&mut tier);
        invoke_factory_batch(registry, tier, &mut processed)?;

        let mut tier = discover_factory(registry, &processed, |c| c.is_ordered())?;
        sort_discovered(&mut tier);
        invoke_factory_batch(registry, tier, &mut processed)?;

        let mut tier = discover_factory(registry, &processed, |_| true)?;
        sort_discovered(&mut tier);
        invoke_factory_batch(registry, tier, &mut processed)?;

        // Post-processors may have changed raw definitions; cached finalized
        // views are stale now
        registry.clear_merged_cache();
        Ok(())
    }

    /// Discover, tier-sort and install instance extensions into the registry
    ///
    /// Mirrors the three-tier protocol but registers the sorted extensions
    /// into the registry's active hook list instead of calling them. Ends by
    /// appending a watchdog that reports components forced into existence
    /// before every hook was installed.
    pub fn register_instance_extensions(
        &mut self,
        registry: &mut DefinitionRegistry,
    ) -> Result<(), BootstrapError> {
        self.install_passes
            .mark(registry.token(), "instance extension installation")?;

        let discovered = discover_instance(registry)?;
        let expected_count = registry.instance_extension_count() + discovered.len() + 1;

        let mut priority = Vec::new();
        let mut ordered = Vec::new();
        let mut unordered = Vec::new();
        for d in discovered {
            if d.capability.is_priority_ordered() {
                priority.push(d);
            } else if d.capability.is_ordered() {
                ordered.push(d);
            } else {
                unordered.push(d);
            }
        }
        sort_discovered(&mut priority);
        sort_discovered(&mut ordered);

        for d in priority.into_iter().chain(ordered).chain(unordered) {
            tracing::debug!("Installing instance extension '{}'", d.extension.name());
            registry.add_instance_extension(d.extension);
        }
        registry.add_instance_extension(Arc::new(InstanceExtensionChecker::new(expected_count)));
        Ok(())
    }
}

fn discover_registry(
    registry: &DefinitionRegistry,
    processed: &HashSet<String>,
    filter: impl Fn(&OrderingCapability) -> bool,
) -> Result<Vec<Discovered<Arc<dyn RegistryExtension>>>, BootstrapError> {
    let mut found = Vec::new();
    for name in registry.names() {
        if processed.contains(&name) {
            continue;
        }
        let definition = registry.get(&name)?;
        if let Some(declaration) = &definition.extension {
            if let ExtensionHandle::Registry(extension) = &declaration.handle {
                if filter(&declaration.capability) {
                    found.push(Discovered {
                        name,
                        capability: declaration.capability,
                        extension: Arc::clone(extension),
                    });
                }
            }
        }
    }
    Ok(found)
}

fn discover_factory(
    registry: &DefinitionRegistry,
    processed: &HashSet<String>,
    filter: impl Fn(&OrderingCapability) -> bool,
) -> Result<Vec<Discovered<FactoryCapable>>, BootstrapError> {
    let mut found = Vec::new();
    for name in registry.names() {
        if processed.contains(&name) {
            continue;
        }
        let definition = registry.get(&name)?;
        if let Some(declaration) = &definition.extension {
            if !filter(&declaration.capability) {
                continue;
            }
            let capable = match &declaration.handle {
                ExtensionHandle::Registry(ext) => FactoryCapable::Registry(Arc::clone(ext)),
                ExtensionHandle::Factory(ext) => FactoryCapable::Factory(Arc::clone(ext)),
                ExtensionHandle::Instance(_) => continue,
            };
            found.push(Discovered {
                name,
                capability: declaration.capability,
                extension: capable,
            });
        }
    }
    Ok(found)
}

fn discover_instance(
    registry: &DefinitionRegistry,
) -> Result<Vec<Discovered<Arc<dyn InstanceExtension>>>, BootstrapError> {
    let mut found = Vec::new();
    for name in registry.names() {
        let definition = registry.get(&name)?;
        if let Some(declaration) = &definition.extension {
            if let ExtensionHandle::Instance(extension) = &declaration.handle {
                found.push(Discovered {
                    name,
                    capability: declaration.capability,
                    extension: Arc::clone(extension),
                });
            }
        }
    }
    Ok(found)
}

fn invoke_registry_batch(
    registry: &mut DefinitionRegistry,
    batch: Vec<Discovered<Arc<dyn RegistryExtension>>>,
    processed: &mut HashSet<String>,
    invoked: &mut Vec<Arc<dyn RegistryExtension>>,
) -> Result<(), BootstrapError> {
    for d in &batch {
        processed.insert(d.name.clone());
    }
    for d in batch {
        tracing::debug!("Invoking registry extension '{}' ('{}')", d.extension.name(), d.name);
        d.extension.post_process_registry(registry)?;
        invoked.push(d.extension);
    }
    Ok(())
}

fn invoke_factory_batch(
    registry: &mut DefinitionRegistry,
    batch: Vec<Discovered<FactoryCapable>>,
    processed: &mut HashSet<String>,
) -> Result<(), BootstrapError> {
    for d in &batch {
        processed.insert(d.name.clone());
    }
    for d in batch {
        tracing::debug!("Invoking factory extension '{}' ('{}')", d.extension.name(), d.name);
        d.extension.post_process_factory(registry)?;
    }
    Ok(())
}

/// Watchdog appended at the end of the active hook list
///
/// Detects components forced into existence before all instance extensions
/// were installed. Reports, never fails; infrastructure-role definitions and
/// extension-contributing definitions are exempt.
pub struct InstanceExtensionChecker {
    expected_count: usize,
}

impl InstanceExtensionChecker {
    /// Create a checker expecting the given final hook count
    pub fn new(expected_count: usize) -> Self {
        Self { expected_count }
    }

    fn is_exempt(name: &str, registry: &DefinitionRegistry) -> bool {
        match registry.get(name) {
            Ok(definition) => {
                definition.extension.is_some() || definition.role.is_infrastructure()
            }
            Err(_) => false,
        }
    }

    /// Decide whether a component created now must be reported as having
    /// missed part of the hook list
    fn should_report(&self, name: &str, registry: &DefinitionRegistry) -> bool {
        registry.instance_extension_count() < self.expected_count
            && !Self::is_exempt(name, registry)
    }
}

impl InstanceExtension for InstanceExtensionChecker {
    fn name(&self) -> &str {
        "instance-extension-checker"
    }

    fn after_init(&self, _instance: &ComponentInstance, name: &str, registry: &DefinitionRegistry) {
        if self.should_report(name, registry) {
            tracing::info!(
                "Component '{}' was created before all instance extensions were installed \
                 and is not eligible for getting processed by all of them",
                name
            );
        }
    }
}

impl std::fmt::Debug for InstanceExtensionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceExtensionChecker")
            .field("expected_count", &self.expected_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ComponentDefinition, Role};
    use crate::processor::extension::ExtensionDeclaration;
    use std::sync::Mutex;

    /// Registry extension that records its invocation and may register one
    /// further extension definition as a side effect
    struct Recording {
        label: String,
        log: Arc<Mutex<Vec<String>>>,
        registers: Mutex<Option<(String, ComponentDefinition)>>,
    }

    impl Recording {
        fn new(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: Arc::clone(log),
                registers: Mutex::new(None),
            })
        }

        fn registering(
            label: &str,
            log: &Arc<Mutex<Vec<String>>>,
            name: &str,
            definition: ComponentDefinition,
        ) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                log: Arc::clone(log),
                registers: Mutex::new(Some((name.to_string(), definition))),
            })
        }
    }

    impl FactoryExtension for Recording {
        fn name(&self) -> &str {
            &self.label
        }

        fn post_process_factory(
            &self,
            _registry: &mut DefinitionRegistry,
        ) -> Result<(), BootstrapError> {
            self.log.lock().unwrap().push(format!("{}:factory", self.label));
            Ok(())
        }
    }

    impl RegistryExtension for Recording {
        fn post_process_registry(
            &self,
            registry: &mut DefinitionRegistry,
        ) -> Result<(), BootstrapError> {
            self.log.lock().unwrap().push(format!("{}:registry", self.label));
            if let Some((name, definition)) = self.registers.lock().unwrap().take() {
                registry.register(name, definition)?;
            }
            Ok(())
        }
    }

    fn declare(
        extension: Arc<Recording>,
        capability: OrderingCapability,
    ) -> ComponentDefinition {
        ComponentDefinition::new()
            .with_role(Role::Infrastructure)
            .with_extension(ExtensionDeclaration::registry(extension).with_capability(capability))
    }

    #[test]
    fn test_tiers_and_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DefinitionRegistry::new();

        registry
            .register("u1", declare(Recording::new("u1", &log), OrderingCapability::Unordered))
            .unwrap();
        registry
            .register("p2", declare(Recording::new("p2", &log), OrderingCapability::PriorityOrdered(2)))
            .unwrap();
        registry
            .register("p1", declare(Recording::new("p1", &log), OrderingCapability::PriorityOrdered(1)))
            .unwrap();
        registry
            .register("o1", declare(Recording::new("o1", &log), OrderingCapability::Ordered(5)))
            .unwrap();
        registry
            .register("o2", declare(Recording::new("o2", &log), OrderingCapability::Ordered(-5)))
            .unwrap();

        let mut orchestrator = Orchestrator::new();
        orchestrator
            .invoke_registry_extensions(&mut registry, Vec::new())
            .unwrap();

        let registry_calls: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.ends_with(":registry"))
            .cloned()
            .collect();
        assert_eq!(
            registry_calls,
            vec![
                "p1:registry",
                "p2:registry",
                "o2:registry",
                "o1:registry",
                "u1:registry"
            ]
        );

        // Factory hooks follow in the same invocation order
        let factory_calls: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.ends_with(":factory"))
            .cloned()
            .collect();
        assert_eq!(
            factory_calls,
            vec!["p1:factory", "p2:factory", "o2:factory", "o1:factory", "u1:factory"]
        );
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DefinitionRegistry::new();
        for label in ["first", "second", "third"] {
            registry
                .register(
                    label,
                    declare(Recording::new(label, &log), OrderingCapability::PriorityOrdered(7)),
                )
                .unwrap();
        }

        let mut orchestrator = Orchestrator::new();
        orchestrator
            .invoke_registry_extensions(&mut registry, Vec::new())
            .unwrap();

        let calls: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.ends_with(":registry"))
            .cloned()
            .collect();
        assert_eq!(calls, vec!["first:registry", "second:registry", "third:registry"]);
    }

    #[test]
    fn test_dynamically_registered_extension_runs_in_third_tier() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DefinitionRegistry::new();

        let dynamic = declare(Recording::new("dynamic", &log), OrderingCapability::Unordered);
        registry
            .register(
                "registrar",
                declare(
                    Recording::registering("registrar", &log, "dynamic", dynamic),
                    OrderingCapability::PriorityOrdered(0),
                ),
            )
            .unwrap();
        registry
            .register(
                "existing",
                declare(Recording::new("existing", &log), OrderingCapability::Unordered),
            )
            .unwrap();

        let mut orchestrator = Orchestrator::new();
        orchestrator
            .invoke_registry_extensions(&mut registry, Vec::new())
            .unwrap();

        let calls: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.ends_with(":registry"))
            .cloned()
            .collect();
        // All three ran exactly once; the dynamic one surfaced in the
        // re-entrant third tier alongside the pre-existing unordered one
        assert_eq!(
            calls,
            vec!["registrar:registry", "existing:registry", "dynamic:registry"]
        );
    }

    #[test]
    fn test_double_invocation_is_fatal() {
        let mut registry = DefinitionRegistry::new();
        let mut orchestrator = Orchestrator::new();

        orchestrator
            .invoke_registry_extensions(&mut registry, Vec::new())
            .unwrap();
        let err = orchestrator
            .invoke_registry_extensions(&mut registry, Vec::new())
            .unwrap_err();
        assert!(err.is_already_processed());

        // A different registry is still fine
        let mut other = DefinitionRegistry::new();
        orchestrator
            .invoke_registry_extensions(&mut other, Vec::new())
            .unwrap();
    }

    struct NamedInstanceExtension {
        label: String,
    }

    impl InstanceExtension for NamedInstanceExtension {
        fn name(&self) -> &str {
            &self.label
        }
    }

    #[test]
    fn test_instance_extensions_installed_in_tier_order() {
        let mut registry = DefinitionRegistry::new();
        for (name, capability) in [
            ("u", OrderingCapability::Unordered),
            ("p", OrderingCapability::PriorityOrdered(0)),
            ("o", OrderingCapability::Ordered(0)),
        ] {
            registry
                .register(
                    name,
                    ComponentDefinition::new().with_extension(
                        ExtensionDeclaration::instance(Arc::new(NamedInstanceExtension {
                            label: name.to_string(),
                        }))
                        .with_capability(capability),
                    ),
                )
                .unwrap();
        }

        let mut orchestrator = Orchestrator::new();
        orchestrator.register_instance_extensions(&mut registry).unwrap();

        let installed: Vec<&str> = registry
            .instance_extensions()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(installed, vec!["p", "o", "u", "instance-extension-checker"]);

        let err = orchestrator
            .register_instance_extensions(&mut registry)
            .unwrap_err();
        assert!(err.is_already_processed());
    }

    #[test]
    fn test_checker_exemptions() {
        let mut registry = DefinitionRegistry::new();
        registry
            .register(
                "infra",
                ComponentDefinition::new().with_role(Role::Infrastructure),
            )
            .unwrap();
        registry
            .register("app", ComponentDefinition::new())
            .unwrap();

        assert!(InstanceExtensionChecker::is_exempt("infra", &registry));
        assert!(!InstanceExtensionChecker::is_exempt("app", &registry));
        assert!(!InstanceExtensionChecker::is_exempt("missing", &registry));
    }

    #[test]
    fn test_checker_reports_early_forced_components() {
        let mut registry = DefinitionRegistry::new();
        registry
            .register("app", ComponentDefinition::new())
            .unwrap();
        registry
            .register(
                "infra",
                ComponentDefinition::new().with_role(Role::Infrastructure),
            )
            .unwrap();
        registry
            .register(
                "hook",
                ComponentDefinition::new().with_extension(ExtensionDeclaration::instance(
                    Arc::new(NamedInstanceExtension {
                        label: "hook".to_string(),
                    }),
                )),
            )
            .unwrap();

        // Two hooks are still missing from the active list, as if the
        // instantiation engine forced objects into existence mid-install
        let checker = InstanceExtensionChecker::new(registry.instance_extension_count() + 2);

        assert!(checker.should_report("app", &registry));
        assert!(!checker.should_report("infra", &registry));
        assert!(!checker.should_report("hook", &registry));

        // Reporting never fails the pipeline
        let instance: ComponentInstance = Arc::new(0usize);
        checker.after_init(&instance, "app", &registry);

        // Once the full hook list is installed the checker falls silent
        registry.add_instance_extension(Arc::new(NamedInstanceExtension {
            label: "late-a".to_string(),
        }));
        registry.add_instance_extension(Arc::new(NamedInstanceExtension {
            label: "late-b".to_string(),
        }));
        assert!(!checker.should_report("app", &registry));
    }
}
