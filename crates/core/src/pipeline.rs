use crate::definition::{ComponentDefinition, DefinitionRegistry, Role};
use crate::errors::BootstrapError;
use crate::metadata::{MetadataProvider, SourceScanner};
use crate::processor::{
    ExtensionDeclaration, Orchestrator, OrderingCapability, SourceExpansionExtension,
    SuppliedExtension,
};
use std::sync::Arc;
use std::time::Instant;

/// Registry name of the built-in source-expansion extension
pub const SOURCE_EXPANSION_NAME: &str = "cinder.internal.sourceExpansion";

/// Bootstrap driver orchestrating the whole pipeline
///
/// Seeds the built-in source-expansion extension, runs the registry and
/// factory extension passes, installs instance extensions, and hands back
/// the finalized registry. A fatal error aborts the run; the registry is
/// not guaranteed to be partially usable afterwards.
pub struct Bootstrap {
    registry: DefinitionRegistry,
    orchestrator: Orchestrator,
    supplied: Vec<SuppliedExtension>,
    proxy_target_class: bool,
    stats: BootstrapStats,
}

impl Bootstrap {
    /// Create a new bootstrap with an empty registry
    pub fn new() -> Self {
        Self::with_registry(DefinitionRegistry::new())
    }

    /// Create a new bootstrap over an existing registry
    pub fn with_registry(registry: DefinitionRegistry) -> Self {
        Self {
            registry,
            orchestrator: Orchestrator::new(),
            supplied: Vec::new(),
            proxy_target_class: true,
            stats: BootstrapStats::new(),
        }
    }

    /// Add a seed definition before the pipeline runs
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Result<Self, BootstrapError> {
        self.registry.register(name, definition)?;
        Ok(self)
    }

    /// Add an extension supplied ahead of anything discovered in the registry
    pub fn with_extension(mut self, extension: SuppliedExtension) -> Self {
        self.supplied.push(extension);
        self
    }

    /// Set whether scoped proxies preserve the target class
    pub fn with_proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }

    /// Register a seed definition
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Result<(), BootstrapError> {
        self.registry.register(name, definition)
    }

    /// Run the pipeline and return the finalized registry
    ///
    /// The built-in expansion extension is declared priority-ordered at the
    /// lowest precedence of its tier, so embedder-supplied priority-ordered
    /// extensions observe the registry before sources expand.
    pub fn run(
        &mut self,
        provider: Arc<dyn MetadataProvider>,
        scanner: Arc<dyn SourceScanner>,
    ) -> Result<DefinitionRegistry, BootstrapError> {
        let start_time = Instant::now();

        tracing::info!("Starting container bootstrap...");

        // Seed infrastructure definitions
        let seed_start = Instant::now();
        let expansion = SourceExpansionExtension::new(provider, scanner)
            .with_proxy_target_class(self.proxy_target_class);
        self.registry.register(
            SOURCE_EXPANSION_NAME,
            ComponentDefinition::new()
                .with_role(Role::Infrastructure)
                .with_extension(
                    ExtensionDeclaration::registry(Arc::new(expansion))
                        .with_capability(OrderingCapability::PriorityOrdered(i32::MAX)),
                ),
        )?;
        self.stats.seed_time = seed_start.elapsed();

        // Registry and factory extension passes
        let expansion_start = Instant::now();
        let supplied = std::mem::take(&mut self.supplied);
        self.orchestrator
            .invoke_registry_extensions(&mut self.registry, supplied)?;
        self.stats.expansion_time = expansion_start.elapsed();

        // Instance-extension installation
        let install_start = Instant::now();
        self.orchestrator
            .register_instance_extensions(&mut self.registry)?;
        self.stats.installation_time = install_start.elapsed();

        self.stats.total_time = start_time.elapsed();
        self.stats.definition_count = self.registry.count();
        self.stats.singleton_count = self.registry.singleton_count();

        tracing::info!(
            "Container bootstrap completed in {:?} with {} definitions",
            self.stats.total_time,
            self.stats.definition_count
        );

        Ok(std::mem::take(&mut self.registry))
    }

    /// Get bootstrap statistics
    pub fn stats(&self) -> &BootstrapStats {
        &self.stats
    }

    /// Get the registry being bootstrapped
    ///
    /// After a failed run this is the partially-expanded registry; no
    /// usability guarantee attaches to it beyond inspection.
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Get the registry being bootstrapped, mutably
    pub fn registry_mut(&mut self) -> &mut DefinitionRegistry {
        &mut self.registry
    }

    /// Print bootstrap summary
    pub fn print_summary(&self) {
        let stats = &self.stats;

        println!("\n=== Container Bootstrap Summary ===");
        println!("Definitions: {}", stats.definition_count);
        println!("Singletons: {}", stats.singleton_count);
        println!("Total time: {:?}", stats.total_time);
        println!("  - Seeding: {:?}", stats.seed_time);
        println!("  - Expansion: {:?}", stats.expansion_time);
        println!("  - Installation: {:?}", stats.installation_time);
        println!("===================================\n");
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a bootstrap run
#[derive(Debug, Clone)]
pub struct BootstrapStats {
    pub definition_count: usize,
    pub singleton_count: usize,
    pub total_time: std::time::Duration,
    pub seed_time: std::time::Duration,
    pub expansion_time: std::time::Duration,
    pub installation_time: std::time::Duration,
}

impl BootstrapStats {
    /// Create new bootstrap stats
    pub fn new() -> Self {
        Self {
            definition_count: 0,
            singleton_count: 0,
            total_time: std::time::Duration::ZERO,
            seed_time: std::time::Duration::ZERO,
            expansion_time: std::time::Duration::ZERO,
            installation_time: std::time::Duration::ZERO,
        }
    }
}

impl Default for BootstrapStats {
    fn default() -> Self {
        Self::new()
    }
}
