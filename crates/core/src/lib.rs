pub mod definition;
pub mod enhance;
pub mod errors;
pub mod metadata;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod scope;

// Re-export key types for convenience (specific exports to avoid ambiguity)
pub use definition::{
    ComponentDefinition, DecoratedTarget, DefinitionRegistry, ProcessedIdentitySet, RegistryToken,
    Role, SourceKind,
};
pub use enhance::{ComponentInstance, Enhancer, FactoryDispatch, FactoryInvocation};
pub use errors::BootstrapError;
pub use metadata::{
    FactoryMethodDecl, MetadataProvider, NoOpScanner, SourceAttributes, SourceDeclarations,
    SourceScanner,
};
pub use parser::{ConfigurationUnit, DefinitionReader, ImportRegistry, SourceCandidate, SourceParser};
pub use pipeline::{Bootstrap, BootstrapStats, SOURCE_EXPANSION_NAME};
pub use processor::{
    ExtensionDeclaration, ExtensionHandle, FactoryExtension, InstanceExtension, Orchestrator,
    OrderingCapability, RegistryExtension, SourceExpansionExtension, SuppliedExtension,
};
pub use scope::{create_scoped_proxy, is_scoped_target_name, target_name, TARGET_NAME_PREFIX};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework information
pub const FRAMEWORK_NAME: &str = "cinder";

/// Get framework version
pub fn version() -> &'static str {
    VERSION
}

/// Get framework name
pub fn name() -> &'static str {
    FRAMEWORK_NAME
}
