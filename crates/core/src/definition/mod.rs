pub mod definition;
pub mod registry;

pub use definition::{
    ComponentDefinition, DecoratedTarget, Role, SourceKind, FACTORY_METHOD_ATTRIBUTE,
    FACTORY_SOURCE_ATTRIBUTE, PRESERVE_TARGET_CLASS_ATTRIBUTE, PROXY_TARGET_CLASS_ATTRIBUTE,
};
pub use registry::{DefinitionRegistry, ProcessedIdentitySet, RegistryToken};
