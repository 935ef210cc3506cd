pub mod expansion;
pub mod extension;
pub mod orchestrator;

pub use expansion::{SourceExpansionExtension, CANDIDATE_ATTRIBUTE};
pub use extension::{
    ExtensionDeclaration, ExtensionHandle, FactoryExtension, InstanceExtension,
    OrderingCapability, RegistryExtension, SuppliedExtension,
};
pub use orchestrator::{InstanceExtensionChecker, Orchestrator};
