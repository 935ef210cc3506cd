use crate::definition::DefinitionRegistry;
use crate::enhance::ComponentInstance;
use crate::errors::BootstrapError;
use std::sync::Arc;

/// Ordering capability attached to an extension at declaration time
///
/// A closed tag set replaces runtime type inspection: the orchestrator only
/// ever consults the declared capability. Lower values run first; the
/// priority-ordered tier as a whole precedes the ordered tier, which
/// precedes the unordered tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingCapability {
    PriorityOrdered(i32),
    Ordered(i32),
    Unordered,
}

impl OrderingCapability {
    /// Numeric priority used for sorting within a tier
    pub fn order_value(&self) -> i32 {
        match self {
            OrderingCapability::PriorityOrdered(value) => *value,
            OrderingCapability::Ordered(value) => *value,
            OrderingCapability::Unordered => i32::MAX,
        }
    }

    /// Check if this is the priority-ordered tier
    pub fn is_priority_ordered(&self) -> bool {
        matches!(self, OrderingCapability::PriorityOrdered(_))
    }

    /// Check if this is the ordered tier
    pub fn is_ordered(&self) -> bool {
        matches!(self, OrderingCapability::Ordered(_))
    }
}

impl Default for OrderingCapability {
    fn default() -> Self {
        OrderingCapability::Unordered
    }
}

/// Extension invoked against finalized definitions after source expansion
///
/// May inspect and modify existing definitions' final shape, but must not
/// register brand-new application components.
pub trait FactoryExtension: Send + Sync {
    /// Descriptive name used in diagnostics
    fn name(&self) -> &str;

    /// Adjust definitions after the registry has been fully expanded
    fn post_process_factory(&self, registry: &mut DefinitionRegistry)
        -> Result<(), BootstrapError>;
}

/// Extension invoked against the raw registry during expansion
///
/// May register new definitions as a side effect; the source-expansion
/// extension is the canonical example. Every registry extension also
/// participates in the factory-level pass afterwards.
pub trait RegistryExtension: FactoryExtension {
    /// Expand or rewrite the registry before definitions are finalized
    fn post_process_registry(
        &self,
        registry: &mut DefinitionRegistry,
    ) -> Result<(), BootstrapError>;
}

/// Extension installed for the instantiation phase
///
/// The bootstrap pipeline sorts and installs these into the registry's
/// active hook list; it never invokes them itself.
pub trait InstanceExtension: Send + Sync {
    /// Descriptive name used in diagnostics
    fn name(&self) -> &str;

    /// Hook running before an instance is initialized
    fn before_init(&self, _instance: &ComponentInstance, _name: &str, _registry: &DefinitionRegistry) {
    }

    /// Hook running after an instance is initialized
    fn after_init(&self, _instance: &ComponentInstance, _name: &str, _registry: &DefinitionRegistry) {
    }
}

/// Handle to a declared extension, tagged by family
#[derive(Clone)]
pub enum ExtensionHandle {
    Registry(Arc<dyn RegistryExtension>),
    Factory(Arc<dyn FactoryExtension>),
    Instance(Arc<dyn InstanceExtension>),
}

impl ExtensionHandle {
    /// Descriptive name of the held extension
    pub fn name(&self) -> &str {
        match self {
            ExtensionHandle::Registry(ext) => ext.name(),
            ExtensionHandle::Factory(ext) => ext.name(),
            ExtensionHandle::Instance(ext) => ext.name(),
        }
    }
}

impl std::fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let family = match self {
            ExtensionHandle::Registry(_) => "Registry",
            ExtensionHandle::Factory(_) => "Factory",
            ExtensionHandle::Instance(_) => "Instance",
        };
        f.debug_struct("ExtensionHandle")
            .field("family", &family)
            .field("name", &self.name())
            .finish()
    }
}

/// Extension payload carried by a component definition
///
/// Family membership and ordering are fixed here, at declaration time; the
/// orchestrator discovers declarations by scanning definitions, not by
/// inspecting types.
#[derive(Debug, Clone)]
pub struct ExtensionDeclaration {
    pub capability: OrderingCapability,
    pub handle: ExtensionHandle,
}

impl ExtensionDeclaration {
    /// Declare a registry extension, unordered by default
    pub fn registry(extension: Arc<dyn RegistryExtension>) -> Self {
        Self {
            capability: OrderingCapability::Unordered,
            handle: ExtensionHandle::Registry(extension),
        }
    }

    /// Declare a factory extension, unordered by default
    pub fn factory(extension: Arc<dyn FactoryExtension>) -> Self {
        Self {
            capability: OrderingCapability::Unordered,
            handle: ExtensionHandle::Factory(extension),
        }
    }

    /// Declare an instance extension, unordered by default
    pub fn instance(extension: Arc<dyn InstanceExtension>) -> Self {
        Self {
            capability: OrderingCapability::Unordered,
            handle: ExtensionHandle::Instance(extension),
        }
    }

    /// Set the ordering capability
    pub fn with_capability(mut self, capability: OrderingCapability) -> Self {
        self.capability = capability;
        self
    }
}

/// An extension supplied to the orchestrator directly, outside the registry
pub enum SuppliedExtension {
    Registry(Arc<dyn RegistryExtension>),
    Factory(Arc<dyn FactoryExtension>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_values() {
        assert_eq!(OrderingCapability::PriorityOrdered(3).order_value(), 3);
        assert_eq!(OrderingCapability::Ordered(-2).order_value(), -2);
        assert_eq!(OrderingCapability::Unordered.order_value(), i32::MAX);
    }

    #[test]
    fn test_tier_predicates() {
        assert!(OrderingCapability::PriorityOrdered(0).is_priority_ordered());
        assert!(!OrderingCapability::PriorityOrdered(0).is_ordered());
        assert!(OrderingCapability::Ordered(0).is_ordered());
        assert!(!OrderingCapability::Unordered.is_ordered());
        assert_eq!(OrderingCapability::default(), OrderingCapability::Unordered);
    }
}
