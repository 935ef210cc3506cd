use crate::enhance::FactoryDispatch;
use crate::processor::ExtensionDeclaration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Attribute marking a definition whose original target class must be preserved when proxied
pub const PRESERVE_TARGET_CLASS_ATTRIBUTE: &str = "preserveTargetClass";

/// Attribute carrying an explicit proxy-target-class choice on a proxy definition
pub const PROXY_TARGET_CLASS_ATTRIBUTE: &str = "proxyTargetClass";

/// Attribute recording the factory method a definition is produced by
pub const FACTORY_METHOD_ATTRIBUTE: &str = "factoryMethod";

/// Attribute recording the source a factory-method definition was declared on
pub const FACTORY_SOURCE_ATTRIBUTE: &str = "factorySource";

/// Classification of how a definition relates to source expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Not a component source; an ordinary definition
    Plain,
    /// A source whose factory methods run as plain calls, never enhanced
    LiteSource,
    /// A source whose factory methods must be routed back through the registry
    FullSource,
}

impl SourceKind {
    /// Check if this is a plain definition
    pub fn is_plain(&self) -> bool {
        matches!(self, SourceKind::Plain)
    }

    /// Check if this is a lite source
    pub fn is_lite(&self) -> bool {
        matches!(self, SourceKind::LiteSource)
    }

    /// Check if this is a full source (enhancement required)
    pub fn is_full(&self) -> bool {
        matches!(self, SourceKind::FullSource)
    }

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Plain => "plain",
            SourceKind::LiteSource => "lite",
            SourceKind::FullSource => "full",
        }
    }
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::Plain
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a definition within the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A user-facing application component
    Application,
    /// A supporting component of some larger configuration
    Support,
    /// An internal component of the container itself
    Infrastructure,
}

impl Role {
    /// Check if this is an infrastructure role
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Role::Infrastructure)
    }

    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Application => "application",
            Role::Support => "support",
            Role::Infrastructure => "infrastructure",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Application
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to another definition wrapped by the owning definition
///
/// The wrapping definition exclusively owns this reference; it is metadata
/// describing the wrapped target, not a live object.
#[derive(Debug, Clone)]
pub struct DecoratedTarget {
    pub name: String,
    pub definition: Box<ComponentDefinition>,
}

/// Registry-held description of one managed component
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    /// How this definition relates to source expansion
    pub source_kind: SourceKind,
    /// Scope name, "singleton" by default
    pub scope: String,
    /// Role within the container
    pub role: Role,
    /// Whether this definition wins ties during injection candidate selection
    pub primary: bool,
    /// Whether this definition may be selected as an injection candidate at all
    pub autowire_eligible: bool,
    /// Names that must be resolved before this one; propagated, not consumed, here
    pub depends_on: Vec<String>,
    /// Whether construction is deferred until first use
    pub lazy_init: bool,
    /// Wrapped target when this definition is a proxy for another
    pub decorated_target: Option<DecoratedTarget>,
    /// Open attribute map for pipeline-internal flags
    pub attributes: HashMap<String, Value>,
    /// Stable source identity, distinct from the registry name
    pub source_ref: Option<String>,
    /// Implementation pointer consumed by the instantiation engine
    pub factory: Option<Arc<FactoryDispatch>>,
    /// Declared extension payload, if this definition contributes a pipeline hook
    pub extension: Option<ExtensionDeclaration>,
}

impl ComponentDefinition {
    /// Create a new definition with default settings
    pub fn new() -> Self {
        Self {
            source_kind: SourceKind::Plain,
            scope: "singleton".to_string(),
            role: Role::Application,
            primary: false,
            autowire_eligible: true,
            depends_on: Vec::new(),
            lazy_init: false,
            decorated_target: None,
            attributes: HashMap::new(),
            source_ref: None,
            factory: None,
            extension: None,
        }
    }

    /// Set the source kind
    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Mark as primary injection candidate
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// Set autowire eligibility
    pub fn with_autowire_eligible(mut self, eligible: bool) -> Self {
        self.autowire_eligible = eligible;
        self
    }

    /// Set the ordered list of names to resolve first
    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Set lazy initialization
    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = lazy;
        self
    }

    /// Set the stable source identity
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    /// Set the factory dispatch implementation pointer
    pub fn with_factory(mut self, factory: Arc<FactoryDispatch>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Attach a declared extension payload
    pub fn with_extension(mut self, extension: ExtensionDeclaration) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Set an attribute, builder style
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set an attribute in place
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get an attribute value
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Check whether an attribute is present
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Read a boolean attribute, treating absence as false
    pub fn bool_attribute(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Check whether this definition is singleton scoped
    pub fn is_singleton(&self) -> bool {
        self.scope == "singleton"
    }
}

impl Default for ComponentDefinition {
    fn default() -> Self {
        Self::new()
    }
}
