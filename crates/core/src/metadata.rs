use crate::definition::{ComponentDefinition, Role, SourceKind};
use crate::enhance::FactoryDispatch;
use crate::errors::BootstrapError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Structured attributes extracted from a component source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttributes {
    pub scope: String,
    pub depends_on: Vec<String>,
    pub lazy_init: bool,
    pub role: Role,
    pub order: Option<i32>,
    pub primary: bool,
}

impl Default for SourceAttributes {
    fn default() -> Self {
        Self {
            scope: "singleton".to_string(),
            depends_on: Vec::new(),
            lazy_init: false,
            role: Role::Application,
            order: None,
            primary: false,
        }
    }
}

/// Declaration of one factory method on a component source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryMethodDecl {
    /// Method name; the produced definition is registered under it
    pub name: String,
    pub scope: String,
    pub lazy_init: bool,
    pub depends_on: Vec<String>,
    /// Whether the method can be intercepted by enhancement; a
    /// non-overridable method on a full source is an illegal modifier
    pub overridable: bool,
    /// Whether a non-singleton declaration should be hidden behind a scoped proxy
    pub scoped_proxy: bool,
    /// Source identity of the produced component, when it is itself a source
    pub source_ref: Option<String>,
}

impl FactoryMethodDecl {
    /// Create a declaration with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: "singleton".to_string(),
            lazy_init: false,
            depends_on: Vec::new(),
            overridable: true,
            scoped_proxy: false,
            source_ref: None,
        }
    }

    /// Set the declared scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set lazy initialization
    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = lazy;
        self
    }

    /// Set the names to resolve first
    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Mark the method as non-overridable (illegal on full sources)
    pub fn with_overridable(mut self, overridable: bool) -> Self {
        self.overridable = overridable;
        self
    }

    /// Request a scoped proxy for non-singleton scopes
    pub fn with_scoped_proxy(mut self, scoped_proxy: bool) -> Self {
        self.scoped_proxy = scoped_proxy;
        self
    }

    /// Mark the produced component as itself being a source
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }
}

/// Nested declarations carried by a component source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDeclarations {
    /// Other sources to fold into the configuration model
    pub imports: Vec<String>,
    /// Factory methods that become new definitions
    pub factory_methods: Vec<FactoryMethodDecl>,
    /// Scan bases handed to the scanning collaborator
    pub component_scans: Vec<String>,
}

impl SourceDeclarations {
    /// Create an empty declaration set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an import
    pub fn with_import(mut self, source_ref: impl Into<String>) -> Self {
        self.imports.push(source_ref.into());
        self
    }

    /// Add a factory-method declaration
    pub fn with_factory_method(mut self, decl: FactoryMethodDecl) -> Self {
        self.factory_methods.push(decl);
        self
    }

    /// Add a component-scan declaration
    pub fn with_component_scan(mut self, base: impl Into<String>) -> Self {
        self.component_scans.push(base.into());
        self
    }

    /// Check whether the source declares nothing
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.factory_methods.is_empty() && self.component_scans.is_empty()
    }
}

/// Metadata/reflection collaborator, consumed but never implemented by this core
///
/// Given a stable source identity, the provider answers what kind of source
/// it is, which attributes it declares, and which nested declarations it
/// carries.
pub trait MetadataProvider: Send + Sync {
    /// Classify a source by its expansion behavior
    fn classify(&self, source_ref: &str) -> SourceKind;

    /// Structured attributes declared on a source
    fn attributes_of(&self, source_ref: &str) -> SourceAttributes;

    /// Nested declarations carried by a source
    fn declarations_of(&self, source_ref: &str) -> SourceDeclarations;

    /// Resolve the factory dispatch standing in for a source's implementation type
    fn factory_of(&self, _source_ref: &str) -> Option<Arc<FactoryDispatch>> {
        None
    }

    /// Check whether a registered definition is a candidate component source
    fn is_candidate_source(&self, definition: &ComponentDefinition) -> bool {
        match &definition.source_ref {
            Some(source_ref) => !self.classify(source_ref).is_plain(),
            None => false,
        }
    }
}

/// Scanning collaborator for component-scan declarations
pub trait SourceScanner: Send + Sync {
    /// Expand a scan base into candidate (name, definition) pairs
    fn scan(&self, base: &str) -> Result<Vec<(String, ComponentDefinition)>, BootstrapError>;
}

/// Scanner that finds nothing, for embedders without a scanning collaborator
#[derive(Debug, Default)]
pub struct NoOpScanner;

impl SourceScanner for NoOpScanner {
    fn scan(&self, base: &str) -> Result<Vec<(String, ComponentDefinition)>, BootstrapError> {
        tracing::warn!("No scanner configured; ignoring component scan of '{}'", base);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider;

    impl MetadataProvider for StubProvider {
        fn classify(&self, source_ref: &str) -> SourceKind {
            if source_ref.ends_with("Config") {
                SourceKind::FullSource
            } else {
                SourceKind::Plain
            }
        }

        fn attributes_of(&self, _source_ref: &str) -> SourceAttributes {
            SourceAttributes::default()
        }

        fn declarations_of(&self, _source_ref: &str) -> SourceDeclarations {
            SourceDeclarations::new()
        }
    }

    #[test]
    fn test_default_candidate_predicate() {
        let provider = StubProvider;

        let config = ComponentDefinition::new().with_source_ref("AppConfig");
        assert!(provider.is_candidate_source(&config));

        let plain_ref = ComponentDefinition::new().with_source_ref("Widget");
        assert!(!provider.is_candidate_source(&plain_ref));

        let no_ref = ComponentDefinition::new();
        assert!(!provider.is_candidate_source(&no_ref));
    }

    #[test]
    fn test_declarations_builder() {
        let decls = SourceDeclarations::new()
            .with_import("OtherConfig")
            .with_factory_method(FactoryMethodDecl::new("widget").with_scope("session"))
            .with_component_scan("com.example");

        assert!(!decls.is_empty());
        assert_eq!(decls.imports, vec!["OtherConfig"]);
        assert_eq!(decls.factory_methods[0].name, "widget");
        assert_eq!(decls.factory_methods[0].scope, "session");
        assert!(decls.factory_methods[0].overridable);
        assert_eq!(decls.component_scans, vec!["com.example"]);
    }

    #[test]
    fn test_noop_scanner() {
        let scanner = NoOpScanner;
        assert!(scanner.scan("anything").unwrap().is_empty());
    }
}
