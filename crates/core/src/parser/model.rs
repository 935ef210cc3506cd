use crate::definition::SourceKind;
use crate::enhance::FactoryDispatch;
use crate::metadata::{SourceAttributes, SourceDeclarations};
use std::collections::HashMap;
use std::sync::Arc;

/// Singleton name under which the import registry is published after parsing
pub const IMPORT_REGISTRY_NAME: &str = "cinder.internal.importRegistry";

/// A candidate component source handed to the parser
#[derive(Debug, Clone)]
pub struct SourceCandidate {
    /// Registry name the candidate definition is registered under
    pub name: String,
    /// Stable source identity
    pub source_ref: String,
    /// Factory dispatch carried by the candidate definition, if any
    pub factory: Option<Arc<FactoryDispatch>>,
}

impl SourceCandidate {
    /// Create a candidate without a factory dispatch
    pub fn new(name: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_ref: source_ref.into(),
            factory: None,
        }
    }

    /// Attach the candidate definition's factory dispatch
    pub fn with_factory(mut self, factory: Arc<FactoryDispatch>) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// One expanded unit of the resolved configuration model
#[derive(Debug, Clone)]
pub struct ConfigurationUnit {
    /// Stable source identity
    pub source_ref: String,
    /// Registry name of the originating definition; `None` for units reached
    /// only through an import, which the reader registers itself
    pub registry_name: Option<String>,
    /// Classification of the source
    pub kind: SourceKind,
    /// Declared attributes
    pub attributes: SourceAttributes,
    /// Nested declarations to expand
    pub declarations: SourceDeclarations,
    /// Source that caused this one to be included, if imported
    pub imported_by: Option<String>,
    /// Factory dispatch backing this source's factory methods
    pub factory: Option<Arc<FactoryDispatch>>,
}

/// Mapping from an imported source to the source that imported it
///
/// Built during one parser run, published once into the registry as a
/// singleton value, and read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    imports: HashMap<String, String>,
}

impl ImportRegistry {
    /// Create an empty import registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `imported` was pulled in by `importing`
    ///
    /// The first importer wins; later duplicate imports of the same source
    /// do not rewrite the association.
    pub fn record(&mut self, imported: impl Into<String>, importing: impl Into<String>) {
        self.imports.entry(imported.into()).or_insert(importing.into());
    }

    /// Source that caused the given source to be included, if any
    pub fn importing_source_for(&self, source_ref: &str) -> Option<&str> {
        self.imports.get(source_ref).map(String::as_str)
    }

    /// Check whether a source was included through an import
    pub fn is_imported(&self, source_ref: &str) -> bool {
        self.imports.contains_key(source_ref)
    }

    /// Number of recorded import associations
    pub fn len(&self) -> usize {
        self.imports.len()
    }

    /// Check whether no imports were recorded
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}
