use crate::definition::SourceKind;
use crate::enhance::FactoryDispatch;
use crate::errors::BootstrapError;
use crate::metadata::MetadataProvider;
use crate::parser::model::{ConfigurationUnit, ImportRegistry, SourceCandidate};
use std::collections::HashSet;
use std::sync::Arc;

/// Expands candidate component sources into a resolved configuration model
///
/// Imports are resolved depth-first with an explicit stack; a source that is
/// already on the stack indicates a cyclic import chain and fails the whole
/// parse round. Each source is parsed exactly once, matched by its stable
/// source identity rather than by registry name.
pub struct SourceParser<'a> {
    provider: &'a dyn MetadataProvider,
    units: Vec<ConfigurationUnit>,
    parsed_refs: HashSet<String>,
    import_stack: Vec<String>,
    import_registry: ImportRegistry,
}

impl<'a> SourceParser<'a> {
    /// Create a parser backed by the given metadata provider
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self {
            provider,
            units: Vec::new(),
            parsed_refs: HashSet::new(),
            import_stack: Vec::new(),
            import_registry: ImportRegistry::new(),
        }
    }

    /// Parse a batch of candidates, folding in transitively imported sources
    ///
    /// May be called repeatedly across fixed-point rounds; sources parsed in
    /// an earlier round are skipped.
    pub fn parse(&mut self, candidates: &[SourceCandidate]) -> Result<(), BootstrapError> {
        for candidate in candidates {
            self.parse_source(
                &candidate.source_ref,
                Some(candidate.name.clone()),
                candidate.factory.clone(),
                None,
            )?;
        }
        debug_assert!(self.import_stack.is_empty());
        Ok(())
    }

    fn parse_source(
        &mut self,
        source_ref: &str,
        registry_name: Option<String>,
        factory: Option<Arc<FactoryDispatch>>,
        imported_by: Option<String>,
    ) -> Result<(), BootstrapError> {
        if self.import_stack.iter().any(|s| s == source_ref) {
            let mut chain = self.import_stack.clone();
            chain.push(source_ref.to_string());
            return Err(BootstrapError::circular_import(&chain));
        }
        if self.parsed_refs.contains(source_ref) {
            // Already folded in through another path; only the import
            // association is worth remembering
            if let Some(importer) = imported_by {
                self.import_registry.record(source_ref, importer);
            }
            return Ok(());
        }

        let kind = self.provider.classify(source_ref);
        let attributes = self.provider.attributes_of(source_ref);
        let declarations = self.provider.declarations_of(source_ref);
        tracing::debug!(
            "Parsing {} source '{}' ({} imports, {} factory methods, {} scans)",
            kind,
            source_ref,
            declarations.imports.len(),
            declarations.factory_methods.len(),
            declarations.component_scans.len()
        );

        self.import_stack.push(source_ref.to_string());
        for import in &declarations.imports {
            self.import_registry.record(import.clone(), source_ref);
            let imported_factory = self.provider.factory_of(import);
            self.parse_source(import, None, imported_factory, Some(source_ref.to_string()))?;
        }
        self.import_stack.pop();

        if let Some(importer) = imported_by {
            self.import_registry.record(source_ref, importer.clone());
        }
        self.parsed_refs.insert(source_ref.to_string());
        self.units.push(ConfigurationUnit {
            source_ref: source_ref.to_string(),
            registry_name,
            kind,
            attributes,
            declarations,
            imported_by: self
                .import_registry
                .importing_source_for(source_ref)
                .map(str::to_string),
            factory: factory.or_else(|| self.provider.factory_of(source_ref)),
        });
        Ok(())
    }

    /// Validate the parsed configuration model
    ///
    /// A full source whose factory method cannot be intercepted (declared
    /// non-overridable) is illegal: enhancement could not route its calls
    /// through the registry.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        for unit in &self.units {
            if unit.kind != SourceKind::FullSource {
                continue;
            }
            for method in &unit.declarations.factory_methods {
                if !method.overridable {
                    return Err(BootstrapError::validation(format!(
                        "factory method '{}' on source '{}' must be overridable to be \
                         intercepted by enhancement",
                        method.name, unit.source_ref
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parsed configuration units, in discovery order
    pub fn configuration_units(&self) -> &[ConfigurationUnit] {
        &self.units
    }

    /// Import associations collected so far
    pub fn import_registry(&self) -> &ImportRegistry {
        &self.import_registry
    }
}
