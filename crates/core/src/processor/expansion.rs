use crate::definition::{ComponentDefinition, DefinitionRegistry, ProcessedIdentitySet};
use crate::enhance::Enhancer;
use crate::errors::BootstrapError;
use crate::metadata::{MetadataProvider, SourceScanner};
use crate::parser::{DefinitionReader, SourceCandidate, SourceParser, IMPORT_REGISTRY_NAME};
use crate::processor::extension::{FactoryExtension, RegistryExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Attribute marking a definition that was already picked up as a candidate source
pub const CANDIDATE_ATTRIBUTE: &str = "cinder.candidateSource";

/// Registry extension driving source expansion
///
/// Runs the parser/reader pair to a fixed point: parsing candidates may
/// register definitions that are themselves candidate sources, so after each
/// round the registry delta is re-filtered through the metadata provider and
/// any genuinely new source feeds the next round. Its factory-level hook
/// afterwards enhances full-source definitions.
pub struct SourceExpansionExtension {
    provider: Arc<dyn MetadataProvider>,
    scanner: Arc<dyn SourceScanner>,
    proxy_target_class: bool,
    enhancer: Enhancer,
    registries_processed: Mutex<ProcessedIdentitySet>,
    factories_processed: Mutex<ProcessedIdentitySet>,
}

impl SourceExpansionExtension {
    /// Create the expansion extension with its collaborators
    pub fn new(provider: Arc<dyn MetadataProvider>, scanner: Arc<dyn SourceScanner>) -> Self {
        Self {
            provider,
            scanner,
            proxy_target_class: true,
            enhancer: Enhancer::new(),
            registries_processed: Mutex::new(ProcessedIdentitySet::new()),
            factories_processed: Mutex::new(ProcessedIdentitySet::new()),
        }
    }

    /// Set whether scoped proxies preserve the target class
    pub fn with_proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }

    /// Expand all candidate sources currently in the registry to a fixed point
    pub fn process_sources(&self, registry: &mut DefinitionRegistry) -> Result<(), BootstrapError> {
        let mut known_names = registry.names();
        let mut candidates = self.collect_candidates(registry, &known_names)?;
        if candidates.is_empty() {
            return Ok(());
        }
        self.sort_candidates(&mut candidates);

        let provider = Arc::clone(&self.provider);
        let mut parser = SourceParser::new(provider.as_ref());
        let mut already_read: HashSet<String> = HashSet::new();

        loop {
            parser.parse(&candidates)?;
            parser.validate()?;

            let fresh: Vec<_> = parser
                .configuration_units()
                .iter()
                .filter(|unit| !already_read.contains(&unit.source_ref))
                .cloned()
                .collect();
            let added = {
                let mut reader =
                    DefinitionReader::new(registry, self.scanner.as_ref(), self.proxy_target_class);
                reader.load(&fresh)?
            };
            tracing::debug!(
                "Expansion round read {} units, registered {} definitions",
                fresh.len(),
                added
            );
            for unit in &fresh {
                already_read.insert(unit.source_ref.clone());
            }

            candidates.clear();
            let current_names = registry.names();
            if current_names.len() > known_names.len() {
                let old: HashSet<&String> = known_names.iter().collect();
                let new_names: Vec<String> = current_names
                    .iter()
                    .filter(|name| !old.contains(name))
                    .cloned()
                    .collect();
                candidates = self.collect_candidates(registry, &new_names)?;
                candidates.retain(|candidate| !already_read.contains(&candidate.source_ref));
                self.sort_candidates(&mut candidates);
                known_names = current_names;
            }

            if candidates.is_empty() {
                break;
            }
        }

        if !registry.contains_singleton(IMPORT_REGISTRY_NAME) {
            registry.register_singleton(
                IMPORT_REGISTRY_NAME,
                Arc::new(parser.import_registry().clone()),
            );
        }
        Ok(())
    }

    /// Filter a set of names down to genuinely new candidate sources,
    /// marking accepted definitions so later rounds skip them
    fn collect_candidates(
        &self,
        registry: &mut DefinitionRegistry,
        names: &[String],
    ) -> Result<Vec<SourceCandidate>, BootstrapError> {
        let mut candidates = Vec::new();
        for name in names {
            let definition = registry.get(name)?;
            if definition.has_attribute(CANDIDATE_ATTRIBUTE) {
                tracing::debug!("Definition '{}' was already processed as a candidate source", name);
                continue;
            }
            if !self.provider.is_candidate_source(definition) {
                continue;
            }
            let source_ref = match &definition.source_ref {
                Some(source_ref) => source_ref.clone(),
                None => {
                    tracing::warn!(
                        "Definition '{}' matched the candidate predicate but carries no \
                         source identity; skipping",
                        name
                    );
                    continue;
                }
            };
            let factory = definition.factory.clone();
            let kind = self.provider.classify(&source_ref);

            let definition = registry.get_mut(name)?;
            definition.source_kind = kind;
            definition.set_attribute(CANDIDATE_ATTRIBUTE, true);

            let mut candidate = SourceCandidate::new(name.clone(), source_ref);
            if let Some(factory) = factory {
                candidate = candidate.with_factory(factory);
            }
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    /// Stable sort by the declared order hint, unordered candidates last
    fn sort_candidates(&self, candidates: &mut [SourceCandidate]) {
        candidates.sort_by_key(|candidate| {
            self.provider
                .attributes_of(&candidate.source_ref)
                .order
                .unwrap_or(i32::MAX)
        });
    }
}

impl FactoryExtension for SourceExpansionExtension {
    fn name(&self) -> &str {
        "source-expansion"
    }

    fn post_process_factory(
        &self,
        registry: &mut DefinitionRegistry,
    ) -> Result<(), BootstrapError> {
        let token = registry.token();
        self.factories_processed
            .lock()
            .map_err(|_| BootstrapError::LockError {
                resource: "factories_processed".to_string(),
            })?
            .mark(token, "factory post-processing")?;

        let registry_pass_done = self
            .registries_processed
            .lock()
            .map_err(|_| BootstrapError::LockError {
                resource: "registries_processed".to_string(),
            })?
            .contains(token);
        if !registry_pass_done {
            // Registry-level hook apparently not supported by the embedder;
            // expand sources lazily at this point instead
            self.process_sources(registry)?;
        }

        self.enhancer.enhance_registry(registry)?;
        Ok(())
    }
}

impl RegistryExtension for SourceExpansionExtension {
    fn post_process_registry(
        &self,
        registry: &mut DefinitionRegistry,
    ) -> Result<(), BootstrapError> {
        let token = registry.token();
        if self
            .factories_processed
            .lock()
            .map_err(|_| BootstrapError::LockError {
                resource: "factories_processed".to_string(),
            })?
            .contains(token)
        {
            return Err(BootstrapError::already_processed(format!(
                "factory post-processing for registry {}",
                token
            )));
        }
        self.registries_processed
            .lock()
            .map_err(|_| BootstrapError::LockError {
                resource: "registries_processed".to_string(),
            })?
            .mark(token, "source expansion")?;
        self.process_sources(registry)
    }
}

impl std::fmt::Debug for SourceExpansionExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceExpansionExtension")
            .field("proxy_target_class", &self.proxy_target_class)
            .finish()
    }
}
