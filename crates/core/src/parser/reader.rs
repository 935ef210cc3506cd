use crate::definition::{
    ComponentDefinition, DefinitionRegistry, FACTORY_METHOD_ATTRIBUTE, FACTORY_SOURCE_ATTRIBUTE,
};
use crate::errors::BootstrapError;
use crate::metadata::{FactoryMethodDecl, SourceScanner};
use crate::parser::model::ConfigurationUnit;
use crate::scope::create_scoped_proxy;

/// Converts a resolved configuration model into concrete registry entries
pub struct DefinitionReader<'a> {
    registry: &'a mut DefinitionRegistry,
    scanner: &'a dyn SourceScanner,
    proxy_target_class: bool,
}

impl<'a> DefinitionReader<'a> {
    /// Create a reader targeting the given registry
    pub fn new(
        registry: &'a mut DefinitionRegistry,
        scanner: &'a dyn SourceScanner,
        proxy_target_class: bool,
    ) -> Self {
        Self {
            registry,
            scanner,
            proxy_target_class,
        }
    }

    /// Register definitions for a batch of configuration units
    ///
    /// Returns the number of definitions added to the registry.
    pub fn load(&mut self, units: &[ConfigurationUnit]) -> Result<usize, BootstrapError> {
        let before = self.registry.count();
        for unit in units {
            self.load_unit(unit)?;
        }
        Ok(self.registry.count().saturating_sub(before))
    }

    fn load_unit(&mut self, unit: &ConfigurationUnit) -> Result<(), BootstrapError> {
        if unit.registry_name.is_none() && unit.imported_by.is_some() {
            self.register_imported_unit(unit)?;
        }

        for base in &unit.declarations.component_scans {
            let scanned = self.scanner.scan(base).map_err(|err| match err {
                BootstrapError::ScanFailed { .. } => err,
                other => BootstrapError::scan_failed(base, other.to_string()),
            })?;
            for (name, definition) in scanned {
                tracing::debug!("Registering scanned definition '{}'", name);
                self.registry.register(name, definition)?;
            }
        }

        for method in &unit.declarations.factory_methods {
            self.register_factory_method(unit, method)?;
        }
        Ok(())
    }

    /// A source reached only through an import gets registered itself, under
    /// its stable source identity
    fn register_imported_unit(&mut self, unit: &ConfigurationUnit) -> Result<(), BootstrapError> {
        let attrs = &unit.attributes;
        let mut definition = ComponentDefinition::new()
            .with_source_kind(unit.kind)
            .with_source_ref(&unit.source_ref)
            .with_scope(&attrs.scope)
            .with_role(attrs.role)
            .with_primary(attrs.primary)
            .with_lazy_init(attrs.lazy_init)
            .with_depends_on(attrs.depends_on.clone());
        if let Some(factory) = &unit.factory {
            definition = definition.with_factory(factory.clone());
        }
        tracing::debug!(
            "Registering imported source '{}' (imported by '{}')",
            unit.source_ref,
            unit.imported_by.as_deref().unwrap_or("?")
        );
        self.registry.register(unit.source_ref.clone(), definition)
    }

    fn register_factory_method(
        &mut self,
        unit: &ConfigurationUnit,
        method: &FactoryMethodDecl,
    ) -> Result<(), BootstrapError> {
        let mut definition = ComponentDefinition::new()
            .with_scope(&method.scope)
            .with_lazy_init(method.lazy_init)
            .with_depends_on(method.depends_on.clone())
            .with_attribute(FACTORY_METHOD_ATTRIBUTE, method.name.clone())
            .with_attribute(FACTORY_SOURCE_ATTRIBUTE, unit.source_ref.clone());
        if let Some(source_ref) = &method.source_ref {
            definition = definition.with_source_ref(source_ref.clone());
        }
        if let Some(factory) = &unit.factory {
            definition = definition.with_factory(factory.clone());
        }

        if method.scope != "singleton" && method.scoped_proxy {
            tracing::debug!(
                "Wrapping '{}' ({} scope) behind a scoped proxy",
                method.name,
                method.scope
            );
            create_scoped_proxy(
                definition,
                &method.name,
                self.registry,
                self.proxy_target_class,
            )?;
            Ok(())
        } else {
            self.registry.register(method.name.clone(), definition)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::SourceKind;
    use crate::enhance::FactoryDispatch;
    use crate::metadata::{NoOpScanner, SourceAttributes, SourceDeclarations};
    use crate::scope::is_scoped_target_name;
    use std::sync::Arc;

    fn unit_with(declarations: SourceDeclarations) -> ConfigurationUnit {
        ConfigurationUnit {
            source_ref: "AppConfig".to_string(),
            registry_name: Some("app".to_string()),
            kind: SourceKind::FullSource,
            attributes: SourceAttributes::default(),
            declarations,
            imported_by: None,
            factory: Some(Arc::new(FactoryDispatch::new("AppConfig"))),
        }
    }

    struct FixedScanner;

    impl SourceScanner for FixedScanner {
        fn scan(
            &self,
            _base: &str,
        ) -> Result<Vec<(String, ComponentDefinition)>, BootstrapError> {
            Ok(vec![("scanned".to_string(), ComponentDefinition::new())])
        }
    }

    #[test]
    fn test_factory_methods_become_definitions() {
        let mut registry = DefinitionRegistry::new();
        let scanner = NoOpScanner;
        let unit = unit_with(
            SourceDeclarations::new()
                .with_factory_method(FactoryMethodDecl::new("widget").with_lazy_init(true))
                .with_factory_method(
                    FactoryMethodDecl::new("gadget").with_depends_on(vec!["widget".to_string()]),
                ),
        );

        let mut reader = DefinitionReader::new(&mut registry, &scanner, true);
        let added = reader.load(&[unit]).unwrap();
        assert_eq!(added, 2);

        let widget = registry.get("widget").unwrap();
        assert!(widget.lazy_init);
        assert_eq!(
            widget.attribute(FACTORY_SOURCE_ATTRIBUTE),
            Some(&serde_json::json!("AppConfig"))
        );
        assert!(widget.factory.is_some());

        let gadget = registry.get("gadget").unwrap();
        assert_eq!(gadget.depends_on, vec!["widget"]);
    }

    #[test]
    fn test_non_singleton_declaration_gets_proxied() {
        let mut registry = DefinitionRegistry::new();
        let scanner = NoOpScanner;
        let unit = unit_with(SourceDeclarations::new().with_factory_method(
            FactoryMethodDecl::new("cart")
                .with_scope("session")
                .with_scoped_proxy(true),
        ));

        let mut reader = DefinitionReader::new(&mut registry, &scanner, true);
        reader.load(&[unit]).unwrap();

        let proxy = registry.get("cart").unwrap();
        let decorated = proxy.decorated_target.as_ref().unwrap();
        assert!(is_scoped_target_name(&decorated.name));
        assert!(!registry.get("scopedTarget.cart").unwrap().autowire_eligible);
    }

    struct BrokenScanner;

    impl SourceScanner for BrokenScanner {
        fn scan(
            &self,
            _base: &str,
        ) -> Result<Vec<(String, ComponentDefinition)>, BootstrapError> {
            Err(BootstrapError::validation("filesystem unavailable"))
        }
    }

    #[test]
    fn test_scanner_failure_carries_scan_base() {
        let mut registry = DefinitionRegistry::new();
        let scanner = BrokenScanner;
        let unit = unit_with(SourceDeclarations::new().with_component_scan("com.example"));

        let mut reader = DefinitionReader::new(&mut registry, &scanner, true);
        let err = reader.load(&[unit]).unwrap_err();

        match err {
            BootstrapError::ScanFailed { base, message } => {
                assert_eq!(base, "com.example");
                assert!(message.contains("filesystem unavailable"));
            }
            other => panic!("expected scan failure, got {other}"),
        }
    }

    #[test]
    fn test_scan_declarations_use_scanner() {
        let mut registry = DefinitionRegistry::new();
        let scanner = FixedScanner;
        let unit = unit_with(SourceDeclarations::new().with_component_scan("com.example"));

        let mut reader = DefinitionReader::new(&mut registry, &scanner, true);
        let added = reader.load(&[unit]).unwrap();

        assert_eq!(added, 1);
        assert!(registry.contains("scanned"));
    }

    #[test]
    fn test_imported_unit_registered_under_source_ref() {
        let mut registry = DefinitionRegistry::new();
        let scanner = NoOpScanner;
        let unit = ConfigurationUnit {
            source_ref: "DbConfig".to_string(),
            registry_name: None,
            kind: SourceKind::FullSource,
            attributes: SourceAttributes::default(),
            declarations: SourceDeclarations::new(),
            imported_by: Some("AppConfig".to_string()),
            factory: None,
        };

        let mut reader = DefinitionReader::new(&mut registry, &scanner, true);
        reader.load(&[unit]).unwrap();

        let imported = registry.get("DbConfig").unwrap();
        assert_eq!(imported.source_kind, SourceKind::FullSource);
        assert_eq!(imported.source_ref.as_deref(), Some("DbConfig"));
    }
}
