use crate::definition::{DefinitionRegistry, PRESERVE_TARGET_CLASS_ATTRIBUTE};
use crate::errors::BootstrapError;
use std::any::Any;
use std::sync::Arc;

/// Handle to a constructed component instance
pub type ComponentInstance = Arc<dyn Any + Send + Sync>;

/// A factory method body; receives an invocation context for sibling calls
pub type FactoryFn =
    Arc<dyn Fn(&mut FactoryInvocation<'_>) -> Result<ComponentInstance, BootstrapError> + Send + Sync>;

/// Declarative dispatch table standing in for a source's implementation type
///
/// Built at pipeline time instead of generating code at runtime: each factory
/// method is an entry mapping the method (and component) name to a closure.
/// A plain dispatch executes method bodies directly, constructing a fresh
/// object on every call. An enhanced dispatch first consults the registry's
/// singleton store, so repeated calls return the same managed instance.
pub struct FactoryDispatch {
    type_name: String,
    methods: Vec<(String, FactoryFn)>,
    enhanced: bool,
}

impl FactoryDispatch {
    /// Create an empty dispatch table for the named implementation type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            methods: Vec::new(),
            enhanced: false,
        }
    }

    /// Add a factory method, builder style
    pub fn with_method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut FactoryInvocation<'_>) -> Result<ComponentInstance, BootstrapError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.push((name.into(), Arc::new(body)));
        self
    }

    /// Implementation type name represented by this dispatch
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Check whether factory calls are routed through the registry
    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    /// Names of all declared factory methods, in declaration order
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn method(&self, name: &str) -> Option<&FactoryFn> {
        self.methods
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, body)| body)
    }

    /// Invoke a factory method against the given registry
    ///
    /// Enhanced dispatches look up (or memoize into) the registry's singleton
    /// store under the method name; plain dispatches construct fresh objects.
    pub fn invoke(
        &self,
        method: &str,
        registry: &mut DefinitionRegistry,
    ) -> Result<ComponentInstance, BootstrapError> {
        let body = self
            .method(method)
            .ok_or_else(|| BootstrapError::UnknownFactoryMethod {
                type_name: self.type_name.clone(),
                method: method.to_string(),
            })?;

        if self.enhanced {
            if let Some(existing) = registry.get_singleton(method) {
                tracing::trace!(
                    "Returning existing instance for factory method '{}' on '{}'",
                    method,
                    self.type_name
                );
                return Ok(existing);
            }
        }

        let mut invocation = FactoryInvocation {
            dispatch: self,
            registry,
        };
        let instance = body(&mut invocation)?;

        if self.enhanced {
            registry.register_singleton(method, Arc::clone(&instance));
        }
        Ok(instance)
    }
}

impl std::fmt::Debug for FactoryDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryDispatch")
            .field("type_name", &self.type_name)
            .field("methods", &self.method_names())
            .field("enhanced", &self.enhanced)
            .finish()
    }
}

/// Execution context handed to factory method bodies
///
/// Sibling calls made through [`FactoryInvocation::call`] re-enter the owning
/// dispatch, so on an enhanced dispatch they resolve through the registry
/// instead of executing as plain constructions.
pub struct FactoryInvocation<'a> {
    dispatch: &'a FactoryDispatch,
    registry: &'a mut DefinitionRegistry,
}

impl<'a> FactoryInvocation<'a> {
    /// Call a sibling factory method on the same dispatch
    pub fn call(&mut self, method: &str) -> Result<ComponentInstance, BootstrapError> {
        self.dispatch.invoke(method, self.registry)
    }

    /// Read access to the registry during construction
    pub fn registry(&self) -> &DefinitionRegistry {
        self.registry
    }
}

/// Rewrites full-source definitions so factory calls route through the registry
///
/// Works on the declarative dispatch tables directly; no runtime code
/// generation is involved.
#[derive(Debug, Default)]
pub struct Enhancer;

impl Enhancer {
    /// Create a new enhancer
    pub fn new() -> Self {
        Self
    }

    /// Produce the enhanced counterpart of a dispatch table
    ///
    /// Already-enhanced dispatches are returned unchanged, so repeated
    /// enhancement is safe.
    pub fn enhance(&self, dispatch: &Arc<FactoryDispatch>) -> Arc<FactoryDispatch> {
        if dispatch.enhanced {
            return Arc::clone(dispatch);
        }
        Arc::new(FactoryDispatch {
            type_name: format!("{}$$enhanced", dispatch.type_name),
            methods: dispatch.methods.clone(),
            enhanced: true,
        })
    }

    /// Enhance every full-source definition in the registry
    ///
    /// Lite and plain definitions are skipped, never attempted. Returns the
    /// number of definitions whose implementation pointer was rewritten.
    pub fn enhance_registry(
        &self,
        registry: &mut DefinitionRegistry,
    ) -> Result<usize, BootstrapError> {
        let mut targets = Vec::new();
        for name in registry.names() {
            if registry.get(&name)?.source_kind.is_full() {
                targets.push(name);
            }
        }
        if targets.is_empty() {
            return Ok(0);
        }

        let mut rewritten = 0;
        for name in targets {
            if registry.contains_singleton(&name) {
                tracing::info!(
                    "Cannot cleanly enhance definition '{}' since its instance was created too \
                     early; factory methods may already have run without registry routing",
                    name
                );
            }
            let definition = registry.get_mut(&name)?;
            let dispatch = definition.factory.clone().ok_or_else(|| {
                BootstrapError::enhancement_failed(
                    &name,
                    "no factory dispatch resolvable for source",
                )
            })?;
            let enhanced = self.enhance(&dispatch);
            if !Arc::ptr_eq(&enhanced, &dispatch) {
                tracing::trace!(
                    "Replacing dispatch '{}' of definition '{}' with enhanced dispatch",
                    dispatch.type_name(),
                    name
                );
                definition.factory = Some(enhanced);
                rewritten += 1;
            }
            // An enhanced source must always be proxied by target class
            definition.set_attribute(PRESERVE_TARGET_CLASS_ATTRIBUTE, true);
        }
        Ok(rewritten)
    }
}
