use crate::definition::{
    ComponentDefinition, DecoratedTarget, DefinitionRegistry, PRESERVE_TARGET_CLASS_ATTRIBUTE,
    PROXY_TARGET_CLASS_ATTRIBUTE,
};
use crate::errors::BootstrapError;

/// Prefix under which the hidden target of a scoped proxy is registered
pub const TARGET_NAME_PREFIX: &str = "scopedTarget.";

/// Derive the internal name the proxied target is re-registered under
pub fn target_name(original_name: &str) -> String {
    format!("{}{}", TARGET_NAME_PREFIX, original_name)
}

/// Check whether a name refers to the hidden target of a scoped proxy
pub fn is_scoped_target_name(name: &str) -> bool {
    name.starts_with(TARGET_NAME_PREFIX)
}

/// Wrap a definition behind a stable-named scoped proxy
///
/// The target definition is demoted (never an injection candidate in place
/// of the proxy) and re-registered under `scopedTarget.<name>`; the proxy
/// takes over the original name, inheriting the target's primary flag,
/// autowire eligibility and role, and carrying a decorated-target reference
/// to the relocated original. Everything that depends on the original name
/// keeps resolving to the proxy, a stable scope-aware indirection point.
pub fn create_scoped_proxy(
    mut target: ComponentDefinition,
    original_name: &str,
    registry: &mut DefinitionRegistry,
    proxy_target_class: bool,
) -> Result<ComponentDefinition, BootstrapError> {
    let hidden_name = target_name(original_name);

    let mut proxy = ComponentDefinition::new()
        .with_role(target.role)
        .with_primary(target.primary)
        .with_autowire_eligible(target.autowire_eligible);

    if proxy_target_class {
        target.set_attribute(PRESERVE_TARGET_CLASS_ATTRIBUTE, true);
        // The proxy's own proxy-target-class default is true, nothing to record
    } else {
        proxy.set_attribute(PROXY_TARGET_CLASS_ATTRIBUTE, false);
    }

    // The target must be ignored in favor of the proxy
    target.autowire_eligible = false;
    target.primary = false;

    proxy.decorated_target = Some(DecoratedTarget {
        name: hidden_name.clone(),
        definition: Box::new(target.clone()),
    });

    tracing::debug!(
        "Hiding scoped target '{}' behind proxy definition '{}'",
        hidden_name,
        original_name
    );

    registry.register(hidden_name, target)?;
    registry.register(original_name, proxy.clone())?;
    Ok(proxy)
}
