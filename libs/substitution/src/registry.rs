//! Lookup from substitution type name to handler.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::handler::{AddressHandler, SubstitutionHandler};

/// Registered substitution handlers, keyed by type name.
///
/// Built once at startup and shared by reference afterwards. Registration
/// needs `&mut self`, so a registry cannot change while lookups borrow it.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn SubstitutionHandler>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in address handlers.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry
            .register(AddressHandler::ipv4())
            .register(AddressHandler::ipv6());
        registry
    }

    /// Register a handler, replacing any handler with the same type name.
    ///
    /// # Panics
    ///
    /// Panics if the handler's type name is empty.
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: SubstitutionHandler + 'static,
    {
        self.register_arc(Arc::new(handler))
    }

    /// Register a shared handler. See [`Registry::register`].
    pub fn register_arc(&mut self, handler: Arc<dyn SubstitutionHandler>) -> &mut Self {
        let name = handler.type_name().to_string();
        assert!(
            !name.is_empty(),
            "substitution handler registered with an empty type name"
        );

        if self.handlers.insert(name.clone(), handler).is_some() {
            debug!(type_name = %name, "replaced substitution handler");
        } else {
            debug!(type_name = %name, "registered substitution handler");
        }
        self
    }

    /// Look up the handler for a type name.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn SubstitutionHandler>> {
        self.handlers.get(type_name).cloned()
    }

    /// Check if a type name is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{IPV4_ADDRESS, IPV6_ADDRESS};
    use crate::{GlobalState, Identifier, Substitution, SubstitutionError};

    struct Constant {
        name: &'static str,
        value: &'static str,
    }

    impl SubstitutionHandler for Constant {
        fn type_name(&self) -> &str {
            self.name
        }

        fn write_state(
            &self,
            identifier: &Identifier,
            state: &GlobalState,
            substitution: &Substitution,
        ) -> Result<String, SubstitutionError> {
            state.set(identifier, &substitution.key, self.value);
            Ok(self.value.to_string())
        }
    }

    #[test]
    fn test_builtin_handlers() {
        let registry = Registry::with_builtin_handlers();
        assert!(registry.get(IPV4_ADDRESS).is_some());
        assert!(registry.get(IPV6_ADDRESS).is_some());
        assert!(registry.get("doesNotExist").is_none());
        assert_eq!(registry.type_names(), vec![IPV4_ADDRESS, IPV6_ADDRESS]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.get(IPV4_ADDRESS).is_none());
    }

    #[test]
    fn test_reregister_overwrites() {
        let mut registry = Registry::new();
        registry
            .register(Constant {
                name: "zone",
                value: "a",
            })
            .register(Constant {
                name: "zone",
                value: "b",
            });

        assert_eq!(registry.len(), 1);

        let state = GlobalState::new();
        let id = Identifier::new("r0").unwrap();
        let value = registry
            .get("zone")
            .unwrap()
            .write_state(&id, &state, &Substitution::new("zone", "$zone"))
            .unwrap();
        assert_eq!(value, "b");
    }

    #[test]
    fn test_isolated_registries() {
        let mut custom = Registry::with_builtin_handlers();
        custom.register(Constant {
            name: "zone",
            value: "a",
        });

        let builtin = Registry::with_builtin_handlers();
        assert!(custom.contains("zone"));
        assert!(!builtin.contains("zone"));
    }

    #[test]
    #[should_panic(expected = "empty type name")]
    fn test_register_empty_name_panics() {
        Registry::new().register(Constant { name: "", value: "x" });
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}
