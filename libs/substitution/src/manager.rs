//! Per-replica substitution orchestration.

use fleetinit_cloudinit::CloudInitPatcher;
use tracing::{debug, instrument};

use crate::template::replace_tokens;
use crate::{GlobalState, Identifier, Registry, State, Substitution, SubstitutionError};

/// Resolves a replica's substitutions and writes them into cloud-init content.
///
/// Holds no state of its own; allocations live in the [`GlobalState`] passed
/// to each call, so one manager can serve replicas on several threads.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionManager<'a> {
    registry: &'a Registry,
}

impl<'a> SubstitutionManager<'a> {
    /// Create a manager resolving types through `registry`.
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resolve every substitution for `identifier`, in order.
    ///
    /// A value already recorded for `(identifier, key)` is reused; otherwise
    /// the type's handler generates and records one. Declarations, handler
    /// types and handler properties are checked before anything is
    /// generated, so a configuration error never leaves new allocations
    /// behind.
    #[instrument(skip(self, substitutions, state), fields(identifier = %identifier, count = substitutions.len()))]
    pub fn resolve(
        &self,
        identifier: &Identifier,
        substitutions: &[Substitution],
        state: &GlobalState,
    ) -> Result<Vec<State>, SubstitutionError> {
        for substitution in substitutions {
            substitution.validate()?;
            if state.get(identifier, &substitution.key).is_some() {
                continue;
            }
            let handler = self.registry.get(&substitution.type_name).ok_or_else(|| {
                SubstitutionError::UnknownSubstitutionType(substitution.type_name.clone())
            })?;
            handler.check(substitution)?;
        }

        let mut resolved = Vec::with_capacity(substitutions.len());
        for substitution in substitutions {
            let value = match state.get(identifier, &substitution.key) {
                Some(existing) => {
                    debug!(key = %substitution.key, value = %existing, "reusing recorded value");
                    existing
                }
                None => {
                    let handler = self.registry.get(&substitution.type_name).ok_or_else(|| {
                        SubstitutionError::UnknownSubstitutionType(substitution.type_name.clone())
                    })?;
                    handler.write_state(identifier, state, substitution)?
                }
            };
            resolved.push(State::new(substitution.key.clone(), value));
        }

        Ok(resolved)
    }

    /// Resolve substitutions and replace their placeholder tokens in `template`.
    pub fn apply(
        &self,
        identifier: &Identifier,
        substitutions: &[Substitution],
        state: &GlobalState,
        template: &str,
    ) -> Result<String, SubstitutionError> {
        let resolved = self.resolve(identifier, substitutions, state)?;
        Ok(replace_tokens(template, &resolved))
    }

    /// Resolve substitutions into a copy of `patcher`'s document.
    ///
    /// Placeholders are replaced inside each string scalar of the parsed
    /// document, so a value is never reinterpreted as YAML. `patcher` is left
    /// untouched; on error no partially substituted document exists.
    pub fn render(
        &self,
        identifier: &Identifier,
        substitutions: &[Substitution],
        state: &GlobalState,
        patcher: &CloudInitPatcher,
    ) -> Result<CloudInitPatcher, SubstitutionError> {
        let resolved = self.resolve(identifier, substitutions, state)?;
        let mut rendered = patcher.clone();
        rendered.map_strings(|text| replace_tokens(text, &resolved));
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::{SubstitutionHandler, IPV4_ADDRESS, IPV6_ADDRESS};
    use crate::types::CIDR_PROPERTY;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn ipv4(key: &str, cidr: &str) -> Substitution {
        Substitution::new(IPV4_ADDRESS, key)
            .unique()
            .with_property(CIDR_PROPERTY, cidr)
    }

    struct Counter(std::sync::atomic::AtomicUsize);

    impl SubstitutionHandler for Counter {
        fn type_name(&self) -> &str {
            "counter"
        }

        fn write_state(
            &self,
            identifier: &Identifier,
            state: &GlobalState,
            substitution: &Substitution,
        ) -> Result<String, SubstitutionError> {
            let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let value = n.to_string();
            state.set(identifier, &substitution.key, &value);
            Ok(value)
        }
    }

    #[test]
    fn test_resolve_in_order() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();

        let subs = vec![
            ipv4("$ipv4Address", "10.0.0.0/24"),
            Substitution::new(IPV6_ADDRESS, "$ipv6Address")
                .unique()
                .with_property(CIDR_PROPERTY, "fd00:1::/64"),
        ];

        let resolved = manager.resolve(&id("web-0"), &subs, &state).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].key, "$ipv4Address");
        assert_eq!(resolved[1].key, "$ipv6Address");
        assert!(resolved[0].value.starts_with("10.0.0."));
        assert!(resolved[1].value.starts_with("fd00:1:"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![ipv4("$ipv4Address", "10.0.0.0/8")];

        let first = manager.resolve(&id("web-0"), &subs, &state).unwrap();
        let second = manager.resolve(&id("web-0"), &subs, &state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_unique_values_are_reused() {
        let mut registry = Registry::new();
        registry.register_arc(Arc::new(Counter(Default::default())));
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![Substitution::new("counter", "$n")];

        let first = manager.resolve(&id("a"), &subs, &state).unwrap();
        let again = manager.resolve(&id("a"), &subs, &state).unwrap();
        let other = manager.resolve(&id("b"), &subs, &state).unwrap();

        assert_eq!(first[0].value, "0");
        assert_eq!(again[0].value, "0");
        assert_eq!(other[0].value, "1");
    }

    #[test]
    fn test_unknown_type_records_nothing() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![
            ipv4("$ipv4Address", "10.0.0.0/24"),
            Substitution::new("doesNotExist", "$mystery"),
        ];

        let err = manager.resolve(&id("web-0"), &subs, &state).unwrap_err();
        assert_eq!(
            err,
            SubstitutionError::UnknownSubstitutionType("doesNotExist".to_string())
        );
        assert!(state.is_empty());
    }

    #[test]
    fn test_handler_configuration_error_records_nothing() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![
            ipv4("$a", "10.0.0.0/24"),
            Substitution::new(IPV4_ADDRESS, "$b").unique(),
        ];

        let err = manager.resolve(&id("web-0"), &subs, &state).unwrap_err();
        assert_eq!(
            err,
            SubstitutionError::MissingCidr {
                key: "$b".to_string()
            }
        );
        assert!(err.is_configuration_error());
        assert!(state.is_empty());
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn test_invalid_strategy_records_nothing() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![
            ipv4("$a", "10.0.0.0/24"),
            ipv4("$b", "10.1.0.0/24").with_property(crate::STRATEGY_PROPERTY, "roundrobin"),
        ];

        let err = manager.resolve(&id("web-0"), &subs, &state).unwrap_err();
        assert!(matches!(err, SubstitutionError::InvalidProperty { .. }));
        assert!(state.is_empty());
    }

    #[test]
    fn test_invalid_declaration_rejected() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![Substitution::new(IPV4_ADDRESS, "")];

        let err = manager.resolve(&id("web-0"), &subs, &state).unwrap_err();
        assert!(matches!(err, SubstitutionError::InvalidSubstitution { .. }));
    }

    #[test]
    fn test_recorded_value_survives_unregistered_type() {
        let registry = Registry::new();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        state.set(&id("web-0"), "$ipv4Address", "10.0.0.7");

        let subs = vec![ipv4("$ipv4Address", "10.0.0.0/24")];
        let resolved = manager.resolve(&id("web-0"), &subs, &state).unwrap();
        assert_eq!(resolved[0].value, "10.0.0.7");
    }

    #[test]
    fn test_apply_replaces_tokens() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let subs = vec![ipv4("$ipv4Address", "10.9.0.0/16")];

        let out = manager
            .apply(&id("web-0"), &subs, &state, "addr: $ipv4Address\n")
            .unwrap();
        let recorded = state.get(&id("web-0"), "$ipv4Address").unwrap();
        assert_eq!(out, format!("addr: {recorded}\n"));
    }

    #[test]
    fn test_render_leaves_input_untouched() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();

        let mut patcher = CloudInitPatcher::new("").unwrap();
        patcher.patch("hostname", "web-0").set_env("NODE_IP", "$ipv4Address");
        let before = patcher.clone();

        let subs = vec![ipv4("$ipv4Address", "172.16.0.0/12")];
        let rendered = manager
            .render(&id("web-0"), &subs, &state, &patcher)
            .unwrap();

        assert_eq!(patcher, before);
        let ip = state.get(&id("web-0"), "$ipv4Address").unwrap();
        assert_eq!(
            rendered.get_env("NODE_IP").and_then(|v| v.as_str()),
            Some(ip.as_str())
        );
        assert_eq!(
            rendered.get("hostname").and_then(|v| v.as_str()),
            Some("web-0")
        );
    }

    #[test]
    fn test_render_keeps_values_as_strings() {
        let registry = Registry::new();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        state.set(&id("web-0"), "$ip6", "fd00:1:2:3:4:5::");
        state.set(&id("web-0"), "$flag", "true");
        state.set(&id("web-0"), "$port", "123");

        let patcher = CloudInitPatcher::from_document(
            "#cloud-config\nip: $ip6\nroute: $ip6/94\nflag: $flag\nport: $port\n",
        )
        .unwrap();
        let subs = vec![
            Substitution::new(IPV6_ADDRESS, "$ip6"),
            Substitution::new("flag", "$flag"),
            Substitution::new("port", "$port"),
        ];

        let rendered = manager
            .render(&id("web-0"), &subs, &state, &patcher)
            .unwrap();
        let reparsed = CloudInitPatcher::from_document(&rendered.render().unwrap()).unwrap();

        assert_eq!(
            reparsed.get("ip").and_then(|v| v.as_str()),
            Some("fd00:1:2:3:4:5::")
        );
        assert_eq!(
            reparsed.get("route").and_then(|v| v.as_str()),
            Some("fd00:1:2:3:4:5::/94")
        );
        assert_eq!(reparsed.get("flag").and_then(|v| v.as_str()), Some("true"));
        assert_eq!(reparsed.get("port").and_then(|v| v.as_str()), Some("123"));
    }

    #[test]
    fn test_render_exhaustion_is_an_error() {
        let registry = Registry::with_builtin_handlers();
        let manager = SubstitutionManager::new(&registry);
        let state = GlobalState::new();
        let patcher = CloudInitPatcher::from_document("#cloud-config\nip: $ip\n").unwrap();

        let err = manager
            .render(&id("web-0"), &[ipv4("$ip", "10.0.0.0/32")], &state, &patcher)
            .unwrap_err();
        assert!(err.is_exhausted());
    }
}
