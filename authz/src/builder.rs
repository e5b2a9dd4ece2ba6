//! Builds an ACL from per-controller method maps.
//!
//! The base policy is an allow for every role on every resource. With
//! `deny_by_default` the `guest` role is then denied everything. Configured
//! rules only ever move a guest away from the base policy: under an open
//! policy they deny, under a closed one they allow.

use authn::request::{normalize_action, normalize_controller};
use authn::GUEST_ROLE;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::acl::{Acl, RuleType};
use crate::authorization::AclAuthorization;
use crate::error::{AuthzError, Result};

/// Methods a `default` flag stands for, in the order rules are emitted.
pub const REST_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Key applying a flag to every entry of [`REST_METHODS`].
pub const DEFAULT_KEY: &str = "default";

/// HTTP method (or `default`) to "guests may do this" flag.
pub type MethodMap = BTreeMap<String, bool>;

/// Rules for one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRules {
    /// RPC-style rules keyed by action name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, MethodMap>,
    /// REST rules for requests without an identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<MethodMap>,
    /// REST rules for requests with an identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<MethodMap>,
}

/// The methods in `map` that deviate from the base policy.
///
/// A flag deviates when it disagrees with the policy: `false` under an open
/// policy, `true` under a closed one. `default` seeds all of
/// [`REST_METHODS`] when it deviates; individual flags then add methods that
/// deviate and drop methods that agree.
pub fn privileges(map: &MethodMap, deny_by_default: bool) -> Result<Vec<String>> {
    let deviates = |flag: bool| flag == deny_by_default;
    let mut result: Vec<String> = Vec::new();

    if let Some((_, flag)) = map
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(DEFAULT_KEY))
    {
        if deviates(*flag) {
            result.extend(REST_METHODS.iter().map(|method| method.to_string()));
        }
    }

    for (key, flag) in map {
        if key.eq_ignore_ascii_case(DEFAULT_KEY) {
            continue;
        }
        let method = key.to_ascii_uppercase();
        Method::from_bytes(method.as_bytes())
            .map_err(|_| AuthzError::InvalidRule(format!("\"{key}\" is not an HTTP method")))?;

        if deviates(*flag) {
            if !result.contains(&method) {
                result.push(method);
            }
        } else {
            result.retain(|existing| *existing != method);
        }
    }

    result.sort_by_key(|method| {
        REST_METHODS
            .iter()
            .position(|rest| rest == method)
            .unwrap_or(REST_METHODS.len())
    });
    Ok(result)
}

/// Builds the ACL for `rules` under the given base policy.
pub fn build_acl(rules: &BTreeMap<String, ControllerRules>, deny_by_default: bool) -> Result<Acl> {
    let mut acl = Acl::new();
    acl.add_role(GUEST_ROLE, &[])?;
    acl.allow(None, None, &[])?;
    if deny_by_default {
        acl.deny(Some(GUEST_ROLE), None, &[])?;
    }
    let grant = if deny_by_default {
        RuleType::Allow
    } else {
        RuleType::Deny
    };

    for (controller, controller_rules) in rules {
        let controller = normalize_controller(controller);

        let mut entries: Vec<(String, &MethodMap)> = controller_rules
            .actions
            .iter()
            .map(|(action, map)| (format!("{controller}::{}", normalize_action(action)), map))
            .collect();
        if let Some(map) = &controller_rules.collection {
            entries.push((format!("{controller}::collection"), map));
        }
        if let Some(map) = &controller_rules.entity {
            entries.push((format!("{controller}::entity"), map));
        }

        for (resource, map) in entries {
            if !acl.has_resource(&resource) {
                acl.add_resource(&resource, None)?;
            }
            let methods = privileges(map, deny_by_default)?;
            if methods.is_empty() {
                debug!(resource = %resource, "No rule deviates from the base policy");
                continue;
            }
            let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
            debug!(resource = %resource, rule = %grant, methods = ?methods, "Adding guest rule");
            acl.set_rule(grant, Some(GUEST_ROLE), Some(&resource), &methods)?;
        }
    }

    info!(
        deny_by_default,
        resources = acl.resources().len(),
        "Built authorization ACL"
    );
    Ok(acl)
}

/// [`build_acl`] wrapped for concurrent use.
pub fn build(rules: &BTreeMap<String, ControllerRules>, deny_by_default: bool) -> Result<AclAuthorization> {
    build_acl(rules, deny_by_default).map(AclAuthorization::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Authorization;
    use authn::{AuthenticatedIdentity, Identity};
    use rstest::rstest;
    use serde_json::json;

    fn methods(pairs: &[(&str, bool)]) -> MethodMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[rstest]
    #[case(&[("default", true), ("GET", false)], false, &["GET"])]
    #[case(&[("default", false)], false, &["GET", "POST", "PUT", "PATCH", "DELETE"])]
    #[case(&[("default", false), ("GET", true)], false, &["POST", "PUT", "PATCH", "DELETE"])]
    #[case(&[("default", true)], false, &[])]
    #[case(&[("POST", true)], true, &["POST"])]
    #[case(&[("POST", false)], true, &[])]
    #[case(&[("default", true), ("delete", false)], true, &["GET", "POST", "PUT", "PATCH"])]
    #[case(&[("OPTIONS", true), ("GET", true)], true, &["GET", "OPTIONS"])]
    fn test_privilege_derivation(
        #[case] flags: &[(&str, bool)],
        #[case] deny_by_default: bool,
        #[case] expected: &[&str],
    ) {
        assert_eq!(privileges(&methods(flags), deny_by_default).unwrap(), expected);
    }

    #[test]
    fn test_invalid_method_rejected() {
        let result = privileges(&methods(&[("GE T", true)]), false);
        assert!(matches!(result, Err(AuthzError::InvalidRule(_))));
    }

    #[rstest]
    #[case("Foo-Bar-Controller", "Foo\\Bar\\Controller")]
    #[case("Foo.Bar.Controller", "Foo\\Bar\\Controller")]
    #[case("Foo\\Bar\\Controller", "Foo\\Bar\\Controller")]
    fn test_normalize_controller(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_controller(input), expected);
    }

    #[test]
    fn test_open_policy_without_rules_allows_everything() {
        let authz = build(&BTreeMap::new(), false).unwrap();
        for identity in [Identity::guest(), user("alice")] {
            for method in REST_METHODS {
                assert!(authz.is_authorized(&identity, "Any::thing", method).unwrap());
            }
        }
    }

    #[test]
    fn test_closed_policy_without_rules_denies_guest() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "Users-Controller".to_string(),
            ControllerRules {
                collection: Some(MethodMap::new()),
                ..ControllerRules::default()
            },
        );
        let acl = build_acl(&rules, true).unwrap();
        assert!(acl.has_resource("Users\\Controller::collection"));

        let authz = AclAuthorization::new(acl);
        for method in REST_METHODS {
            assert!(!authz
                .is_authorized(&Identity::guest(), "Users\\Controller::collection", method)
                .unwrap());
        }
        assert!(authz
            .is_authorized(&user("alice"), "Users\\Controller::collection", "GET")
            .unwrap());
    }

    #[test]
    fn test_closed_policy_grant() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "Controller".to_string(),
            ControllerRules {
                collection: Some(methods(&[("POST", true)])),
                ..ControllerRules::default()
            },
        );
        let authz = build(&rules, true).unwrap();
        let guest = Identity::guest();
        assert!(authz.is_authorized(&guest, "Controller::collection", "POST").unwrap());
        assert!(!authz.is_authorized(&guest, "Controller::collection", "GET").unwrap());
    }

    #[test]
    fn test_open_policy_restriction() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "Foo\\Bar\\Controller".to_string(),
            ControllerRules {
                actions: [("Foo".to_string(), methods(&[("default", true), ("GET", false)]))]
                    .into_iter()
                    .collect(),
                entity: Some(methods(&[("DELETE", false)])),
                ..ControllerRules::default()
            },
        );
        let acl = build_acl(&rules, false).unwrap();
        let entries = acl.rules();
        let guest_rules: Vec<_> = entries
            .iter()
            .filter(|entry| entry.role.as_deref() == Some(GUEST_ROLE))
            .collect();
        assert_eq!(guest_rules.len(), 2);
        assert!(guest_rules.iter().all(|entry| entry.rule == RuleType::Deny));

        let authz = AclAuthorization::new(acl);
        let guest = Identity::guest();
        assert!(!authz.is_authorized(&guest, "Foo\\Bar\\Controller::foo", "GET").unwrap());
        assert!(authz.is_authorized(&guest, "Foo\\Bar\\Controller::foo", "POST").unwrap());
        assert!(!authz.is_authorized(&guest, "Foo\\Bar\\Controller::entity", "DELETE").unwrap());
        assert!(authz.is_authorized(&user("bob"), "Foo\\Bar\\Controller::entity", "DELETE").unwrap());
    }

    fn user(name: &str) -> Identity {
        Identity::authenticated(AuthenticatedIdentity::new(json!({})).with_name(name))
    }
}
