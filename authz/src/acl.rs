//! Role/resource/privilege rule table.
//!
//! Rules are stored per (role, resource) pair where either side may be
//! "all". Each pair holds an optional all-privileges rule and any number of
//! per-privilege rules. A query walks from the most specific entry to the
//! global one:
//!
//! 1. the role's own rules on the resource (one privilege, then all)
//! 2. the same for each parent role, depth-first in declaration order
//! 3. rules for all roles on the resource
//! 4. steps 1-3 again on the parent resource, up to "all resources"
//!
//! The global entry always carries a rule, so every query terminates with a
//! verdict. A fresh table denies everything.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::error::{AuthzError, Result};

/// Whether a rule grants or refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Allow,
    Deny,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Allow => f.write_str("allow"),
            RuleType::Deny => f.write_str("deny"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RuleSet {
    all: Option<RuleType>,
    by_privilege: BTreeMap<String, RuleType>,
}

type RuleKey = (Option<String>, Option<String>);

/// One stored rule, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEntry {
    /// `None` means all roles.
    pub role: Option<String>,
    /// `None` means all resources.
    pub resource: Option<String>,
    /// `None` means all privileges.
    pub privilege: Option<String>,
    pub rule: RuleType,
}

/// The rule table with its role and resource registries.
#[derive(Debug, Clone)]
pub struct Acl {
    roles: Vec<String>,
    parents: HashMap<String, Vec<String>>,
    resources: Vec<String>,
    resource_parents: HashMap<String, Option<String>>,
    rules: HashMap<RuleKey, RuleSet>,
}

impl Default for Acl {
    fn default() -> Self {
        Self::new()
    }
}

impl Acl {
    pub fn new() -> Self {
        let mut rules = HashMap::new();
        rules.insert(
            (None, None),
            RuleSet {
                all: Some(RuleType::Deny),
                by_privilege: BTreeMap::new(),
            },
        );
        Self {
            roles: Vec::new(),
            parents: HashMap::new(),
            resources: Vec::new(),
            resource_parents: HashMap::new(),
            rules,
        }
    }

    /// Registers a role inheriting from `parents`, which must exist.
    pub fn add_role(&mut self, role: &str, parents: &[&str]) -> Result<()> {
        if self.has_role(role) {
            return Err(AuthzError::DuplicateRole(role.to_string()));
        }
        for parent in parents {
            if !self.has_role(parent) {
                return Err(AuthzError::RoleNotFound(parent.to_string()));
            }
        }
        self.roles.push(role.to_string());
        self.parents.insert(
            role.to_string(),
            parents.iter().map(|parent| parent.to_string()).collect(),
        );
        Ok(())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.parents.contains_key(role)
    }

    /// Registered roles in registration order.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn role_parents(&self, role: &str) -> Option<&[String]> {
        self.parents.get(role).map(Vec::as_slice)
    }

    /// Registers a resource under an optional parent, which must exist.
    pub fn add_resource(&mut self, resource: &str, parent: Option<&str>) -> Result<()> {
        if self.has_resource(resource) {
            return Err(AuthzError::DuplicateResource(resource.to_string()));
        }
        if let Some(parent) = parent {
            if !self.has_resource(parent) {
                return Err(AuthzError::ResourceNotFound(parent.to_string()));
            }
        }
        self.resources.push(resource.to_string());
        self.resource_parents
            .insert(resource.to_string(), parent.map(str::to_string));
        Ok(())
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.resource_parents.contains_key(resource)
    }

    /// Registered resources in registration order.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Allows `privileges` (all when empty) for `role` on `resource`; `None`
    /// stands for all roles or all resources.
    pub fn allow(&mut self, role: Option<&str>, resource: Option<&str>, privileges: &[&str]) -> Result<()> {
        self.set_rule(RuleType::Allow, role, resource, privileges)
    }

    /// Denies `privileges` (all when empty) for `role` on `resource`.
    pub fn deny(&mut self, role: Option<&str>, resource: Option<&str>, privileges: &[&str]) -> Result<()> {
        self.set_rule(RuleType::Deny, role, resource, privileges)
    }

    pub fn set_rule(
        &mut self,
        rule: RuleType,
        role: Option<&str>,
        resource: Option<&str>,
        privileges: &[&str],
    ) -> Result<()> {
        if let Some(role) = role {
            if !self.has_role(role) {
                return Err(AuthzError::RoleNotFound(role.to_string()));
            }
        }
        if let Some(resource) = resource {
            if !self.has_resource(resource) {
                return Err(AuthzError::ResourceNotFound(resource.to_string()));
            }
        }

        let entry = self
            .rules
            .entry((role.map(str::to_string), resource.map(str::to_string)))
            .or_default();
        if privileges.is_empty() {
            entry.all = Some(rule);
            entry.by_privilege.clear();
        } else {
            for privilege in privileges {
                entry.by_privilege.insert(privilege.to_string(), rule);
            }
        }
        Ok(())
    }

    /// Whether `role` may exercise `privilege` on `resource`.
    ///
    /// A `None` privilege asks about all privileges at once: any explicit
    /// per-privilege deny on the deciding entry makes the answer `false`.
    pub fn is_allowed(
        &self,
        role: Option<&str>,
        resource: Option<&str>,
        privilege: Option<&str>,
    ) -> Result<bool> {
        if let Some(role) = role {
            if !self.has_role(role) {
                return Err(AuthzError::RoleNotFound(role.to_string()));
            }
        }
        if let Some(resource) = resource {
            if !self.has_resource(resource) {
                return Err(AuthzError::ResourceNotFound(resource.to_string()));
            }
        }

        let mut levels = Vec::new();
        let mut current = resource;
        while let Some(name) = current {
            levels.push(Some(name));
            current = self
                .resource_parents
                .get(name)
                .and_then(|parent| parent.as_deref());
        }
        levels.push(None);

        for level in levels {
            if let Some(role) = role {
                let mut visited = HashSet::new();
                if let Some(verdict) = self.visit_role(role, level, privilege, &mut visited) {
                    return Ok(verdict);
                }
            }
            if let Some(verdict) = self.verdict(None, level, privilege) {
                return Ok(verdict);
            }
        }
        Ok(false)
    }

    fn visit_role(
        &self,
        role: &str,
        resource: Option<&str>,
        privilege: Option<&str>,
        visited: &mut HashSet<String>,
    ) -> Option<bool> {
        if !visited.insert(role.to_string()) {
            return None;
        }
        if let Some(verdict) = self.verdict(Some(role), resource, privilege) {
            return Some(verdict);
        }
        self.parents
            .get(role)?
            .iter()
            .find_map(|parent| self.visit_role(parent, resource, privilege, visited))
    }

    /// The verdict of a single (role, resource) entry, if it has one.
    fn verdict(&self, role: Option<&str>, resource: Option<&str>, privilege: Option<&str>) -> Option<bool> {
        let rules = self
            .rules
            .get(&(role.map(str::to_string), resource.map(str::to_string)))?;
        match privilege {
            Some(privilege) => rules
                .by_privilege
                .get(privilege)
                .or(rules.all.as_ref())
                .map(|rule| *rule == RuleType::Allow),
            None => {
                if rules.by_privilege.values().any(|rule| *rule == RuleType::Deny) {
                    return Some(false);
                }
                rules.all.map(|rule| rule == RuleType::Allow)
            }
        }
    }

    /// Every stored rule, sorted by role, resource and privilege.
    pub fn rules(&self) -> Vec<RuleEntry> {
        let mut entries: Vec<RuleEntry> = self
            .rules
            .iter()
            .flat_map(|((role, resource), rules)| {
                let all = rules.all.map(|rule| RuleEntry {
                    role: role.clone(),
                    resource: resource.clone(),
                    privilege: None,
                    rule,
                });
                let specific = rules.by_privilege.iter().map(|(privilege, rule)| RuleEntry {
                    role: role.clone(),
                    resource: resource.clone(),
                    privilege: Some(privilege.clone()),
                    rule: *rule,
                });
                all.into_iter().chain(specific).collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.role, &a.resource, &a.privilege).cmp(&(&b.role, &b.resource, &b.privilege))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Acl {
        let mut acl = Acl::new();
        acl.add_role("guest", &[]).unwrap();
        acl.add_role("member", &["guest"]).unwrap();
        acl.add_role("admin", &[]).unwrap();
        acl.add_resource("news", None).unwrap();
        acl.add_resource("news::comments", Some("news")).unwrap();
        acl
    }

    #[test]
    fn test_fresh_table_denies() {
        let acl = table();
        assert!(!acl.is_allowed(Some("guest"), Some("news"), Some("GET")).unwrap());
        assert!(!acl.is_allowed(None, None, None).unwrap());
    }

    #[test]
    fn test_global_allow() {
        let mut acl = table();
        acl.allow(None, None, &[]).unwrap();
        assert!(acl.is_allowed(Some("admin"), Some("news::comments"), Some("DELETE")).unwrap());
        assert!(acl.is_allowed(None, None, None).unwrap());
    }

    #[test]
    fn test_specific_overrides_general() {
        let mut acl = table();
        acl.allow(None, None, &[]).unwrap();
        acl.deny(Some("guest"), Some("news"), &["POST"]).unwrap();

        assert!(!acl.is_allowed(Some("guest"), Some("news"), Some("POST")).unwrap());
        assert!(acl.is_allowed(Some("guest"), Some("news"), Some("GET")).unwrap());
        // Denial for one role does not leak to an unrelated role.
        assert!(acl.is_allowed(Some("admin"), Some("news"), Some("POST")).unwrap());
    }

    #[test]
    fn test_role_rule_beats_all_roles_rule() {
        let mut acl = table();
        acl.deny(None, Some("news"), &[]).unwrap();
        acl.allow(Some("admin"), Some("news"), &["PUT"]).unwrap();

        assert!(acl.is_allowed(Some("admin"), Some("news"), Some("PUT")).unwrap());
        assert!(!acl.is_allowed(Some("admin"), Some("news"), Some("GET")).unwrap());
    }

    #[test]
    fn test_privilege_rule_beats_all_privileges_rule() {
        let mut acl = table();
        acl.deny(Some("guest"), Some("news"), &[]).unwrap();
        acl.allow(Some("guest"), Some("news"), &["GET"]).unwrap();

        assert!(acl.is_allowed(Some("guest"), Some("news"), Some("GET")).unwrap());
        assert!(!acl.is_allowed(Some("guest"), Some("news"), Some("POST")).unwrap());
    }

    #[test]
    fn test_role_inheritance() {
        let mut acl = table();
        acl.allow(Some("guest"), Some("news"), &["GET"]).unwrap();

        assert!(acl.is_allowed(Some("member"), Some("news"), Some("GET")).unwrap());
        assert!(!acl.is_allowed(Some("admin"), Some("news"), Some("GET")).unwrap());

        acl.deny(Some("member"), Some("news"), &["GET"]).unwrap();
        assert!(!acl.is_allowed(Some("member"), Some("news"), Some("GET")).unwrap());
        assert!(acl.is_allowed(Some("guest"), Some("news"), Some("GET")).unwrap());
    }

    #[test]
    fn test_resource_inheritance() {
        let mut acl = table();
        acl.allow(Some("guest"), Some("news"), &[]).unwrap();
        assert!(acl.is_allowed(Some("guest"), Some("news::comments"), Some("GET")).unwrap());

        acl.deny(Some("guest"), Some("news::comments"), &["POST"]).unwrap();
        assert!(!acl.is_allowed(Some("guest"), Some("news::comments"), Some("POST")).unwrap());
    }

    #[test]
    fn test_all_privileges_query_sees_specific_deny() {
        let mut acl = table();
        acl.allow(None, None, &[]).unwrap();
        acl.deny(Some("guest"), Some("news"), &["DELETE"]).unwrap();
        assert!(!acl.is_allowed(Some("guest"), Some("news"), None).unwrap());
        assert!(acl.is_allowed(Some("admin"), Some("news"), None).unwrap());
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let mut acl = table();
        assert!(matches!(
            acl.is_allowed(Some("ghost"), None, None),
            Err(AuthzError::RoleNotFound(_))
        ));
        assert!(matches!(
            acl.allow(None, Some("missing"), &[]),
            Err(AuthzError::ResourceNotFound(_))
        ));
        assert!(matches!(acl.add_role("guest", &[]), Err(AuthzError::DuplicateRole(_))));
        assert!(matches!(
            acl.add_role("editor", &["nobody"]),
            Err(AuthzError::RoleNotFound(_))
        ));
        assert!(matches!(
            acl.add_resource("news", None),
            Err(AuthzError::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_rules_listing() {
        let mut acl = table();
        acl.allow(None, None, &[]).unwrap();
        acl.deny(Some("guest"), Some("news"), &["POST", "GET"]).unwrap();

        let rules = acl.rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].role, None);
        assert_eq!(rules[0].rule, RuleType::Allow);
        assert_eq!(rules[1].privilege.as_deref(), Some("GET"));
        assert_eq!(rules[2].privilege.as_deref(), Some("POST"));
    }
}
