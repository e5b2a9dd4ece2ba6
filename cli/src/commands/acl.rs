use anyhow::Result;
use authn::{AuthenticatedIdentity, Identity, GUEST_ROLE};
use authz::{Authorization, RuleEntry, RuleType};
use colored::*;
use serde_json::{json, Value};
use std::path::Path;

use super::load_components;

/// List the roles, resources and rules of the built ACL
pub fn list(path: &Path, format: &str) -> Result<()> {
    let components = load_components(path)?;
    let acl = components.acl.snapshot()?;
    let rules = acl.rules();

    match format {
        "json" => {
            let output = json!({
                "roles": acl.roles(),
                "resources": acl.resources(),
                "rules": rules,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", "=== Access Control List ===".bold());
            println!();
            println!("{}", "[roles]".cyan().bold());
            for role in acl.roles() {
                let parents = acl.role_parents(role).unwrap_or_default();
                if parents.is_empty() {
                    println!("  {}", role);
                } else {
                    println!("  {} {} {}", role, "<".dimmed(), parents.join(", "));
                }
            }
            println!();
            println!("{}", "[resources]".cyan().bold());
            for resource in acl.resources() {
                println!("  {}", resource);
            }
            println!();
            println!("{}", "[rules]".cyan().bold());
            for rule in &rules {
                print_rule(rule);
            }
            println!();
            println!("{}", format!("Total rules: {}", rules.len()).green());
        }
    }

    Ok(())
}

fn print_rule(rule: &RuleEntry) {
    let verdict = match rule.rule {
        RuleType::Allow => "allow".green(),
        RuleType::Deny => "deny ".red(),
    };
    println!(
        "  {} {:<16} {:<40} {}",
        verdict,
        rule.role.as_deref().unwrap_or("*"),
        rule.resource.as_deref().unwrap_or("*"),
        rule.privilege.as_deref().unwrap_or("*")
    );
}

/// Identity an ACL check runs as
fn identity_for(role: &str) -> Identity {
    if role == GUEST_ROLE {
        Identity::guest()
    } else {
        Identity::authenticated(AuthenticatedIdentity::new(Value::Null).with_name(role))
    }
}

/// Decide whether `role` may perform `method` on `resource`
pub fn check(path: &Path, role: &str, resource: &str, method: &str, format: &str) -> Result<()> {
    let components = load_components(path)?;
    let method = method.to_ascii_uppercase();

    components.acl.add_resource(resource)?;
    let allowed = components
        .acl
        .is_authorized(&identity_for(role), resource, &method)?;

    match format {
        "json" => {
            let output = json!({
                "role": role,
                "resource": resource,
                "method": method,
                "allowed": allowed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            let verdict = if allowed {
                "ALLOWED".green().bold()
            } else {
                "DENIED".red().bold()
            };
            println!("{} {} {} {}", verdict, role.cyan(), method, resource);
        }
    }

    Ok(())
}
