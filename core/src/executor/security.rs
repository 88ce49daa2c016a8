//! Capability gate for inherited members, calls and globals
//!
//! Own properties are always readable. Members a value inherits from its
//! built-in type come from that type's static member table and are only
//! reachable when the type is whitelisted: an empty member set allows the
//! whole table, a missing type allows nothing.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use super::errors::{Exec, SandboxError};
use super::types::{TypeTag, Value};

/// Substitutes the value of an inherited member: `(receiver, member)`
pub type Replacement = Rc<dyn Fn(&Value, &str) -> Option<Value>>;

#[derive(Clone, Default)]
pub struct SecurityPolicy {
    pub audit: bool,
    pub forbid_function_calls: bool,
    pub forbid_function_creation: bool,
    pub halt_on_sandbox_error: bool,
    pub whitelist: HashMap<TypeTag, HashSet<String>>,
    pub replacements: HashMap<TypeTag, Replacement>,
}

impl SecurityPolicy {
    /// Every built-in type with its full member table
    pub fn default_whitelist() -> HashMap<TypeTag, HashSet<String>> {
        TypeTag::ALL.into_iter().map(|t| (t, HashSet::new())).collect()
    }

    /// Enforcement is skipped in audit mode
    pub fn enforcing(&self) -> bool {
        !self.audit
    }

    pub fn check_member(&self, tag: TypeTag, member: &str) -> Exec<()> {
        if !self.enforcing() {
            return Ok(());
        }
        match self.whitelist.get(&tag) {
            Some(members) if members.is_empty() || members.contains(member) => Ok(()),
            _ => Err(SandboxError::MemberNotPermitted {
                type_name: tag.name().to_string(),
                member: member.to_string(),
            }
            .into()),
        }
    }

    pub fn check_call(&self) -> Exec<()> {
        if self.enforcing() && self.forbid_function_calls {
            return Err(SandboxError::FunctionCallsForbidden.into());
        }
        Ok(())
    }

    pub fn check_function_creation(&self) -> Exec<()> {
        if self.enforcing() && self.forbid_function_creation {
            return Err(SandboxError::FunctionCreationForbidden.into());
        }
        Ok(())
    }

    pub fn replace(&self, tag: TypeTag, receiver: &Value, member: &str) -> Option<Value> {
        self.replacements.get(&tag).and_then(|f| f(receiver, member))
    }
}

impl std::fmt::Debug for SecurityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityPolicy")
            .field("audit", &self.audit)
            .field("forbid_function_calls", &self.forbid_function_calls)
            .field("forbid_function_creation", &self.forbid_function_creation)
            .field("halt_on_sandbox_error", &self.halt_on_sandbox_error)
            .field("whitelist", &self.whitelist)
            .field("replacements", &self.replacements.keys().collect::<Vec<_>>())
            .finish()
    }
}

/* ===================== Audit ===================== */

/// What an audited run touched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub globals: BTreeSet<String>,
    /// Type name to the inherited members read from it
    pub prototype_access: BTreeMap<String, BTreeSet<String>>,
}

impl AuditReport {
    pub fn record_global(&mut self, name: &str) {
        if !self.globals.contains(name) {
            self.globals.insert(name.to_string());
        }
    }

    pub fn record_member(&mut self, tag: TypeTag, member: &str) {
        self.prototype_access
            .entry(tag.name().to_string())
            .or_default()
            .insert(member.to_string());
    }

    pub fn merge(&mut self, other: &AuditReport) {
        self.globals.extend(other.globals.iter().cloned());
        for (ty, members) in &other.prototype_access {
            self.prototype_access
                .entry(ty.clone())
                .or_default()
                .extend(members.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(whitelist: HashMap<TypeTag, HashSet<String>>) -> SecurityPolicy {
        SecurityPolicy {
            whitelist,
            ..SecurityPolicy::default()
        }
    }

    #[test]
    fn test_empty_member_set_allows_all() {
        let p = policy(SecurityPolicy::default_whitelist());
        assert!(p.check_member(TypeTag::Array, "push").is_ok());
    }

    #[test]
    fn test_missing_type_denies() {
        let mut whitelist = HashMap::new();
        whitelist.insert(TypeTag::Array, HashSet::from(["map".to_string()]));
        let p = policy(whitelist);
        assert!(p.check_member(TypeTag::Array, "map").is_ok());
        assert!(p.check_member(TypeTag::Array, "push").is_err());
        assert!(p.check_member(TypeTag::String, "trim").is_err());
    }

    #[test]
    fn test_audit_disables_enforcement() {
        let p = SecurityPolicy {
            audit: true,
            forbid_function_calls: true,
            ..SecurityPolicy::default()
        };
        assert!(p.check_member(TypeTag::String, "trim").is_ok());
        assert!(p.check_call().is_ok());
    }

    #[test]
    fn test_report_merge() {
        let mut a = AuditReport::default();
        a.record_global("Math");
        let mut b = AuditReport::default();
        b.record_member(TypeTag::Array, "push");
        a.merge(&b);
        assert!(a.globals.contains("Math"));
        assert!(a.prototype_access["Array"].contains("push"));
    }
}
