//! Local policy tier: a YAML rule list evaluated in-process.
//!
//! ```yaml
//! rules:
//!   - effect: Allow
//!     groups: ["platform-admins"]
//!     verbs: ["*"]
//!     apiGroups: ["*"]
//!     resources: ["*"]
//!   - effect: Deny
//!     users: ["intern"]
//!     verbs: ["create"]
//!     apiGroups: ["apps"]
//!     resources: ["deployments", "deployments/scale"]
//! ```

use std::path::Path;

use async_trait::async_trait;
use kubeui_core::RequestContext;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Attributes, AuthzError, Authorizer, Verdict};

pub const SUPERUSER_GROUP: &str = "system:masters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub effect: Effect,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub resource_names: Vec<String>,
    #[serde(default, rename = "nonResourceURLs")]
    pub non_resource_urls: Vec<String>,
}

fn any_or(list: &[String], want: &str) -> bool { list.iter().any(|x| x == "*" || x == want) }

impl PolicyRule {
    fn applies_to(&self, attrs: &Attributes) -> bool {
        let user = &attrs.user;
        let subject = any_or(&self.users, &user.name) || user.groups.iter().any(|g| any_or(&self.groups, g));
        if !subject || !any_or(&self.verbs, &attrs.verb) {
            return false;
        }
        if !attrs.is_resource_request() {
            return self.non_resource_urls.iter().any(|u| match u.strip_suffix('*') {
                Some(prefix) => attrs.path.starts_with(prefix),
                None => u == &attrs.path,
            });
        }
        any_or(&self.api_groups, &attrs.group)
            && self.resources.iter().any(|r| resource_matches(r, &attrs.resource, &attrs.subresource))
            && (self.resource_names.is_empty() || self.resource_names.iter().any(|n| n == &attrs.name))
    }
}

fn resource_matches(rule: &str, resource: &str, subresource: &str) -> bool {
    if rule == "*" {
        return true;
    }
    let (r, s) = rule.split_once('/').unwrap_or((rule, ""));
    if subresource.is_empty() {
        return s.is_empty() && r == resource;
    }
    (r == "*" || r == resource) && (s == "*" || s == subresource)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacPolicy {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl RbacPolicy {
    pub fn from_yaml(text: &str) -> Result<Self, AuthzError> {
        serde_yaml::from_str(text).map_err(|e| AuthzError::Policy(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, AuthzError> {
        let text = std::fs::read_to_string(path).map_err(|e| AuthzError::Policy(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Deny rules win over allow rules; no matching rule means no opinion.
    pub fn evaluate(&self, attrs: &Attributes) -> Verdict {
        if attrs.user.groups.iter().any(|g| g == SUPERUSER_GROUP) {
            return Verdict::allow(format!("member of {}", SUPERUSER_GROUP));
        }
        let mut allowed_by: Option<usize> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.applies_to(attrs) {
                continue;
            }
            match rule.effect {
                Effect::Deny => return Verdict::deny(format!("denied by local rule #{}", idx)),
                Effect::Allow => {
                    allowed_by.get_or_insert(idx);
                }
            }
        }
        match allowed_by {
            Some(idx) => Verdict::allow(format!("allowed by local rule #{}", idx)),
            None => Verdict::no_opinion(),
        }
    }
}

/// Tier-one authorizer backed by an [`RbacPolicy`].
#[derive(Debug, Clone, Default)]
pub struct LocalAuthorizer {
    policy: RbacPolicy,
}

impl LocalAuthorizer {
    pub fn new(policy: RbacPolicy) -> Self { Self { policy } }
}

#[async_trait]
impl Authorizer for LocalAuthorizer {
    async fn authorize(&self, _ctx: &RequestContext, attrs: &Attributes) -> Verdict {
        let v = self.policy.evaluate(attrs);
        debug!(user = %attrs.user.name, verb = %attrs.verb, resource = %attrs.resource, decision = ?v.decision, "authz: local");
        crate::record("local", &v);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decision;
    use kubeui_core::UserInfo;

    const POLICY: &str = r#"
rules:
  - effect: Allow
    groups: ["devs"]
    verbs: ["get", "list", "create"]
    apiGroups: ["", "apps"]
    resources: ["pods", "deployments", "deployments/scale"]
  - effect: Deny
    users: ["mallory"]
    verbs: ["*"]
    apiGroups: ["*"]
    resources: ["*"]
  - effect: Allow
    users: ["*"]
    verbs: ["get"]
    nonResourceURLs: ["/healthz", "/api/*"]
"#;

    fn attrs(user: UserInfo, verb: &str, group: &str, resource: &str, sub: &str) -> Attributes {
        Attributes {
            user,
            verb: verb.into(),
            group: group.into(),
            version: "v1".into(),
            resource: resource.into(),
            subresource: sub.into(),
            ..Default::default()
        }
    }

    #[test]
    fn group_rule_allows_listed_verbs() {
        let p = RbacPolicy::from_yaml(POLICY).unwrap();
        let dev = UserInfo::new("alice").with_groups(["devs"]);
        assert_eq!(p.evaluate(&attrs(dev.clone(), "create", "apps", "deployments", "")).decision, Decision::Allow);
        assert_eq!(p.evaluate(&attrs(dev.clone(), "create", "apps", "deployments", "scale")).decision, Decision::Allow);
        assert_eq!(p.evaluate(&attrs(dev.clone(), "delete", "apps", "deployments", "")).decision, Decision::NoOpinion);
        assert_eq!(p.evaluate(&attrs(dev, "get", "batch", "jobs", "")).decision, Decision::NoOpinion);
    }

    #[test]
    fn deny_wins_over_allow() {
        let p = RbacPolicy::from_yaml(POLICY).unwrap();
        let m = UserInfo::new("mallory").with_groups(["devs"]);
        assert_eq!(p.evaluate(&attrs(m, "get", "", "pods", "")).decision, Decision::Deny);
    }

    #[test]
    fn masters_bypass_rules() {
        let p = RbacPolicy::from_yaml(POLICY).unwrap();
        let root = UserInfo::new("mallory").with_groups([SUPERUSER_GROUP]);
        assert_eq!(p.evaluate(&attrs(root, "delete", "", "nodes", "")).decision, Decision::Allow);
    }

    #[test]
    fn non_resource_urls_match_prefix() {
        let p = RbacPolicy::from_yaml(POLICY).unwrap();
        let u = UserInfo::new("bob");
        assert_eq!(p.evaluate(&Attributes::non_resource(&u, "get", "/healthz")).decision, Decision::Allow);
        assert_eq!(p.evaluate(&Attributes::non_resource(&u, "get", "/api/v1")).decision, Decision::Allow);
        assert_eq!(p.evaluate(&Attributes::non_resource(&u, "get", "/metrics")).decision, Decision::NoOpinion);
    }

    #[test]
    fn bad_policy_is_an_error() {
        assert!(matches!(RbacPolicy::from_yaml("rules: [{effect: Maybe}]"), Err(AuthzError::Policy(_))));
    }
}
