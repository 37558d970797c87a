use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Policy, Principal};

/// An action a principal can perform on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Read,
    Write,
}

impl PolicyAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a matching policy admits or blocks the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl PolicyEffect {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single authorization question: may `actor` perform `action` on
/// `resource`?
#[derive(Debug, Clone)]
pub struct Request {
    pub actor: Principal,
    pub action: PolicyAction,
    pub resource: String,
}

/// Returns true if `pattern` matches `resource`. A trailing `*` matches any
/// suffix, including further `/` segments; without it the match is exact.
#[must_use]
pub fn matches_resource(pattern: &str, resource: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => resource.starts_with(prefix),
        None => pattern == resource,
    }
}

/// Evaluates a request against the policies attached to its actor.
///
/// A policy matches when the request's action is in its action set and any of
/// its resource patterns matches the request's resource. A matching deny
/// always wins; with no matching policy at all the request is denied.
#[must_use]
pub fn evaluate(request: &Request, policies: &[Policy]) -> bool {
    let mut allowed = false;
    for policy in policies {
        if !policy.actions.contains(&request.action) {
            continue;
        }
        if !policy
            .resources
            .iter()
            .any(|pattern| matches_resource(pattern, &request.resource))
        {
            continue;
        }
        match policy.effect {
            PolicyEffect::Deny => return false,
            PolicyEffect::Allow => allowed = true,
        }
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            id: String::new(),
            name: "tester".to_string(),
            access_key: "tester".to_string(),
            access_secret: String::new(),
            description: String::new(),
            policies: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn policy(effect: PolicyEffect, actions: &[PolicyAction], resources: &[&str]) -> Policy {
        Policy {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            effect,
            actions: actions.to_vec(),
            resources: resources.iter().map(|r| (*r).to_string()).collect(),
            created_at: None,
            updated_at: None,
        }
    }

    fn request(action: PolicyAction, resource: &str) -> Request {
        Request {
            actor: principal(),
            action,
            resource: resource.to_string(),
        }
    }

    #[test]
    fn test_exact_match() {
        assert!(matches_resource("/collections", "/collections"));
        assert!(!matches_resource("/collections", "/collections/customers"));
    }

    #[test]
    fn test_wildcard_matches_any_suffix() {
        assert!(matches_resource("/collections/customers*", "/collections/customers"));
        assert!(matches_resource(
            "/collections/customers*",
            "/collections/customers/records/rec_1/email.plain"
        ));
        assert!(!matches_resource("/collections/customers*", "/collections/orders"));
    }

    #[test]
    fn test_no_policies_denies() {
        assert!(!evaluate(&request(PolicyAction::Read, "/collections"), &[]));
    }

    #[test]
    fn test_allow_grants() {
        let policies = vec![policy(
            PolicyEffect::Allow,
            &[PolicyAction::Read],
            &["/collections*"],
        )];
        assert!(evaluate(&request(PolicyAction::Read, "/collections/x"), &policies));
    }

    #[test]
    fn test_action_must_be_in_set() {
        let policies = vec![policy(
            PolicyEffect::Allow,
            &[PolicyAction::Read],
            &["/collections*"],
        )];
        assert!(!evaluate(&request(PolicyAction::Write, "/collections/x"), &policies));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let policies = vec![
            policy(PolicyEffect::Allow, &[PolicyAction::Read], &["/collections*"]),
            policy(PolicyEffect::Deny, &[PolicyAction::Read], &["/collections/secret*"]),
        ];
        assert!(evaluate(&request(PolicyAction::Read, "/collections/public"), &policies));
        assert!(!evaluate(
            &request(PolicyAction::Read, "/collections/secret/records"),
            &policies
        ));
    }

    #[test]
    fn test_unmatched_resource_denies() {
        let policies = vec![policy(
            PolicyEffect::Allow,
            &[PolicyAction::Read],
            &["/principals"],
        )];
        assert!(!evaluate(&request(PolicyAction::Read, "/collections"), &policies));
    }
}
