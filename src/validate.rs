use std::fmt;

use serde::Serialize;

use crate::ptypes::PTypeName;
use crate::types::{Collection, Policy, Principal, Subject};

const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 32;
const SECRET_MIN_LEN: usize = 3;

/// A single violated constraint: which field, which rule, and the offending
/// or expected value.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub tag: String,
    pub value: String,
}

/// Every violation found on an entity, not just the first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if e.value.is_empty() {
                write!(f, "{}: {}", e.field, e.tag)?;
            } else {
                write!(f, "{}: {} ({})", e.field, e.tag, e.value)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Default)]
struct Checker {
    errors: Vec<ValidationError>,
}

impl Checker {
    fn fail(&mut self, field: &str, tag: &str, value: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            tag: tag.to_string(),
            value: value.into(),
        });
    }

    fn required(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            self.fail(field, "required", "");
            return false;
        }
        true
    }

    fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.fail(field, "min", min.to_string());
        } else if len > max {
            self.fail(field, "max", max.to_string());
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

pub fn validate_collection(col: &Collection) -> Result<(), ValidationErrors> {
    let mut c = Checker::default();
    if c.required("name", &col.name) {
        c.length("name", &col.name, NAME_MIN_LEN, NAME_MAX_LEN);
    }
    if col.fields.is_empty() {
        c.fail("fields", "required", "");
    }
    for (field_name, field) in &col.fields {
        if PTypeName::parse(&field.type_name).is_none() {
            c.fail(&format!("fields.{field_name}"), "ptype", field.type_name.clone());
        }
    }
    c.finish()
}

pub fn validate_principal(principal: &Principal) -> Result<(), ValidationErrors> {
    let mut c = Checker::default();
    if c.required("access_key", &principal.access_key) {
        c.length("access_key", &principal.access_key, NAME_MIN_LEN, NAME_MAX_LEN);
    }
    if c.required("access_secret", &principal.access_secret)
        && principal.access_secret.chars().count() < SECRET_MIN_LEN
    {
        c.fail("access_secret", "min", SECRET_MIN_LEN.to_string());
    }
    c.finish()
}

pub fn validate_policy(policy: &Policy) -> Result<(), ValidationErrors> {
    let mut c = Checker::default();
    if policy.actions.is_empty() {
        c.fail("actions", "required", "");
    }
    if policy.resources.is_empty() {
        c.fail("resources", "required", "");
    }
    c.finish()
}

pub fn validate_subject(subject: &Subject) -> Result<(), ValidationErrors> {
    let mut c = Checker::default();
    c.required("eid", &subject.eid);
    c.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, PolicyAction, PolicyEffect};

    fn collection(name: &str, fields: &[(&str, &str)]) -> Collection {
        Collection {
            id: String::new(),
            name: name.to_string(),
            description: String::new(),
            fields: fields
                .iter()
                .map(|(n, t)| {
                    ((*n).to_string(), Field {
                        type_name: (*t).to_string(),
                        indexed: false,
                    })
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_valid_collection_passes() {
        assert!(validate_collection(&collection("customers", &[("email", "email")])).is_ok());
    }

    #[test]
    fn test_short_collection_name_fails() {
        let err = validate_collection(&collection("ab", &[("email", "email")])).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].field, "name");
        assert_eq!(err.0[0].tag, "min");
    }

    #[test]
    fn test_unknown_field_type_fails() {
        let err = validate_collection(&collection("customers", &[("blob", "binary")])).unwrap_err();
        assert_eq!(err.0[0].field, "fields.blob");
        assert_eq!(err.0[0].tag, "ptype");
    }

    #[test]
    fn test_all_violations_reported() {
        let err = validate_collection(&collection("ab", &[])).unwrap_err();
        let tags: Vec<&str> = err.0.iter().map(|e| e.tag.as_str()).collect();
        assert!(tags.contains(&"min"));
        assert!(tags.contains(&"required"));
    }

    #[test]
    fn test_principal_validation() {
        let mut principal = Principal {
            id: String::new(),
            name: "tester".to_string(),
            access_key: "test_user".to_string(),
            access_secret: "test_password".to_string(),
            description: String::new(),
            policies: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        assert!(validate_principal(&principal).is_ok());

        principal.access_secret = "ab".to_string();
        let err = validate_principal(&principal).unwrap_err();
        assert_eq!(err.0[0].field, "access_secret");
        assert_eq!(err.0[0].tag, "min");

        principal.access_key = String::new();
        principal.access_secret = String::new();
        let err = validate_principal(&principal).unwrap_err();
        assert_eq!(err.0.len(), 2);
        assert!(err.0.iter().all(|e| e.tag == "required"));
    }

    #[test]
    fn test_policy_validation() {
        let policy = Policy {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            effect: PolicyEffect::Allow,
            actions: vec![PolicyAction::Read],
            resources: vec!["/collections*".to_string()],
            created_at: None,
            updated_at: None,
        };
        assert!(validate_policy(&policy).is_ok());

        let empty = Policy {
            actions: Vec::new(),
            resources: Vec::new(),
            ..policy
        };
        let err = validate_policy(&empty).unwrap_err();
        assert_eq!(err.0.len(), 2);
    }

    #[test]
    fn test_subject_requires_eid() {
        let subject = Subject {
            id: String::new(),
            eid: String::new(),
            metadata: String::new(),
            created_at: None,
            updated_at: None,
        };
        let err = validate_subject(&subject).unwrap_err();
        assert_eq!(err.0[0].field, "eid");
    }
}
