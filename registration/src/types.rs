use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier the API assigned to a contact. Only equality is meaningful.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContactId(String);

/// Identifier the API assigned to a segment (a "grupo").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SegmentId(String);

macro_rules! remote_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        // The API emits ids as numbers on some endpoints and strings on others.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Number(serde_json::Number),
                    Text(String),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Number(n) => $name(n.to_string()),
                    Raw::Text(s) => $name(s),
                })
            }
        }
    };
}

remote_id!(ContactId);
remote_id!(SegmentId);

/// Human-readable segment label; the API treats it as the segment's identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SegmentName(String);

impl SegmentName {
    pub fn new(name: impl Into<String>) -> Self {
        SegmentName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Form submission, as posted by the signup page.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RegistrationRequest {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "perfis", default)]
    pub profiles: Vec<String>,
    #[serde(rename = "interesses", default)]
    pub interests: Vec<String>,
    #[serde(rename = "infoInstitucional", default)]
    pub institutional_info_requested: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    pub success: bool,
    pub contact_id: ContactId,
    pub segments_resolved: usize,
    pub segments_total: usize,
    pub background_pending: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_accept_numbers_and_strings() {
        let numeric: SegmentId = serde_json::from_value(json!(1234)).unwrap();
        let text: SegmentId = serde_json::from_value(json!("abc-1")).unwrap();
        assert_eq!(numeric.as_str(), "1234");
        assert_eq!(text.as_str(), "abc-1");

        assert!(serde_json::from_value::<ContactId>(json!({"id": 1})).is_err());
    }

    #[test]
    fn test_request_uses_form_field_names() {
        let request: RegistrationRequest = serde_json::from_value(json!({
            "nome": "Ana",
            "email": "ana@example.com",
            "perfis": ["estudante"],
            "interesses": ["saude"],
            "infoInstitucional": true
        }))
        .unwrap();

        assert_eq!(request.name, "Ana");
        assert_eq!(request.profiles, vec!["estudante"]);
        assert_eq!(request.interests, vec!["saude"]);
        assert!(request.institutional_info_requested);
    }

    #[test]
    fn test_request_optional_fields_default() {
        let request: RegistrationRequest =
            serde_json::from_value(json!({"nome": "Ana", "email": "ana@example.com"})).unwrap();

        assert!(request.profiles.is_empty());
        assert!(request.interests.is_empty());
        assert!(!request.institutional_info_requested);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = RegistrationResult {
            success: true,
            contact_id: ContactId::new("42"),
            segments_resolved: 2,
            segments_total: 3,
            background_pending: false,
            message: "ok".into(),
        };

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "contactId": "42",
                "segmentsResolved": 2,
                "segmentsTotal": 3,
                "backgroundPending": false,
                "message": "ok"
            })
        );
    }
}
