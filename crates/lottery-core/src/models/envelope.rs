use serde::{Deserialize, Serialize};

/// Response wrapper used by every endpoint: `{ "data": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_data(self) -> T {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    #[test]
    fn test_parse_profile_envelope() {
        let json = r#"{"data": {"name": "Lan", "email": "lan@example.com"}, "message": "ok"}"#;
        let envelope: ApiEnvelope<UserProfile> = serde_json::from_str(json).expect("parse");
        assert_eq!(envelope.message.as_deref(), Some("ok"));
        assert_eq!(envelope.into_data().name, "Lan");
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let json = r#"{"message": "ok"}"#;
        assert!(serde_json::from_str::<ApiEnvelope<UserProfile>>(json).is_err());
    }
}
