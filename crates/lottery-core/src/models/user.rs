use serde::{Deserialize, Serialize};

/// The signed-in user as returned by `GET /auth`.
///
/// The service answers with either `{name, email}` or `{id, name}`, so both
/// `id` and `email` are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserProfile {
    /// Name with email when known, for status lines.
    pub fn display(&self) -> String {
        match self.email {
            Some(ref email) if !email.is_empty() => format!("{} <{}>", self.name, email),
            _ => self.name.clone(),
        }
    }
}

/// Partial update merged into the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut UserProfile) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
    }
}
