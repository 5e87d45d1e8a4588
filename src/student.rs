use serde::{Deserialize, Serialize};

/// Structure for a student as handed over by the enrollment roster.
///
/// Fields:
/// - `id`: Institutional identifier (e.g. "2021-00123"); scores are keyed by it.
/// - `name`: Display name.
/// - `username`: Login name.
/// - `email`: Contact address.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

impl Student {
    pub fn new(id: &str, name: &str) -> Self {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_contact(mut self, username: &str, email: &str) -> Self {
        self.username = username.to_string();
        self.email = email.to_string();
        self
    }
}
