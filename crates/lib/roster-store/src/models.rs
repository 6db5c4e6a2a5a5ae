use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{DEFAULT_SCOUT_RANK, ROLE_SCOUT};

/// Opaque table row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Metadata attached to a newly created account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMetadata {
    pub is_leader: bool,
    pub full_name: String,
    pub rank: String,
    pub user_role: String,
    pub crew: String,
}

impl UserMetadata {
    #[must_use]
    pub fn is_scout(&self) -> bool {
        self.user_role == ROLE_SCOUT
    }
}

/// Role row keyed by the account identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub user_id: String,
    #[serde(rename = "userrole")]
    pub user_role: String,
}

/// Profile row created for accounts invited with the scout role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoutProfile {
    pub user_id: String,
    pub full_name: String,
    pub rank: String,
    pub crew: String,
}

impl ScoutProfile {
    /// Builds the initial profile for an invited scout.
    ///
    /// The rank is always [`DEFAULT_SCOUT_RANK`]; the rank carried in the
    /// metadata is only recorded on the account.
    #[must_use]
    pub fn for_new_scout(user_id: &str, metadata: &UserMetadata) -> Self {
        Self {
            user_id: user_id.to_string(),
            full_name: metadata.full_name.clone(),
            rank: DEFAULT_SCOUT_RANK.to_string(),
            crew: metadata.crew.clone(),
        }
    }
}

/// Serializes a typed record into a row.
///
/// # Errors
/// Returns the serializer error if `record` does not serialize to a JSON object.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scout_profile_ignores_requested_rank() {
        let metadata = UserMetadata {
            is_leader: false,
            full_name: "John Soe".to_string(),
            rank: "Patrol Leader".to_string(),
            user_role: ROLE_SCOUT.to_string(),
            crew: "Terns".to_string(),
        };

        let profile = ScoutProfile::for_new_scout("user-1", &metadata);

        assert_eq!(profile.rank, DEFAULT_SCOUT_RANK);
        assert_eq!(profile.crew, "Terns");
        assert_eq!(profile.full_name, "John Soe");
    }

    #[test]
    fn role_assignment_uses_table_column_names() {
        let row = to_row(&RoleAssignment {
            user_id: "user-1".to_string(),
            user_role: "leader".to_string(),
        })
        .expect("role serializes to an object");

        assert_eq!(row.get("userrole"), Some(&Value::from("leader")));
        assert_eq!(row.get("user_id"), Some(&Value::from("user-1")));
    }
}
