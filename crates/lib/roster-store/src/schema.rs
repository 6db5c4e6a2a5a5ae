pub const TABLE_USER_ROLES: &str = "userroles";
pub const TABLE_SCOUTS: &str = "scouts";
pub const TABLE_SCOUT_HISTORY: &str = "scout_history";

pub const COLUMN_ID: &str = "id";
pub const COLUMN_CREATED_AT: &str = "created_at";
pub const COLUMN_USER_ID: &str = "user_id";
pub const COLUMN_USER_ROLE: &str = "userrole";
pub const COLUMN_SCOUT_ID: &str = "scout_id";

pub const ROLE_SCOUT: &str = "scout";

/// Rank every new scout profile starts with, whatever rank the inviter passed.
pub const DEFAULT_SCOUT_RANK: &str = "Recruit";

/// Returns true when `name` is a bare table identifier.
///
/// Tables are addressed as one REST path segment in the exposed schema, so
/// schema-qualified names are not identifiers here.
#[must_use]
pub fn is_table_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_tables() {
        assert!(is_table_identifier("users"));
        assert!(is_table_identifier("_audit"));
        assert!(is_table_identifier("scout_history"));
    }

    #[test]
    fn rejects_schema_qualified_tables() {
        assert!(!is_table_identifier("public.scout_history"));
        assert!(!is_table_identifier("auth.users"));
    }

    #[test]
    fn rejects_paths_and_punctuation() {
        assert!(!is_table_identifier(""));
        assert!(!is_table_identifier("1users"));
        assert!(!is_table_identifier("users/../admin"));
        assert!(!is_table_identifier("a.b.c"));
        assert!(!is_table_identifier("users?select=*"));
        assert!(!is_table_identifier("public."));
    }
}
