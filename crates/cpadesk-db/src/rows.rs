//! Row helpers shared by the repository implementations.

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for `count() ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Total from a count query; an empty result means zero rows matched.
pub(crate) fn total_of(rows: &[CountRow]) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// UUIDs are stored as strings; decode one and name the field on failure.
pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Corrupt(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(field: &str, value: Option<&str>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_names_the_field() {
        let err = parse_uuid("tenant", "not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("invalid tenant UUID"));
    }

    #[test]
    fn missing_count_row_is_zero() {
        assert_eq!(total_of(&[]), 0);
        assert_eq!(total_of(&[CountRow { total: 4 }]), 4);
    }
}
