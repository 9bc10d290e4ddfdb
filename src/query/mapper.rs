//! Mapping result rows onto records

use crate::error::{Error, Result};
use crate::schema::{short_type_name, Entity, TableDescriptor};
use crate::storage::{ResultSet, Row};

/// Build one record from a row.
///
/// Columns are matched case-insensitively; descriptor columns missing from
/// the row keep their default value.
pub fn map_row<E: Entity>(descriptor: &TableDescriptor, row: &Row<'_>) -> Result<E> {
    let mut entity = E::default();
    for column in &descriptor.columns {
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        entity.set(&column.name, value.clone()).map_err(|err| Error::Mapping {
            entity: short_type_name::<E>(),
            column: column.name.clone(),
            message: err.to_string(),
        })?;
    }
    Ok(entity)
}

/// First row as a record, if any
pub fn map_first<E: Entity>(descriptor: &TableDescriptor, rows: &ResultSet) -> Result<Option<E>> {
    rows.row(0).map(|row| map_row(descriptor, &row)).transpose()
}

pub fn map_all<E: Entity>(descriptor: &TableDescriptor, rows: &ResultSet) -> Result<Vec<E>> {
    rows.rows().map(|row| map_row(descriptor, &row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Player, PlayerRole};
    use taskql::Value;

    fn descriptor() -> TableDescriptor {
        TableDescriptor::of::<Player>().unwrap()
    }

    #[test]
    fn test_maps_present_columns() {
        let rows = ResultSet::new(
            vec!["ID".into(), "Player_Name".into(), "role".into(), "extra".into()],
            vec![vec![
                Value::from("9b2a4f4e-2f63-4d0e-8d1c-6f1a0d0c1b2a"),
                Value::from("Alex"),
                Value::from("ADMIN"),
                Value::Integer(1),
            ]],
        );
        let player: Player = map_first(&descriptor(), &rows).unwrap().unwrap();
        assert_eq!(player.player_name.as_deref(), Some("Alex"));
        assert_eq!(player.role, Some(PlayerRole::Admin));
        assert_eq!(player.points, None);
    }

    #[test]
    fn test_empty_result() {
        let rows = ResultSet::new(vec!["id".into()], vec![]);
        assert!(map_first::<Player>(&descriptor(), &rows).unwrap().is_none());
        assert!(map_all::<Player>(&descriptor(), &rows).unwrap().is_empty());
    }

    #[test]
    fn test_conversion_failure_names_type_and_column() {
        let rows = ResultSet::new(vec!["points".into()], vec![vec![Value::from("lots")]]);
        let err = map_all::<Player>(&descriptor(), &rows).unwrap_err();
        assert!(matches!(err, Error::Mapping { entity: "Player", ref column, .. } if column == "points"));
        assert!(err.to_string().starts_with("Error mapping row to Player"));
    }
}
