use crate::record::{FieldDef, FieldKind, fields_of};
use crate::table::TableKind;

/// Target column for a record field. Identity except for the two audit timestamps,
/// which are renamed the same way in every table.
pub fn target_column_name(_table: TableKind, field: &str) -> &str {
    match field {
        "created_at" => "created",
        "updated_at" => "modified",
        other => other,
    }
}

/// Pairs each record field with the target column it is written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap(Vec<(FieldDef, String)>);

impl ColumnMap {
    /// Builds the map for a table from its record fields, in insert order.
    pub fn for_table(table: TableKind) -> Self {
        let map = fields_of(table)
            .iter()
            .map(|field| (*field, target_column_name(table, field.name).to_string()))
            .collect();
        ColumnMap(map)
    }

    /// Replaces the target column of one field. Unknown fields are left alone.
    pub fn with_rename(mut self, field: &str, target: &str) -> Self {
        if let Some((_, column)) = self.0.iter_mut().find(|(f, _)| f.name == field) {
            *column = target.to_string();
        }
        self
    }

    /// Target columns, aligned with the record's positional values.
    pub fn target_cols(&self) -> Vec<&str> {
        self.0.iter().map(|(_, target)| target.as_str()).collect()
    }

    /// Record field names, which are also the source column names.
    pub fn source_cols(&self) -> Vec<&str> {
        self.0.iter().map(|(field, _)| field.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, FieldKind)> {
        self.0
            .iter()
            .map(|(field, target)| (field.name, target.as_str(), field.kind))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
