//! Typed records for the five managed tables.
//!
//! Rows come out of SQLite as loosely typed `(column, value)` lists. They are
//! decoded into one of the record structs right here and never travel further
//! in their raw form.

use crate::error::{MigrateError, Result};
use crate::table::TableKind;
use crate::timestamp::{parse_date, parse_timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use postgres::types::ToSql;
use rusqlite::types::Value;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Text,
    Float,
    Date,
    Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        nullable: false,
    }
}

const fn nullable(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        nullable: true,
    }
}

/// An ordered `column -> value` list as fetched from the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRow(Vec<(String, Value)>);

impl RawRow {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        RawRow(columns)
    }

    pub fn from_sqlite(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Self> {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            values.push((name.clone(), row.get::<_, Value>(idx)?));
        }
        Ok(RawRow(values))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Field-by-field decoding of a raw row with errors that name the table and field.
struct RowReader<'r> {
    table: TableKind,
    row: &'r RawRow,
}

impl<'r> RowReader<'r> {
    fn value(&self, name: &str) -> Result<Option<&'r Value>> {
        match self.row.get(name) {
            None => Err(MigrateError::mapping(
                self.table.name(),
                name,
                "is missing from the row",
            )),
            Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }

    fn required<T>(&self, name: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| MigrateError::mapping(self.table.name(), name, "is NULL"))
    }

    fn invalid(&self, name: &str, value: &Value) -> MigrateError {
        MigrateError::mapping(
            self.table.name(),
            name,
            format!("has an unexpected value {:?}", value),
        )
    }

    fn opt_uuid(&self, name: &str) -> Result<Option<Uuid>> {
        let Some(value) = self.value(name)? else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Text(text) => Uuid::parse_str(text.trim()).ok(),
            Value::Blob(bytes) => Uuid::from_slice(bytes).ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| self.invalid(name, value))
    }

    fn uuid(&self, name: &str) -> Result<Uuid> {
        let value = self.opt_uuid(name)?;
        self.required(name, value)
    }

    fn opt_text(&self, name: &str) -> Result<Option<String>> {
        match self.value(name)? {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(Value::Integer(i)) => Ok(Some(i.to_string())),
            Some(Value::Real(f)) => Ok(Some(f.to_string())),
            Some(value) => Err(self.invalid(name, value)),
        }
    }

    fn text(&self, name: &str) -> Result<String> {
        let value = self.opt_text(name)?;
        self.required(name, value)
    }

    fn opt_float(&self, name: &str) -> Result<Option<f64>> {
        match self.value(name)? {
            None => Ok(None),
            Some(Value::Real(f)) => Ok(Some(*f)),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(value) => match value {
                Value::Text(text) => text
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| self.invalid(name, value)),
                _ => Err(self.invalid(name, value)),
            },
        }
    }

    fn opt_date(&self, name: &str) -> Result<Option<NaiveDate>> {
        match self.value(name)? {
            None => Ok(None),
            Some(Value::Text(text)) => parse_date(text)
                .map(Some)
                .ok_or_else(|| self.invalid(name, &Value::Text(text.clone()))),
            Some(value) => Err(self.invalid(name, value)),
        }
    }

    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.value(name)? {
            None => self.required(name, None),
            Some(Value::Text(text)) => parse_timestamp(text)
                .ok_or_else(|| self.invalid(name, &Value::Text(text.clone()))),
            Some(value) => Err(self.invalid(name, value)),
        }
    }
}

/// A record type bound to one managed table.
pub trait Entity: Sized {
    const KIND: TableKind;
    /// Record fields in insert order. Named after the source columns.
    const FIELDS: &'static [FieldDef];

    fn from_row(row: &RawRow) -> Result<Self>;

    fn id(&self) -> Uuid;

    /// Positional values, aligned with `FIELDS`.
    fn params(&self) -> Vec<&(dyn ToSql + Sync)>;
}

fn reader<E: Entity>(row: &RawRow) -> RowReader<'_> {
    RowReader {
        table: E::KIND,
        row,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Genre {
    const KIND: TableKind = TableKind::Genre;
    const FIELDS: &'static [FieldDef] = &[
        field("id", FieldKind::Uuid),
        field("name", FieldKind::Text),
        nullable("description", FieldKind::Text),
        field("created_at", FieldKind::Timestamp),
        field("updated_at", FieldKind::Timestamp),
    ];

    fn from_row(row: &RawRow) -> Result<Self> {
        let r = reader::<Self>(row);
        Ok(Genre {
            id: r.uuid("id")?,
            name: r.text("name")?,
            description: r.opt_text("description")?,
            created_at: r.timestamp("created_at")?,
            updated_at: r.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.name,
            &self.description,
            &self.created_at,
            &self.updated_at,
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Person {
    const KIND: TableKind = TableKind::Person;
    const FIELDS: &'static [FieldDef] = &[
        field("id", FieldKind::Uuid),
        field("full_name", FieldKind::Text),
        field("created_at", FieldKind::Timestamp),
        field("updated_at", FieldKind::Timestamp),
    ];

    fn from_row(row: &RawRow) -> Result<Self> {
        let r = reader::<Self>(row);
        Ok(Person {
            id: r.uuid("id")?,
            full_name: r.text("full_name")?,
            created_at: r.timestamp("created_at")?,
            updated_at: r.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.id, &self.full_name, &self.created_at, &self.updated_at]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub file_path: Option<String>,
    pub rating: Option<f64>,
    pub r#type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for FilmWork {
    const KIND: TableKind = TableKind::FilmWork;
    const FIELDS: &'static [FieldDef] = &[
        field("id", FieldKind::Uuid),
        field("title", FieldKind::Text),
        nullable("description", FieldKind::Text),
        nullable("creation_date", FieldKind::Date),
        nullable("file_path", FieldKind::Text),
        nullable("rating", FieldKind::Float),
        field("type", FieldKind::Text),
        field("created_at", FieldKind::Timestamp),
        field("updated_at", FieldKind::Timestamp),
    ];

    fn from_row(row: &RawRow) -> Result<Self> {
        let r = reader::<Self>(row);
        Ok(FilmWork {
            id: r.uuid("id")?,
            title: r.text("title")?,
            description: r.opt_text("description")?,
            creation_date: r.opt_date("creation_date")?,
            file_path: r.opt_text("file_path")?,
            rating: r.opt_float("rating")?,
            r#type: r.text("type")?,
            created_at: r.timestamp("created_at")?,
            updated_at: r.timestamp("updated_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.title,
            &self.description,
            &self.creation_date,
            &self.file_path,
            &self.rating,
            &self.r#type,
            &self.created_at,
            &self.updated_at,
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenreFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Entity for GenreFilmWork {
    const KIND: TableKind = TableKind::GenreFilmWork;
    const FIELDS: &'static [FieldDef] = &[
        field("id", FieldKind::Uuid),
        field("film_work_id", FieldKind::Uuid),
        field("genre_id", FieldKind::Uuid),
        field("created_at", FieldKind::Timestamp),
    ];

    fn from_row(row: &RawRow) -> Result<Self> {
        let r = reader::<Self>(row);
        Ok(GenreFilmWork {
            id: r.uuid("id")?,
            film_work_id: r.uuid("film_work_id")?,
            genre_id: r.uuid("genre_id")?,
            created_at: r.timestamp("created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![&self.id, &self.film_work_id, &self.genre_id, &self.created_at]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersonFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for PersonFilmWork {
    const KIND: TableKind = TableKind::PersonFilmWork;
    const FIELDS: &'static [FieldDef] = &[
        field("id", FieldKind::Uuid),
        field("film_work_id", FieldKind::Uuid),
        field("person_id", FieldKind::Uuid),
        field("role", FieldKind::Text),
        field("created_at", FieldKind::Timestamp),
    ];

    fn from_row(row: &RawRow) -> Result<Self> {
        let r = reader::<Self>(row);
        Ok(PersonFilmWork {
            id: r.uuid("id")?,
            film_work_id: r.uuid("film_work_id")?,
            person_id: r.uuid("person_id")?,
            role: r.text("role")?,
            created_at: r.timestamp("created_at")?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        vec![
            &self.id,
            &self.film_work_id,
            &self.person_id,
            &self.role,
            &self.created_at,
        ]
    }
}

/// One decoded source row, whatever table it came from.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Genre(Genre),
    Person(Person),
    FilmWork(FilmWork),
    GenreFilmWork(GenreFilmWork),
    PersonFilmWork(PersonFilmWork),
}

impl Record {
    pub fn from_row(kind: TableKind, row: &RawRow) -> Result<Self> {
        Ok(match kind {
            TableKind::Genre => Record::Genre(Genre::from_row(row)?),
            TableKind::Person => Record::Person(Person::from_row(row)?),
            TableKind::FilmWork => Record::FilmWork(FilmWork::from_row(row)?),
            TableKind::GenreFilmWork => Record::GenreFilmWork(GenreFilmWork::from_row(row)?),
            TableKind::PersonFilmWork => Record::PersonFilmWork(PersonFilmWork::from_row(row)?),
        })
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Record::Genre(_) => TableKind::Genre,
            Record::Person(_) => TableKind::Person,
            Record::FilmWork(_) => TableKind::FilmWork,
            Record::GenreFilmWork(_) => TableKind::GenreFilmWork,
            Record::PersonFilmWork(_) => TableKind::PersonFilmWork,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Record::Genre(r) => r.id(),
            Record::Person(r) => r.id(),
            Record::FilmWork(r) => r.id(),
            Record::GenreFilmWork(r) => r.id(),
            Record::PersonFilmWork(r) => r.id(),
        }
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        match self {
            Record::Genre(r) => r.params(),
            Record::Person(r) => r.params(),
            Record::FilmWork(r) => r.params(),
            Record::GenreFilmWork(r) => r.params(),
            Record::PersonFilmWork(r) => r.params(),
        }
    }
}

/// Record fields of a table, in insert order.
pub fn fields_of(kind: TableKind) -> &'static [FieldDef] {
    match kind {
        TableKind::Genre => Genre::FIELDS,
        TableKind::Person => Person::FIELDS,
        TableKind::FilmWork => FilmWork::FIELDS,
        TableKind::GenreFilmWork => GenreFilmWork::FIELDS,
        TableKind::PersonFilmWork => PersonFilmWork::FIELDS,
    }
}
