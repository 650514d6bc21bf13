use crate::error::MigrateError;
use std::fmt;
use std::str::FromStr;

/// The managed tables. Anything else is never read or written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Genre,
    Person,
    FilmWork,
    GenreFilmWork,
    PersonFilmWork,
}

/// Parents strictly before the junction tables that reference them.
pub const PROCESSING_ORDER: [TableKind; 5] = [
    TableKind::Genre,
    TableKind::Person,
    TableKind::FilmWork,
    TableKind::GenreFilmWork,
    TableKind::PersonFilmWork,
];

impl TableKind {
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Genre => "genre",
            TableKind::Person => "person",
            TableKind::FilmWork => "film_work",
            TableKind::GenreFilmWork => "genre_film_work",
            TableKind::PersonFilmWork => "person_film_work",
        }
    }

    /// Tables this one holds foreign keys into.
    pub fn parents(self) -> &'static [TableKind] {
        match self {
            TableKind::GenreFilmWork => &[TableKind::FilmWork, TableKind::Genre],
            TableKind::PersonFilmWork => &[TableKind::FilmWork, TableKind::Person],
            _ => &[],
        }
    }
}

impl FromStr for TableKind {
    type Err = MigrateError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PROCESSING_ORDER
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| MigrateError::UnknownTable(s.to_string()))
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A possibly schema-qualified table name, as it appears in SQL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
}

impl Table {
    pub fn source(kind: TableKind) -> Self {
        Table {
            schema: None,
            name: kind.name().to_string(),
        }
    }

    pub fn target(schema: &str, kind: TableKind) -> Self {
        Table {
            schema: Some(schema.to_string()),
            name: kind.name().to_string(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
