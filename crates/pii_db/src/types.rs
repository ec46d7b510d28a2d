//! Small helper types local to the database layer.

/// Which wire dialect a DSN resolves to. Derived from the DSN scheme rather
/// than queried, since the scheme is known before a connection is even
/// opened and every introspection query this crate issues branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    MySql,
    Sqlite,
}

impl DbKind {
    pub fn from_dsn(dsn: &str) -> Option<Self> {
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if dsn.starts_with("mysql://") {
            Some(Self::MySql)
        } else if dsn.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }

    pub fn product_name(self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
        }
    }
}
