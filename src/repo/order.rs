//! Result ordering.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// Ordered list of sort keys. An empty spec means the database decides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBySpec(Vec<OrderBy>);

impl OrderBySpec {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new(keys: impl IntoIterator<Item = OrderBy>) -> Self {
        Self(keys.into_iter().collect())
    }

    pub fn then(mut self, key: OrderBy) -> Self {
        self.0.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[OrderBy] {
        &self.0
    }

    /// ` ORDER BY a ASC, b DESC`, or an empty string.
    pub(crate) fn to_sql(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        format!(" ORDER BY {}", keys.join(", "))
    }
}

impl From<OrderBy> for OrderBySpec {
    fn from(key: OrderBy) -> Self {
        Self(vec![key])
    }
}
