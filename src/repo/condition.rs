//! Predicates composed into `WHERE` clauses.
//!
//! Every condition renders one fragment using the neutral `?` bind marker and
//! contributes its bound values in order. Conditions are only ever AND-ed.

use sea_orm::Value;

/// AND-composed list of conditions. Declaration order fixes argument order.
pub type Conditions = Vec<Condition>;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equal { field: String, value: Value },
    NotEqual { field: String, value: Value },
    NotNull { field: String },
    In { field: String, values: Vec<Value> },
    InSubquery {
        field: String,
        query: String,
        args: Vec<Value>,
    },
    NotRegexMatch { field: String, pattern: Value },
}

impl Condition {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::NotNull {
            field: field.into(),
        }
    }

    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `field IN (<query>)`; `query` must use neutral `?` markers for `args`.
    pub fn in_subquery(field: impl Into<String>, query: impl Into<String>, args: Vec<Value>) -> Self {
        Self::InSubquery {
            field: field.into(),
            query: query.into(),
            args,
        }
    }

    pub fn not_regex_match(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::NotRegexMatch {
            field: field.into(),
            pattern: Value::from(pattern.into()),
        }
    }

    /// Column the predicate constrains.
    pub fn field(&self) -> &str {
        match self {
            Self::Equal { field, .. }
            | Self::NotEqual { field, .. }
            | Self::NotNull { field }
            | Self::In { field, .. }
            | Self::InSubquery { field, .. }
            | Self::NotRegexMatch { field, .. } => field,
        }
    }

    pub fn fragment(&self) -> String {
        match self {
            Self::Equal { field, .. } => format!("{field} = ?"),
            Self::NotEqual { field, .. } => format!("{field} != ?"),
            Self::NotNull { field } => format!("{field} IS NOT NULL"),
            Self::In { values, .. } if values.is_empty() => "FALSE".to_string(),
            Self::In { field, values } => {
                let markers = vec!["?"; values.len()].join(", ");
                format!("{field} IN ({markers})")
            }
            Self::InSubquery { field, query, .. } => format!("{field} IN ({query})"),
            Self::NotRegexMatch { field, .. } => format!("NOT {field} ~ ?"),
        }
    }

    /// Bound values, or `None` when the fragment binds nothing.
    pub fn args(&self) -> Option<&[Value]> {
        match self {
            Self::Equal { value, .. } | Self::NotEqual { value, .. } => {
                Some(std::slice::from_ref(value))
            }
            Self::NotRegexMatch { pattern, .. } => Some(std::slice::from_ref(pattern)),
            Self::NotNull { .. } => None,
            Self::In { values, .. } if values.is_empty() => None,
            Self::In { values, .. } => Some(values.as_slice()),
            Self::InSubquery { args, .. } if args.is_empty() => None,
            Self::InSubquery { args, .. } => Some(args.as_slice()),
        }
    }
}

/// Renders `a AND b AND ...` and collects the bound values in order.
pub(crate) fn render(conditions: &[Condition]) -> (String, Vec<Value>) {
    let fragments: Vec<String> = conditions.iter().map(Condition::fragment).collect();
    let args = conditions
        .iter()
        .filter_map(Condition::args)
        .flat_map(|args| args.iter().cloned())
        .collect();
    (fragments.join(" AND "), args)
}
