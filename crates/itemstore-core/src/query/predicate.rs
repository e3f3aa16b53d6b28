use serde_json::Value;

///
/// Predicate
///
/// Backend-neutral predicate AST (Design Notes §9: the target language
/// lacks expression trees, so predicates are a small algebraic data type
/// rather than a true expression tree). Built with the fluent helpers
/// below and composed with `And`/`Or`/`Not`.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Contains(String, Value),
    StartsWith(String, String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    #[must_use]
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Le(field.into(), value.into())
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    #[must_use]
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ge(field.into(), value.into())
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Every field name referenced anywhere in this predicate tree.
    pub(crate) fn field_names(&self, out: &mut Vec<String>) {
        match self {
            Self::Eq(f, _)
            | Self::Ne(f, _)
            | Self::Lt(f, _)
            | Self::Le(f, _)
            | Self::Gt(f, _)
            | Self::Ge(f, _)
            | Self::Contains(f, _)
            | Self::StartsWith(f, _) => out.push(f.clone()),
            Self::And(a, b) | Self::Or(a, b) => {
                a.field_names(out);
                b.field_names(out);
            }
            Self::Not(a) => a.field_names(out),
        }
    }

    /// Evaluate this predicate against a serialized JSON object. Used by
    /// the in-memory reference adapter; real backends translate the AST
    /// to their native query language instead of evaluating it directly.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq(f, v) => row.get(f) == Some(v),
            Self::Ne(f, v) => row.get(f) != Some(v),
            Self::Lt(f, v) => compare(row.get(f), v).is_some_and(|o| o.is_lt()),
            Self::Le(f, v) => compare(row.get(f), v).is_some_and(|o| o.is_le()),
            Self::Gt(f, v) => compare(row.get(f), v).is_some_and(|o| o.is_gt()),
            Self::Ge(f, v) => compare(row.get(f), v).is_some_and(|o| o.is_ge()),
            Self::Contains(f, v) => row
                .get(f)
                .and_then(Value::as_array)
                .is_some_and(|arr| arr.contains(v)),
            Self::StartsWith(f, prefix) => row
                .get(f)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Self::And(a, b) => a.matches(row) && b.matches(row),
            Self::Or(a, b) => a.matches(row) || b.matches(row),
            Self::Not(a) => !a.matches(row),
        }
    }
}

fn compare(lhs: Option<&Value>, rhs: &Value) -> Option<std::cmp::Ordering> {
    let lhs = lhs?;
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
