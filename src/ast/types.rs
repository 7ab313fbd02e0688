//! Logical statement AST for crudsql.
//!
//! Requests are ingested once into these types (see `parser.rs`); the renderer
//! in `compiler.rs` walks them and asks the active dialect for every
//! dialect-specific fragment. Nothing here knows about placeholders or quoting.

use std::fmt;

use serde::Serialize;

/// A typed bind value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            // i64::MAX as f64 rounds up to 2^63, hence the exclusive bound
            Value::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Render as a plain string the way catalog rows are consumed.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Json(j) => j.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Json(j) => j.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Comparison operators usable in a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

/// A conjunction of clauses. An empty filter matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// JSON containment: the column document contains `document`.
    Contains {
        field: String,
        document: serde_json::Value,
    },
    Like {
        field: String,
        pattern: Value,
    },
    Regex {
        field: String,
        pattern: Value,
    },
    /// Disjunction of sub-filters; an empty sub-filter always matches.
    Or(Vec<Filter>),
    /// Rows a `$max`/`$min` write of `value` would actually change.
    Changes {
        field: String,
        extremum: Extremum,
        value: Value,
    },
}

/// Table reference, optionally namespaced by the logical database/schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Top-level statement representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`
    All,
    Columns(Vec<String>),
    /// `COUNT(*)`
    Count,
    /// `DISTINCT column`
    Distinct(String),
    /// Plain columns followed by aggregate expressions.
    Aggregate {
        columns: Vec<String>,
        aggregates: Vec<Aggregate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Max,
    Min,
    Avg,
    Count,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggregateFunction::Sum),
            "max" => Some(AggregateFunction::Max),
            "min" => Some(AggregateFunction::Min),
            "avg" => Some(AggregateFunction::Avg),
            "count" => Some(AggregateFunction::Count),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
        }
    }
}

/// `FUNC(column) AS func_column`; `column` is `*` only for counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: String,
}

impl Aggregate {
    pub fn alias(&self) -> String {
        if self.column == "*" {
            self.function.name().to_string()
        } else {
            format!("{}_{}", self.function.name(), self.column)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: TableRef,
    pub projection: Projection,
    pub filter: Filter,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: TableRef,
    /// Empty with a single empty row renders `DEFAULT VALUES`.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<InsertValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertValue {
    Bind(Value),
    /// SQL-native expression such as `CURRENT_TIMESTAMP`
    Native(DateFunction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: SetExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Multiply,
}

impl Arithmetic {
    pub fn symbol(self) -> char {
        match self {
            Arithmetic::Add => '+',
            Arithmetic::Multiply => '*',
        }
    }
}

/// Which way a conditional write moves the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFunction {
    CurrentDate,
    CurrentTimestamp,
}

/// Right-hand side of a SET assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// `column=ph`
    Value(Value),
    /// `column=column<op>ph`
    Arithmetic(Arithmetic, Value),
    /// Keep the larger (`Max`) or smaller (`Min`) of column and operand.
    Conditional(Extremum, Value),
    Date(DateFunction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableRef,
    pub filter: Filter,
}

/// Rendered SQL text plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub args: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_display() {
        let bare = TableRef {
            namespace: None,
            name: "users".into(),
        };
        let qualified = TableRef {
            namespace: Some("app".into()),
            name: "users".into(),
        };
        assert_eq!(bare.to_string(), "users");
        assert_eq!(qualified.to_string(), "app.users");
    }

    #[test]
    fn test_value_serializes_untagged() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::String("x".into()),
            Value::Json(serde_json::json!({"a": 1})),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,7,"x",{"a":1}]"#);
    }

    #[test]
    fn test_value_as_bool() {
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::from("FALSE").as_bool(), Some(false));
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Int(-3).to_text(), "-3");
        assert_eq!(Value::from("abc").to_text(), "abc");
    }

    #[test]
    fn test_value_as_i64_rejects_out_of_range_floats() {
        assert_eq!(Value::Float(42.0).as_i64(), Some(42));
        assert_eq!(Value::Float(-1.0).as_i64(), Some(-1));
        assert_eq!(Value::Float(1.5).as_i64(), None);
        assert_eq!(Value::Float(1e19).as_i64(), None);
        assert_eq!(Value::Float(-1e19).as_i64(), None);
        assert_eq!(Value::Float(f64::NAN).as_i64(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_i64(), None);
    }

    #[test]
    fn test_aggregate_alias() {
        let sum = Aggregate {
            function: AggregateFunction::Sum,
            column: "price".into(),
        };
        assert_eq!(sum.alias(), "sum_price");
        let count = Aggregate {
            function: AggregateFunction::Count,
            column: "*".into(),
        };
        assert_eq!(count.alias(), "count");
        assert_eq!(AggregateFunction::from_name("median"), None);
    }
}
