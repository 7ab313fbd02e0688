/// JSON request → logical AST ingestion.
///
/// Filters, mutations and documents arrive as `serde_json` trees. They are
/// converted exactly once here into typed [`Filter`], [`Mutation`] and row
/// values, so the renderer never inspects raw JSON.
use serde_json::{Map, Value as Json};

use super::mutation::{FieldUpdate, Mutation};
use super::types::*;
use crate::error::CompileError;

pub type Document = Map<String, Json>;

/// Mutation operators in the order their assignments are rendered.
pub const MUTATION_OPERATORS: [&str; 6] = ["$set", "$inc", "$mul", "$max", "$min", "$currentDate"];

/// Normalize a JSON scalar into a bind value.
///
/// Integral numbers representable as `i64` become [`Value::Int`]; other
/// numbers become [`Value::Float`]. Arrays and objects stay JSON documents.
pub fn convert_value(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(_) | Json::Object(_) => Value::Json(value.clone()),
    }
}

/// Parse a `find` document into a filter. An empty document matches all rows.
pub fn parse_filter(find: &Document) -> Result<Filter, CompileError> {
    let mut filter = Filter::default();
    for (key, value) in find {
        if key == "$or" {
            filter.clauses.push(convert_or(value)?);
            continue;
        }
        if key.starts_with('$') {
            return Err(CompileError::UnknownOperator(key.clone()));
        }
        convert_field(&mut filter, key, value)?;
    }
    Ok(filter)
}

fn convert_or(value: &Json) -> Result<Clause, CompileError> {
    let members = match value {
        Json::Array(members) if !members.is_empty() => members,
        Json::Array(_) => {
            return Err(CompileError::MalformedCombinator(
                "$or".into(),
                "expected a non-empty array".into(),
            ))
        }
        other => {
            return Err(CompileError::MalformedCombinator(
                "$or".into(),
                format!("expected an array, found {}", json_kind(other)),
            ))
        }
    };

    let mut filters = Vec::with_capacity(members.len());
    for member in members {
        match member {
            Json::Object(doc) => filters.push(parse_filter(doc)?),
            other => {
                return Err(CompileError::MalformedCombinator(
                    "$or".into(),
                    format!("expected objects, found {}", json_kind(other)),
                ))
            }
        }
    }
    Ok(Clause::Or(filters))
}

fn convert_field(filter: &mut Filter, field: &str, value: &Json) -> Result<(), CompileError> {
    match value {
        Json::Object(ops) => {
            if ops.is_empty() || ops.keys().any(|k| !k.starts_with('$')) {
                return Err(invalid(
                    "=",
                    field,
                    "nested documents cannot be compared, use $contains",
                ));
            }
            for (op, operand) in ops {
                filter.clauses.push(convert_operator(field, op, operand)?);
            }
            Ok(())
        }
        Json::Array(_) => Err(invalid("=", field, "arrays cannot be compared, use $in")),
        scalar => {
            filter.clauses.push(Clause::Compare {
                field: field.to_string(),
                op: Comparison::Eq,
                value: convert_value(scalar),
            });
            Ok(())
        }
    }
}

fn convert_operator(field: &str, op: &str, operand: &Json) -> Result<Clause, CompileError> {
    let comparison = match op {
        "$eq" => Some(Comparison::Eq),
        "$ne" => Some(Comparison::Ne),
        "$gt" => Some(Comparison::Gt),
        "$gte" => Some(Comparison::Gte),
        "$lt" => Some(Comparison::Lt),
        "$lte" => Some(Comparison::Lte),
        _ => None,
    };
    if let Some(op_kind) = comparison {
        if operand.is_array() || operand.is_object() {
            return Err(invalid(op, field, "expected a scalar"));
        }
        return Ok(Clause::Compare {
            field: field.to_string(),
            op: op_kind,
            value: convert_value(operand),
        });
    }

    match op {
        "$in" | "$nin" => {
            let values = match operand {
                Json::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        if item.is_array() || item.is_object() {
                            return Err(invalid(op, field, "list elements must be scalars"));
                        }
                        values.push(convert_value(item));
                    }
                    values
                }
                Json::Object(_) => return Err(invalid(op, field, "expected a list")),
                scalar => vec![convert_value(scalar)],
            };
            Ok(Clause::In {
                field: field.to_string(),
                values,
                negated: op == "$nin",
            })
        }
        "$contains" => Ok(Clause::Contains {
            field: field.to_string(),
            document: operand.clone(),
        }),
        "$like" | "$regex" => {
            let pattern = match operand {
                Json::String(s) => Value::String(s.clone()),
                _ => return Err(invalid(op, field, "expected a string pattern")),
            };
            Ok(if op == "$like" {
                Clause::Like {
                    field: field.to_string(),
                    pattern,
                }
            } else {
                Clause::Regex {
                    field: field.to_string(),
                    pattern,
                }
            })
        }
        _ => Err(CompileError::UnknownOperator(op.to_string())),
    }
}

/// Accept one document or an array of documents.
pub fn parse_documents(value: &Json) -> Result<Vec<Document>, CompileError> {
    match value {
        Json::Object(doc) => Ok(vec![doc.clone()]),
        Json::Array(items) => {
            if items.is_empty() {
                return Err(CompileError::InvalidDocument(
                    "no documents provided for insert".into(),
                ));
            }
            items
                .iter()
                .map(|item| match item {
                    Json::Object(doc) => Ok(doc.clone()),
                    other => Err(CompileError::InvalidDocument(format!(
                        "expected an object, found {}",
                        json_kind(other)
                    ))),
                })
                .collect()
        }
        other => Err(CompileError::InvalidDocument(format!(
            "expected an object or array of objects, found {}",
            json_kind(other)
        ))),
    }
}

/// Parse an update document (`{"$set": {...}, "$inc": {...}}`).
pub fn parse_mutation(update: &Document) -> Result<Mutation, CompileError> {
    if let Some(op) = update.keys().find(|k| !MUTATION_OPERATORS.contains(&k.as_str())) {
        return Err(CompileError::UnknownOperator(op.clone()));
    }

    let mut mutation = Mutation::default();
    for op in MUTATION_OPERATORS {
        let Some(fields) = update.get(op) else {
            continue;
        };
        let fields = match fields {
            Json::Object(fields) => fields,
            other => {
                return Err(CompileError::InvalidOperand {
                    op: op.to_string(),
                    field: String::new(),
                    reason: format!("expected an object, found {}", json_kind(other)),
                })
            }
        };
        for (field, operand) in fields {
            let field_update = convert_field_update(op, field, operand)?;
            mutation.push(field, field_update)?;
        }
    }

    if mutation.is_empty() {
        return Err(CompileError::EmptyMutation);
    }
    Ok(mutation)
}

fn convert_field_update(op: &str, field: &str, operand: &Json) -> Result<FieldUpdate, CompileError> {
    let numeric = || {
        let value = convert_value(operand);
        if value.is_numeric() {
            Ok(value)
        } else {
            Err(invalid(op, field, "expected a number"))
        }
    };
    match op {
        "$set" => Ok(FieldUpdate::Set(convert_value(operand))),
        "$inc" => Ok(FieldUpdate::Inc(numeric()?)),
        "$mul" => Ok(FieldUpdate::Mul(numeric()?)),
        "$max" => Ok(FieldUpdate::Max(numeric()?)),
        "$min" => Ok(FieldUpdate::Min(numeric()?)),
        "$currentDate" => convert_current_date(field, operand).map(FieldUpdate::CurrentDate),
        _ => Err(CompileError::UnknownOperator(op.to_string())),
    }
}

fn convert_current_date(field: &str, operand: &Json) -> Result<DateFunction, CompileError> {
    let kind = operand
        .as_object()
        .and_then(|spec| spec.get("$type"))
        .and_then(Json::as_str);
    match kind {
        Some("date") => Ok(DateFunction::CurrentDate),
        Some("timestamp") => Ok(DateFunction::CurrentTimestamp),
        Some(other) => Err(invalid(
            "$currentDate",
            field,
            &format!("invalid current date value ({})", other),
        )),
        None => Err(invalid(
            "$currentDate",
            field,
            "expected {\"$type\": \"date\" | \"timestamp\"}",
        )),
    }
}

fn invalid(op: &str, field: &str, reason: &str) -> CompileError {
    CompileError::InvalidOperand {
        op: op.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
