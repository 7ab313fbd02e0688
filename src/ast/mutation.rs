//! Update mutations: per-field operators turned into SET assignments.

use std::collections::BTreeMap;

use super::types::*;
use crate::error::CompileError;

/// One field's update operator and operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(Value),
    Inc(Value),
    Mul(Value),
    Max(Value),
    Min(Value),
    CurrentDate(DateFunction),
}

impl FieldUpdate {
    /// `$max`/`$min` only write when the operand wins the comparison.
    pub fn is_conditional(&self) -> bool {
        matches!(self, FieldUpdate::Max(_) | FieldUpdate::Min(_))
    }

    fn set_expr(&self) -> SetExpr {
        match self {
            FieldUpdate::Set(v) => SetExpr::Value(v.clone()),
            FieldUpdate::Inc(v) => SetExpr::Arithmetic(Arithmetic::Add, v.clone()),
            FieldUpdate::Mul(v) => SetExpr::Arithmetic(Arithmetic::Multiply, v.clone()),
            FieldUpdate::Max(v) => SetExpr::Conditional(Extremum::Max, v.clone()),
            FieldUpdate::Min(v) => SetExpr::Conditional(Extremum::Min, v.clone()),
            FieldUpdate::CurrentDate(f) => SetExpr::Date(*f),
        }
    }

    fn insert_value(&self) -> InsertValue {
        match self {
            FieldUpdate::Set(v)
            | FieldUpdate::Inc(v)
            | FieldUpdate::Mul(v)
            | FieldUpdate::Max(v)
            | FieldUpdate::Min(v) => InsertValue::Bind(v.clone()),
            FieldUpdate::CurrentDate(f) => InsertValue::Native(*f),
        }
    }
}

/// Ordered field updates, each field targeted at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    updates: Vec<(String, FieldUpdate)>,
}

impl Mutation {
    pub fn push(&mut self, field: &str, update: FieldUpdate) -> Result<(), CompileError> {
        if self.updates.iter().any(|(f, _)| f == field) {
            return Err(CompileError::ConflictingMutation(field.to_string()));
        }
        self.updates.push((field.to_string(), update));
        Ok(())
    }

    pub fn updates(&self) -> &[(String, FieldUpdate)] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.updates
            .iter()
            .map(|(field, update)| Assignment {
                column: field.clone(),
                value: update.set_expr(),
            })
            .collect()
    }

    /// WHERE extension that keeps rows a pure `$max`/`$min` mutation would
    /// leave unchanged out of the affected-row count.
    ///
    /// Returns `None` as soon as any unconditional operator is present, since
    /// those rows are written regardless.
    pub fn change_guard(&self) -> Option<Clause> {
        if self.updates.is_empty() || !self.updates.iter().all(|(_, u)| u.is_conditional()) {
            return None;
        }
        let mut guards: Vec<Clause> = self
            .updates
            .iter()
            .filter_map(|(field, update)| {
                let (extremum, value) = match update {
                    FieldUpdate::Max(v) => (Extremum::Max, v),
                    FieldUpdate::Min(v) => (Extremum::Min, v),
                    _ => return None,
                };
                Some(Clause::Changes {
                    field: field.clone(),
                    extremum,
                    value: value.clone(),
                })
            })
            .collect();
        if guards.len() == 1 {
            return guards.pop();
        }
        Some(Clause::Or(
            guards
                .into_iter()
                .map(|g| Filter::default().and(g))
                .collect(),
        ))
    }

    /// Row inserted by an upsert that matched nothing: the filter's top-level
    /// equality fields overlaid with the mutation's operands.
    pub fn upsert_row(&self, filter: &Filter) -> (Vec<String>, Vec<InsertValue>) {
        let mut row: BTreeMap<String, InsertValue> = BTreeMap::new();
        for clause in &filter.clauses {
            if let Clause::Compare {
                field,
                op: Comparison::Eq,
                value,
            } = clause
            {
                row.insert(field.clone(), InsertValue::Bind(value.clone()));
            }
        }
        for (field, update) in &self.updates {
            row.insert(field.clone(), update.insert_value());
        }
        row.into_iter().unzip()
    }
}

/// Build the UPDATE for `mutation`, appending the change guard when needed.
pub fn build_update(table: TableRef, filter: Filter, mutation: &Mutation) -> UpdateStatement {
    let filter = match mutation.change_guard() {
        Some(guard) => filter.and(guard),
        None => filter,
    };
    UpdateStatement {
        table,
        assignments: mutation.assignments(),
        filter,
    }
}
