//! Inbound request shapes.
//!
//! These mirror the JSON an API layer hands to the engine. Payloads stay as
//! `serde_json` trees until the statement builder ingests them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::ast::parser::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// One document or an array of documents.
    pub document: Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOperation {
    One,
    #[default]
    All,
    Count,
    Distinct,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Projected columns; the values are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<BTreeMap<String, Json>>,
    /// Column names, `-` prefix for descending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub find: Document,
    #[serde(default)]
    pub operation: ReadOperation,
    #[serde(default)]
    pub options: ReadOptions,
    /// Aggregate function (`sum`, `max`, `min`, `avg`, `count`) to columns.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregate: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "group", alias = "groupBy", skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOperation {
    #[default]
    All,
    Upsert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub find: Document,
    #[serde(default)]
    pub operation: UpdateOperation,
    pub update: Document,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub find: Document,
}

/// A write operation inside a batch, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create(CreateRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(alias = "col")]
    pub table: String,
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchItem>,
}

/// Result of a read: the number of rows and their documents.
///
/// `count` reads carry the counted value in `count` and no documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadResult {
    pub count: u64,
    pub documents: Vec<Json>,
}
