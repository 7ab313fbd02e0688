/// Logical statement AST and the request → SQL pipeline.
///
/// ```text
/// Request JSON (find / update / documents)
///       ↓
/// Ingestion               (parser.rs)
///       ↓
/// Logical AST             (types.rs, mutation.rs)
///       ↓
/// Statement construction  (builder.rs)
///       ↓
/// Dialect-aware renderer  (compiler.rs + crate::dialect)
///       ↓
/// Executor                (crate::db)
/// ```
pub mod builder;
pub mod compiler;
pub mod mutation;
pub mod parser;
pub mod types;

// Re-export key types for convenience
pub use builder::{StatementBuilder, UpsertPlan};
pub use compiler::{compile, compile_filter, Params};
pub use mutation::{FieldUpdate, Mutation};
pub use parser::{parse_documents, parse_filter, parse_mutation, Document};
pub use types::*;
