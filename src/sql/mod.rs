//! SQL processing module
//!
//! This module provides:
//! - `parser`: SQL lexer and parser
//! - `types`: SQL data types and operator rules
//! - `schema`: Field and schema definitions
//! - `plan`: Name resolution and typed plan generation
//! - `executor`: Columnar plan execution
//! - `engine`: Catalog abstraction and query sessions

pub mod engine;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
