//! TinyQuery - an in-memory emulator of a cloud tabular query service
//!
//! This crate provides:
//! - SQL parsing, planning and columnar evaluation of a query subset
//! - An in-memory table store with create/write dispositions
//! - Query and copy jobs with identity-keyed result retrieval
//! - Request and response bodies in the emulated service's JSON shapes

pub mod api;
pub mod config;
mod emulator;
pub mod error;
pub mod job;
pub mod sql;
pub mod storage;

pub use emulator::TinyQuery;
