//! Store clients and the orchestration built on top of them.

pub mod blob_store;
pub mod catalog_store;
pub mod keygen;
pub mod orchestrator;
pub mod validator;
