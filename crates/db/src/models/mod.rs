//! Entity structs and insert DTOs.
//!
//! Rows that are read back get a `FromRow` + `Serialize` struct; rows that
//! are only written get a create DTO.

pub mod measurement;
pub mod node;
