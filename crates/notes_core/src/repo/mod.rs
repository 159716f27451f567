//! Repository layer: note persistence contract and error taxonomy.
//!
//! # Invariants
//! - Repositories return semantic errors (`NotFound`, `DuplicateTitle`)
//!   distinct from store transport errors.
//! - No repository call retries on its own.

pub mod error;
pub mod note_repo;
