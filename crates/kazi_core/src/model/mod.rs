//! Catalog domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the pure identifier rules (code numerals, full artifact numbers).
//!
//! # Invariants
//! - Main codes are canonical 3-letter uppercase strings.
//! - Full artifact numbers are derived, never stored.

pub mod artifact;
pub mod code;
pub mod main_code;
