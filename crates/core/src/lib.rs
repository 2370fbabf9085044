//! Core business logic for Paciolus.
//!
//! This crate contains pure business logic with ZERO network or storage
//! dependencies. Uploaded trial balances are classified by the backend into
//! lead sheets; everything derived from that classification on the client
//! lives here.
//!
//! # Modules
//!
//! - `statements` - Lead-sheet model and financial statement derivation

pub mod statements;
