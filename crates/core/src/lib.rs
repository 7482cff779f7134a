//! Cartside Core - Shared types library.
//!
//! This crate provides common types used across the Cartside client
//! components:
//! - `client` - Session and cart synchronization SDK
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe emails, product IDs, and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
