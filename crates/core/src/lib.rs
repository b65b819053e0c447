//! Inkwell Core - Shared types library.
//!
//! This crate provides common types used across the Inkwell components:
//! - `storefront` - Public-facing e-commerce site
//! - `integration-tests` - End-to-end tests against a stub commerce API
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
