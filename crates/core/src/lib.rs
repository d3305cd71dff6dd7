//! Marketline Core - Shared types library.
//!
//! This crate provides common types used across all Marketline components:
//! - `storefront` - Customer-facing shop
//! - `admin` - Staff panel for catalog, review, order and invoice management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no session handling. This keeps it lightweight and testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, ratings, statuses
//! - [`cart`] - Client-side cart store (quantities and selection)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{
    Availability, Cart, CartAdjustment, CartError, CartLine, Catalog, CatalogEntry, PricedCart,
    PricedLine,
};
pub use types::*;
