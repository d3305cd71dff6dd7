//! Session-backed services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart store persisted in the session, reconciled against the
//!   backend catalog
//! - `flash` - One-shot toast messages shown on the next rendered page

pub mod cart;
pub mod flash;
