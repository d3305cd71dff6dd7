//! Core types for Marketline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pagination;
pub mod price;
pub mod rating;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use pagination::Pagination;
pub use price::{Vnd, discount_percent};
pub use rating::{Rating, RatingError, average_stars};
pub use status::*;
