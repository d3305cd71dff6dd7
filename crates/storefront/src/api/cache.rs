//! Cached values for catalog reads.

use super::types::{Category, Page, Product};

/// Cached value types, keyed by strings such as `product:7`.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Category(Box<Category>),
    Categories(Vec<Category>),
}

pub fn product_key(id: impl std::fmt::Display) -> String {
    format!("product:{id}")
}

pub fn category_key(id: impl std::fmt::Display) -> String {
    format!("category:{id}")
}

pub const CATEGORIES_KEY: &str = "categories";
