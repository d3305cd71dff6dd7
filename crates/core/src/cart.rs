//! Client-side cart store.
//!
//! The cart only remembers *which* products the shopper wants, how many,
//! and whether each line is ticked for checkout. Names, prices and stock
//! belong to the remote catalog and are joined in at render time through
//! the [`Catalog`] trait, so a stale cart never shows stale prices.
//!
//! # Invariants
//!
//! - every line has `quantity >= 1`
//! - a product appears in at most one line
//! - lines keep insertion order
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use marketline_core::{Cart, CatalogEntry, ProductId, Vnd};
//!
//! let tea = ProductId::new(1);
//! let mut catalog = HashMap::new();
//! catalog.insert(tea, CatalogEntry::new("Green tea", Vnd::from_dong(45_000), 10));
//!
//! let mut cart = Cart::default();
//! cart.add(tea, 2, 10).unwrap();
//!
//! let priced = cart.price(&catalog);
//! assert_eq!(priced.selected_subtotal, Vnd::from_dong(90_000));
//! assert!(priced.checkout_ready());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};

use crate::types::{ProductId, Vnd};

/// Errors returned by cart operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartError {
    /// Tried to add zero items.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The product has no stock left.
    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),
    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),
}

/// One product in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product reference into the remote catalog.
    pub product_id: ProductId,
    /// Number of units, always at least 1.
    pub quantity: u32,
    /// Whether the line is ticked for checkout.
    pub selected: bool,
}

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// All lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Result<&mut CartLine, CartError> {
        self.lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CartError::LineNotFound(product_id))
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of quantities across all lines (the badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Lines ticked for checkout.
    pub fn selected_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|l| l.selected)
    }

    /// Product ids of every line, for fetching catalog entries.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    /// Add units of a product, merging with an existing line.
    ///
    /// The resulting quantity is clamped to `stock`. The line ends up
    /// selected. Returns the line's quantity after the change.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ZeroQuantity` for `quantity == 0` and
    /// `CartError::OutOfStock` when `stock == 0`.
    pub fn add(&mut self, product_id: ProductId, quantity: u32, stock: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if stock == 0 {
            return Err(CartError::OutOfStock(product_id));
        }

        if let Ok(line) = self.line_mut(product_id) {
            line.quantity = line.quantity.saturating_add(quantity).min(stock);
            line.selected = true;
            return Ok(line.quantity);
        }

        let quantity = quantity.min(stock);
        self.lines.push(CartLine {
            product_id,
            quantity,
            selected: true,
        });
        Ok(quantity)
    }

    /// Set the quantity of a line.
    ///
    /// `0` removes the line; anything else is clamped to `1..=stock`.
    /// Returns the quantity after the change.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32, stock: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            self.remove(product_id)?;
            return Ok(0);
        }

        let line = self.line_mut(product_id)?;
        line.quantity = quantity.min(stock).max(1);
        Ok(line.quantity)
    }

    /// Add one unit, bounded by `stock`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn increment(&mut self, product_id: ProductId, stock: u32) -> Result<u32, CartError> {
        let current = self.line_mut(product_id)?.quantity;
        self.set_quantity(product_id, current.saturating_add(1), stock)
    }

    /// Remove one unit, never going below 1.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn decrement(&mut self, product_id: ProductId, stock: u32) -> Result<u32, CartError> {
        let current = self.line_mut(product_id)?.quantity;
        self.set_quantity(product_id, current.saturating_sub(1).max(1), stock)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or(CartError::LineNotFound(product_id))?;
        Ok(self.lines.remove(index))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Flip the checkout tick of a line. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn toggle(&mut self, product_id: ProductId) -> Result<bool, CartError> {
        let line = self.line_mut(product_id)?;
        line.selected = !line.selected;
        Ok(line.selected)
    }

    /// Tick or untick every line.
    pub fn select_all(&mut self, selected: bool) {
        for line in &mut self.lines {
            line.selected = selected;
        }
    }

    /// Whether the cart is non-empty and every line is ticked.
    #[must_use]
    pub fn all_selected(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.selected)
    }

    /// Take the ticked lines out of the cart, leaving the rest.
    ///
    /// Called once an order for those lines has been placed.
    pub fn remove_selected(&mut self) -> Vec<CartLine> {
        let (selected, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.lines).into_iter().partition(|l| l.selected);
        self.lines = kept;
        selected
    }

    /// Join every line with the catalog.
    #[must_use]
    pub fn price<C: Catalog + ?Sized>(&self, catalog: &C) -> PricedCart {
        let lines: Vec<PricedLine> = self
            .lines
            .iter()
            .map(|line| PricedLine::new(line, catalog.entry(line.product_id)))
            .collect();

        let selected = lines.iter().filter(|l| l.selected);
        let selected_subtotal: Vnd = selected.clone().map(|l| l.line_total).sum();
        let selected_quantity = selected.fold(0u32, |acc, l| acc.saturating_add(l.quantity));

        PricedCart {
            lines,
            selected_subtotal,
            selected_quantity,
        }
    }

    /// Bring the cart in line with the current catalog.
    ///
    /// - products that disappeared or were deactivated are dropped
    /// - quantities above the remaining stock are lowered to it
    /// - out-of-stock lines stay in the cart but are unticked
    ///
    /// Returns what changed so the caller can tell the shopper.
    pub fn reconcile<C: Catalog + ?Sized>(&mut self, catalog: &C) -> Vec<CartAdjustment> {
        let mut adjustments = Vec::new();

        self.lines.retain_mut(|line| {
            let Some(entry) = catalog.entry(line.product_id).filter(|e| e.active) else {
                adjustments.push(CartAdjustment::Removed {
                    product_id: line.product_id,
                    name: catalog.entry(line.product_id).map(|e| e.name.clone()),
                });
                return false;
            };

            if entry.stock == 0 {
                if line.selected {
                    line.selected = false;
                    adjustments.push(CartAdjustment::Deselected {
                        product_id: line.product_id,
                        name: entry.name.clone(),
                    });
                }
            } else if line.quantity > entry.stock {
                adjustments.push(CartAdjustment::Clamped {
                    product_id: line.product_id,
                    name: entry.name.clone(),
                    from: line.quantity,
                    to: entry.stock,
                });
                line.quantity = entry.stock;
            }

            true
        });

        adjustments
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// What the cart needs to know about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display name.
    pub name: String,
    /// Price per unit the shopper will pay (sale price when on sale).
    pub unit_price: Vnd,
    /// Units the backend reports as available.
    pub stock: u32,
    /// Thumbnail URL.
    pub image: Option<String>,
    /// Whether the product is still sold.
    pub active: bool,
}

impl CatalogEntry {
    /// An active entry without an image.
    #[must_use]
    pub fn new(name: impl Into<String>, unit_price: Vnd, stock: u32) -> Self {
        Self {
            name: name.into(),
            unit_price,
            stock,
            image: None,
            active: true,
        }
    }
}

/// Product lookup used to price and reconcile a cart.
pub trait Catalog {
    /// The entry for a product, if the catalog knows it.
    fn entry(&self, product_id: ProductId) -> Option<&CatalogEntry>;
}

impl<S: BuildHasher> Catalog for HashMap<ProductId, CatalogEntry, S> {
    fn entry(&self, product_id: ProductId) -> Option<&CatalogEntry> {
        self.get(&product_id)
    }
}

// =============================================================================
// Priced view
// =============================================================================

/// Whether a cart line can be bought as it stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// In stock for the requested quantity.
    Available,
    /// In stock, but fewer units than requested.
    ExceedsStock {
        /// Units left.
        stock: u32,
    },
    /// No units left.
    OutOfStock,
    /// Missing from the catalog or no longer sold.
    Unavailable,
}

impl Availability {
    /// Whether the line can be checked out.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// A cart line joined with its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected: bool,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Vnd,
    pub line_total: Vnd,
    pub stock: u32,
    pub availability: Availability,
}

impl PricedLine {
    fn new(line: &CartLine, entry: Option<&CatalogEntry>) -> Self {
        match entry {
            Some(entry) if entry.active => {
                let availability = if entry.stock == 0 {
                    Availability::OutOfStock
                } else if line.quantity > entry.stock {
                    Availability::ExceedsStock { stock: entry.stock }
                } else {
                    Availability::Available
                };

                Self {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    selected: line.selected,
                    name: entry.name.clone(),
                    image: entry.image.clone(),
                    unit_price: entry.unit_price,
                    line_total: entry.unit_price.checked_mul(line.quantity).unwrap_or_default(),
                    stock: entry.stock,
                    availability,
                }
            }
            other => Self {
                product_id: line.product_id,
                quantity: line.quantity,
                selected: line.selected,
                name: other.map_or_else(|| "Unavailable product".to_string(), |e| e.name.clone()),
                image: other.and_then(|e| e.image.clone()),
                unit_price: Vnd::zero(),
                line_total: Vnd::zero(),
                stock: 0,
                availability: Availability::Unavailable,
            },
        }
    }
}

/// A cart with prices and availability resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    /// Sum of line totals over ticked lines.
    pub selected_subtotal: Vnd,
    /// Sum of quantities over ticked lines.
    pub selected_quantity: u32,
}

impl PricedCart {
    /// Ticked lines.
    pub fn selected(&self) -> impl Iterator<Item = &PricedLine> {
        self.lines.iter().filter(|l| l.selected)
    }

    /// At least one ticked line, and every ticked line is available.
    #[must_use]
    pub fn checkout_ready(&self) -> bool {
        let mut selected = self.selected().peekable();
        selected.peek().is_some() && selected.all(|l| l.availability.is_available())
    }
}

// =============================================================================
// Adjustments
// =============================================================================

/// A change made by [`Cart::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAdjustment {
    /// The line was dropped because the product is gone.
    Removed {
        product_id: ProductId,
        name: Option<String>,
    },
    /// The quantity was lowered to the remaining stock.
    Clamped {
        product_id: ProductId,
        name: String,
        from: u32,
        to: u32,
    },
    /// The line was unticked because the product sold out.
    Deselected { product_id: ProductId, name: String },
}

impl fmt::Display for CartAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed {
                name: Some(name), ..
            } => write!(f, "{name} is no longer available and was removed from your cart"),
            Self::Removed { .. } => {
                write!(f, "A product is no longer available and was removed from your cart")
            }
            Self::Clamped { name, to, .. } => {
                write!(f, "Only {to} of {name} left in stock, quantity updated")
            }
            Self::Deselected { name, .. } => write!(f, "{name} is out of stock"),
        }
    }
}
