//! Cache types for commerce API catalog responses.

use super::types::{Category, Product};

/// Cached value types. Only read-only catalog data is cached; cart and
/// order responses never enter the cache.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
    Category(Box<Category>),
    Categories(Vec<Category>),
}
