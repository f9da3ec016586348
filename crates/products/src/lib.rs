//! Product catalog module (event-sourced).
//!
//! Only what order conversion needs: identity, unit of measure and weight.

pub mod product;

pub use product::{
    CreateProduct, LogisticsUpdated, Product, ProductCommand, ProductCreated, ProductEvent,
    ProductId, UomId, UpdateLogistics,
};
