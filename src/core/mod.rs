//! Core layer - the in-memory particle store and its operations.
//!
//! This module provides:
//! - [`Attribute`] - Resolved handle to a registered attribute
//! - [`ParticleStore`] - Columnar container for per-particle and fixed data
//! - [`AttrView`] / [`AttrViewMut`] - Prepared bulk cursors over one column
//! - [`clone_schema`] / [`clone`] - Schema-preserving and deep copies
//! - [`merge`] - Identifier-keyed merge of two stores

mod access;
mod attribute;
mod clone;
mod merge;
mod store;

pub use access::{AttrView, AttrViewMut};
pub use attribute::Attribute;
pub use clone::{clone, clone_schema};
pub use merge::merge;
pub use store::ParticleStore;
