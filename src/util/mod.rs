//! Utility types for the particle cache library.
//!
//! This module contains fundamental types used throughout the library:
//! - [`AttributeType`] - Enum of the four attribute element types
//! - [`AttrElement`] - Trait over the primitive view types (`f32`, `i32`)
//! - [`Error`] / [`Result`] - Error handling

mod attr_type;
mod error;

pub use attr_type::*;
pub use error::*;
