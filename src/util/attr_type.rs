//! Attribute element types - the four storage types a particle cache can hold.

use bytemuck::Pod;
use std::fmt;

/// Element type of a particle or fixed attribute.
///
/// Every cache format in this crate stores its values as one of these four
/// types. Each element occupies exactly four bytes on disk and in memory;
/// `Vector` is three float elements, and `IndexedStr` stores an `i32` token
/// into the attribute's string table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AttributeType {
    /// 32-bit floating point scalar
    #[default]
    Float = 0,
    /// Three 32-bit floats (tuple width fixed at 3)
    Vector = 1,
    /// 32-bit signed integer
    Int = 2,
    /// String stored as an i32 token into a per-attribute dictionary
    IndexedStr = 3,
}

impl AttributeType {
    /// Size in bytes of a single element of this type.
    ///
    /// The tuple width is not included: a `Vector` value is
    /// `3 * element_size()` bytes.
    #[inline]
    pub const fn element_size(self) -> usize {
        4
    }

    /// Returns the name of this type as used in diagnostics.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "FLOAT",
            Self::Vector => "VECTOR",
            Self::Int => "INT",
            Self::IndexedStr => "INDEXEDSTR",
        }
    }

    /// Returns true if elements of this type are stored as `f32`.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Vector)
    }

    /// Returns true if elements of this type are stored as `i32`.
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::Int | Self::IndexedStr)
    }

    /// Canonical tuple width for a requested count.
    ///
    /// `Vector` is always width 3 regardless of the requested count; every
    /// other type keeps the caller's count.
    #[inline]
    pub const fn normalized_count(self, count: usize) -> usize {
        match self {
            Self::Vector => 3,
            _ => count,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait for the primitive types attribute data can be viewed as.
///
/// Sealed to `f32` (FLOAT/VECTOR columns) and `i32` (INT/INDEXEDSTR
/// columns). Typed store accessors check the element type against
/// [`AttributeType::is_float`]/[`is_int`](AttributeType::is_int) before
/// handing out a view.
pub trait AttrElement: Pod + Copy + Default + private::Sealed {
    /// True when this primitive matches the given attribute type's storage.
    fn matches(attr_type: AttributeType) -> bool;

    /// Diagnostic name of the primitive ("FLOAT" / "INT").
    const NAME: &'static str;
}

impl AttrElement for f32 {
    #[inline]
    fn matches(attr_type: AttributeType) -> bool {
        attr_type.is_float()
    }

    const NAME: &'static str = "FLOAT";
}

impl AttrElement for i32 {
    #[inline]
    fn matches(attr_type: AttributeType) -> bool {
        attr_type.is_int()
    }

    const NAME: &'static str = "INT";
}

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for i32 {}
}
