//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two instances holding the same attribute
/// values are the same value (`Money { 1500, "EUR" }` is a value object, a
/// `Partner` with a `PartyId` is not). They are immutable; "changing" one means
/// building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
