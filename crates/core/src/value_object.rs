//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attributes are interchangeable. An order line is one; a batch,
/// which keeps its identity while its allocations change, is not.
///
/// `Eq + Hash` are required so value objects can live in hash sets, which is
/// how an entity keeps "at most once" collections of them.
pub trait ValueObject: Clone + Eq + core::hash::Hash + core::fmt::Debug {}
