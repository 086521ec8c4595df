//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Two entities are the same entity when their ids match, whatever the rest of
/// their state looks like. Implementors should make `PartialEq`/`Hash` agree
/// with `id()`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Identity comparison, ignoring every attribute other than the id.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
