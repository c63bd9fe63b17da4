//! Resource identifiers.
//!
//! An [`Id`] is the compact handle clients hold for a resource. It is minted by
//! a pool when a slot is allocated and names three things at once: the unique
//! stamp of that allocation, the slot index inside the pool, and the resource
//! type the pool serves.

use std::cmp::Ordering;
use std::fmt;

/// Handle to a resource living in a pool slot.
///
/// Ids are plain values: copying one does not touch any use count. Two ids are
/// equal iff all three components are equal, and they order by [`Id::pack`].
///
/// # Example
///
/// ```
/// use ember_resource::Id;
///
/// let id = Id::new(7, 3, 1);
/// assert!(id.is_valid());
/// assert_eq!(id.slot_index(), 3);
/// assert!(!Id::invalid().is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    unique_stamp: u32,
    slot_index: u16,
    res_type: u16,
}

static_assertions::assert_eq_size!(Id, u64);

impl Id {
    /// Unique stamp reserved for the invalid id.
    pub const INVALID_UNIQUE_STAMP: u32 = u32::MAX;
    /// Slot index carried by the invalid id.
    pub const INVALID_SLOT_INDEX: u16 = u16::MAX;
    /// Resource type carried by the invalid id.
    pub const INVALID_TYPE: u16 = u16::MAX;

    /// Pseudo-type matching every resource type.
    pub const ALL_TYPES: u16 = u16::MAX - 1;

    /// Build an id from its components.
    pub const fn new(unique_stamp: u32, slot_index: u16, res_type: u16) -> Self {
        Self {
            unique_stamp,
            slot_index,
            res_type,
        }
    }

    /// The invalid id.
    pub const fn invalid() -> Self {
        Self::new(
            Self::INVALID_UNIQUE_STAMP,
            Self::INVALID_SLOT_INDEX,
            Self::INVALID_TYPE,
        )
    }

    /// Pack the id into a single `u64`: `stamp << 32 | type << 16 | slot`.
    #[inline]
    pub const fn pack(&self) -> u64 {
        ((self.unique_stamp as u64) << 32) | ((self.res_type as u64) << 16) | self.slot_index as u64
    }

    /// Inverse of [`Id::pack`].
    #[inline]
    pub const fn unpack(packed: u64) -> Self {
        Self::new(
            (packed >> 32) as u32,
            (packed & 0xFFFF) as u16,
            ((packed >> 16) & 0xFFFF) as u16,
        )
    }

    /// True unless the unique stamp is the reserved invalid stamp.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.unique_stamp != Self::INVALID_UNIQUE_STAMP
    }

    #[inline]
    pub const fn unique_stamp(&self) -> u32 {
        self.unique_stamp
    }

    #[inline]
    pub const fn slot_index(&self) -> u16 {
        self.slot_index
    }

    #[inline]
    pub const fn res_type(&self) -> u16 {
        self.res_type
    }

    /// Reset to the invalid id.
    pub fn invalidate(&mut self) {
        *self = Self::invalid();
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pack().cmp(&other.pack())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("Id(invalid)");
        }
        f.debug_struct("Id")
            .field("stamp", &self.unique_stamp)
            .field("slot", &self.slot_index)
            .field("type", &self.res_type)
            .finish()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}#{}", self.res_type, self.slot_index, self.unique_stamp)
        } else {
            f.write_str("<invalid>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        let id = Id::default();
        assert!(!id.is_valid());
        assert_eq!(id, Id::invalid());
        assert_eq!(id.pack(), u64::MAX);
    }

    #[test]
    fn test_components() {
        let id = Id::new(0x1234_5678, 0xAB, 0x02);
        assert_eq!(id.unique_stamp(), 0x1234_5678);
        assert_eq!(id.slot_index(), 0xAB);
        assert_eq!(id.res_type(), 0x02);
        assert_eq!(id.pack(), 0x1234_5678_0002_00AB);
        assert_eq!(Id::unpack(id.pack()), id);
    }

    #[test]
    fn test_ordering_follows_pack() {
        let a = Id::new(1, 9, 0);
        let b = Id::new(2, 0, 0);
        let c = Id::new(2, 0, 1);
        assert!(a < b);
        assert!(b < c);
        assert!(c < Id::invalid());
    }

    #[test]
    fn test_equality_needs_all_components() {
        let a = Id::new(5, 1, 1);
        assert_ne!(a, Id::new(5, 1, 2));
        assert_ne!(a, Id::new(5, 2, 1));
        assert_ne!(a, Id::new(6, 1, 1));
        assert_eq!(a, Id::new(5, 1, 1));
    }

    #[test]
    fn test_invalidate() {
        let mut id = Id::new(3, 4, 5);
        id.invalidate();
        assert!(!id.is_valid());
        assert_eq!(format!("{}", id), "<invalid>");
    }
}
