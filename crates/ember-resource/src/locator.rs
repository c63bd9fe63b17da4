//! Sharing keys.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Key deciding whether two resource requests resolve to the same resource.
///
/// A locator is a location string plus a signature. The signature lets callers
/// keep several variants of the same location apart (for instance the same file
/// decoded with different options). Two reserved signatures exist:
///
/// - [`Locator::NON_SHARED_SIGNATURE`] - never shared, every request creates a
///   new resource
/// - [`Locator::DEFAULT_SIGNATURE`] - normal sharing by location
///
/// Locators are immutable and cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    location: Option<Arc<str>>,
    signature: u32,
}

impl Locator {
    pub const NON_SHARED_SIGNATURE: u32 = u32::MAX;
    pub const DEFAULT_SIGNATURE: u32 = u32::MAX - 1;

    /// Shareable locator with the default signature.
    pub fn new(location: impl AsRef<str>) -> Self {
        Self::with_signature(location, Self::DEFAULT_SIGNATURE)
    }

    /// Locator with an explicit signature.
    pub fn with_signature(location: impl AsRef<str>, signature: u32) -> Self {
        let location = location.as_ref();
        Self {
            location: (!location.is_empty()).then(|| Arc::from(location)),
            signature,
        }
    }

    /// Locator with a location that is never shared.
    pub fn non_shared_at(location: impl AsRef<str>) -> Self {
        Self::with_signature(location, Self::NON_SHARED_SIGNATURE)
    }

    /// Empty, non-shared locator.
    pub fn non_shared() -> Self {
        Self {
            location: None,
            signature: Self::NON_SHARED_SIGNATURE,
        }
    }

    /// Location string, empty when none was given.
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// True unless the signature is [`Locator::NON_SHARED_SIGNATURE`].
    pub fn is_shared(&self) -> bool {
        self.signature != Self::NON_SHARED_SIGNATURE
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::non_shared()
    }
}

impl From<&str> for Locator {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

impl From<String> for Locator {
    fn from(location: String) -> Self {
        Self::new(location)
    }
}

impl PartialOrd for Locator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// signature first, then location
impl Ord for Locator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.signature
            .cmp(&other.signature)
            .then_with(|| self.location().cmp(other.location()))
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Locator");
        s.field("location", &self.location());
        match self.signature {
            Self::NON_SHARED_SIGNATURE => s.field("signature", &"non-shared"),
            Self::DEFAULT_SIGNATURE => s.field("signature", &"default"),
            sig => s.field("signature", &sig),
        };
        s.finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signature {
            Self::NON_SHARED_SIGNATURE => write!(f, "{} (non-shared)", self.location()),
            Self::DEFAULT_SIGNATURE => f.write_str(self.location()),
            sig => write!(f, "{}@{:#x}", self.location(), sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_signature_is_shared() {
        let loc = Locator::new("tex:foo.png");
        assert!(loc.is_shared());
        assert_eq!(loc.signature(), Locator::DEFAULT_SIGNATURE);
        assert_eq!(loc.location(), "tex:foo.png");
    }

    #[test]
    fn test_non_shared() {
        assert!(!Locator::non_shared().is_shared());
        assert!(!Locator::non_shared_at("tex:foo.png").is_shared());
        assert!(!Locator::default().has_location());
    }

    #[test]
    fn test_equality_uses_signature() {
        let a = Locator::new("mesh:a");
        let b = Locator::with_signature("mesh:a", 7);
        assert_ne!(a, b);
        assert_eq!(a, Locator::from("mesh:a"));
    }

    #[test]
    fn test_ordering_signature_then_location() {
        let a = Locator::with_signature("zzz", 1);
        let b = Locator::with_signature("aaa", 2);
        let c = Locator::with_signature("bbb", 2);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.cmp(&b.clone()), Ordering::Equal);
    }
}
