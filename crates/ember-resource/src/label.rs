//! Resource labels.
//!
//! Every registry entry records the label that was active when it was created.
//! Labels allow destroying a whole group of resources at once, e.g. everything
//! belonging to one level.

use std::fmt;

/// Group tag attached to registry entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceLabel(pub u8);

impl ResourceLabel {
    /// Label active when nothing was pushed.
    pub const DEFAULT: ResourceLabel = ResourceLabel(0);
    /// Matches every label in bulk operations.
    pub const ALL: ResourceLabel = ResourceLabel(u8::MAX);

    /// True if `self` selects `other` in a bulk operation.
    #[inline]
    pub fn matches(self, other: ResourceLabel) -> bool {
        self == Self::ALL || self == other
    }
}

impl Default for ResourceLabel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for ResourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DEFAULT => f.write_str("ResourceLabel(default)"),
            Self::ALL => f.write_str("ResourceLabel(all)"),
            ResourceLabel(v) => write!(f, "ResourceLabel({})", v),
        }
    }
}

/// Stack of active labels.
///
/// The top of the stack is the label stamped onto newly created resources.
/// The bottom is always [`ResourceLabel::DEFAULT`] and cannot be popped.
#[derive(Debug, Clone)]
pub struct LabelStack {
    stack: Vec<ResourceLabel>,
    next: u8,
}

impl LabelStack {
    pub fn new() -> Self {
        Self {
            stack: vec![ResourceLabel::DEFAULT],
            next: 1,
        }
    }

    /// Currently active label.
    pub fn current(&self) -> ResourceLabel {
        self.stack.last().copied().unwrap_or(ResourceLabel::DEFAULT)
    }

    /// Push an explicit label.
    ///
    /// # Panics
    ///
    /// Panics if `label` is [`ResourceLabel::ALL`].
    pub fn push(&mut self, label: ResourceLabel) {
        assert!(label != ResourceLabel::ALL, "cannot push ResourceLabel::ALL");
        self.stack.push(label);
    }

    /// Generate a fresh label, push it and return it.
    ///
    /// Generated labels wrap around after 254 pushes, skipping the reserved
    /// values.
    pub fn push_new(&mut self) -> ResourceLabel {
        let label = ResourceLabel(self.next);
        self.next = match self.next.wrapping_add(1) {
            0 | u8::MAX => 1,
            n => n,
        };
        self.push(label);
        label
    }

    /// Pop the active label and return it.
    ///
    /// # Panics
    ///
    /// Panics when only the default label is left.
    pub fn pop(&mut self) -> ResourceLabel {
        assert!(self.stack.len() > 1, "label stack underflow");
        self.stack.pop().unwrap_or(ResourceLabel::DEFAULT)
    }

    /// Number of pushed labels, not counting the default.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}

impl Default for LabelStack {
    fn default() -> Self {
        Self::new()
    }
}
