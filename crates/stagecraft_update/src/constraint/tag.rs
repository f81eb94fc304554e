//! # Constraint Tags
//!
//! ```text
//! 0                      default (untagged)
//! 1 ..= 1_000_000        custom, set by application code
//! 1_000_001 ..= 1_100_000 internal, ten namespaces of 10_000
//!   namespace 0 = Core, 1 = Toolkit, 2.. = Other(n)
//! ```
//!
//! Custom and internal tags never overwrite each other, so bulk removal by
//! custom range can never take out an internal constraint.

use stagecraft_shared::constants::{
    CUSTOM_CONSTRAINT_TAG_END, CUSTOM_CONSTRAINT_TAG_START, DEFAULT_CONSTRAINT_TAG,
    INTERNAL_CONSTRAINT_TAG_END, INTERNAL_CONSTRAINT_TAG_START, INTERNAL_NAMESPACE_COUNT,
    INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE,
};

use crate::error::ConstraintError;

/// Tag carried by a constraint, used for bulk removal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintTag(u32);

impl ConstraintTag {
    /// The tag of an untagged constraint.
    pub const DEFAULT: Self = Self(DEFAULT_CONSTRAINT_TAG);

    /// Raw tag value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` for the untagged value.
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == DEFAULT_CONSTRAINT_TAG
    }

    /// Returns `true` for application-owned tags.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        self.0 >= CUSTOM_CONSTRAINT_TAG_START && self.0 <= CUSTOM_CONSTRAINT_TAG_END
    }

    /// Returns `true` for reserved internal tags.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        self.0 >= INTERNAL_CONSTRAINT_TAG_START && self.0 <= INTERNAL_CONSTRAINT_TAG_END
    }

    /// Namespace of an internal tag.
    #[must_use]
    pub const fn namespace(self) -> Option<InternalTagNamespace> {
        if !self.is_internal() {
            return None;
        }
        let index = (self.0 - INTERNAL_CONSTRAINT_TAG_START) / INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE;
        Some(InternalTagNamespace::from_index(index))
    }

    /// Validates a tag for application use.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::TagOutOfRange`] unless `tag` is default or custom.
    pub const fn custom(tag: u32) -> Result<Self, ConstraintError> {
        let tag = Self(tag);
        if tag.is_default() || tag.is_custom() {
            Ok(tag)
        } else {
            Err(ConstraintError::TagOutOfRange {
                tag: tag.0,
                start: DEFAULT_CONSTRAINT_TAG,
                end: CUSTOM_CONSTRAINT_TAG_END,
            })
        }
    }

    /// Validates a tag for internal use.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::TagOutOfRange`] unless `tag` is internal.
    pub const fn internal(tag: u32) -> Result<Self, ConstraintError> {
        let tag = Self(tag);
        if tag.is_internal() {
            Ok(tag)
        } else {
            Err(ConstraintError::TagOutOfRange {
                tag: tag.0,
                start: INTERNAL_CONSTRAINT_TAG_START,
                end: INTERNAL_CONSTRAINT_TAG_END,
            })
        }
    }

    /// Replaces `current` with an application tag.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::TagOutOfRange`] for a non-custom `requested`,
    /// [`ConstraintError::TagOwnershipConflict`] if `current` is internal.
    pub fn replace_custom(current: Self, requested: u32) -> Result<Self, ConstraintError> {
        let tag = Self::custom(requested)?;
        if current.is_internal() {
            return Err(ConstraintError::TagOwnershipConflict {
                current: current.0,
                requested,
            });
        }
        Ok(tag)
    }

    /// Replaces `current` with an internal tag.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::TagOutOfRange`] for a non-internal `requested`,
    /// [`ConstraintError::TagOwnershipConflict`] if `current` is custom.
    pub fn replace_internal(current: Self, requested: u32) -> Result<Self, ConstraintError> {
        let tag = Self::internal(requested)?;
        if current.is_custom() {
            return Err(ConstraintError::TagOwnershipConflict {
                current: current.0,
                requested,
            });
        }
        Ok(tag)
    }
}

/// A block of 10 000 internal tags owned by one subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalTagNamespace {
    /// Namespace 0.
    Core,
    /// Namespace 1.
    Toolkit,
    /// Namespace `n`, `2 <= n < 10`.
    Other(u32),
}

impl InternalTagNamespace {
    const fn from_index(index: u32) -> Self {
        match index {
            0 => Self::Core,
            1 => Self::Toolkit,
            n => Self::Other(n),
        }
    }

    /// Namespace number.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Core => 0,
            Self::Toolkit => 1,
            Self::Other(n) => n,
        }
    }

    /// First tag of the namespace.
    #[must_use]
    pub const fn start(self) -> u32 {
        INTERNAL_CONSTRAINT_TAG_START + self.index() * INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE
    }

    /// Last tag of the namespace (inclusive).
    #[must_use]
    pub const fn end(self) -> u32 {
        self.start() + INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE - 1
    }

    /// The tag `offset` places into the namespace.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::TagOutOfRange`] if the namespace does not exist or
    /// `offset` exceeds its size.
    pub fn tag(self, offset: u32) -> Result<ConstraintTag, ConstraintError> {
        if self.index() >= INTERNAL_NAMESPACE_COUNT || offset >= INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE
        {
            return Err(ConstraintError::TagOutOfRange {
                tag: self.start().saturating_add(offset),
                start: INTERNAL_CONSTRAINT_TAG_START,
                end: INTERNAL_CONSTRAINT_TAG_END,
            });
        }
        ConstraintTag::internal(self.start() + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ConstraintTag::DEFAULT.is_default());
        assert!(ConstraintTag::custom(1).unwrap().is_custom());
        assert!(ConstraintTag::custom(1_000_000).unwrap().is_custom());
        assert!(ConstraintTag::internal(1_000_001).unwrap().is_internal());
        assert!(ConstraintTag::internal(1_100_000).unwrap().is_internal());
        assert!(ConstraintTag::internal(1_100_001).is_err());
        assert!(ConstraintTag::custom(1_000_001).is_err());
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(InternalTagNamespace::Core.start(), 1_000_001);
        assert_eq!(InternalTagNamespace::Toolkit.start(), 1_010_001);
        assert_eq!(InternalTagNamespace::Other(9).end(), 1_100_000);

        let tag = InternalTagNamespace::Toolkit.tag(5).unwrap();
        assert_eq!(tag.raw(), 1_010_006);
        assert_eq!(tag.namespace(), Some(InternalTagNamespace::Toolkit));
        assert_eq!(
            ConstraintTag::internal(1_000_001).unwrap().namespace(),
            Some(InternalTagNamespace::Core)
        );
        assert!(InternalTagNamespace::Core.tag(10_000).is_err());
        assert!(InternalTagNamespace::Other(10).tag(0).is_err());
    }

    #[test]
    fn test_custom_cannot_overwrite_internal() {
        let internal = ConstraintTag::internal(1_000_001).unwrap();
        assert_eq!(
            ConstraintTag::replace_custom(internal, 7),
            Err(ConstraintError::TagOwnershipConflict {
                current: 1_000_001,
                requested: 7
            })
        );
        assert!(ConstraintTag::replace_custom(internal, 0).is_err());
    }

    #[test]
    fn test_internal_cannot_overwrite_custom() {
        let custom = ConstraintTag::custom(7).unwrap();
        assert!(matches!(
            ConstraintTag::replace_internal(custom, 1_000_001),
            Err(ConstraintError::TagOwnershipConflict { .. })
        ));
        assert_eq!(
            ConstraintTag::replace_internal(ConstraintTag::DEFAULT, 1_000_001)
                .unwrap()
                .raw(),
            1_000_001
        );
    }

    #[test]
    fn test_setters_check_range_first() {
        assert!(matches!(
            ConstraintTag::replace_custom(ConstraintTag::DEFAULT, 2_000_000),
            Err(ConstraintError::TagOutOfRange { .. })
        ));
        assert!(matches!(
            ConstraintTag::replace_internal(ConstraintTag::DEFAULT, 5),
            Err(ConstraintError::TagOutOfRange { .. })
        ));
    }
}
