use std::fmt;

use serde::{Deserialize, Serialize};

/// Mask is a bitfield of capabilities held on an authorization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mask(u32);

impl Mask {
    pub const ADMIN: Mask = Mask(1 << 0); // 1
    pub const EDIT: Mask = Mask(1 << 1); // 2
    pub const DELETE: Mask = Mask(1 << 2); // 4
    pub const VIEW: Mask = Mask(1 << 3); // 8

    pub const ALL: Mask = Mask(Self::ADMIN.0 | Self::EDIT.0 | Self::DELETE.0 | Self::VIEW.0);

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every bit of `required` is set in this mask.
    #[must_use]
    pub const fn has(self, required: Mask) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns true if any bit of `other` is set in this mask.
    #[must_use]
    pub const fn intersects(self, other: Mask) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(self, other: Mask) -> Mask {
        Mask(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Mask) -> Mask {
        Mask(self.0 & !other.0)
    }

    pub fn parse(s: &str) -> Option<Mask> {
        match s {
            "admin" => Some(Self::ADMIN),
            "edit" => Some(Self::EDIT),
            "delete" => Some(Self::DELETE),
            "view" => Some(Self::VIEW),
            _ => None,
        }
    }

    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<Mask> {
        let mut result = Mask::default();
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        [
            (Self::ADMIN, "admin"),
            (Self::EDIT, "edit"),
            (Self::DELETE, "delete"),
            (Self::VIEW, "view"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.has(*bit))
        .map(|(_, name)| name)
        .collect()
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Mask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Mask> for u32 {
    fn from(m: Mask) -> Self {
        m.0
    }
}

impl From<i64> for Mask {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Mask> for i64 {
    fn from(m: Mask) -> Self {
        m.0 as i64
    }
}
