//! Upper/lower device relation sets.

use std::collections::HashSet;
use std::fmt;

use crate::xid::Xid;

/// Set of related interfaces, held by xid rather than by reference.
///
/// Membership, insert, remove and count are all O(1). Iteration order is
/// unspecified; use [`Associates::sorted`] when a stable order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Associates {
    set: HashSet<Xid>,
}

impl Associates {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `xid`; returns false if it was already present.
    pub fn insert(&mut self, xid: Xid) -> bool {
        self.set.insert(xid)
    }

    /// Remove `xid`; returns false if it was absent.
    pub fn remove(&mut self, xid: Xid) -> bool {
        self.set.remove(&xid)
    }

    /// Whether `xid` is a member.
    pub fn contains(&self, xid: Xid) -> bool {
        self.set.contains(&xid)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Members in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = Xid> + '_ {
        self.set.iter().copied()
    }

    /// Members in ascending xid order.
    pub fn sorted(&self) -> Vec<Xid> {
        let mut v: Vec<Xid> = self.iter().collect();
        v.sort_unstable();
        v
    }
}

impl FromIterator<Xid> for Associates {
    fn from_iter<I: IntoIterator<Item = Xid>>(iter: I) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Associates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for xid in self.sorted() {
            write!(f, "{}{}", sep, xid)?;
            sep = ", ";
        }
        Ok(())
    }
}
