use crate::state::StateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One directed adjacency record.
///
/// A connection `a -> b` is stored twice: as `Link { source: a, dest: b }`
/// under `a`'s outgoing list, and as `Link { source: b, dest: a }` under
/// `b`'s incoming list. In both cases `dest` is the neighbor reached when
/// walking in the list's direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link<W> {
    pub source: StateId,
    pub dest: StateId,
    pub weight: W,
}

impl<W> Link<W> {
    #[inline]
    pub fn new(source: StateId, dest: StateId, weight: W) -> Self {
        Link { source, dest, weight }
    }

    /// True if this record connects `a` and `b` in either orientation.
    #[inline]
    pub fn joins(&self, a: StateId, b: StateId) -> bool {
        (self.source == a && self.dest == b) || (self.source == b && self.dest == a)
    }
}

impl<W: Copy> Link<W> {
    /// The same connection seen from the other endpoint.
    #[inline]
    pub fn reversed(&self) -> Self {
        Link { source: self.dest, dest: self.source, weight: self.weight }
    }
}

impl<W: fmt::Display> fmt::Display for Link<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.dest, self.weight)
    }
}
