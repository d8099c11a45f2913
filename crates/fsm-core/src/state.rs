use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a state within one `Fsm`.
///
/// Ordinary states get an `Index` from the graph's counter. The two
/// sentinels are separate variants so they can never collide with an index.
/// Ordering puts `Initial` first and `Final` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateId {
    Initial,
    Index(u64),
    Final,
}

impl StateId {
    /// True for `Initial` and `Final`.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        !matches!(self, StateId::Index(_))
    }

    /// The counter value for ordinary states, `None` for sentinels.
    #[inline]
    pub fn index(self) -> Option<u64> {
        match self {
            StateId::Index(i) => Some(i),
            StateId::Initial | StateId::Final => None,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Initial => f.write_str("<init>"),
            StateId::Final => f.write_str("<final>"),
            StateId::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A node of the automaton.
///
/// A state with an emission index is *emitting*: it is tied to a
/// probability density and consumes one observation frame. States without
/// one only route transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    id: StateId,
    emission: Option<usize>,
    label: Option<String>,
}

impl State {
    pub(crate) fn new(id: StateId, emission: Option<usize>, label: Option<String>) -> Self {
        State { id, emission, label }
    }

    pub(crate) fn sentinel(id: StateId) -> Self {
        debug_assert!(id.is_sentinel());
        State { id, emission: None, label: None }
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn emission(&self) -> Option<usize> {
        self.emission
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[inline]
    pub fn is_emitting(&self) -> bool {
        self.emission.is_some()
    }

    #[inline]
    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }
}

impl From<&State> for StateId {
    fn from(state: &State) -> Self {
        state.id
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(label) = &self.label {
            write!(f, ":{}", label)?;
        }
        if let Some(e) = self.emission {
            write!(f, "[{}]", e)?;
        }
        Ok(())
    }
}
