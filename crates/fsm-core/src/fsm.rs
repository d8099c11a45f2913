use crate::error::{FsmError, Result};
use crate::link::Link;
use crate::projection::Direction;
use crate::state::{State, StateId};
use num_traits::Float;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map::{self, Entry};
use std::slice;
use tracing::{debug, trace};

/// Weighted finite-state graph with an initial and a final sentinel.
///
/// States are keyed by `StateId`; links refer to their endpoints by id, so
/// the graph is the sole owner of everything it holds. Every connection is
/// recorded in both `outgoing` (under its source) and `incoming` (under its
/// destination, reversed). Adjacency entries are dropped once empty.
///
/// Iterators returned by this type borrow the graph, so it cannot be
/// mutated while a traversal is in flight.
#[derive(Debug, Clone)]
pub struct Fsm<W = f64> {
    counter: u64,
    states: FxHashMap<StateId, State>,
    outgoing: FxHashMap<StateId, Vec<Link<W>>>,
    incoming: FxHashMap<StateId, Vec<Link<W>>>,
}

impl<W: Float> Default for Fsm<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Float> Fsm<W> {
    /// Empty graph holding only the two sentinel states.
    pub fn new() -> Self {
        let mut states = FxHashMap::default();
        states.insert(StateId::Initial, State::sentinel(StateId::Initial));
        states.insert(StateId::Final, State::sentinel(StateId::Final));
        Fsm {
            counter: 0,
            states,
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Create a state with a fresh index. Indices are never reused.
    pub fn add_state(&mut self, emission: Option<usize>, label: Option<String>) -> State {
        self.counter += 1;
        let id = StateId::Index(self.counter);
        let state = State::new(id, emission, label);
        trace!(%id, ?emission, "add state");
        self.states.insert(id, state.clone());
        state
    }

    /// Sever every connection of `id` and drop it from the graph.
    ///
    /// Sentinels cannot be removed.
    pub fn remove_state(&mut self, id: StateId) -> Result<State> {
        if id.is_sentinel() {
            return Err(FsmError::StateNotFound(id));
        }
        let state = self.states.remove(&id).ok_or(FsmError::StateNotFound(id))?;

        let mut seen: FxHashSet<StateId> = FxHashSet::default();
        let neighbors: Vec<StateId> = self
            .children(id)
            .iter()
            .chain(self.parents(id))
            .map(|l| l.dest)
            .filter(|&n| seen.insert(n))
            .collect();
        for &n in &neighbors {
            self.unlink(id, n);
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);

        debug!(%id, neighbors = neighbors.len(), "removed state");
        Ok(state)
    }

    /// Connect `source -> dest`.
    ///
    /// Parallel links and self-loops are kept as separate entries. Neither
    /// endpoint is checked for membership in this graph.
    pub fn link(&mut self, source: StateId, dest: StateId, weight: W) {
        trace!(%source, %dest, "link");
        let forward = Link::new(source, dest, weight);
        self.incoming.entry(dest).or_default().push(forward.reversed());
        self.outgoing.entry(source).or_default().push(forward);
    }

    /// `link` with the default weight of zero (probability one).
    pub fn connect(&mut self, source: StateId, dest: StateId) {
        self.link(source, dest, W::zero());
    }

    /// Remove every link between `a` and `b`, in both directions.
    pub fn unlink(&mut self, a: StateId, b: StateId) {
        trace!(%a, %b, "unlink");
        for map in [&mut self.outgoing, &mut self.incoming] {
            strip(map, a, b);
            strip(map, b, a);
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn initial_state(&self) -> &State {
        &self.states[&StateId::Initial]
    }

    pub fn final_state(&self) -> &State {
        &self.states[&StateId::Final]
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(&id)
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    /// Ids that are not states of this graph count as non-emitting.
    #[inline]
    pub fn is_emitting(&self, id: StateId) -> bool {
        self.states.get(&id).is_some_and(State::is_emitting)
    }

    /// Number of states, sentinels included.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Number of logical links (each counted once).
    pub fn num_links(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Every state, in map order.
    pub fn states(&self) -> States<'_> {
        States { inner: self.states.values() }
    }

    /// Every forward link: each state's outgoing list in `states()` order.
    pub fn links(&self) -> Links<'_, W> {
        Links {
            fsm: self,
            states: self.states(),
            current: Default::default(),
        }
    }

    /// Outgoing links of `id`; `dest` is the child.
    #[inline]
    pub fn children(&self, id: StateId) -> &[Link<W>] {
        self.outgoing.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Incoming links of `id`, stored reversed; `dest` is the parent.
    #[inline]
    pub fn parents(&self, id: StateId) -> &[Link<W>] {
        self.incoming.get(&id).map_or(&[], Vec::as_slice)
    }

    #[inline]
    pub fn adjacent(&self, id: StateId, direction: Direction) -> &[Link<W>] {
        match direction {
            Direction::Forward => self.children(id),
            Direction::Backward => self.parents(id),
        }
    }
}

/// Drop links under `key` that point at `other`; remove the entry if empty.
fn strip<W>(map: &mut FxHashMap<StateId, Vec<Link<W>>>, key: StateId, other: StateId) {
    if let Entry::Occupied(mut e) = map.entry(key) {
        e.get_mut().retain(|l| l.dest != other);
        if e.get().is_empty() {
            e.remove();
        }
    }
}

/// Iterator over the states of an `Fsm`.
pub struct States<'a> {
    inner: hash_map::Values<'a, StateId, State>,
}

impl<'a> Iterator for States<'a> {
    type Item = &'a State;

    #[inline]
    fn next(&mut self) -> Option<&'a State> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for States<'_> {}

/// Iterator over the forward links of an `Fsm`.
pub struct Links<'a, W> {
    fsm: &'a Fsm<W>,
    states: States<'a>,
    current: slice::Iter<'a, Link<W>>,
}

impl<'a, W: Float> Iterator for Links<'a, W> {
    type Item = &'a Link<W>;

    fn next(&mut self) -> Option<&'a Link<W>> {
        loop {
            if let Some(link) = self.current.next() {
                return Some(link);
            }
            let state = self.states.next()?;
            self.current = self.fsm.children(state.id()).iter();
        }
    }
}
