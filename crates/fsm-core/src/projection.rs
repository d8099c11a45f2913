//! Emitting-state projection.
//!
//! Decoders only care about transitions between emitting states. Starting
//! from a state, the projection walks through any number of non-emitting
//! states and reports each emitting state it lands on together with the sum
//! of the link weights along the way. Every path is reported separately;
//! combining alternatives (e.g. with log-sum-exp) is left to the caller.

use crate::error::{FsmError, Result};
use crate::fsm::Fsm;
use crate::link::Link;
use crate::state::{State, StateId};
use num_traits::Float;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Which adjacency the projection follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow outgoing links (children).
    Forward,
    /// Follow incoming links (parents).
    Backward,
}

/// Safety settings for `Fsm::try_emitting_states`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionConfig {
    /// Maximum number of non-emitting states expanded before giving up.
    /// `None` means unbounded, which never terminates on a non-emitting cycle.
    pub max_expansions: Option<usize>,
}

impl ProjectionConfig {
    pub fn bounded(max_expansions: usize) -> Self {
        ProjectionConfig { max_expansions: Some(max_expansions) }
    }
}

/// Outcome of one unit of work on the frontier.
enum Step<'a, W> {
    Emit(&'a State, W),
    Expanded,
    Done,
}

/// LIFO work list of `(link, accumulated weight)` shared by both iterators.
struct Frontier<'a, W> {
    fsm: &'a Fsm<W>,
    direction: Direction,
    stack: Vec<(&'a Link<W>, W)>,
    expansions: usize,
}

impl<'a, W: Float> Frontier<'a, W> {
    fn new(fsm: &'a Fsm<W>, start: StateId, direction: Direction) -> Self {
        let stack = fsm
            .adjacent(start, direction)
            .iter()
            .map(|l| (l, l.weight))
            .collect();
        Frontier { fsm, direction, stack, expansions: 0 }
    }

    fn step(&mut self) -> Step<'a, W> {
        let Some((link, weight)) = self.stack.pop() else {
            return Step::Done;
        };
        let fsm = self.fsm;
        match fsm.state(link.dest) {
            Some(state) if state.is_emitting() => Step::Emit(state, weight),
            Some(_) => {
                for next in fsm.adjacent(link.dest, self.direction) {
                    self.stack.push((next, weight + next.weight));
                }
                self.expansions += 1;
                Step::Expanded
            }
            // dangling id from an unvalidated link: dead end
            None => Step::Expanded,
        }
    }
}

/// Lazy iterator of `(emitting state, path weight)` pairs.
///
/// Depth-first: the most recently discovered branch is explored first.
/// Each call to `next` does just enough work to produce one pair.
pub struct EmittingStates<'a, W> {
    frontier: Frontier<'a, W>,
}

impl<'a, W: Float> Iterator for EmittingStates<'a, W> {
    type Item = (&'a State, W);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.frontier.step() {
                Step::Emit(state, weight) => return Some((state, weight)),
                Step::Expanded => continue,
                Step::Done => return None,
            }
        }
    }
}

/// Like `EmittingStates`, but stops with `FsmError::ExpansionLimit` once the
/// configured expansion budget is exhausted.
pub struct GuardedEmittingStates<'a, W> {
    frontier: Frontier<'a, W>,
    start: StateId,
    limit: Option<usize>,
    tripped: bool,
}

impl<'a, W: Float> Iterator for GuardedEmittingStates<'a, W> {
    type Item = Result<(&'a State, W)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tripped {
            return None;
        }
        loop {
            match self.frontier.step() {
                Step::Emit(state, weight) => return Some(Ok((state, weight))),
                Step::Done => return None,
                Step::Expanded => {
                    if let Some(limit) = self.limit {
                        if self.frontier.expansions > limit {
                            self.tripped = true;
                            self.frontier.stack.clear();
                            warn!(start = %self.start, limit, "emitting-state projection gave up");
                            return Some(Err(FsmError::ExpansionLimit { start: self.start, limit }));
                        }
                    }
                }
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Closed,
}

impl<W: Float> Fsm<W> {
    /// Emitting states reachable from `start` through non-emitting states.
    ///
    /// Yields one `(state, weight)` pair per path. Does not terminate if a
    /// non-emitting cycle is reachable; see `try_emitting_states` and
    /// `has_non_emitting_cycle`.
    pub fn emitting_states(&self, start: StateId, direction: Direction) -> EmittingStates<'_, W> {
        EmittingStates { frontier: Frontier::new(self, start, direction) }
    }

    /// `emitting_states` with an optional bound on expanded non-emitting
    /// states. Results are identical until the bound is hit.
    pub fn try_emitting_states(
        &self,
        start: StateId,
        direction: Direction,
        config: &ProjectionConfig,
    ) -> GuardedEmittingStates<'_, W> {
        GuardedEmittingStates {
            frontier: Frontier::new(self, start, direction),
            start,
            limit: config.max_expansions,
            tripped: false,
        }
    }

    /// True if some cycle consists only of non-emitting states, i.e. the
    /// projection can run forever from some start.
    ///
    /// Ids that are not states of the graph are dead ends for the
    /// projection, so cycles through them do not count.
    pub fn has_non_emitting_cycle(&self) -> bool {
        let mut marks: FxHashMap<StateId, Mark> = FxHashMap::default();

        for root in self.states().filter(|s| !s.is_emitting()).map(State::id) {
            if marks.contains_key(&root) {
                continue;
            }
            marks.insert(root, Mark::Open);
            let mut stack: Vec<(StateId, usize)> = vec![(root, 0)];

            while let Some(top) = stack.last_mut() {
                let (node, pos) = *top;
                let children = self.children(node);
                if pos == children.len() {
                    marks.insert(node, Mark::Closed);
                    stack.pop();
                    continue;
                }
                top.1 += 1;

                let dest = children[pos].dest;
                if !self.state(dest).is_some_and(|s| !s.is_emitting()) {
                    continue;
                }
                match marks.get(&dest) {
                    Some(Mark::Open) => return true,
                    Some(Mark::Closed) => {}
                    None => {
                        marks.insert(dest, Mark::Open);
                        stack.push((dest, 0));
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(fsm: &Fsm<f64>, start: StateId, direction: Direction) -> Vec<(StateId, f64)> {
        fsm.emitting_states(start, direction)
            .map(|(s, w)| (s.id(), w))
            .collect()
    }

    /// A(emit) -> B -> C -> D(emit), weights 1.0, 2.0, 0.5.
    fn chain() -> (Fsm<f64>, [StateId; 4]) {
        let mut fsm = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let b = fsm.add_state(None, None).id();
        let c = fsm.add_state(None, None).id();
        let d = fsm.add_state(Some(1), None).id();
        fsm.link(a, b, 1.0);
        fsm.link(b, c, 2.0);
        fsm.link(c, d, 0.5);
        (fsm, [a, b, c, d])
    }

    #[test]
    fn test_forward_chain() {
        let (fsm, [a, _, _, d]) = chain();
        assert_eq!(collect(&fsm, a, Direction::Forward), vec![(d, 3.5)]);
    }

    #[test]
    fn test_backward_chain() {
        let (fsm, [a, _, _, d]) = chain();
        assert_eq!(collect(&fsm, d, Direction::Backward), vec![(a, 3.5)]);
    }

    #[test]
    fn test_direct_emitting_neighbor() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let b = fsm.add_state(Some(1), None).id();
        fsm.link(a, b, -0.3);
        fsm.link(b, b, -0.1);
        assert_eq!(collect(&fsm, a, Direction::Forward), vec![(b, -0.3)]);
        // an emitting self-loop is reported, not expanded
        assert_eq!(collect(&fsm, b, Direction::Forward), vec![(b, -0.1)]);
    }

    #[test]
    fn test_paths_not_merged() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let b1 = fsm.add_state(None, None).id();
        let b2 = fsm.add_state(None, None).id();
        let d = fsm.add_state(Some(1), None).id();
        fsm.link(a, b1, 1.0);
        fsm.link(a, b2, 2.0);
        fsm.connect(b1, d);
        fsm.connect(b2, d);

        // b2 was pushed last, so its path pops first
        assert_eq!(collect(&fsm, a, Direction::Forward), vec![(d, 2.0), (d, 1.0)]);
    }

    #[test]
    fn test_depth_first_order() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let n = fsm.add_state(None, None).id();
        let x = fsm.add_state(Some(1), None).id();
        let y = fsm.add_state(Some(2), None).id();
        let z = fsm.add_state(Some(3), None).id();
        fsm.link(a, x, 1.0);
        fsm.link(a, n, 1.0);
        fsm.link(n, y, 1.0);
        fsm.link(n, z, 1.0);

        // n's subtree is explored fully before the older sibling x
        assert_eq!(
            collect(&fsm, a, Direction::Forward),
            vec![(z, 2.0), (y, 2.0), (x, 1.0)]
        );
    }

    #[test]
    fn test_sentinels_are_walked_through() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        fsm.connect(StateId::Initial, a);
        fsm.connect(a, StateId::Final);

        assert_eq!(collect(&fsm, StateId::Initial, Direction::Forward), vec![(a, 0.0)]);
        assert_eq!(collect(&fsm, StateId::Final, Direction::Backward), vec![(a, 0.0)]);
        // the final state is non-emitting and has no children: nothing to report
        assert!(collect(&fsm, a, Direction::Forward).is_empty());
    }

    #[test]
    fn test_lazy() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let b = fsm.add_state(Some(1), None).id();
        let c = fsm.add_state(Some(2), None).id();
        fsm.connect(a, b);
        fsm.connect(a, c);

        let mut it = fsm.emitting_states(a, Direction::Forward);
        assert_eq!(it.next().map(|(s, _)| s.id()), Some(c));
        assert_eq!(it.frontier.stack.len(), 1, "remaining work left for later");
        assert_eq!(it.next().map(|(s, _)| s.id()), Some(b));
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn test_guard_matches_unguarded_on_acyclic() {
        let (fsm, [a, _, _, d]) = chain();
        let got: Vec<(StateId, f64)> = fsm
            .try_emitting_states(a, Direction::Forward, &ProjectionConfig::bounded(2))
            .map(|r| r.map(|(s, w)| (s.id(), w)))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(got, vec![(d, 3.5)]);
    }

    #[test]
    fn test_guard_trips_on_cycle() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let b = fsm.add_state(None, None).id();
        let c = fsm.add_state(None, None).id();
        fsm.connect(a, b);
        fsm.connect(b, c);
        fsm.connect(c, b);

        let mut it = fsm.try_emitting_states(a, Direction::Forward, &ProjectionConfig::bounded(10));
        assert_eq!(
            it.next(),
            Some(Err(FsmError::ExpansionLimit { start: a, limit: 10 }))
        );
        assert!(it.next().is_none());
    }

    #[test]
    fn test_guard_unbounded_default() {
        let (fsm, [a, ..]) = chain();
        let config = ProjectionConfig::default();
        assert_eq!(config.max_expansions, None);
        assert_eq!(fsm.try_emitting_states(a, Direction::Forward, &config).count(), 1);
    }

    #[test]
    fn test_cycle_detection() {
        let (mut fsm, [a, b, c, d]) = chain();
        assert!(!fsm.has_non_emitting_cycle());

        // cycle through an emitting state is harmless
        fsm.connect(d, a);
        assert!(!fsm.has_non_emitting_cycle());

        fsm.connect(c, b);
        assert!(fsm.has_non_emitting_cycle());

        fsm.unlink(c, b);
        fsm.connect(b, b);
        assert!(fsm.has_non_emitting_cycle());
    }

    #[test]
    fn test_dangling_dest_is_dead_end() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let a = fsm.add_state(Some(0), None).id();
        let d = fsm.add_state(Some(1), None).id();
        let ghost = StateId::Index(99);
        fsm.link(a, ghost, 1.0);
        fsm.link(ghost, d, 1.0);

        assert!(collect(&fsm, a, Direction::Forward).is_empty());
        assert!(collect(&fsm, d, Direction::Backward).is_empty());

        // a real path next to the dangling one is still reported
        fsm.link(a, d, 0.5);
        assert_eq!(collect(&fsm, a, Direction::Forward), vec![(d, 0.5)]);
    }

    #[test]
    fn test_dangling_cycle_does_not_diverge() {
        let mut fsm: Fsm<f64> = Fsm::new();
        let x = StateId::Index(50);
        let y = StateId::Index(51);
        fsm.connect(x, y);
        fsm.connect(y, x);

        assert!(!fsm.has_non_emitting_cycle());
        // starting on a dangling id only looks at its own links
        assert!(collect(&fsm, x, Direction::Forward).is_empty());
        let guarded: Vec<_> = fsm
            .try_emitting_states(x, Direction::Forward, &ProjectionConfig::bounded(0))
            .collect();
        assert!(guarded.is_empty());
    }
}
