use pyo3::exceptions::{PyKeyError, PyRuntimeError};
use pyo3::prelude::*;
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::FsmError;
use crate::fsm::Fsm;
use crate::projection::{Direction, ProjectionConfig};
use crate::state::{State, StateId};

impl From<FsmError> for PyErr {
    fn from(err: FsmError) -> PyErr {
        match err {
            FsmError::StateNotFound(_) | FsmError::LabelNotFound(_) => {
                PyKeyError::new_err(err.to_string())
            }
            FsmError::ExpansionLimit { .. } => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

/// Python-visible state. A snapshot: states are immutable once created.
#[pyclass(frozen)]
#[derive(Clone)]
pub struct RustState {
    inner: State,
}

impl From<State> for RustState {
    fn from(inner: State) -> Self {
        RustState { inner }
    }
}

#[pymethods]
impl RustState {
    /// Counter value, or None for the initial/final sentinels.
    #[getter]
    fn index(&self) -> Option<u64> {
        self.inner.id().index()
    }

    #[getter]
    fn emission(&self) -> Option<usize> {
        self.inner.emission()
    }

    #[getter]
    fn label(&self) -> Option<String> {
        self.inner.label().map(str::to_string)
    }

    #[getter]
    fn is_initial(&self) -> bool {
        self.inner.id() == StateId::Initial
    }

    #[getter]
    fn is_final(&self) -> bool {
        self.inner.id() == StateId::Final
    }

    #[getter]
    fn is_emitting(&self) -> bool {
        self.inner.is_emitting()
    }

    /// Equal when id, emission and label all match. Ids are only unique
    /// within one graph, so states of different graphs can still collide.
    fn __eq__(&self, other: PyRef<'_, RustState>) -> bool {
        self.inner == other.inner
    }

    fn __hash__(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.inner.hash(&mut hasher);
        hasher.finish()
    }

    fn __repr__(&self) -> String {
        format!("State({})", self.inner)
    }
}

/// Python-visible automaton with f64 log-domain weights.
#[pyclass]
pub struct RustFsm {
    inner: Fsm<f64>,
}

impl RustFsm {
    /// Ids dangling from an unvalidated `link` resolve to a bare state.
    fn resolve(&self, id: StateId) -> RustState {
        self.inner
            .state(id)
            .cloned()
            .unwrap_or_else(|| State::new(id, None, None))
            .into()
    }
}

#[pymethods]
impl RustFsm {
    #[new]
    fn new() -> Self {
        RustFsm { inner: Fsm::new() }
    }

    #[staticmethod]
    fn linear_chain(labels: Vec<String>, emissions: HashMap<String, usize>) -> PyResult<Self> {
        let inner = Fsm::linear_chain(labels.as_slice(), &emissions)?;
        Ok(RustFsm { inner })
    }

    fn initial_state(&self) -> RustState {
        self.inner.initial_state().clone().into()
    }

    fn final_state(&self) -> RustState {
        self.inner.final_state().clone().into()
    }

    fn num_states(&self) -> usize {
        self.inner.num_states()
    }

    fn num_links(&self) -> usize {
        self.inner.num_links()
    }

    #[pyo3(signature = (emission=None, label=None))]
    fn add_state(&mut self, emission: Option<usize>, label: Option<String>) -> RustState {
        self.inner.add_state(emission, label).into()
    }

    fn remove_state(&mut self, state: PyRef<'_, RustState>) -> PyResult<RustState> {
        Ok(self.inner.remove_state(state.inner.id())?.into())
    }

    #[pyo3(signature = (source, dest, weight=0.0))]
    fn link(&mut self, source: PyRef<'_, RustState>, dest: PyRef<'_, RustState>, weight: f64) {
        self.inner.link(source.inner.id(), dest.inner.id(), weight);
    }

    fn unlink(&mut self, a: PyRef<'_, RustState>, b: PyRef<'_, RustState>) {
        self.inner.unlink(a.inner.id(), b.inner.id());
    }

    fn states(&self) -> Vec<RustState> {
        self.inner.states().cloned().map(RustState::from).collect()
    }

    /// All links as (source, dest, weight).
    fn links(&self) -> Vec<(RustState, RustState, f64)> {
        self.inner
            .links()
            .map(|l| (self.resolve(l.source), self.resolve(l.dest), l.weight))
            .collect()
    }

    /// Children as (state, weight).
    fn children(&self, state: PyRef<'_, RustState>) -> Vec<(RustState, f64)> {
        self.inner
            .children(state.inner.id())
            .iter()
            .map(|l| (self.resolve(l.dest), l.weight))
            .collect()
    }

    /// Parents as (state, weight).
    fn parents(&self, state: PyRef<'_, RustState>) -> Vec<(RustState, f64)> {
        self.inner
            .parents(state.inner.id())
            .iter()
            .map(|l| (self.resolve(l.dest), l.weight))
            .collect()
    }

    /// Emitting states reachable through non-emitting ones, one entry per
    /// path. Materialized eagerly; pass `max_expansions` to bound the walk on
    /// graphs that may contain non-emitting cycles.
    #[pyo3(signature = (state, forward=true, max_expansions=None))]
    fn emitting_states(
        &self,
        state: PyRef<'_, RustState>,
        forward: bool,
        max_expansions: Option<usize>,
    ) -> PyResult<Vec<(RustState, f64)>> {
        let direction = if forward { Direction::Forward } else { Direction::Backward };
        let config = ProjectionConfig { max_expansions };
        let mut result = Vec::new();
        for item in self.inner.try_emitting_states(state.inner.id(), direction, &config) {
            let (s, w) = item?;
            result.push((RustState::from(s.clone()), w));
        }
        Ok(result)
    }

    fn has_non_emitting_cycle(&self) -> bool {
        self.inner.has_non_emitting_cycle()
    }

    fn __repr__(&self) -> String {
        format!(
            "Fsm(states={}, links={})",
            self.inner.num_states(),
            self.inner.num_links()
        )
    }
}
