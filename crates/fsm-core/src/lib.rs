pub mod builder;
pub mod error;
pub mod fsm;
pub mod link;
pub mod projection;
pub mod state;
#[cfg(feature = "python")]
pub mod py;

pub use error::{FsmError, Result};
pub use fsm::{Fsm, Links, States};
pub use link::Link;
pub use projection::{Direction, EmittingStates, GuardedEmittingStates, ProjectionConfig};
pub use state::{State, StateId};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn fsm_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<py::RustFsm>()?;
    m.add_class::<py::RustState>()?;
    Ok(())
}
