use crate::error::{FsmError, Result};
use crate::fsm::Fsm;
use crate::state::StateId;
use num_traits::Float;
use std::collections::HashMap;
use std::hash::BuildHasher;
use tracing::debug;

impl<W: Float> Fsm<W> {
    /// Build `<init> -> s1 -> ... -> sn -> <final>` for a label sequence.
    ///
    /// Each `si` is labeled with the i-th label and emits the index the map
    /// assigns to it. All links carry weight zero. Fails with
    /// `LabelNotFound` on the first label missing from `emissions`.
    pub fn linear_chain<S, H>(labels: &[S], emissions: &HashMap<String, usize, H>) -> Result<Self>
    where
        S: AsRef<str>,
        H: BuildHasher,
    {
        let mut fsm = Fsm::new();
        let mut prev = StateId::Initial;
        for label in labels {
            let label = label.as_ref();
            let emission = *emissions
                .get(label)
                .ok_or_else(|| FsmError::LabelNotFound(label.to_string()))?;
            let id = fsm.add_state(Some(emission), Some(label.to_string())).id();
            fsm.connect(prev, id);
            prev = id;
        }
        fsm.connect(prev, StateId::Final);

        debug!(states = labels.len(), "built linear chain");
        Ok(fsm)
    }
}
