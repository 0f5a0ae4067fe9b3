// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side index of tuner inputs, independent of active sessions.

use std::collections::HashMap;

use dvr_core::{InputEvent, InputId, TunerInputInfo};
use tracing::info;

#[derive(Debug, Default)]
pub(crate) struct InputTracker {
    inputs: HashMap<InputId, TunerInputInfo>,
}

impl InputTracker {
    pub(crate) fn new(initial: Vec<TunerInputInfo>) -> Self {
        Self {
            inputs: initial.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub(crate) fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Added(info) => {
                info!(input_id = %info.id, tuner_count = info.tuner_count, "tuner input added");
                self.inputs.insert(info.id.clone(), info);
            }
            InputEvent::Updated(info) => {
                info!(input_id = %info.id, tuner_count = info.tuner_count, "tuner input updated");
                self.inputs.insert(info.id.clone(), info);
            }
            InputEvent::Removed(id) => {
                info!(input_id = %id, "tuner input removed");
                self.inputs.remove(&id);
            }
        }
    }

    pub(crate) fn get(&self, id: &InputId) -> Option<&TunerInputInfo> {
        self.inputs.get(id)
    }

    /// Recording-capable tuners on the input; zero when unknown.
    pub(crate) fn tuner_count(&self, id: &InputId) -> u32 {
        self.get(id)
            .filter(|info| info.can_record)
            .map(|info| info.tuner_count)
            .unwrap_or(0)
    }

    pub(crate) fn all(&self) -> Vec<TunerInputInfo> {
        let mut all: Vec<_> = self.inputs.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, tuners: u32, can_record: bool) -> TunerInputInfo {
        TunerInputInfo {
            id: InputId::new(id),
            tuner_count: tuners,
            can_record,
        }
    }

    #[test]
    fn tracks_input_events() {
        let mut tracker = InputTracker::new(vec![info("hw0", 2, true)]);
        assert_eq!(tracker.tuner_count(&InputId::new("hw0")), 2);

        tracker.apply(InputEvent::Updated(info("hw0", 4, true)));
        tracker.apply(InputEvent::Added(info("hw1", 1, false)));
        assert_eq!(tracker.tuner_count(&InputId::new("hw0")), 4);
        assert_eq!(tracker.tuner_count(&InputId::new("hw1")), 0);
        assert_eq!(tracker.all().len(), 2);

        tracker.apply(InputEvent::Removed(InputId::new("hw0")));
        assert!(tracker.get(&InputId::new("hw0")).is_none());
        assert_eq!(tracker.tuner_count(&InputId::new("hw0")), 0);
    }
}
