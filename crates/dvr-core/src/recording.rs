// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduled recording record and its builder.
//!
//! Records are immutable. Every change is expressed as a new value built
//! from the previous one with [`ScheduledRecording::build_from`].

use std::cmp::Ordering;

use serde::Serialize;

use crate::error::DvrError;
use crate::types::{
    ChannelId, Period, Program, ProgramId, RecordingId, RecordingState, RecordingType,
};

/// Priority assigned when none is given. Lower values win.
pub const DEFAULT_PRIORITY: i64 = i64::MAX;

/// A single unit of recording work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledRecording {
    id: RecordingId,
    channel_id: ChannelId,
    program_id: Option<ProgramId>,
    start_time_ms: i64,
    end_time_ms: i64,
    priority: i64,
    state: RecordingState,
    recording_type: RecordingType,
}

impl ScheduledRecording {
    /// Starts a `PROGRAM` record covering the program's air time.
    pub fn builder_for_program(program: &Program) -> ScheduledRecordingBuilder {
        ScheduledRecordingBuilder {
            program_id: Some(program.id),
            recording_type: RecordingType::Program,
            ..ScheduledRecordingBuilder::new(
                program.channel_id,
                program.start_time_ms,
                program.end_time_ms,
            )
        }
    }

    /// Starts a `TIMED` record on a channel.
    pub fn builder_for_time_range(
        channel_id: ChannelId,
        start_time_ms: i64,
        end_time_ms: i64,
    ) -> ScheduledRecordingBuilder {
        ScheduledRecordingBuilder::new(channel_id, start_time_ms, end_time_ms)
    }

    /// Seeds a builder with every field of `existing`.
    pub fn build_from(existing: &ScheduledRecording) -> ScheduledRecordingBuilder {
        ScheduledRecordingBuilder {
            id: existing.id,
            channel_id: existing.channel_id,
            program_id: existing.program_id,
            start_time_ms: existing.start_time_ms,
            end_time_ms: existing.end_time_ms,
            priority: existing.priority,
            state: existing.state,
            recording_type: existing.recording_type,
        }
    }

    pub fn id(&self) -> RecordingId {
        self.id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn program_id(&self) -> Option<ProgramId> {
        self.program_id
    }

    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    pub fn end_time_ms(&self) -> i64 {
        self.end_time_ms
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn recording_type(&self) -> RecordingType {
        self.recording_type
    }

    pub fn period(&self) -> Period {
        Period::new(self.start_time_ms, self.end_time_ms)
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }

    /// Closed-interval overlap: touching endpoints count as overlapping.
    pub fn is_overlapping(&self, period: &Period) -> bool {
        self.start_time_ms <= period.end_ms && self.end_time_ms >= period.start_ms
    }

    /// Shorthand for a copy with a different state.
    pub fn with_state(&self, state: RecordingState) -> ScheduledRecording {
        ScheduledRecording {
            state,
            ..self.clone()
        }
    }

    /// Shorthand for a copy carrying a store-assigned id.
    pub fn with_id(&self, id: RecordingId) -> ScheduledRecording {
        ScheduledRecording { id, ..self.clone() }
    }

    /// Orders by priority ascending, then id ascending. The first element of
    /// a sorted list is the most important one.
    pub fn priority_cmp(a: &ScheduledRecording, b: &ScheduledRecording) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Orders by start time, then id.
    pub fn start_time_cmp(a: &ScheduledRecording, b: &ScheduledRecording) -> Ordering {
        a.start_time_ms
            .cmp(&b.start_time_ms)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Builder for [`ScheduledRecording`].
#[derive(Debug, Clone)]
pub struct ScheduledRecordingBuilder {
    id: RecordingId,
    channel_id: ChannelId,
    program_id: Option<ProgramId>,
    start_time_ms: i64,
    end_time_ms: i64,
    priority: i64,
    state: RecordingState,
    recording_type: RecordingType,
}

impl ScheduledRecordingBuilder {
    fn new(channel_id: ChannelId, start_time_ms: i64, end_time_ms: i64) -> Self {
        Self {
            id: RecordingId::UNSET,
            channel_id,
            program_id: None,
            start_time_ms,
            end_time_ms,
            priority: DEFAULT_PRIORITY,
            state: RecordingState::NotStarted,
            recording_type: RecordingType::Timed,
        }
    }

    pub fn id(mut self, id: RecordingId) -> Self {
        self.id = id;
        self
    }

    pub fn channel_id(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn program_id(mut self, program_id: Option<ProgramId>) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn start_time_ms(mut self, start_time_ms: i64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }

    pub fn end_time_ms(mut self, end_time_ms: i64) -> Self {
        self.end_time_ms = end_time_ms;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn state(mut self, state: RecordingState) -> Self {
        self.state = state;
        self
    }

    pub fn recording_type(mut self, recording_type: RecordingType) -> Self {
        self.recording_type = recording_type;
        self
    }

    /// Validates and builds the record. Fails unless `end > start`.
    pub fn build(self) -> Result<ScheduledRecording, DvrError> {
        if self.end_time_ms <= self.start_time_ms {
            return Err(DvrError::InvalidRecording(format!(
                "end time {} must be after start time {}",
                self.end_time_ms, self.start_time_ms
            )));
        }
        Ok(ScheduledRecording {
            id: self.id,
            channel_id: self.channel_id,
            program_id: self.program_id,
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
            priority: self.priority,
            state: self.state,
            recording_type: self.recording_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn timed(id: i64, start: i64, end: i64, priority: i64) -> ScheduledRecording {
        ScheduledRecording::builder_for_time_range(ChannelId(1), start, end)
            .id(RecordingId(id))
            .priority(priority)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_non_positive_duration() {
        let err = ScheduledRecording::builder_for_time_range(ChannelId(1), 100, 100)
            .build()
            .unwrap_err();
        assert!(matches!(err, DvrError::InvalidRecording(_)));

        assert!(
            ScheduledRecording::builder_for_time_range(ChannelId(1), 200, 100)
                .build()
                .is_err()
        );
    }

    #[test]
    fn time_range_builder_defaults() {
        let rec = ScheduledRecording::builder_for_time_range(ChannelId(7), 10, 20)
            .build()
            .unwrap();
        assert_eq!(rec.id(), RecordingId::UNSET);
        assert!(!rec.id().is_set());
        assert_eq!(rec.priority(), DEFAULT_PRIORITY);
        assert_eq!(rec.state(), RecordingState::NotStarted);
        assert_eq!(rec.recording_type(), RecordingType::Timed);
        assert_eq!(rec.program_id(), None);
    }

    #[test]
    fn program_builder_copies_program_fields() {
        let program = Program {
            id: ProgramId(42),
            channel_id: ChannelId(3),
            title: "News".into(),
            start_time_ms: 1_000,
            end_time_ms: 5_000,
        };
        let rec = ScheduledRecording::builder_for_program(&program)
            .build()
            .unwrap();
        assert_eq!(rec.program_id(), Some(ProgramId(42)));
        assert_eq!(rec.channel_id(), ChannelId(3));
        assert_eq!(rec.period(), Period::new(1_000, 5_000));
        assert_eq!(rec.recording_type(), RecordingType::Program);
    }

    #[test]
    fn build_from_preserves_all_fields() {
        let original = timed(5, 10, 20, 3).with_state(RecordingState::InProgress);
        let copy = ScheduledRecording::build_from(&original).build().unwrap();
        assert_eq!(original, copy);

        let changed = ScheduledRecording::build_from(&original)
            .state(RecordingState::Finished)
            .build()
            .unwrap();
        assert_eq!(changed.state(), RecordingState::Finished);
        assert_eq!(changed.id(), original.id());
        assert_eq!(original.state(), RecordingState::InProgress);
    }

    #[test]
    fn overlap_counts_touching_endpoints() {
        let rec = timed(1, 100, 200, 0);
        assert!(rec.is_overlapping(&Period::new(200, 300)));
        assert!(rec.is_overlapping(&Period::new(0, 100)));
        assert!(rec.is_overlapping(&Period::new(150, 160)));
        assert!(!rec.is_overlapping(&Period::new(201, 300)));
        assert!(!rec.is_overlapping(&Period::new(0, 99)));
    }

    #[test]
    fn priority_cmp_orders_by_priority_then_id() {
        let mut recs = vec![timed(3, 0, 1, 5), timed(1, 0, 1, 5), timed(2, 0, 1, 1)];
        recs.sort_by(ScheduledRecording::priority_cmp);
        let ids: Vec<i64> = recs.iter().map(|r| r.id().0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    proptest! {
        #[test]
        fn overlap_matches_interval_definition(
            start in -1_000i64..1_000,
            len in 1i64..500,
            p_start in -1_000i64..1_000,
            p_len in 0i64..500,
        ) {
            let rec = timed(1, start, start + len, 0);
            let period = Period::new(p_start, p_start + p_len);
            let disjoint = start + len < p_start || p_start + p_len < start;
            prop_assert_eq!(rec.is_overlapping(&period), !disjoint);
        }

        #[test]
        fn priority_sort_is_total(
            entries in proptest::collection::vec((0i64..5, 0i64..100), 1..20)
        ) {
            let mut recs: Vec<_> = entries
                .iter()
                .map(|(prio, id)| timed(*id, 0, 1, *prio))
                .collect();
            recs.sort_by(ScheduledRecording::priority_cmp);
            for pair in recs.windows(2) {
                let ordered = pair[0].priority() < pair[1].priority()
                    || (pair[0].priority() == pair[1].priority() && pair[0].id() <= pair[1].id());
                prop_assert!(ordered);
            }
        }
    }
}
