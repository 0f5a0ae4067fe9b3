// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the DVR recording scheduler.
//!
//! Holds the recording record, the shared domain types, the error type, the
//! clock abstraction and the traits implemented by the scheduler's external
//! collaborators (store, tuner, alarm, channel directory).

pub mod clock;
pub mod error;
pub mod recording;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::DvrError;
pub use recording::{DEFAULT_PRIORITY, ScheduledRecording, ScheduledRecordingBuilder};
pub use types::{
    Channel, ChannelId, InputId, Period, Program, ProgramId, RecordedProgram, RecordedProgramId,
    RecordingId, RecordingState, RecordingType, TunerInputInfo,
};

pub use traits::{
    AlarmService, ChannelLookup, InputEvent, RecordingResult, RecordingStore, StaticChannels,
    StoreChange, TunerCallback, TunerErrorCode, TunerEvent, TunerService, TunerSession, WakeFn,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn dvr_error_variants_construct() {
        let _config = DvrError::Config("test".into());
        let _storage = DvrError::storage(std::io::Error::other("test"));
        let _tuner = DvrError::tuner("test");
        let _busy = DvrError::TunerUnavailable {
            input_id: InputId::new("hw0"),
        };
        let _invalid = DvrError::InvalidRecording("test".into());
        let _missing = DvrError::NotFound(RecordingId(1));
        let _shutdown = DvrError::Shutdown;
        let _internal = DvrError::Internal("test".into());
    }

    #[test]
    fn recording_state_string_round_trip() {
        let states = [
            RecordingState::NotStarted,
            RecordingState::InProgress,
            RecordingState::UnexpectedlyStopped,
            RecordingState::Finished,
            RecordingState::Failed,
        ];
        for state in states {
            let s = state.to_string();
            assert_eq!(RecordingState::from_str(&s).unwrap(), state);
        }
        assert_eq!(RecordingState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(RecordingType::Timed.to_string(), "TIMED");
    }

    #[test]
    fn recording_state_serde_matches_display() {
        let json = serde_json::to_string(&RecordingState::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn active_and_terminal_states() {
        assert!(RecordingState::NotStarted.is_active());
        assert!(RecordingState::InProgress.is_active());
        assert!(!RecordingState::Finished.is_active());
        assert!(RecordingState::Failed.is_terminal());
        assert!(!RecordingState::InProgress.is_terminal());
    }

    #[test]
    fn tuner_callback_forwards_events() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = TunerCallback::new(move |ev| sink.lock().unwrap().push(ev));
        callback.notify(TunerEvent::Tuned);
        callback.notify(TunerEvent::Error(TunerErrorCode::ResourceBusy));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                TunerEvent::Tuned,
                TunerEvent::Error(TunerErrorCode::ResourceBusy)
            ]
        );
    }
}
