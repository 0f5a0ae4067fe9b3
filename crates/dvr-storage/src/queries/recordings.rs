// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled recording CRUD.

use dvr_core::{ChannelId, DvrError, ProgramId, RecordingId, ScheduledRecording};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_text;

const SELECT_COLUMNS: &str = "SELECT id, channel_id, program_id, start_time_ms, end_time_ms, \
     priority, state, recording_type FROM scheduled_recordings";

fn row_to_recording(row: &Row<'_>) -> Result<ScheduledRecording, rusqlite::Error> {
    let start: i64 = row.get(3)?;
    let end: i64 = row.get(4)?;
    ScheduledRecording::builder_for_time_range(ChannelId(row.get(1)?), start, end)
        .id(RecordingId(row.get(0)?))
        .program_id(row.get::<_, Option<i64>>(2)?.map(ProgramId))
        .priority(row.get(5)?)
        .state(parse_text(6, row.get(6)?)?)
        .recording_type(parse_text(7, row.get(7)?)?)
        .build()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Integer,
                Box::new(e),
            )
        })
}

/// Inserts a record and returns the id SQLite assigned. The record's own id
/// is ignored.
pub async fn insert_recording(
    db: &Database,
    recording: &ScheduledRecording,
) -> Result<RecordingId, DvrError> {
    let rec = recording.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_recordings \
                 (channel_id, program_id, start_time_ms, end_time_ms, priority, state, recording_type) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rec.channel_id().0,
                    rec.program_id().map(|p| p.0),
                    rec.start_time_ms(),
                    rec.end_time_ms(),
                    rec.priority(),
                    rec.state().to_string(),
                    rec.recording_type().to_string(),
                ],
            )?;
            Ok(RecordingId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrites every column of an existing record. Returns affected rows.
pub async fn update_recording(
    db: &Database,
    recording: &ScheduledRecording,
) -> Result<usize, DvrError> {
    let rec = recording.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_recordings SET channel_id = ?2, program_id = ?3, \
                 start_time_ms = ?4, end_time_ms = ?5, priority = ?6, state = ?7, \
                 recording_type = ?8 WHERE id = ?1",
                params![
                    rec.id().0,
                    rec.channel_id().0,
                    rec.program_id().map(|p| p.0),
                    rec.start_time_ms(),
                    rec.end_time_ms(),
                    rec.priority(),
                    rec.state().to_string(),
                    rec.recording_type().to_string(),
                ],
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_recording(db: &Database, id: RecordingId) -> Result<usize, DvrError> {
    db.connection()
        .call(move |conn| conn.execute("DELETE FROM scheduled_recordings WHERE id = ?1", params![id.0]))
        .await
        .map_err(map_tr_err)
}

/// Every record, ordered by start time.
pub async fn list_recordings(db: &Database) -> Result<Vec<ScheduledRecording>, DvrError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY start_time_ms, id"))?;
            let rows = stmt.query_map([], row_to_recording)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_recording(
    db: &Database,
    id: RecordingId,
) -> Result<Option<ScheduledRecording>, DvrError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                row_to_recording,
            );
            match result {
                Ok(rec) => Ok(Some(rec)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_core::{Program, RecordingState, RecordingType};

    fn timed(start: i64, end: i64) -> ScheduledRecording {
        ScheduledRecording::builder_for_time_range(ChannelId(4), start, end)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let db = Database::open_in_memory().await.unwrap();
        let a = insert_recording(&db, &timed(0, 10)).await.unwrap();
        let b = insert_recording(&db, &timed(5, 15)).await.unwrap();
        assert!(a.is_set());
        assert!(b > a);
    }

    #[tokio::test]
    async fn round_trips_all_columns() {
        let db = Database::open_in_memory().await.unwrap();
        let program = Program {
            id: ProgramId(99),
            channel_id: ChannelId(2),
            title: "Match".into(),
            start_time_ms: 1_000,
            end_time_ms: 2_000,
        };
        let rec = ScheduledRecording::builder_for_program(&program)
            .priority(7)
            .state(RecordingState::InProgress)
            .build()
            .unwrap();
        let id = insert_recording(&db, &rec).await.unwrap();

        let loaded = get_recording(&db, id).await.unwrap().unwrap();
        assert_eq!(loaded, rec.with_id(id));
        assert_eq!(loaded.recording_type(), RecordingType::Program);
        assert_eq!(loaded.program_id(), Some(ProgramId(99)));
    }

    #[tokio::test]
    async fn default_priority_survives_storage() {
        let db = Database::open_in_memory().await.unwrap();
        let id = insert_recording(&db, &timed(0, 10)).await.unwrap();
        let loaded = get_recording(&db, id).await.unwrap().unwrap();
        assert_eq!(loaded.priority(), i64::MAX);
    }

    #[tokio::test]
    async fn update_and_delete_report_affected_rows() {
        let db = Database::open_in_memory().await.unwrap();
        let id = insert_recording(&db, &timed(0, 10)).await.unwrap();
        let updated = timed(0, 10)
            .with_id(id)
            .with_state(RecordingState::Finished);

        assert_eq!(update_recording(&db, &updated).await.unwrap(), 1);
        assert_eq!(
            get_recording(&db, id).await.unwrap().unwrap().state(),
            RecordingState::Finished
        );

        assert_eq!(delete_recording(&db, id).await.unwrap(), 1);
        assert_eq!(delete_recording(&db, id).await.unwrap(), 0);
        assert_eq!(update_recording(&db, &updated).await.unwrap(), 0);
        assert!(get_recording(&db, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_by_start_time() {
        let db = Database::open_in_memory().await.unwrap();
        insert_recording(&db, &timed(500, 600)).await.unwrap();
        insert_recording(&db, &timed(100, 200)).await.unwrap();
        insert_recording(&db, &timed(300, 400)).await.unwrap();
        let starts: Vec<i64> = list_recordings(&db)
            .await
            .unwrap()
            .iter()
            .map(|r| r.start_time_ms())
            .collect();
        assert_eq!(starts, vec![100, 300, 500]);
    }
}
