// SPDX-FileCopyrightText: 2026 DVR Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recorded program CRUD.

use dvr_core::{ChannelId, DvrError, InputId, ProgramId, RecordedProgram, RecordedProgramId};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

const SELECT_COLUMNS: &str = "SELECT id, input_id, channel_id, program_id, start_time_ms, \
     end_time_ms, data_uri, size_bytes FROM recorded_programs";

fn row_to_program(row: &Row<'_>) -> Result<RecordedProgram, rusqlite::Error> {
    let size: i64 = row.get(7)?;
    Ok(RecordedProgram {
        id: RecordedProgramId(row.get(0)?),
        input_id: InputId(row.get(1)?),
        channel_id: ChannelId(row.get(2)?),
        program_id: row.get::<_, Option<i64>>(3)?.map(ProgramId),
        start_time_ms: row.get(4)?,
        end_time_ms: row.get(5)?,
        data_uri: row.get(6)?,
        size_bytes: u64::try_from(size).unwrap_or(0),
    })
}

pub async fn insert_recorded_program(
    db: &Database,
    program: &RecordedProgram,
) -> Result<RecordedProgramId, DvrError> {
    let p = program.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO recorded_programs \
                 (input_id, channel_id, program_id, start_time_ms, end_time_ms, data_uri, size_bytes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    p.input_id.0,
                    p.channel_id.0,
                    p.program_id.map(|id| id.0),
                    p.start_time_ms,
                    p.end_time_ms,
                    p.data_uri,
                    i64::try_from(p.size_bytes).unwrap_or(i64::MAX),
                ],
            )?;
            Ok(RecordedProgramId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_recorded_program(
    db: &Database,
    id: RecordedProgramId,
) -> Result<usize, DvrError> {
    db.connection()
        .call(move |conn| conn.execute("DELETE FROM recorded_programs WHERE id = ?1", params![id.0]))
        .await
        .map_err(map_tr_err)
}

pub async fn list_recorded_programs(db: &Database) -> Result<Vec<RecordedProgram>, DvrError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY start_time_ms, id"))?;
            let rows = stmt.query_map([], row_to_program)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_recorded_program(
    db: &Database,
    id: RecordedProgramId,
) -> Result<Option<RecordedProgram>, DvrError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                row_to_program,
            );
            match result {
                Ok(p) => Ok(Some(p)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
