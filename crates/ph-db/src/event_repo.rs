use crate::util::{decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, to_rfc3339};
use ph_core::error::PanhandlerError;
use ph_core::events::EventRepository;
use ph_events::EventRecord;
use rusqlite::Connection;
use ulid::Ulid;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn internal(err: impl std::fmt::Display) -> PanhandlerError {
    PanhandlerError::Internal {
        message: err.to_string(),
    }
}

impl<'a> EventRepository for EventRepo<'a> {
    fn append(&self, mut event: EventRecord) -> Result<EventRecord, PanhandlerError> {
        event.seq = next_seq(self.conn)?;
        event.id = format!("evt_{}", Ulid::new());
        let sql = "INSERT INTO events (id, seq, at, correlation_id, source, body_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            event.id.clone(),
            event.seq,
            to_rfc3339(&event.at),
            event.correlation_id.clone(),
            encode_enum(&event.source).map_err(internal)?,
            encode_json(&event.body).map_err(internal)?,
        );
        self.conn.execute(sql, params).map_err(internal)?;
        Ok(event)
    }

    fn list(
        &self,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<EventRecord>, PanhandlerError> {
        let sql = "SELECT id, seq, at, correlation_id, source, body_json FROM events WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2";
        let mut stmt = self.conn.prepare(sql).map_err(internal)?;
        let limit = limit.map_or(-1, i64::from);
        let mut rows = stmt
            .query(rusqlite::params![after.unwrap_or(0), limit])
            .map_err(internal)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(internal)? {
            events.push(map_event_row(row)?);
        }
        Ok(events)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<EventRecord, PanhandlerError> {
    let id: String = row.get(0).map_err(internal)?;
    let seq: i64 = row.get(1).map_err(internal)?;
    let at: String = row.get(2).map_err(internal)?;
    let correlation_id: Option<String> = row.get(3).map_err(internal)?;
    let source: String = row.get(4).map_err(internal)?;
    let body_json: String = row.get(5).map_err(internal)?;

    Ok(EventRecord {
        id,
        seq,
        at: from_rfc3339(&at).map_err(internal)?,
        correlation_id,
        source: decode_enum(&source).map_err(internal)?,
        body: decode_json(&body_json).map_err(internal)?,
    })
}

fn next_seq(conn: &Connection) -> Result<i64, PanhandlerError> {
    let seq: i64 = conn
        .query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| {
            row.get(0)
        })
        .map_err(internal)?;
    Ok(seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use ph_events::EventSource;

    fn record(kind: &str) -> EventRecord {
        EventRecord {
            id: String::new(),
            seq: 0,
            at: chrono::Utc::now(),
            correlation_id: None,
            source: EventSource::Cli,
            body: serde_json::json!({ "type": kind }),
        }
    }

    #[test]
    fn append_assigns_sequence_and_id() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let first = repo.append(record("A")).unwrap();
        let second = repo.append(record("B")).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(first.id.starts_with("evt_"));
    }

    #[test]
    fn list_pages_by_sequence() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        for kind in ["A", "B", "C", "D"] {
            repo.append(record(kind)).unwrap();
        }
        assert_eq!(repo.list(None, None).unwrap().len(), 4);
        let page = repo.list(Some(1), Some(2)).unwrap();
        let seqs: Vec<i64> = page.iter().map(|event| event.seq).collect();
        assert_eq!(seqs, [2, 3]);
        assert_eq!(page[0].source, EventSource::Cli);
    }
}
