use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;

/// Dismiss/snooze state of one event's alarm. The document backend cannot
/// store this inside the event object without rewriting the document on
/// every dismiss, so it lives in an auxiliary key-value table instead.
#[derive(Clone, Debug, PartialEq)]
pub struct AlarmState {
    pub event_id: String,
    pub dismissed: bool,
    pub notifyat: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait AlarmStateRepo: Send + Sync {
    async fn find_many(&self, event_ids: &[String]) -> anyhow::Result<Vec<AlarmState>>;
    async fn upsert(&self, state: &AlarmState) -> anyhow::Result<()>;
}

pub struct PostgresAlarmStateRepo {
    pool: PgPool,
}

impl PostgresAlarmStateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AlarmStateRepo for PostgresAlarmStateRepo {
    async fn find_many(&self, event_ids: &[String]) -> anyhow::Result<Vec<AlarmState>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT event_id, dismissed, notifyat FROM document_alarms WHERE event_id = ANY($1)",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| AlarmState {
                event_id: r.get("event_id"),
                dismissed: r.get("dismissed"),
                notifyat: r.get("notifyat"),
            })
            .collect())
    }

    async fn upsert(&self, state: &AlarmState) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_alarms(event_id, dismissed, notifyat)
            VALUES($1, $2, $3)
            ON CONFLICT (event_id)
            DO UPDATE SET dismissed = EXCLUDED.dismissed, notifyat = EXCLUDED.notifyat
            "#,
        )
        .bind(&state.event_id)
        .bind(state.dismissed)
        .bind(state.notifyat)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct InMemoryAlarmStateRepo {
    states: Mutex<HashMap<String, AlarmState>>,
}

impl InMemoryAlarmStateRepo {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAlarmStateRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AlarmStateRepo for InMemoryAlarmStateRepo {
    async fn find_many(&self, event_ids: &[String]) -> anyhow::Result<Vec<AlarmState>> {
        let states = self.states.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter_map(|id| states.get(id).cloned())
            .collect())
    }

    async fn upsert(&self, state: &AlarmState) -> anyhow::Result<()> {
        let mut states = self.states.lock().unwrap();
        states.insert(state.event_id.clone(), state.clone());
        Ok(())
    }
}
