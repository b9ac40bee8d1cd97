//! SQLite memory backend.
//!
//! One database file, two append-only tables. Embeddings are stored as
//! little-endian `f32` blobs; state snapshots and rule locations as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Arc;
use tokio::sync::Mutex;

use swarm_core::{
    traits::MemoryBackend,
    types::{Episode, EpisodeDraft, MemoryCounts, Rule, RuleDraft, RuleLocation, StateSnapshot},
    Error, Result,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS episodic_memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    agent_id INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    state TEXT NOT NULL,
    outcome_text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    poisoned INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS semantic_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_text TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    location TEXT NOT NULL,
    confidence REAL NOT NULL,
    embedding BLOB NOT NULL,
    poisoned INTEGER NOT NULL DEFAULT 0
);
";

const EPISODE_COLUMNS: &str = "id, timestamp, agent_id, action_type, state, outcome_text, embedding, poisoned";
const RULE_COLUMNS: &str = "id, rule_text, rule_type, location, confidence, embedding, poisoned";

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::storage(format!("{}: {}", context, e))
}

fn join_err(e: tokio::task::JoinError) -> Error {
    Error::internal(format!("storage task failed: {}", e))
}

pub(crate) fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Raw episode columns, converted outside the row callback.
struct EpisodeRow {
    id: i64,
    timestamp: String,
    agent_id: i64,
    action_type: String,
    state: String,
    outcome_text: String,
    embedding: Vec<u8>,
    poisoned: i64,
}

impl TryFrom<EpisodeRow> for Episode {
    type Error = Error;

    fn try_from(row: EpisodeRow) -> Result<Self> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| Error::storage(format!("bad timestamp on episode {}: {}", row.id, e)))?
            .with_timezone(&Utc);
        let agent_id = u32::try_from(row.agent_id)
            .map_err(|_| Error::storage(format!("bad agent id on episode {}: {}", row.id, row.agent_id)))?;
        let state: StateSnapshot = serde_json::from_str(&row.state)?;

        Ok(Episode {
            id: row.id,
            timestamp,
            agent_id,
            action_type: row.action_type.parse()?,
            state,
            outcome_text: row.outcome_text,
            embedding: decode_embedding(&row.embedding),
            poisoned: row.poisoned != 0,
        })
    }
}

struct RuleRow {
    id: i64,
    rule_text: String,
    rule_type: String,
    location: String,
    confidence: f64,
    embedding: Vec<u8>,
    poisoned: i64,
}

impl TryFrom<RuleRow> for Rule {
    type Error = Error;

    fn try_from(row: RuleRow) -> Result<Self> {
        let location: RuleLocation = serde_json::from_str(&row.location)?;
        Ok(Rule {
            id: row.id,
            rule_text: row.rule_text,
            rule_type: row.rule_type.parse()?,
            location,
            confidence: row.confidence,
            embedding: decode_embedding(&row.embedding),
            poisoned: row.poisoned != 0,
        })
    }
}

fn query_episodes(conn: &Connection, sql: &str, limit: i64) -> Result<Vec<Episode>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("Prepare error"))?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(EpisodeRow {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                agent_id: row.get(2)?,
                action_type: row.get(3)?,
                state: row.get(4)?,
                outcome_text: row.get(5)?,
                embedding: row.get(6)?,
                poisoned: row.get(7)?,
            })
        })
        .map_err(db_err("Query error"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("Result error"))?;

    rows.into_iter().map(Episode::try_from).collect()
}

fn query_rules(conn: &Connection, sql: &str, limit: i64) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("Prepare error"))?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(RuleRow {
                id: row.get(0)?,
                rule_text: row.get(1)?,
                rule_type: row.get(2)?,
                location: row.get(3)?,
                confidence: row.get(4)?,
                embedding: row.get(5)?,
                poisoned: row.get(6)?,
            })
        })
        .map_err(db_err("Query error"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("Result error"))?;

    rows.into_iter().map(Rule::try_from).collect()
}

/// SQLite-backed memory that persists across runs.
pub struct SqliteMemoryBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryBackend {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("DB error"))?;
        tracing::info!(path = %path.as_ref().display(), "Opened memory database");
        Self::init(conn)
    }

    /// A private database that lives as long as this backend.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB error"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err("Schema error"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(join_err)?
    }
}

#[async_trait]
impl MemoryBackend for SqliteMemoryBackend {
    async fn insert_episode(&self, draft: EpisodeDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Episode> {
        let state_json = serde_json::to_string(&draft.state)?;
        let timestamp = Utc::now();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO episodic_memory (timestamp, agent_id, action_type, state, outcome_text, embedding, poisoned)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    timestamp.to_rfc3339(),
                    draft.agent_id,
                    draft.action_type.as_str(),
                    state_json,
                    draft.outcome_text,
                    encode_embedding(&embedding),
                    poisoned as i64,
                ],
            )
            .map_err(db_err("Insert error"))?;

            Ok(Episode {
                id: conn.last_insert_rowid(),
                timestamp,
                agent_id: draft.agent_id,
                action_type: draft.action_type,
                state: draft.state,
                outcome_text: draft.outcome_text,
                embedding,
                poisoned,
            })
        })
        .await
    }

    async fn insert_rule(&self, draft: RuleDraft, embedding: Vec<f32>, poisoned: bool) -> Result<Rule> {
        let location_json = serde_json::to_string(&draft.location)?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO semantic_rules (rule_text, rule_type, location, confidence, embedding, poisoned)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    draft.rule_text,
                    draft.rule_type.as_str(),
                    location_json,
                    draft.confidence,
                    encode_embedding(&embedding),
                    poisoned as i64,
                ],
            )
            .map_err(db_err("Insert error"))?;

            Ok(Rule {
                id: conn.last_insert_rowid(),
                rule_text: draft.rule_text,
                rule_type: draft.rule_type,
                location: draft.location,
                confidence: draft.confidence,
                embedding,
                poisoned,
            })
        })
        .await
    }

    async fn episodes(&self) -> Result<Vec<Episode>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM episodic_memory ORDER BY id ASC LIMIT ?1", EPISODE_COLUMNS);
            query_episodes(conn, &sql, -1)
        })
        .await
    }

    async fn rules(&self) -> Result<Vec<Rule>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM semantic_rules ORDER BY id ASC LIMIT ?1", RULE_COLUMNS);
            query_rules(conn, &sql, -1)
        })
        .await
    }

    async fn counts(&self) -> Result<MemoryCounts> {
        self.with_conn(|conn| {
            let (episodes, poisoned_episodes): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(poisoned), 0) FROM episodic_memory",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(db_err("Count error"))?;
            let (rules, poisoned_rules): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(poisoned), 0) FROM semantic_rules",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(db_err("Count error"))?;

            Ok(MemoryCounts {
                episodes: episodes as usize,
                poisoned_episodes: poisoned_episodes as usize,
                rules: rules as usize,
                poisoned_rules: poisoned_rules as usize,
            })
        })
        .await
    }

    async fn recent_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM episodic_memory ORDER BY id DESC LIMIT ?1", EPISODE_COLUMNS);
            query_episodes(conn, &sql, limit)
        })
        .await
    }

    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM semantic_rules ORDER BY id DESC LIMIT ?1", RULE_COLUMNS);
            query_rules(conn, &sql, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::types::{ActionType, RuleType};

    #[test]
    fn test_embedding_blob_layout() {
        let bytes = encode_embedding(&[1.0, -0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes), vec![1.0, -0.5]);
        // Trailing partial floats are ignored.
        assert_eq!(decode_embedding(&bytes[..6]), vec![1.0]);
    }

    #[tokio::test]
    async fn test_sqlite_memory_persists_across_reopen() {
        use tempfile::NamedTempFile;
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let backend = SqliteMemoryBackend::open(&path).unwrap();
            let draft = EpisodeDraft::new(1, ActionType::Move, "Move command sent")
                .with_state("lat", 47.39)
                .with_state("soc", 0.92);
            backend.insert_episode(draft, vec![0.25, 0.5], false).await.unwrap();

            let loc = RuleLocation { lat: 47.39, lon: 8.54, radius: 30.0 };
            backend
                .insert_rule(RuleDraft::new("UNSAFE: jamming", RuleType::Hazard, loc, 0.7), vec![1.0, 0.0], true)
                .await
                .unwrap();
        }

        let backend = SqliteMemoryBackend::open(&path).unwrap();
        let episodes = backend.episodes().await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].agent_id, 1);
        assert_eq!(episodes[0].action_type, ActionType::Move);
        assert_eq!(episodes[0].state["soc"], serde_json::json!(0.92));
        assert_eq!(episodes[0].embedding, vec![0.25, 0.5]);
        assert!(!episodes[0].poisoned);

        let rules = backend.rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::Hazard);
        assert_eq!(rules[0].location.radius, 30.0);
        assert!(rules[0].poisoned);

        let counts = backend.counts().await.unwrap();
        assert_eq!(counts.episodes, 1);
        assert_eq!(counts.poisoned_episodes, 0);
        assert_eq!(counts.rules, 1);
        assert_eq!(counts.poisoned_rules, 1);
    }

    #[tokio::test]
    async fn test_sqlite_recent_and_empty_counts() {
        let backend = SqliteMemoryBackend::open_in_memory().unwrap();
        assert_eq!(backend.counts().await.unwrap(), MemoryCounts::default());

        for outcome in ["first", "second", "third"] {
            backend
                .insert_episode(EpisodeDraft::new(2, ActionType::Scan, outcome), vec![1.0], false)
                .await
                .unwrap();
        }
        let recent = backend.recent_episodes(2).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|e| e.outcome_text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second"]);

        let all = backend.episodes().await.unwrap();
        assert_eq!(all.first().map(|e| e.outcome_text.as_str()), Some("first"));
    }
}
