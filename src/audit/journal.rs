use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::models::AuditDecision;

pub const JOURNAL_FILE_NAME: &str = "audit_journal.db";

/// Durable record of audit decisions.
///
/// Every decision is committed as soon as it is made, so a crashed or
/// interrupted session resumes right after the last image the operator judged.
#[derive(Debug)]
pub struct AuditJournal {
    pool: SqlitePool,
    session_id: Uuid,
}

impl AuditJournal {
    /// Open (or create) the journal and start a new session.
    pub async fn open<P: AsRef<Path>>(db_file: P, source_csv: &Path) -> anyhow::Result<Self> {
        let db_file = db_file.as_ref();
        let connect_opts = SqliteConnectOptions::new()
            .filename(db_file)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("Failed to open audit journal {:?}", db_file))?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let session_id = Uuid::new_v4();
        sqlx::query("INSERT INTO audit_session (id, started_at, source_csv) VALUES (?1, ?2, ?3)")
            .bind(session_id.to_string())
            .bind(now_rfc3339()?)
            .bind(source_csv.display().to_string())
            .execute(&pool)
            .await?;

        Ok(Self { pool, session_id })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Persist a decision. Deciding the same image again replaces the old entry.
    pub async fn record(&self, image_index: &str, decision: AuditDecision) -> anyhow::Result<()> {
        if decision == AuditDecision::Quit {
            anyhow::bail!("quit is not a decision about {}", image_index);
        }
        sqlx::query(
            r#"INSERT OR REPLACE INTO audit_decision (image_index, decision, session_id, decided_at)
            VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(image_index)
        .bind(decision.to_string())
        .bind(self.session_id.to_string())
        .bind(now_rfc3339()?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Images that already have a decision, from any session.
    pub async fn completed(&self) -> anyhow::Result<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT image_index FROM audit_decision")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().collect())
    }

    pub async fn decision_for(&self, image_index: &str) -> anyhow::Result<Option<AuditDecision>> {
        let decision: Option<String> =
            sqlx::query_scalar("SELECT decision FROM audit_decision WHERE image_index = ?1")
                .bind(image_index)
                .fetch_optional(&self.pool)
                .await?;
        decision
            .map(|d| AuditDecision::try_from(d.as_str()))
            .transpose()
    }

    /// Most recently decided image.
    pub async fn last_decided(&self) -> anyhow::Result<Option<String>> {
        let name = sqlx::query_scalar(
            "SELECT image_index FROM audit_decision ORDER BY seq DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }

    /// Flush and release the database file.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn now_rfc3339() -> anyhow::Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}
