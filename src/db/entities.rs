//! Recognized entity upserts
//!
//! Exactly one entity row exists per external recognition id. Existing rows
//! are only patched when the resolved label changed; everything else was
//! written by whichever ingestor saw the id first.

use crate::db::now_ms;
use crate::types::EntityIdentity;
use crate::{Error, Result};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RecognizedEntity {
    pub guid: Uuid,
    pub recognition_id: String,
    pub display_name: String,
    pub image_url: Option<String>,
    pub share_url: Option<String>,
    pub play_url: Option<String>,
    pub label_id: Option<Uuid>,
}

pub async fn get_by_recognition_id(
    conn: &mut SqliteConnection,
    recognition_id: &str,
) -> Result<Option<RecognizedEntity>> {
    let row = sqlx::query(
        r#"
        SELECT guid, recognition_id, display_name, image_url, share_url, play_url, label_id
        FROM recognized_entities
        WHERE recognition_id = ?
        "#,
    )
    .bind(recognition_id)
    .fetch_optional(conn)
    .await?;

    row.map(|row| {
        let guid: String = row.get("guid");
        let label_id: Option<String> = row.get("label_id");
        Ok(RecognizedEntity {
            guid: Uuid::parse_str(&guid)
                .map_err(|e| Error::Internal(format!("bad entity guid {guid}: {e}")))?,
            recognition_id: row.get("recognition_id"),
            display_name: row.get("display_name"),
            image_url: row.get("image_url"),
            share_url: row.get("share_url"),
            play_url: row.get("play_url"),
            label_id: label_id
                .map(|s| {
                    Uuid::parse_str(&s)
                        .map_err(|e| Error::Internal(format!("bad label guid {s}: {e}")))
                })
                .transpose()?,
        })
    })
    .transpose()
}

/// Upsert keyed by recognition id; returns the entity guid.
pub async fn upsert(
    conn: &mut SqliteConnection,
    identity: &EntityIdentity,
    label_id: Option<Uuid>,
) -> Result<Uuid> {
    if let Some(existing) = get_by_recognition_id(conn, &identity.recognition_id).await? {
        if let Some(label_id) = label_id {
            if existing.label_id != Some(label_id) {
                sqlx::query("UPDATE recognized_entities SET label_id = ?, updated_at = ? WHERE guid = ?")
                    .bind(label_id.to_string())
                    .bind(now_ms())
                    .bind(existing.guid.to_string())
                    .execute(conn)
                    .await?;
            }
        }
        return Ok(existing.guid);
    }

    let guid = Uuid::new_v4();
    let now = now_ms();

    sqlx::query(
        r#"
        INSERT INTO recognized_entities (guid, recognition_id, display_name, image_url,
                                         share_url, play_url, label_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(&identity.recognition_id)
    .bind(&identity.display_name)
    .bind(&identity.image_url)
    .bind(&identity.share_url)
    .bind(&identity.play_url)
    .bind(label_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(guid)
}
