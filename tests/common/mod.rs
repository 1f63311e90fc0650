//! Shared helpers for integration tests
#![allow(dead_code)]

use sounddex::types::{
    Hub, HubAction, MatchEntry, MetadataItem, RecognitionPayload, Section, ShareInfo, Track,
    TrackImages,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// File-backed database so multiple pool connections see the same catalog
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
    let pool = sounddex::db::init_pool(&url).await.expect("init pool");
    (pool, dir)
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

/// A complete successful payload for one recognized track
pub fn match_payload(recognition_id: u64, display_name: &str, label: Option<&str>) -> RecognitionPayload {
    let metadata = vec![
        MetadataItem {
            title: Some("Album".to_string()),
            text: Some("Fixture Album".to_string()),
        },
        MetadataItem {
            title: Some("Label".to_string()),
            text: label.map(|l| l.to_string()),
        },
    ];

    RecognitionPayload {
        matches: vec![MatchEntry {
            id: format!("match-{recognition_id}"),
            offset: Some(3.5),
        }],
        track: Some(Track {
            title: Some(display_name.to_string()),
            subtitle: None,
            url: Some(format!(
                "https://www.shazam.com/track/{recognition_id}/fixture"
            )),
            images: Some(TrackImages {
                background: Some("https://images.example/bg.jpg".to_string()),
                coverart: None,
            }),
            share: Some(ShareInfo {
                subject: Some(display_name.to_string()),
                text: Some(format!("I used sounddex to find {display_name}")),
                href: None,
            }),
            sections: if label.is_some() {
                vec![Section {
                    section_type: "SONG".to_string(),
                    metadata,
                }]
            } else {
                Vec::new()
            },
            hub: Some(Hub {
                actions: vec![HubAction {
                    action_type: Some("uri".to_string()),
                    uri: Some(format!(
                        "https://audio-ssl.itunes.apple.com/preview/{recognition_id}.m4a"
                    )),
                }],
            }),
        }),
        ..Default::default()
    }
}

/// A payload whose track lacks the fields identity requires
pub fn anonymous_payload() -> RecognitionPayload {
    RecognitionPayload {
        track: Some(Track {
            title: Some("Untitled".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
