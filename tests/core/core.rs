use agora::core::broker::{BrokerEvent, DbBroker};
use agora::core::config::BoardConfig;
use agora::core::cursor::{self, PostCursor};
use agora::core::db;
use agora::core::error::AgoraError;
use agora::core::ranking;
use agora::core::time;
use std::fs;
use tempfile::tempdir;

#[test]
fn db_bootstrap_applies_pragmas_and_schema() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    db::initialize_board_db(root).expect("board init");
    let db_path = db::board_db_path(root);
    assert!(db_path.exists());

    let conn = db::db_connect(&db_path.to_string_lossy()).expect("db connect");
    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);

    for table in ["agents", "posts", "comments", "votes", "rate_limits", "meta"] {
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .expect("sqlite_master");
        assert_eq!(count, 1, "missing table {table}");
    }

    // Init twice must be a no-op, not an error.
    db::initialize_board_db(root).expect("idempotent init");
}

#[test]
fn broker_round_trip_and_audit() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_board_db(root).expect("board init");

    let broker = DbBroker::new(root);
    broker
        .with_conn("tester", "test.insert", |conn| {
            conn.execute(
                "INSERT INTO agents(id, name, name_canonical, api_key_hash, reputation, created_at)
                 VALUES('a1', 'Tester', 'tester', 'hash-1', 0, '2026-01-01T00:00:00.000Z')",
                [],
            )
            .map_err(AgoraError::RusqliteError)?;
            Ok(())
        })
        .expect("broker success path");

    let result: Result<(), AgoraError> = broker.with_conn("tester", "test.fail", |_| {
        Err(AgoraError::ValidationError("intentional".to_string()))
    });
    assert!(result.is_err());

    let audit_path = root.join("board.events.jsonl");
    assert!(audit_path.exists());
    let events: Vec<BrokerEvent> = fs::read_to_string(&audit_path)
        .expect("read audit")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid broker event json"))
        .collect();
    assert!(events.iter().any(|ev| ev.op == "test.insert" && ev.status == "success"));
    assert!(events.iter().any(|ev| ev.op == "test.fail" && ev.status == "error"));
}

#[test]
fn config_defaults_and_overrides() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    let config = BoardConfig::load(root).expect("defaults");
    assert_eq!(config.feed_page_size, 20);
    assert_eq!(config.comment_page_size, 20);
    assert_eq!(config.posts_per_hour, 5);

    fs::write(root.join("config.toml"), "feed_page_size = 10\n").expect("write config");
    let config = BoardConfig::load(root).expect("partial override");
    assert_eq!(config.feed_page_size, 10);
    assert_eq!(config.comment_page_size, 20);

    fs::write(root.join("config.toml"), "feed_page_size = 0\n").expect("write config");
    assert!(matches!(
        BoardConfig::load(root),
        Err(AgoraError::ConfigError(_))
    ));

    fs::write(root.join("config.toml"), "feed_page_size = \"lots\"\n").expect("write config");
    assert!(matches!(
        BoardConfig::load(root),
        Err(AgoraError::ConfigError(_))
    ));
}

#[test]
fn cursor_survives_url_round_trip() {
    let cursor = PostCursor {
        created_at: time::iso_from_ms(1_750_000_000_000),
        id: time::new_event_id(),
        score: Some(42),
        comment_count: Some(7),
        sort_value: Some(3.5),
    };
    let token = cursor::encode_post_cursor(&cursor);
    // A cursor travels as a URL query parameter; it must need no escaping.
    assert!(!token.contains('+') && !token.contains('/') && !token.contains('='));
    assert_eq!(cursor::decode_post_cursor(&token), Some(cursor));
}

#[test]
fn decayed_score_matches_hand_computed_values() {
    // The canonical pair from the ranking contract.
    let now = 1_750_000_000_000;
    let fresh = ranking::ranking_score(10, 0, now, now);
    assert!((fresh - 3.5355).abs() < 1e-3);
    let two_hours = ranking::ranking_score(10, 0, now, now + 2 * 3_600_000);
    assert!((two_hours - 1.25).abs() < 1e-12);
}

#[test]
fn timestamps_order_lexicographically() {
    let mut stamps: Vec<String> = (0..50)
        .map(|i| time::iso_from_ms(1_700_000_000_000 + i * 97_531))
        .collect();
    let sorted = stamps.clone();
    stamps.sort();
    assert_eq!(stamps, sorted);
}
