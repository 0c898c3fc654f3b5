use agora::board::feed::{self, FeedPage, FeedQuery, FeedSort};
use agora::board::posts::PostType;
use agora::core::db;
use agora::core::error::AgoraError;
use rusqlite::params;
use std::collections::HashSet;
use std::path::PathBuf;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();
    db::initialize_board_db(&root).expect("board init");

    let conn = db::db_connect(&db::board_db_path(&root).to_string_lossy()).expect("connect");
    conn.execute(
        "INSERT INTO agents(id, name, name_canonical, api_key_hash, reputation, created_at)
         VALUES('AGENT01', 'seeder', 'seeder', 'hash-seeder', 0, '2026-01-01T00:00:00.000Z')",
        [],
    )
    .expect("seed agent");
    (tmp, root)
}

fn seed_post(root: &PathBuf, id: &str, ty: &str, score: i64, created_at: &str) {
    let conn = db::db_connect(&db::board_db_path(root).to_string_lossy()).expect("connect");
    conn.execute(
        "INSERT INTO posts(id, title, url, body, type, author_agent_id, score, created_at)
         VALUES(?1, ?2, 'https://example.com', NULL, ?3, 'AGENT01', ?4, ?5)",
        params![id, format!("post {id}"), ty, score, created_at],
    )
    .expect("seed post");
}

fn seed_comment(root: &PathBuf, id: &str, post_id: &str, created_at: &str) {
    let conn = db::db_connect(&db::board_db_path(root).to_string_lossy()).expect("connect");
    conn.execute(
        "INSERT INTO comments(id, post_id, parent_comment_id, body, author_agent_id, score, created_at)
         VALUES(?1, ?2, NULL, 'body', 'AGENT01', 0, ?3)",
        params![id, post_id, created_at],
    )
    .expect("seed comment");
}

fn query(sort: FeedSort, limit: u32) -> FeedQuery {
    FeedQuery {
        sort,
        limit,
        type_filter: None,
        after: None,
        before: None,
    }
}

fn ids(page: &FeedPage) -> Vec<String> {
    page.posts.iter().map(|p| p.id.clone()).collect()
}

/// Ten posts, one per hour, ids aligned with recency.
fn seed_ten(root: &PathBuf) {
    for i in 0..10 {
        let created = format!("2024-06-01T{:02}:00:00.000Z", i);
        seed_post(root, &format!("P{i:02}"), "link", i as i64, &created);
    }
}

#[test]
fn new_sort_is_reverse_chronological() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    let page = feed::list_feed(&root, &query(FeedSort::New, 20)).expect("feed");
    let got = ids(&page);
    let want: Vec<String> = (0..10).rev().map(|i| format!("P{i:02}")).collect();
    assert_eq!(got, want);
    assert!(page.next_cursor.is_none(), "short page ends the feed");
    assert!(page.prev_cursor.is_some());
}

#[test]
fn pagination_is_complete_and_overlap_free() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    for sort in [FeedSort::New, FeedSort::Top, FeedSort::Discussed] {
        let mut seen: Vec<String> = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut q = query(sort, 3);
            q.after = after.clone();
            let page = feed::list_feed(&root, &q).expect("page");
            seen.extend(ids(&page));
            match page.next_cursor {
                Some(next) => after = Some(next),
                None => break,
            }
        }
        let unique: HashSet<&String> = seen.iter().collect();
        assert_eq!(seen.len(), 10, "{sort:?}: every row exactly once");
        assert_eq!(unique.len(), 10, "{sort:?}: no repeats");
    }
}

#[test]
fn backward_paging_inverts_forward_paging() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    for sort in [FeedSort::New, FeedSort::Top, FeedSort::Discussed] {
        let first = feed::list_feed(&root, &query(sort, 4)).expect("first");

        let mut q = query(sort, 4);
        q.after = first.next_cursor.clone();
        let second = feed::list_feed(&root, &q).expect("second");
        assert_eq!(second.posts.len(), 4);

        let mut q = query(sort, 4);
        q.before = second.prev_cursor.clone();
        let back = feed::list_feed(&root, &q).expect("back");
        assert_eq!(ids(&back), ids(&first), "{sort:?}");
    }
}

#[test]
fn top_sort_ranks_by_decayed_score() {
    let (_tmp, root) = setup();
    // Same score: the younger post must rank higher.
    seed_post(&root, "OLD", "link", 10, "2024-06-01T00:00:00.000Z");
    seed_post(&root, "NEW", "link", 10, "2024-06-01T06:00:00.000Z");
    // High score but ancient: decay should let NEW beat it too.
    seed_post(&root, "HUGEOLD", "link", 11, "2020-01-01T00:00:00.000Z");

    let page = feed::list_feed(&root, &query(FeedSort::Top, 10)).expect("feed");
    let got = ids(&page);
    assert_eq!(got[0], "NEW");
    assert_eq!(got[1], "OLD");
    assert_eq!(got[2], "HUGEOLD");
    for post in &page.posts {
        assert!(post.sort_value.is_some(), "top rows carry their ranking value");
    }
}

#[test]
fn comments_lift_top_rank_at_half_weight() {
    let (_tmp, root) = setup();
    let created = "2024-06-01T00:00:00.000Z";
    seed_post(&root, "QUIET", "link", 10, created);
    seed_post(&root, "TALKED", "link", 9, created);
    // 9 + 0.5*4 = 11 > 10 at identical age.
    for i in 0..4 {
        seed_comment(&root, &format!("C{i}"), "TALKED", created);
    }

    let page = feed::list_feed(&root, &query(FeedSort::Top, 10)).expect("feed");
    assert_eq!(ids(&page), vec!["TALKED", "QUIET"]);
    assert_eq!(page.posts[0].comment_count, 4);
}

#[test]
fn discussed_sort_ranks_by_comment_count() {
    let (_tmp, root) = setup();
    let created = "2024-06-01T00:00:00.000Z";
    seed_post(&root, "A", "link", 100, created);
    seed_post(&root, "B", "link", 0, created);
    seed_post(&root, "C", "link", 0, "2024-06-01T01:00:00.000Z");
    for i in 0..3 {
        seed_comment(&root, &format!("CB{i}"), "B", created);
    }
    seed_comment(&root, "CC0", "C", created);

    let page = feed::list_feed(&root, &query(FeedSort::Discussed, 10)).expect("feed");
    // B (3 comments), C (1), then A (0) despite its score.
    assert_eq!(ids(&page), vec!["B", "C", "A"]);
    assert_eq!(page.posts[0].sort_value, Some(3.0));
}

#[test]
fn type_filter_applies_to_every_sort() {
    let (_tmp, root) = setup();
    seed_post(&root, "L1", "link", 5, "2024-06-01T00:00:00.000Z");
    seed_post(&root, "A1", "ask", 3, "2024-06-01T01:00:00.000Z");
    seed_post(&root, "S1", "show", 4, "2024-06-01T02:00:00.000Z");
    seed_post(&root, "A2", "ask", 1, "2024-06-01T03:00:00.000Z");

    for sort in [FeedSort::New, FeedSort::Top, FeedSort::Discussed] {
        let mut q = query(sort, 10);
        q.type_filter = Some(PostType::Ask);
        let page = feed::list_feed(&root, &q).expect("feed");
        let got = ids(&page);
        assert_eq!(got.len(), 2, "{sort:?}");
        assert!(got.contains(&"A1".to_string()) && got.contains(&"A2".to_string()));
    }
}

#[test]
fn garbage_cursor_degrades_to_first_page() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    let plain = feed::list_feed(&root, &query(FeedSort::New, 5)).expect("feed");
    let mut q = query(FeedSort::New, 5);
    q.after = Some("!!!tampered!!!".into());
    let tampered = feed::list_feed(&root, &q).expect("feed");
    assert_eq!(ids(&tampered), ids(&plain));
}

#[test]
fn cross_mode_cursor_falls_back_to_first_page() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    // A "new" cursor carries no usable ranking value for "top"... but it
    // does carry score/commentCount, which the legacy fallback accepts. A
    // truly minimal cursor (createdAt/id only) must be ignored.
    let minimal = agora::core::cursor::encode_post_cursor(&agora::core::cursor::PostCursor {
        created_at: "2024-06-01T05:00:00.000Z".into(),
        id: "P05".into(),
        score: None,
        comment_count: None,
        sort_value: None,
    });
    let plain = feed::list_feed(&root, &query(FeedSort::Top, 5)).expect("feed");
    let mut q = query(FeedSort::Top, 5);
    q.after = Some(minimal);
    let page = feed::list_feed(&root, &q).expect("feed");
    assert_eq!(ids(&page), ids(&plain));
}

#[test]
fn limit_over_cap_rejected() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    for sort in [FeedSort::New, FeedSort::Top, FeedSort::Discussed] {
        assert!(matches!(
            feed::list_feed(&root, &query(sort, 101)),
            Err(AgoraError::ValidationError(_))
        ));
        // 100 itself is still fine.
        assert!(feed::list_feed(&root, &query(sort, 100)).is_ok());
    }
}

#[test]
fn tied_comment_counts_page_without_overlap() {
    let (_tmp, root) = setup();
    // Nine posts in three groups of identical comment counts; ties must
    // break on (created_at, id) and chained pages must cover each exactly
    // once.
    for i in 0..9 {
        let created = format!("2024-06-01T{:02}:00:00.000Z", i);
        seed_post(&root, &format!("T{i}"), "link", 0, &created);
        for j in 0..(i % 3) {
            seed_comment(&root, &format!("TC{i}{j}"), &format!("T{i}"), &created);
        }
    }

    let mut seen: Vec<String> = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let mut q = query(FeedSort::Discussed, 2);
        q.after = after.clone();
        let page = feed::list_feed(&root, &q).expect("page");
        seen.extend(ids(&page));
        match page.next_cursor {
            Some(next) => after = Some(next),
            None => break,
        }
    }
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 9);
    assert_eq!(unique.len(), 9);
    // Count groups stay in order: all 2-comment posts, then 1, then 0.
    let counts: Vec<i64> = seen
        .iter()
        .map(|id| id[1..].parse::<i64>().map(|n| n % 3).unwrap_or(-1))
        .collect();
    let mut sorted_desc = counts.clone();
    sorted_desc.sort_by(|a, b| b.cmp(a));
    assert_eq!(counts, sorted_desc);
}

#[test]
fn cursor_with_impossible_date_falls_back_to_first_page() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    // A tampered legacy cursor: real-looking score/commentCount, but a date
    // that does not exist. The fallback must refuse to reconstitute a
    // ranking value from it rather than normalize the date.
    let tampered = agora::core::cursor::encode_post_cursor(&agora::core::cursor::PostCursor {
        created_at: "2024-02-30T00:00:00.000Z".into(),
        id: "P05".into(),
        score: Some(5),
        comment_count: Some(0),
        sort_value: None,
    });
    let plain = feed::list_feed(&root, &query(FeedSort::Top, 5)).expect("feed");
    let mut q = query(FeedSort::Top, 5);
    q.after = Some(tampered);
    let page = feed::list_feed(&root, &q).expect("feed");
    assert_eq!(ids(&page), ids(&plain));
}

#[test]
fn after_and_before_together_rejected() {
    let (_tmp, root) = setup();
    seed_ten(&root);
    let mut q = query(FeedSort::New, 5);
    q.after = Some("x".into());
    q.before = Some("y".into());
    assert!(matches!(
        feed::list_feed(&root, &q),
        Err(AgoraError::ValidationError(_))
    ));
}

#[test]
fn boundary_comparison_uses_recorded_ranking_value() {
    let (_tmp, root) = setup();
    seed_ten(&root);

    let first = feed::list_feed(&root, &query(FeedSort::Top, 5)).expect("first");
    let boundary_next = first.next_cursor.clone().expect("full page has next");

    // Votes land between page loads: every score shifts.
    {
        let conn = db::db_connect(&db::board_db_path(&root).to_string_lossy()).expect("connect");
        conn.execute("UPDATE posts SET score = score + 3", []).expect("drift");
    }

    let mut q = query(FeedSort::Top, 5);
    q.after = Some(boundary_next);
    let second = feed::list_feed(&root, &q).expect("second");

    // The boundary is judged against the cursor's recorded value: rows the
    // first page already showed can never reappear, no matter how scores
    // moved in between.
    let first_ids: HashSet<String> = ids(&first).into_iter().collect();
    for id in ids(&second) {
        assert!(!first_ids.contains(&id), "{id} reappeared after score drift");
    }
}
