use agora::board::agents;
use agora::board::comments;
use agora::board::posts::{self, NewPost, PostType};
use agora::core::db;
use agora::core::error::AgoraError;
use std::path::PathBuf;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();
    db::initialize_board_db(&root).expect("board init");
    (tmp, root)
}

#[test]
fn register_issues_key_once_and_resolves_it() {
    let (_tmp, root) = setup();

    let registered = agents::register_agent(&root, "Crawler-7").expect("register");
    assert!(registered.api_key.starts_with("agora_"));

    let agent = agents::agent_from_token(&root, &registered.api_key)
        .expect("lookup")
        .expect("agent resolves");
    assert_eq!(agent.id, registered.agent_id);
    assert_eq!(agent.name, "Crawler-7");
    assert_eq!(agent.name_canonical, "crawler-7");
    assert_eq!(agent.reputation, 0);

    // Only the hash is at rest; a wrong key resolves to nothing.
    assert!(
        agents::agent_from_token(&root, "agora_not_a_real_key")
            .expect("lookup")
            .is_none()
    );
    assert!(agents::agent_from_token(&root, "").expect("lookup").is_none());
}

#[test]
fn canonical_name_collisions_rejected() {
    let (_tmp, root) = setup();

    agents::register_agent(&root, "Crawler-7").expect("register");
    for taken in ["crawler-7", "  Crawler-7  ", "CRAWLER-7"] {
        let err = agents::register_agent(&root, taken).unwrap_err();
        assert!(matches!(err, AgoraError::ValidationError(_)), "{taken}");
    }

    // A different canonical name is fine.
    agents::register_agent(&root, "crawler-8").expect("register sibling");
}

#[test]
fn name_bounds_enforced() {
    let (_tmp, root) = setup();
    assert!(agents::register_agent(&root, "   ").is_err());
    assert!(agents::register_agent(&root, &"x".repeat(65)).is_err());
}

#[test]
fn creation_grants_reputation_and_profile_counts() {
    let (_tmp, root) = setup();
    let author = agents::register_agent(&root, "author").expect("register");

    let post = posts::create_post(
        &root,
        &author.agent_id,
        &NewPost {
            title: "Show: my thing".into(),
            url: Some("https://example.com".into()),
            body: None,
            post_type: None,
        },
    )
    .expect("post");
    assert_eq!(post.post_type, PostType::Show);

    comments::create_comment(&root, &author.agent_id, &post.id, None, "first!").expect("comment");

    let profile = agents::get_agent_profile(&root, &author.agent_id).expect("profile");
    assert_eq!(profile.post_count, 1);
    assert_eq!(profile.comment_count, 1);
    // +2 for the post, +1 for the comment.
    assert_eq!(profile.reputation, 3);

    assert!(matches!(
        agents::get_agent_profile(&root, "01JUNKJUNKJUNKJUNKJUNKJUNK"),
        Err(AgoraError::NotFound(_))
    ));
}
