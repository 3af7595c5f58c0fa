mod common;

use common::*;

use lgtm_core::codec;
use lgtm_core::{ConsensusRecord, TreeHash, Verdict, SELF_APPROVAL_MESSAGE};
use lgtm_server::router::{NoteableType, PullRequestAction};

/// The record as currently written in the PR's single tracking comment.
fn tracking_record(host: &FakeHost) -> ConsensusRecord {
    let tracking: Vec<ConsensusRecord> = host
        .bot_comments()
        .iter()
        .filter_map(|c| {
            codec::parse(&c.body).map(|mut record| {
                record.comment_id = Some(c.id);
                record
            })
        })
        .collect();
    assert_eq!(tracking.len(), 1, "expected exactly one tracking comment");
    tracking.into_iter().next().unwrap()
}

async fn opened(host: &FakeHost) {
    router_for(host)
        .handle_pull_request(&pr_event(PullRequestAction::Opened, "c1"))
        .await
        .unwrap();
}

async fn comment(host: &FakeHost, who: &str, body: &str) -> Option<ConsensusRecord> {
    comment_at(host, who, body, "c1").await
}

async fn comment_at(
    host: &FakeHost,
    who: &str,
    body: &str,
    head_sha: &str,
) -> Option<ConsensusRecord> {
    router_for(host)
        .handle_note(&note(who, body, head_sha))
        .await
        .unwrap()
}

/// Scenario A carried through to a ready PR at tree `t1`.
async fn ready_with_label(host: &FakeHost) {
    opened(host).await;
    comment(host, "alice", "/lgtm").await;
    comment(host, "bob", "/lgtm").await;
    assert!(host.has_label(LABEL));
    assert_eq!(tracking_record(host).verdict, Verdict::Lgtm);
}

#[tokio::test]
async fn test_opened_publishes_fresh_record() {
    let host = scenario_host();
    let record = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Opened, "c1"))
        .await
        .unwrap()
        .unwrap();

    assert!(record.consentors.is_empty());
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
    assert_eq!(record.tree_hash, TreeHash::from("t1"));
    assert!(record.comment_id.is_some());
    assert_eq!(tracking_record(&host).verdict, Verdict::NotLgtm);
    assert!(!host.has_label(LABEL));
}

#[tokio::test]
async fn test_scenario_a_two_owners_approve() {
    let host = scenario_host();
    opened(&host).await;

    let record = comment(&host, "alice", "/lgtm").await.unwrap();
    assert_eq!(record.consentors, logins(&["alice!"]));
    assert_eq!(record.pending_directories, dirs(&["b"]));
    assert!(!host.has_label(LABEL));

    let record = comment(&host, "Bob", "Looks right.\n/lgtm").await.unwrap();
    assert_eq!(record.consentors, logins(&["alice!", "bob!"]));
    assert!(record.pending_directories.is_empty());
    assert!(host.has_label(LABEL));

    let published = tracking_record(&host);
    assert_eq!(published.verdict, Verdict::Lgtm);
    assert_eq!(published.consentors, record.consentors);
}

#[tokio::test]
async fn test_scenario_b_reviewer_cancel_reopens() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;
    comment(&host, "bob", "/lgtm").await;
    assert!(host.has_label(LABEL));

    let record = comment(&host, "bob", "/lgtm cancel").await.unwrap();
    assert_eq!(record.opponents, logins(&["bob!"]));
    assert_eq!(record.consentors, logins(&["alice!"]));
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
    assert!(!host.has_label(LABEL));
    assert_eq!(tracking_record(&host).verdict, Verdict::NotLgtm);
}

#[tokio::test]
async fn test_scenario_c_bystander_cancel_changes_nothing_else() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;

    let record = comment(&host, "carol", "/lgtm cancel").await.unwrap();
    assert_eq!(record.opponents, logins(&["carol"]));
    assert_eq!(record.consentors, logins(&["alice!"]));
    assert_eq!(record.pending_directories, dirs(&["b"]));
    assert!(!host.calls().contains(&Op::AddLabel));
    assert!(!host.calls().contains(&Op::RemoveLabel));
}

#[tokio::test]
async fn test_bystander_approval_is_idempotent() {
    let host = scenario_host();
    opened(&host).await;

    let first = comment(&host, "carol", "/lgtm").await.unwrap();
    let second = comment(&host, "carol", "/lgtm").await.unwrap();
    assert_eq!(first.consentors, logins(&["carol"]));
    assert_eq!(first.consentors, second.consentors);
    assert_eq!(first.opponents, second.opponents);
}

#[tokio::test]
async fn test_scenario_d_new_commits_rebuild_record() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;
    host.set_label(LABEL);
    let comment_id = tracking_record(&host).comment_id;

    let record = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Synchronized, "c2"))
        .await
        .unwrap()
        .unwrap();

    assert!(record.consentors.is_empty());
    assert!(record.opponents.is_empty());
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
    assert_eq!(record.tree_hash, TreeHash::from("t2"));
    assert!(!host.has_label(LABEL));

    // Edited in place.
    assert_eq!(host.bot_comments().len(), 1);
    assert!(comment_id.is_some());
    assert_eq!(record.comment_id, comment_id);
    assert_eq!(tracking_record(&host).tree_hash, TreeHash::from("t2"));
}

#[tokio::test]
async fn test_synchronize_without_tree_change_is_a_no_op() {
    let host = scenario_host();
    // A new commit with the same tree, e.g. a rebase with no content change.
    host.set_tree("c1-rebased", "t1");
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;

    let result = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Synchronized, "c1-rebased"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(tracking_record(&host).consentors, logins(&["alice!"]));
}

#[tokio::test]
async fn test_synchronize_tolerates_label_listing_failure() {
    let host = scenario_host();
    opened(&host).await;
    host.set_label(LABEL);
    host.fail(Op::ListLabels);

    let record = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Synchronized, "c2"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.tree_hash, TreeHash::from("t2"));
    assert!(host.calls().contains(&Op::RemoveLabel));
    assert!(!host.has_label(LABEL));
}

#[tokio::test]
async fn test_other_pull_request_actions_are_ignored() {
    let host = scenario_host();
    let result = router_for(&host)
        .handle_pull_request(&pr_event(
            PullRequestAction::Other("labeled".to_string()),
            "c1",
        ))
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_comment_on_new_tree_rebuilds_before_applying() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;

    let record = router_for(&host)
        .handle_note(&note("bob", "/lgtm", "c2"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.consentors, logins(&["bob!"]));
    assert_eq!(record.pending_directories, dirs(&["a"]));
    assert_eq!(record.tree_hash, TreeHash::from("t2"));
    assert_eq!(host.bot_comments().len(), 1);
}

#[tokio::test]
async fn test_bystander_comment_on_new_tree_drops_label() {
    let host = scenario_host();
    ready_with_label(&host).await;

    // New commits land; the comment arrives before the synchronize delivery.
    let record = comment_at(&host, "carol", "/lgtm", "c2").await.unwrap();
    assert_eq!(record.consentors, logins(&["carol"]));
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
    assert!(!host.has_label(LABEL));

    let published = tracking_record(&host);
    assert_eq!(published.tree_hash, TreeHash::from("t2"));
    assert_eq!(published.verdict, Verdict::NotLgtm);

    let result = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Synchronized, "c2"))
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(!host.has_label(LABEL));
    assert_eq!(tracking_record(&host).verdict, Verdict::NotLgtm);
}

#[tokio::test]
async fn test_author_approval_on_new_tree_still_republishes() {
    let host = scenario_host();
    ready_with_label(&host).await;

    let record = comment_at(&host, "dave", "/lgtm", "c2").await.unwrap();
    assert!(record.consentors.is_empty());
    assert!(!host.has_label(LABEL));

    let published = tracking_record(&host);
    assert_eq!(published.tree_hash, TreeHash::from("t2"));
    assert_eq!(published.verdict, Verdict::NotLgtm);
    assert_eq!(published.pending_directories, dirs(&["a", "b"]));

    let rebuke = host.bot_comments().into_iter().last().unwrap();
    assert!(rebuke.body.contains(SELF_APPROVAL_MESSAGE));
}

#[tokio::test]
async fn test_reviewer_commands_on_new_tree_reconcile_label() {
    let host = scenario_host();
    ready_with_label(&host).await;

    let record = comment_at(&host, "alice", "/lgtm", "c2").await.unwrap();
    assert_eq!(record.consentors, logins(&["alice!"]));
    assert_eq!(record.pending_directories, dirs(&["b"]));
    assert!(!host.has_label(LABEL));
    assert_eq!(tracking_record(&host).verdict, Verdict::NotLgtm);

    let host = scenario_host();
    ready_with_label(&host).await;

    let record = comment_at(&host, "bob", "/lgtm cancel", "c2").await.unwrap();
    assert_eq!(record.opponents, logins(&["bob!"]));
    assert!(record.consentors.is_empty());
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
    assert!(!host.has_label(LABEL));
    assert_eq!(tracking_record(&host).tree_hash, TreeHash::from("t2"));
}

#[tokio::test]
async fn test_redelivered_opened_keeps_one_tracking_comment() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;

    let result = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Opened, "c1"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(host.bot_comments().len(), 1);
    assert_eq!(tracking_record(&host).consentors, logins(&["alice!"]));
}

#[tokio::test]
async fn test_opened_reuses_stale_tracking_comment() {
    let host = scenario_host();
    opened(&host).await;
    let comment_id = tracking_record(&host).comment_id;

    let record = router_for(&host)
        .handle_pull_request(&pr_event(PullRequestAction::Opened, "c2"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.comment_id, comment_id);
    assert_eq!(host.bot_comments().len(), 1);
    assert_eq!(tracking_record(&host).tree_hash, TreeHash::from("t2"));
}

#[tokio::test]
async fn test_comment_without_tracking_comment_creates_one() {
    let host = scenario_host();
    host.add_human_comment("erin", "drive-by remark");

    let record = comment(&host, "alice", "/lgtm").await.unwrap();
    assert_eq!(record.pending_directories, dirs(&["b"]));
    assert_eq!(tracking_record(&host).consentors, logins(&["alice!"]));
}

#[tokio::test]
async fn test_author_cannot_approve_own_pr() {
    let host = scenario_host();
    opened(&host).await;
    let before = tracking_record(&host);

    let record = comment(&host, "Dave", "/lgtm").await.unwrap();
    assert!(record.consentors.is_empty());
    assert_eq!(tracking_record(&host), before);

    let replies: Vec<_> = host
        .bot_comments()
        .into_iter()
        .filter(|c| codec::parse(&c.body).is_none())
        .collect();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].body.starts_with("@Dave: "));
    assert!(replies[0].body.contains(SELF_APPROVAL_MESSAGE));
    assert!(replies[0].body.contains("> /lgtm"));

    // The rebuke is newer but is skipped when loading state.
    let record = comment(&host, "alice", "/lgtm").await.unwrap();
    assert_eq!(record.comment_id, before.comment_id);
    assert_eq!(tracking_record(&host).consentors, logins(&["alice!"]));
}

#[tokio::test]
async fn test_author_cancel_resets_everyone() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;
    comment(&host, "carol", "/lgtm cancel").await;

    let record = comment(&host, "dave", "/lgtm cancel").await.unwrap();
    assert!(record.consentors.is_empty());
    assert!(record.opponents.is_empty());
    assert_eq!(record.pending_directories, dirs(&["a", "b"]));
}

#[tokio::test]
async fn test_non_commands_and_foreign_comments_are_ignored() {
    let host = scenario_host();

    assert!(comment(&host, "alice", "nice work").await.is_none());
    assert!(comment(&host, BOT, "/lgtm").await.is_none());

    let mut on_issue = note("alice", "/lgtm", "c1");
    on_issue.noteable_type = NoteableType::Issue;
    assert!(router_for(&host).handle_note(&on_issue).await.unwrap().is_none());

    let mut closed = note("alice", "/lgtm", "c1");
    closed.pr_open = false;
    assert!(router_for(&host).handle_note(&closed).await.unwrap().is_none());

    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_comment_listing_failure_aborts_without_publishing() {
    let host = scenario_host();
    opened(&host).await;
    let before = host.comments();
    host.fail(Op::ListComments);

    let result = router_for(&host)
        .handle_note(&note("alice", "/lgtm", "c1"))
        .await;

    assert!(result.is_err());
    assert_eq!(host.comments(), before);
}

#[tokio::test]
async fn test_ownership_failure_aborts_without_publishing() {
    let host = scenario_host();
    opened(&host).await;
    let before = host.comments();
    host.fail(Op::OwnersFile);

    let result = router_for(&host)
        .handle_note(&note("alice", "/lgtm", "c1"))
        .await;

    assert!(result.is_err());
    assert_eq!(host.comments(), before);
}

#[tokio::test]
async fn test_malformed_owners_file_aborts() {
    let host = scenario_host();
    opened(&host).await;
    host.set_owners_file("b/OWNERS", "approvers: {bob");

    let err = router_for(&host)
        .handle_note(&note("alice", "/lgtm", "c1"))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("b/OWNERS"));
    assert_eq!(tracking_record(&host).consentors, logins(&[]));
}

#[tokio::test]
async fn test_label_listing_failure_aborts_comment_handling() {
    let host = scenario_host();
    opened(&host).await;
    host.fail(Op::ListLabels);

    let result = router_for(&host)
        .handle_note(&note("alice", "/lgtm", "c1"))
        .await;

    assert!(result.is_err());
    assert!(tracking_record(&host).consentors.is_empty());
}

#[tokio::test]
async fn test_label_failures_do_not_fail_the_event() {
    let host = scenario_host();
    opened(&host).await;
    comment(&host, "alice", "/lgtm").await;
    host.fail(Op::AddLabel);

    let record = comment(&host, "bob", "/lgtm").await.unwrap();

    assert!(record.pending_directories.is_empty());
    assert_eq!(tracking_record(&host).verdict, Verdict::Lgtm);
    assert!(!host.has_label(LABEL));
}

#[tokio::test]
async fn test_label_removal_failure_does_not_fail_the_event() {
    let host = scenario_host();
    ready_with_label(&host).await;
    host.fail(Op::RemoveLabel);

    let record = comment(&host, "bob", "/lgtm cancel").await.unwrap();

    assert_eq!(record.opponents, logins(&["bob!"]));
    assert_eq!(tracking_record(&host).verdict, Verdict::NotLgtm);
    assert!(host.has_label(LABEL));
}

#[tokio::test]
async fn test_reply_failure_fails_the_event() {
    let host = scenario_host();
    opened(&host).await;
    host.fail(Op::CreateComment);

    let result = router_for(&host)
        .handle_note(&note("dave", "/lgtm", "c1"))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_publish_failure_fails_the_event() {
    let host = scenario_host();
    opened(&host).await;
    host.fail(Op::UpdateComment);

    let result = router_for(&host)
        .handle_note(&note("alice", "/lgtm", "c1"))
        .await;

    assert!(result.is_err());
    assert!(!host.calls().contains(&Op::AddLabel));
}

#[tokio::test]
async fn test_owners_inheritance_from_root() {
    let host = scenario_host();
    host.set_owners_file("OWNERS", "reviewers:\n- root-reviewer\n");
    opened(&host).await;

    let record = comment(&host, "root-reviewer", "/lgtm").await.unwrap();
    assert_eq!(record.consentors, logins(&["root-reviewer!"]));
    assert!(record.pending_directories.is_empty());
    assert!(host.has_label(LABEL));
}
