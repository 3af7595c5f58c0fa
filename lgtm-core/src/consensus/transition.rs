//! Pure consensus transition function.
//!
//! `transition` takes the current record, a command and who issued it, and
//! returns the updated record plus the effects needed to publish it. It has
//! no side effects and never fails.

use super::effect::{reconcile_label, Effect, LogLevel};
use crate::command::ConsensusCommand;
use crate::ownership::OwnershipMapping;
use crate::record::{ConsensusRecord, Login, Verdict};

/// Reply sent when the PR author tries to approve their own change.
pub const SELF_APPROVAL_MESSAGE: &str = "you cannot LGTM your own PR.";

/// How the commenter relates to the pull request.
///
/// The author check comes first: an author who also owns changed files is
/// still the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Author,
    Reviewer,
    Bystander,
}

impl ActorRole {
    pub fn classify(actor: &Login, pr_author: &Login, ownership: &OwnershipMapping) -> Self {
        if actor == pr_author {
            ActorRole::Author
        } else if ownership.is_valid_reviewer(actor) {
            ActorRole::Reviewer
        } else {
            ActorRole::Bystander
        }
    }
}

/// Everything about the event a transition needs besides the record.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub actor: &'a Login,
    pub pr_author: &'a Login,
    pub ownership: &'a OwnershipMapping,
    /// Whether the ready label is on the PR right now.
    pub label_present: bool,
    /// The record was rebuilt because the head tree moved since it was last
    /// published. Any label on the PR belongs to the old tree.
    pub tree_changed: bool,
}

/// Result of a consensus transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// The record after the transition.
    pub record: ConsensusRecord,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(record: ConsensusRecord, effects: Vec<Effect>) -> Self {
        Self { record, effects }
    }

    /// Whether executing the effects writes the tracking comment.
    pub fn publishes(&self) -> bool {
        self.effects.contains(&Effect::PublishRecord)
    }
}

/// Apply a command to the record.
pub fn transition(
    record: ConsensusRecord,
    command: ConsensusCommand,
    ctx: TransitionContext<'_>,
) -> TransitionResult {
    let role = ActorRole::classify(ctx.actor, ctx.pr_author, ctx.ownership);

    match (role, command) {
        (ActorRole::Author, ConsensusCommand::Approve) => reject_self_approval(record, ctx),
        (_, ConsensusCommand::Approve) if record.is_consentor(ctx.actor) => {
            TransitionResult::new(
                record,
                vec![Effect::log(
                    LogLevel::Debug,
                    format!("{} already consents; nothing to do", ctx.actor),
                )],
            )
        }
        (ActorRole::Reviewer, ConsensusCommand::Approve) => reviewer_approves(record, ctx),
        (ActorRole::Bystander, ConsensusCommand::Approve) => bystander_votes(record, command, ctx),
        (ActorRole::Bystander, ConsensusCommand::Cancel) => bystander_votes(record, command, ctx),
        (ActorRole::Author, ConsensusCommand::Cancel) => author_cancels(record, ctx),
        (ActorRole::Reviewer, ConsensusCommand::Cancel) => reviewer_cancels(record, ctx),
    }
}

/// A freshly built record for a newly opened PR: publish it, nothing else.
pub fn pull_request_opened(record: ConsensusRecord) -> TransitionResult {
    TransitionResult::new(record, vec![Effect::PublishRecord])
}

/// New commits invalidated every vote: publish the rebuilt record and drop
/// the label if it was on.
pub fn tree_changed(record: ConsensusRecord, label_present: bool) -> TransitionResult {
    TransitionResult::new(record, publish_and_drop_label(label_present))
}

fn publish_and_drop_label(label_present: bool) -> Vec<Effect> {
    let mut effects = vec![Effect::PublishRecord];
    if label_present {
        effects.push(Effect::RemoveLabel);
    }
    effects
}

/// The record is left alone, unless it was just rebuilt: then it still has to
/// be published for the new tree so the old label comes off.
fn reject_self_approval(record: ConsensusRecord, ctx: TransitionContext<'_>) -> TransitionResult {
    let mut effects = vec![
        Effect::log(
            LogLevel::Info,
            format!("Rejected self-approval by {}", ctx.actor),
        ),
        Effect::Reply {
            message: SELF_APPROVAL_MESSAGE.to_string(),
        },
    ];
    if ctx.tree_changed {
        effects.extend(publish_and_drop_label(ctx.label_present));
    }
    TransitionResult::new(record, effects)
}

fn reviewer_approves(mut record: ConsensusRecord, ctx: TransitionContext<'_>) -> TransitionResult {
    record.add_consentor(ctx.actor.clone(), true);
    record.pending_directories = ctx
        .ownership
        .pending_directories(&record.consenting_reviewers());

    let ready = record.is_ready();
    record.verdict = Verdict::from_ready(ready);

    let mut effects = vec![Effect::PublishRecord];
    effects.extend(reconcile_label(ready, ctx.label_present));
    TransitionResult::new(record, effects)
}

/// A bystander's vote is recorded but changes nothing else: the headline
/// keeps reporting whatever the label currently says. On a rebuilt record the
/// label is stale, so it is dropped and the headline reads NOT LGTM.
fn bystander_votes(
    mut record: ConsensusRecord,
    command: ConsensusCommand,
    ctx: TransitionContext<'_>,
) -> TransitionResult {
    match command {
        ConsensusCommand::Approve => record.add_consentor(ctx.actor.clone(), false),
        ConsensusCommand::Cancel => record.add_opponent(ctx.actor.clone(), false),
    }

    if ctx.tree_changed {
        record.verdict = Verdict::NotLgtm;
        let effects = publish_and_drop_label(ctx.label_present);
        return TransitionResult::new(record, effects);
    }

    record.verdict = Verdict::from_ready(ctx.label_present);
    TransitionResult::new(record, vec![Effect::PublishRecord])
}

/// The author withdrawing restarts review from scratch on the same tree.
fn author_cancels(mut record: ConsensusRecord, ctx: TransitionContext<'_>) -> TransitionResult {
    record.reset_sides();
    reopen(record, ctx)
}

fn reviewer_cancels(mut record: ConsensusRecord, ctx: TransitionContext<'_>) -> TransitionResult {
    record.add_opponent(ctx.actor.clone(), true);
    reopen(record, ctx)
}

fn reopen(mut record: ConsensusRecord, ctx: TransitionContext<'_>) -> TransitionResult {
    record.pending_directories = ctx.ownership.all_directories();
    record.verdict = Verdict::NotLgtm;
    TransitionResult::new(record, publish_and_drop_label(ctx.label_present))
}
