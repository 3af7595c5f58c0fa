//! Tracking-comment codec.
//!
//! The consensus record lives in exactly one bot comment on the PR. This
//! module renders a record into that comment and recovers it again. The
//! rendered text is also what humans read, so the shape is fixed: anything
//! that does not match it exactly is treated as "no state" rather than an
//! error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::record::{ConsensusRecord, Login, TreeHash, Verdict};

const LGTM_PHRASE: &str = "**LGTM**";
const NOT_LGTM_PHRASE: &str = "**NOT LGTM**";
const NAME_SEPARATOR: &str = ", ";
const DIRECTORY_SEPARATOR: &str = "\n- ";

static TRACKING_COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^LGTM NOTIFIER: This PR is (\*\*LGTM\*\*|\*\*NOT LGTM\*\*)\.",
        r"\n\nReviewers added `/lgtm` are: (.*)\.",
        r"\n\nReviewers added `/lgtm cancel` are: (.*)\.",
        r"\n\nIt still needs review for the codes in each of these directoris:((?:\n- [^\n]*)*)",
        r"\n<details>Git tree hash: ([^<\s]+)</details>$",
    ))
    .expect("tracking comment regex is valid")
});

/// Render a record into the body of its tracking comment.
pub fn serialize(record: &ConsensusRecord) -> String {
    let verdict = match record.verdict {
        Verdict::Lgtm => LGTM_PHRASE,
        Verdict::NotLgtm => NOT_LGTM_PHRASE,
    };

    let directories = if record.pending_directories.is_empty() {
        String::new()
    } else {
        let joined: Vec<&str> = record
            .pending_directories
            .iter()
            .map(String::as_str)
            .collect();
        format!("{}{}", DIRECTORY_SEPARATOR, joined.join(DIRECTORY_SEPARATOR))
    };

    format!(
        "LGTM NOTIFIER: This PR is {}.\n\n\
         Reviewers added `/lgtm` are: {}.\n\n\
         Reviewers added `/lgtm cancel` are: {}.\n\n\
         It still needs review for the codes in each of these directoris:{}\n\
         <details>Git tree hash: {}</details>",
        verdict,
        names_to_text(&record.consentors),
        names_to_text(&record.opponents),
        directories,
        record.tree_hash,
    )
}

/// Recover a record from a comment body.
///
/// Returns `None` for any text that is not a tracking comment. The returned
/// record has no comment ID; the caller knows which comment it read.
pub fn parse(text: &str) -> Option<ConsensusRecord> {
    let captures = TRACKING_COMMENT_REGEX.captures(text.trim())?;

    let verdict = if &captures[1] == LGTM_PHRASE {
        Verdict::Lgtm
    } else {
        Verdict::NotLgtm
    };

    let pending_directories: BTreeSet<String> = captures[4]
        .split(DIRECTORY_SEPARATOR)
        .filter(|dir| !dir.is_empty())
        .map(str::to_string)
        .collect();

    Some(ConsensusRecord {
        consentors: text_to_names(&captures[2]),
        opponents: text_to_names(&captures[3]),
        pending_directories,
        tree_hash: TreeHash::from(&captures[5]),
        comment_id: None,
        verdict,
    })
}

/// Whether a parsed record is still authoritative for the current head tree.
pub fn is_current(record: &ConsensusRecord, current: &TreeHash) -> bool {
    record.tree_hash == *current
}

fn names_to_text(names: &BTreeMap<Login, bool>) -> String {
    names
        .iter()
        .map(|(login, &is_reviewer)| {
            if is_reviewer {
                format!("**{}**", login)
            } else {
                login.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}

fn text_to_names(text: &str) -> BTreeMap<Login, bool> {
    if text.is_empty() {
        return BTreeMap::new();
    }

    text.split(NAME_SEPARATOR)
        .filter(|item| !item.is_empty())
        .map(|item| {
            match item
                .strip_prefix("**")
                .and_then(|rest| rest.strip_suffix("**"))
            {
                Some(name) => (Login::new(name), true),
                None => (Login::new(item), false),
            }
        })
        .collect()
}
