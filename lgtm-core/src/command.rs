/// Command parsing for `/lgtm` slash commands in PR comments
use std::fmt;

/// A review-consensus command found in a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusCommand {
    /// `/lgtm`: the commenter consents to the change
    Approve,
    /// `/lgtm cancel`: the commenter withdraws consent or objects
    Cancel,
}

impl fmt::Display for ConsensusCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusCommand::Approve => write!(f, "/lgtm"),
            ConsensusCommand::Cancel => write!(f, "/lgtm cancel"),
        }
    }
}

/// Knobs that widen the recognized command surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Treat `/approve` as `/lgtm`.
    pub approve_acts_as_lgtm: bool,
}

/// Parse a comment body for a consensus command.
///
/// A command occupies a whole line: after trimming, the line starts with `/`,
/// then the command word, then optional arguments. Command words and
/// arguments are case-insensitive.
///
/// - `/lgtm` and `/lgtm no-issue` approve
/// - `/lgtm cancel` cancels
/// - `/approve` (and `/approve no-issue`) approve when
///   [`CommandOptions::approve_acts_as_lgtm`] is set
///
/// If the comment contains both an approving line and a cancelling line, the
/// approval wins. Anything else on a slash line (`/lgtm please`, `/lgtmx`)
/// is not a command.
pub fn parse_comment(body: &str, options: CommandOptions) -> Option<ConsensusCommand> {
    let mut found = None;

    for line in body.lines() {
        let Some(rest) = line.trim().strip_prefix('/') else {
            continue;
        };

        let (word, args) = match rest.split_once(|c: char| c.is_whitespace()) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };

        let is_lgtm = word.eq_ignore_ascii_case("lgtm");
        let is_approve = options.approve_acts_as_lgtm && word.eq_ignore_ascii_case("approve");

        if (is_lgtm || is_approve) && (args.is_empty() || args.eq_ignore_ascii_case("no-issue"))
        {
            return Some(ConsensusCommand::Approve);
        }

        if is_lgtm && args.eq_ignore_ascii_case("cancel") {
            found = Some(ConsensusCommand::Cancel);
        }
    }

    found
}
