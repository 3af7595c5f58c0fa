pub mod codec;
pub mod command;
pub mod consensus;
pub mod owners;
pub mod ownership;
pub mod record;
pub mod response;

pub use command::{parse_comment, CommandOptions, ConsensusCommand};
pub use consensus::{
    transition, ActorRole, Effect, LogLevel, TransitionContext, TransitionResult,
    SELF_APPROVAL_MESSAGE,
};
pub use owners::{OwnersFile, RepoOwners, OWNERS_FILE_NAME};
pub use ownership::OwnershipMapping;
pub use record::*;
pub use response::format_reply;
