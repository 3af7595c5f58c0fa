//! Review consensus as a pure state machine.
//!
//! - **Record**: what the tracking comment says (`ConsensusRecord`)
//! - **Command**: what a commenter asked for (`ConsensusCommand`)
//! - **Effects**: what to do on GitHub (`Effect`)
//! - **Transition**: `(Record, Command, Context) -> (Record, Vec<Effect>)`
//!
//! The publisher in the server crate executes the effects.

pub mod effect;
pub mod transition;

pub use effect::*;
pub use transition::*;
