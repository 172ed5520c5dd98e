use clap::{Parser, Subcommand};

use mi1_shuffle::ShuffleError;

use crate::command::global_args::GlobalArgs;

mod dump;
mod global_args;
mod patch;

pub trait ShuffleCommand {
    fn run(self, global_args: GlobalArgs) -> Result<(), ShuffleError>;
}

#[derive(Parser, Debug)]
#[clap(about = "Secret of Monkey Island (EGA) randomiser", version)]
pub struct Mi1Shuffle {
    #[clap(flatten)]
    pub global_args: GlobalArgs,
    /// Thing to do.
    #[clap(subcommand)]
    pub subcommand: MSCommand,
}

#[derive(Subcommand, Debug)]
pub enum MSCommand {
    Patch(patch::Patch),
    Dump(dump::Dump),
}

impl ShuffleCommand for MSCommand {
    fn run(self, global_args: GlobalArgs) -> Result<(), ShuffleError> {
        match self {
            MSCommand::Patch(v) => v.run(global_args),
            MSCommand::Dump(v) => v.run(global_args),
        }
    }
}
