use clap::Parser;

use mi1_shuffle::ShuffleError;

use crate::command::{Mi1Shuffle, ShuffleCommand};

mod command;
mod tint;

fn main() -> Result<(), ShuffleError> {
    let args = Mi1Shuffle::parse();

    env_logger::Builder::new()
        .filter_level(match args.global_args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    args.subcommand.run(args.global_args)
}
