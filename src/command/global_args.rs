use clap::Args;

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Verbosity level, repeat to increase.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}
