use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct OutputArgs {
    /// Print JSON instead of text
    #[clap(long, default_value = "false")]
    pub json: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PairArgs {
    /// First url
    pub url1: String,

    /// Second url
    pub url2: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare two urls and store the score.
    /// Missing urls are asked for interactively.
    Compare {
        /// First url
        url1: Option<String>,

        /// Second url
        url2: Option<String>,

        /// Print per-channel scores
        #[clap(short, long, default_value = "false")]
        details: bool,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Show the stored score of a pair
    Show {
        #[clap(flatten)]
        pair: PairArgs,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// List every stored score
    List {
        #[clap(flatten)]
        output: OutputArgs,
    },

    /// Mark stored scores stale so the next comparison overwrites them
    Stale {
        /// First url
        #[clap(required_unless_present = "all")]
        url1: Option<String>,

        /// Second url
        #[clap(required_unless_present = "all")]
        url2: Option<String>,

        /// Mark every stored score stale
        #[clap(long, default_value = "false", conflicts_with_all = ["url1", "url2"])]
        all: bool,
    },
}
