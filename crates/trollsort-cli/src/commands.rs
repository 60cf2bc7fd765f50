use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use trollsort_core::CollisionPolicy;

#[derive(Debug, Parser)]
#[command(name = "trollsort")]
#[command(about = "Sort photos and videos into dated folders without losing a byte", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy media from a source tree into dated folders under the destination
    Sort {
        /// Destination root
        #[arg(long)]
        dest: PathBuf,
        /// Source tree (defaults to the current directory)
        #[arg(long)]
        src: Option<PathBuf>,
        /// Extra folder level between the destination root and the dated folders
        #[arg(long)]
        top_folder: Option<String>,
        /// What to do when a different file already sits at a target path
        #[arg(long, value_enum)]
        collision_policy: Option<PolicyArg>,
    },
    /// Hash the destination tree and report duplicates already in it
    Index {
        /// Destination root
        #[arg(long)]
        dest: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Skip,
    Rename,
    Conflicts,
}

impl From<PolicyArg> for CollisionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => CollisionPolicy::Skip,
            PolicyArg::Rename => CollisionPolicy::Rename,
            PolicyArg::Conflicts => CollisionPolicy::Conflicts,
        }
    }
}
