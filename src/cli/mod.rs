pub mod args;

use clap::Parser;

pub use args::{Arguments, PipelineKind};

pub fn parse() -> Arguments {
    Arguments::parse()
}
