use anyhow::Result;
use clap::Parser;
use suffixerator::{Cli, Command};

// --------------------------------------------------
fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// --------------------------------------------------
fn run(args: Cli) -> Result<()> {
    suffixerator::setup(&args)?;

    match &args.command {
        Some(Command::Esa(args)) => {
            suffixerator::esa(args)?;
            Ok(())
        }
        Some(Command::Packed(args)) => {
            suffixerator::packed(args)?;
            Ok(())
        }
        Some(Command::Check(args)) => {
            suffixerator::check(args)?;
            Ok(())
        }
        Some(Command::Firstcodes(args)) => {
            suffixerator::firstcodes(args)?;
            Ok(())
        }
        Some(Command::Summarize(args)) => {
            suffixerator::summarize(args)?;
            Ok(())
        }
        _ => unreachable!(),
    }
}
