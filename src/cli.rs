use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "partwatch")]
#[command(about = "Watch an inbox for complete 1/2/3 message sets and alert once per set", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output the command report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one poll cycle, or keep polling with --daemon
    Watch {
        /// Run a single cycle and exit (default)
        #[arg(long)]
        once: bool,

        /// Poll forever at the configured interval
        #[arg(long)]
        daemon: bool,
    },

    /// Show paths, configuration and tracked subjects
    Status,

    /// Show how a subject line is split into base and part
    Parse {
        /// Raw subject line
        subject: String,
    },

    /// Stop a running daemon
    Stop,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_plain());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Watch { once, daemon } => {
            commands::watch::run(&commands::watch::WatchOptions { once, daemon })?
        }
        Commands::Status => commands::status::run()?,
        Commands::Parse { subject } => commands::parse::run(&subject),
        Commands::Stop => commands::stop::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
