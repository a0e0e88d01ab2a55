// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI entry point for the message box simulator.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use msgbox::MailboxConfig;
use msgbox_sim::{scenario, stderr_sink, Kernel, SimError, SimResult};

#[derive(Parser, Debug)]
#[command(name = "msgbox-sim", version, about = "Drive the msgbox syscalls from simulated tasks")]
struct Cli {
    /// Kernel heap bytes the mailbox may charge (nodes plus payloads).
    #[arg(long, global = true)]
    heap_limit: Option<usize>,
    /// Forward kernel diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Put two greetings and read them back.
    Demo,
    /// Put each argument, then retrieve until the mailbox is empty.
    Drain {
        messages: Vec<String>,
    },
    /// Two producers against one consumer; fails unless the tally drains to zero.
    Stress {
        #[arg(long, default_value_t = 10_000)]
        count: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("msgbox-sim: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> SimResult<()> {
    if cli.verbose {
        msgbox::diag::log::set_sink(stderr_sink);
    }
    let config = match cli.heap_limit {
        Some(limit) => MailboxConfig::with_heap_limit(limit),
        None => MailboxConfig::default(),
    };
    let kernel = Kernel::new(config);

    match cli.command {
        Command::Demo => {
            for line in scenario::demo(&kernel)? {
                println!("{line}");
            }
        }
        Command::Drain { messages } => {
            for line in scenario::drain(&kernel, &messages)? {
                println!("{line}");
            }
        }
        Command::Stress { count } => {
            let report = scenario::stress(&kernel, count)?;
            println!(
                "received {} tokens and {} pills, tally {}",
                report.received, report.pills, report.tally
            );
            if report.tally != 0 {
                return Err(SimError::Imbalance { tally: report.tally });
            }
        }
    }

    // Reaches stderr only when -v installed the sink.
    let stats = kernel.mailbox().stats();
    msgbox::log_info!(
        target: "msgbox-sim",
        "submitted={} retrieved={} depth={} heap_used={} lock_contended={} long_holds={}",
        stats.submitted,
        stats.retrieved,
        stats.depth,
        stats.heap_used,
        stats.lock.contended,
        stats.lock.long_holds
    );
    Ok(())
}
