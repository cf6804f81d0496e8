// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::Parser;
use logflume::config::{self, LogLevel};
use logflume::{flume, logging, pidfile};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "logflume", version)]
#[command(about = "Tails a log source, parses records into structured events \
                   and streams them to a collector as newline-delimited JSON")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', value_name = "FILE", default_value = "/etc/logflume.conf")]
    config: PathBuf,
    /// Raise verbosity to debug
    #[arg(short = 'd')]
    debug: bool,
    /// Run in the foreground
    #[arg(short = 'f')]
    foreground: bool,
    /// Diagnostics destination: empty for stderr, "syslog:" for the system
    /// log, anything else names a file to append to
    #[arg(short = 'l', value_name = "LOGSPEC")]
    logspec: Option<String>,
    /// PID file path
    #[arg(short = 'p', value_name = "FILE", default_value = "/var/run/logflume.pid")]
    pidfile: PathBuf,
    /// Raise verbosity to verbose
    #[arg(short = 'v')]
    verbose: bool,
}

/// Flags only ever lower the threshold below what the configuration set.
fn effective_level(cli: &Cli, configured: Option<LogLevel>) -> LogLevel {
    let mut level = configured.unwrap_or(LogLevel::Notice);
    if cli.verbose && level > LogLevel::Verbose {
        level = LogLevel::Verbose;
    }
    if cli.debug && level > LogLevel::Debug {
        level = LogLevel::Debug;
    }
    level
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(&cli.config)?;
    let level = effective_level(&cli, config.log_level);

    let mut pidfile = None;
    if !cli.foreground {
        let mut pf = pidfile::PidFile::open(&cli.pidfile)?;
        nix::unistd::daemon(false, false).context("unable to daemonize")?;
        pf.write_pid()
            .with_context(|| format!("writing {}", cli.pidfile.display()))?;
        pidfile = Some(pf);
    }

    let logspec = cli
        .logspec
        .clone()
        .or_else(|| (!cli.foreground).then(|| "syslog:".to_owned()));
    logging::init("logflume", logspec.as_deref(), level)?;

    let result = flume::run(config.flume);
    if let Some(pf) = pidfile {
        pf.remove();
    }
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("logflume: {e:#}");
            ExitCode::FAILURE
        }
    }
}
