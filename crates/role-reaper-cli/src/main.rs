//! Removes the zombie IAM roles a serverless deployment leaves behind.
//!
//! Roles are selected by the deployment prefix (`{service}-{stage}` unless
//! the host context names an API gateway), and each one has its
//! `{stage}-{service}-lambda` inline policy deleted before the role itself
//! is deleted. Run with `-v` (or more) to see what happens under the hood.
//!
//! ```sh
//! remove-iam-roles --service buyte --stage dev
//! remove-iam-roles --service buyte --stage dev --apply
//! serverless print --format json > service.json
//! remove-iam-roles --host-context service.json --apply
//! ```

use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use colored::{Color, Colorize};
use reaper::{
    aws,
    config::{HostContext, Overrides},
    NamingContext, Reaper, Report, Status,
};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the verbosity level
    #[clap(short, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Whether to delete anything. Without it the matching roles are only
    /// printed.
    #[clap(long)]
    apply: bool,

    /// Exit successfully even when some roles could not be removed.
    #[clap(long)]
    tolerate_failures: bool,

    /// A serverless service config (.json or .toml), for example the
    /// output of `serverless print --format json`.
    #[clap(long, env = "REAPER_HOST_CONTEXT")]
    host_context: Option<PathBuf>,

    /// Service name, overrides the host context.
    #[clap(long, env = "REAPER_SERVICE")]
    service: Option<String>,

    /// Deployment stage, overrides the host context.
    #[clap(long, env = "REAPER_STAGE")]
    stage: Option<String>,

    /// AWS region, overrides the host context and the AWS environment.
    #[clap(long, env = "REAPER_REGION")]
    region: Option<String>,

    /// Role name prefix, overrides the derived `{service}-{stage}`.
    #[clap(long, env = "REAPER_PREFIX")]
    prefix: Option<String>,

    /// How many roles to tear down at once.
    #[clap(long, default_value_t = reaper::DEFAULT_CONCURRENCY)]
    concurrency: NonZeroUsize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stream {
    Stdout,
    Stderr,
}

/// One operator-facing line of output.
#[derive(Clone, Debug, PartialEq)]
struct Line {
    stream: Stream,
    text: String,
    color: Option<Color>,
}

impl Line {
    fn out(text: impl Into<String>, color: Option<Color>) -> Self {
        Line {
            stream: Stream::Stdout,
            text: text.into(),
            color,
        }
    }

    fn err(text: impl Into<String>) -> Self {
        Line {
            stream: Stream::Stderr,
            text: text.into(),
            color: Some(Color::Red),
        }
    }

    fn print(&self) {
        let text = match self.color {
            Some(color) => self.text.color(color),
            None => self.text.normal(),
        };
        match self.stream {
            Stream::Stdout => println!("{text}"),
            Stream::Stderr => eprintln!("{text}"),
        }
    }
}

/// Turns a finished run into the lines to print and the exit status.
///
/// Role failures fail the run unless `tolerate_failures` is set.
fn summarize(
    report: &Report,
    apply: bool,
    tolerate_failures: bool,
) -> (Vec<Line>, anyhow::Result<()>) {
    let mut lines = vec![];
    for outcome in &report.outcomes {
        lines.push(match &outcome.status {
            Status::Planned => Line::out(
                format!("Would remove role: {}", outcome.role),
                Some(Color::Cyan),
            ),
            Status::Removed => {
                Line::out(format!("Removed role: {}", outcome.role), Some(Color::Cyan))
            }
            Status::Failed(e) => Line::err(e.to_string()),
        });
    }

    if !apply {
        if !report.outcomes.is_empty() {
            lines.push(Line::out("", None));
            lines.push(Line::out("Please call with `--apply` to delete these roles.", None));
        }
        return (lines, Ok(()));
    }

    if report.is_success() {
        lines.push(Line::out("Successfully removed zombie roles.", Some(Color::Green)));
        return (lines, Ok(()));
    }

    let failed = report.failures().count();
    let attempted = report.attempted();
    if tolerate_failures {
        lines.push(Line::out(
            format!("Finished with {failed} of {attempted} roles not removed, ignoring."),
            Some(Color::Yellow),
        ));
        return (lines, Ok(()));
    }

    lines.push(Line::err(format!("Could not remove {failed} zombie roles.")));
    (lines, Err(reaper::Error::PartialFailure { failed, attempted }.into()))
}

#[::tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        verbosity,
        apply,
        tolerate_failures,
        host_context,
        service,
        stage,
        region,
        prefix,
        concurrency,
    } = Cli::parse();

    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("reaper", level)
        .filter_module("remove_iam_roles", level)
        .init();

    log::info!("apply: {apply}");

    let host = host_context
        .as_deref()
        .map(HostContext::from_path)
        .transpose()?;
    let naming = NamingContext::resolve(
        host.as_ref(),
        &Overrides {
            service,
            stage,
            region,
            prefix,
        },
    )?;
    log::debug!("{naming:#?}");
    println!("Removing IAM roles with prefix: {}", naming.prefix);

    let sdk_cfg = aws::load_sdk_config(naming.region.as_deref()).await;
    let report = Reaper::new(aws::iam::Iam::new(&sdk_cfg), naming)
        .with_concurrency(concurrency)
        .with_apply(apply)
        .run()
        .await?;

    let (lines, status) = summarize(&report, apply, tolerate_failures);
    for line in &lines {
        line.print();
    }
    status
}
