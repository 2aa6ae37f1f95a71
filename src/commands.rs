//! `translate`, `run` and `status` subcommands.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::config::{CliSettings, Config};
use crate::error::CliError;
use crate::model::job::SyncJob;
use crate::model::report::SyncReport;
use crate::output::Output;
use crate::services::ai::ChatClient;
use crate::services::pipeline::{self, Action, PlanItem};

#[derive(Serialize)]
struct JobResult<'a> {
    #[serde(flatten)]
    job: &'a SyncJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JobPlan<'a> {
    #[serde(flatten)]
    job: &'a SyncJob,
    items: Vec<PlanItem>,
}

/// Options shared by the commands that talk to the provider.
#[derive(Args)]
pub struct ProviderArgs {
    /// Path to configuration file (default: auto-discover docsync.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider name, skipping the API key scan (moonshot, deepseek, openai).
    #[arg(long, env = "DOCSYNC_PROVIDER")]
    provider: Option<String>,

    /// Model name (overrides config and the provider default).
    #[arg(long)]
    model: Option<String>,

    /// Log per-file progress at debug level only.
    #[arg(short, long)]
    quiet: bool,

    /// Echo translated text to the terminal as it streams in.
    #[arg(long)]
    echo: bool,
}

impl ProviderArgs {
    fn load(&self, extensions: Option<Vec<String>>) -> Result<Config, CliError> {
        let settings = CliSettings {
            provider: self.provider.clone(),
            model: self.model.clone(),
            extensions,
            verbose: self.quiet.then_some(false),
        };
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }
}

/// Arguments for `docsync translate`.
#[derive(Args)]
pub struct TranslateArgs {
    /// Source tree in the base language.
    source: PathBuf,

    /// Target tree to create or update.
    target: PathBuf,

    /// Target language as the provider should see it, e.g. "Français".
    language: String,

    /// Extension to translate; repeat for several (default: .md .mdx).
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    #[command(flatten)]
    provider: ProviderArgs,
}

impl TranslateArgs {
    pub fn execute(self, output: &Output) -> Result<(), CliError> {
        let extensions = (!self.extensions.is_empty()).then_some(self.extensions);
        let config = self.provider.load(extensions)?;
        let provider = config.resolve_provider()?;
        tracing::info!(provider = %provider.name, model = %provider.model, "provider resolved");

        let client = ChatClient::new(&provider)?;
        let client = if self.provider.echo {
            client.with_echo(|chunk| output.fragment(chunk))
        } else {
            client
        };

        let job = SyncJob::new(self.source, self.target, self.language);
        print_start(output, &job);
        let report = pipeline::run(&job, &config.options, &client)?;
        print_summary(output, &report);

        if report.is_clean() {
            Ok(())
        } else {
            Err(CliError::Incomplete {
                failed: report.failed,
                aborted: 0,
            })
        }
    }
}

/// Arguments for `docsync run`.
#[derive(Args)]
pub struct RunArgs {
    /// Only run jobs for this language label or target directory name.
    #[arg(long = "only", value_name = "LANGUAGE")]
    only: Vec<String>,

    /// Print per-job reports as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    provider: ProviderArgs,
}

impl RunArgs {
    pub fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.provider.load(None)?;
        let jobs = select_jobs(config.jobs(), &self.only)?;
        let provider = config.resolve_provider()?;
        tracing::info!(provider = %provider.name, model = %provider.model, "provider resolved");

        let client = ChatClient::new(&provider)?;
        let client = if self.provider.echo {
            client.with_echo(|chunk| output.fragment(chunk))
        } else {
            client
        };

        let results = pipeline::run_jobs(&jobs, &config.options, &client);

        if self.json {
            let view: Vec<JobResult<'_>> = results
                .iter()
                .map(|(job, result)| JobResult {
                    job,
                    report: result.as_ref().ok(),
                    error: result.as_ref().err().map(ToString::to_string),
                })
                .collect();
            print_json(&view)?;
        }

        let mut failed = 0;
        let mut aborted = 0;
        for (job, result) in &results {
            print_start(output, job);
            match result {
                Ok(report) => {
                    failed += report.failed;
                    print_summary(output, report);
                }
                Err(err) => {
                    aborted += 1;
                    output.error(&format!("Skipped {}: {err}", job.language));
                }
            }
        }

        if failed == 0 && aborted == 0 {
            Ok(())
        } else {
            Err(CliError::Incomplete { failed, aborted })
        }
    }
}

/// Arguments for `docsync status`.
#[derive(Args)]
pub struct StatusArgs {
    /// Path to configuration file (default: auto-discover docsync.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only check jobs for this language label or target directory name.
    #[arg(long = "only", value_name = "LANGUAGE")]
    only: Vec<String>,

    /// Print every planned action as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl StatusArgs {
    pub fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = Config::load(self.config.as_deref(), None)?;
        let jobs = select_jobs(config.jobs(), &self.only)?;

        let mut stale = 0;
        let mut unreadable = 0;
        let mut aborted = 0;
        let mut plans = Vec::new();
        for job in &jobs {
            let items = match pipeline::plan(job, &config.options) {
                Ok(items) => items,
                Err(err) => {
                    aborted += 1;
                    output.error(&format!("{}: {err}", job.language));
                    continue;
                }
            };

            let count = |action: Action| items.iter().filter(|i| i.action == action).count();
            let pending = count(Action::Translate);
            let broken = count(Action::Unreadable);

            output.highlight(&format!(
                "{} ({}): {} up to date, {} stale, {} unreadable",
                job.language,
                job.target.display(),
                count(Action::Skip),
                pending,
                broken
            ));
            for item in &items {
                match item.action {
                    Action::Translate => output.info(&format!("  {}", item.path)),
                    Action::Unreadable => output.error(&format!("  {} (unreadable)", item.path)),
                    Action::Copy | Action::Skip => {}
                }
            }
            stale += pending;
            unreadable += broken;
            plans.push(JobPlan { job, items });
        }

        if self.json {
            print_json(&plans)?;
        }

        status_result(stale, unreadable, aborted)?;
        output.success("All translations are up to date.");
        Ok(())
    }
}

/// `status` passes only when every file was checked and none is stale.
fn status_result(stale: usize, unreadable: usize, aborted: usize) -> Result<(), CliError> {
    if stale > 0 {
        Err(CliError::Stale(stale))
    } else if unreadable > 0 || aborted > 0 {
        Err(CliError::Unchecked { unreadable, aborted })
    } else {
        Ok(())
    }
}

/// Keep jobs whose language label or target directory name is in `only`.
fn select_jobs(jobs: Vec<SyncJob>, only: &[String]) -> Result<Vec<SyncJob>, CliError> {
    if only.is_empty() {
        return Ok(jobs);
    }

    let selected: Vec<SyncJob> = jobs
        .into_iter()
        .filter(|job| {
            let dir = job
                .target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            only.iter()
                .any(|o| o.eq_ignore_ascii_case(&job.language) || o.eq_ignore_ascii_case(&dir))
        })
        .collect();

    if selected.is_empty() {
        return Err(CliError::NoJobs(only.join(", ")));
    }
    Ok(selected)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_start(output: &Output, job: &SyncJob) {
    output.highlight(&format!(
        "{} -> {} ({})",
        job.source.display(),
        job.target.display(),
        job.language
    ));
    output.separator();
}

fn print_summary(output: &Output, report: &SyncReport) {
    output.separator();
    let headline = format!("Done in {:.2}s", report.elapsed.as_secs_f64());
    if report.is_clean() {
        output.success(&headline);
    } else {
        output.warning(&headline);
    }
    output.info(&format!("Total files: {}", report.total));
    output.info(&format!("- skipped (hash match): {}", report.skipped));
    output.info(&format!("- translated: {}", report.translated));
    output.info(&format!("- copied: {}", report.copied));
    output.info(&format!("- failed: {}", report.failed));
    for failure in &report.failures {
        output.error(&format!("  {}: {}", failure.path, failure.error));
    }
}
