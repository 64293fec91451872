//! Matomo Ops CLI
//!
//! The `matomo-ops` command operates a Matomo-on-AWS deployment made of the
//! `{project}-networking`, `{project}-database` and `{project}-compute`
//! CDK stacks.
//!
//! ## Commands
//!
//! - `destroy`: staged teardown of every stack plus local cleanup
//! - `status`: project settings, stack status and key outputs
//! - `validate`: probe the site (optionally waiting) and inspect install files
//! - `health`: availability, installation and database checks
//!
//! Exit codes: 0 success or cancelled, 1 unresolved failure, 2 precondition
//! failure (missing tools, credentials or project configuration).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matomo_ops_aws::{AwsCliProvider, AwsConfig};
use matomo_ops_core::{
    project_stacks, validate_project_name, CheckLevel, CheckLine, CheckSummary, ConfigError,
    ProjectConfig, ProviderError, StackProvider, StackRole, StdinConfirm, TeardownConfig,
    TeardownError, TeardownSequencer,
};
use matomo_ops_probe::{
    check_health, classify, load_install_log, validate_url, wait_for_site, Fetch, HttpFetcher,
    PollSettings, StatusMarker,
};
use tracing::{info, Level};

/// Outputs shown by `status`.
const STATUS_OUTPUTS: &[&str] = &[
    "VpcId",
    "InstanceId",
    "PublicIp",
    "MatomoUrl",
    "DatabaseEndpoint",
];

#[derive(Parser)]
#[command(name = "matomo-ops")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate Matomo analytics deployments on AWS", long_about = None)]
struct Cli {
    /// Directory of the CDK app (holds cdk.json)
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Project name (overrides context.matomo.projectName in cdk.json)
    #[arg(long, global = true)]
    project: Option<String>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS credentials profile
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Destroy every stack of the project and remove local artifacts
    Destroy {
        /// Skip the DELETE confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show project settings and stack status
    Status,

    /// Check that the Matomo site is up
    Validate {
        /// Site URL (default: MatomoUrl output of the compute stack)
        #[arg(long)]
        url: Option<String>,

        /// Keep probing until the site stops failing or the timeout passes
        #[arg(long)]
        wait: bool,

        /// Wait timeout in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        /// Seconds between probes while waiting
        #[arg(long, default_value = "15")]
        interval: u64,

        /// Local copy of the install status marker
        #[arg(long)]
        marker: Option<PathBuf>,

        /// Local copy of the install log
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Run availability, installation and database health checks
    Health {
        /// Site URL (default: MatomoUrl output of the compute stack)
        #[arg(long)]
        url: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    matomo_ops_core::init_tracing(cli.log_json, level);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let project = resolve_project(&cli.project_dir, cli.project.as_deref())?;
    let aws = AwsConfig::new(&cli.project_dir)
        .with_region(cli.region.clone())
        .with_profile(cli.profile.clone());

    match cli.command {
        Commands::Destroy { force } => cmd_destroy(&project, &cli.project_dir, aws, force).await,
        Commands::Status => cmd_status(&project, &AwsCliProvider::new(aws)).await,
        Commands::Validate {
            url,
            wait,
            timeout,
            interval,
            marker,
            log,
        } => {
            let settings = PollSettings::new(
                Duration::from_secs(timeout),
                Duration::from_secs(interval),
            );
            let provider = AwsCliProvider::new(aws);
            let url = site_url(&provider, &project.project_name, url).await?;
            let fetcher = HttpFetcher::new(HttpFetcher::DEFAULT_TIMEOUT)?;
            cmd_validate(
                &fetcher,
                &url,
                wait.then_some(settings),
                marker.as_deref(),
                log.as_deref(),
            )
            .await
        }
        Commands::Health { url, json } => {
            let provider = AwsCliProvider::new(aws);
            let url = site_url(&provider, &project.project_name, url).await?;
            let fetcher = HttpFetcher::new(HttpFetcher::DEFAULT_TIMEOUT)?;
            cmd_health(&fetcher, &url, json).await
        }
    }
}

/// Project settings from `cdk.json`, or just the name when `--project` is given.
fn resolve_project(project_dir: &Path, name: Option<&str>) -> Result<ProjectConfig> {
    match name {
        Some(name) => {
            validate_project_name(name)?;
            let mut config = match ProjectConfig::load(project_dir) {
                Ok(config) => config,
                Err(ConfigError::NotFound(_)) => ProjectConfig::default(),
                Err(err) => return Err(err.into()),
            };
            config.project_name = name.to_string();
            Ok(config)
        }
        None => ProjectConfig::load(project_dir).with_context(|| {
            format!(
                "Failed to load project settings from {}",
                project_dir.display()
            )
        }),
    }
}

/// Map an error to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let precondition = err.chain().any(|cause| {
        if let Some(teardown) = cause.downcast_ref::<TeardownError>() {
            return matches!(
                teardown,
                TeardownError::Precondition(_) | TeardownError::Config(_)
            );
        }
        if let Some(provider) = cause.downcast_ref::<ProviderError>() {
            return provider.is_precondition();
        }
        cause.downcast_ref::<ConfigError>().is_some()
    });
    if precondition {
        2
    } else {
        1
    }
}

fn print_lines(lines: &[CheckLine]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_summary(lines: &[CheckLine]) -> CheckSummary {
    let summary = CheckSummary::from_lines(lines);
    println!();
    println!("Summary: {}", summary);
    summary
}

async fn cmd_destroy(
    project: &ProjectConfig,
    project_dir: &Path,
    aws: AwsConfig,
    force: bool,
) -> Result<u8> {
    let provider = AwsCliProvider::new(aws);
    let confirm = StdinConfirm::new();
    let config = TeardownConfig::new(project.project_name.as_str(), project_dir).with_force(force);

    let report = TeardownSequencer::new(&provider, &confirm, config)
        .run()
        .await
        .context("Teardown could not start")?;

    println!();
    println!("Teardown of '{}' (run {})", report.project, report.run_id);
    print_lines(&report.lines);
    print_summary(&report.lines);

    if report.cancelled {
        println!("Cancelled; nothing was destroyed.");
    } else if !report.remaining.is_empty() {
        println!("Remaining stacks: {}", report.remaining.join(", "));
        if let Some(diagnostics) = &report.diagnostics {
            let ids: Vec<&str> = diagnostics.ids().collect();
            if !ids.is_empty() {
                println!("Lingering resources: {}", ids.join(", "));
            }
        }
    }

    Ok(report.exit_code())
}

async fn cmd_status(project: &ProjectConfig, provider: &dyn StackProvider) -> Result<u8> {
    println!("Project:   {}", project.project_name);
    println!("Instance:  {}", project.instance_type);
    println!(
        "Database:  {}",
        if project.enable_database {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("VPC CIDR:  {}", project.networking.vpc_cidr);
    println!();

    for stack in project_stacks(&project.project_name) {
        let status = match provider.stack_status(&stack.name).await {
            Ok(status) => status,
            Err(err) if err.is_precondition() => return Err(err.into()),
            Err(err) => {
                println!("{:<32} unknown ({})", stack.name, err);
                continue;
            }
        };
        println!("{:<32} {}", stack.name, status);
        if !status.exists() {
            continue;
        }
        match provider.stack_outputs(&stack.name).await {
            Ok(outputs) => {
                for key in STATUS_OUTPUTS {
                    if let Some(value) = outputs.get(*key) {
                        println!("    {:<18} {}", key, value);
                    }
                }
            }
            Err(err) => println!("    outputs unavailable: {}", err),
        }
    }
    Ok(0)
}

/// The site URL: explicit, else the compute stack's outputs.
async fn site_url(
    provider: &dyn StackProvider,
    project: &str,
    explicit: Option<String>,
) -> Result<String> {
    let url = match explicit {
        Some(url) => url,
        None => {
            let stack = StackRole::Compute.stack_name(project);
            let outputs = provider
                .stack_outputs(&stack)
                .await
                .with_context(|| format!("Failed to read outputs of {}; pass --url", stack))?;
            match (outputs.get("MatomoUrl"), outputs.get("PublicIp")) {
                (Some(url), _) => url.clone(),
                (None, Some(ip)) => format!("http://{}", ip),
                (None, None) => anyhow::bail!("{} has no MatomoUrl or PublicIp output; pass --url", stack),
            }
        }
    };
    validate_url(&url)?;
    info!(url = %url, "using site URL");
    Ok(url)
}

async fn cmd_validate(
    fetch: &dyn Fetch,
    url: &str,
    wait: Option<PollSettings>,
    marker: Option<&Path>,
    log: Option<&Path>,
) -> Result<u8> {
    let mut lines = Vec::new();

    let verdict = match wait {
        Some(settings) => {
            let outcome = wait_for_site(fetch, url, settings).await;
            if outcome.timed_out {
                lines.push(CheckLine::fail(format!(
                    "site did not come up within {}s ({} probes)",
                    settings.timeout.as_secs(),
                    outcome.attempts
                )));
            }
            outcome.verdict
        }
        None => classify(&fetch.get(url).await),
    };
    lines.push(CheckLine {
        level: verdict.level,
        message: format!("{}: {}", url, verdict.message),
    });

    if let Some(path) = marker {
        match StatusMarker::load(path).await {
            Ok(marker) => lines.extend(marker.lines()),
            Err(err) => lines.push(CheckLine::warn(format!("status marker: {}", err))),
        }
    }
    if let Some(path) = log {
        match load_install_log(path).await {
            Ok(scan) => lines.extend(scan.lines()),
            Err(err) => lines.push(CheckLine::warn(format!("install log: {}", err))),
        }
    }

    print_lines(&lines);
    let summary = print_summary(&lines);
    Ok(if summary.worst() == Some(CheckLevel::Fail) {
        1
    } else {
        0
    })
}

async fn cmd_health(fetch: &dyn Fetch, url: &str, json: bool) -> Result<u8> {
    let report = check_health(fetch, url).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize health report")?
        );
    } else {
        println!("Health of {}", report.url);
        let lines = report.lines();
        print_lines(&lines);
        print_summary(&lines);
    }

    Ok(if report.healthy() { 0 } else { 1 })
}
