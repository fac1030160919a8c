use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::CommandFactory;

use iam_audit::audit::{evaluate, AuditReport, FindingKind};
use iam_audit::aws::{collect_snapshots, Credentials, IamClient};
use iam_audit::cli::{self, Commands};
use iam_audit::config::Config;
use iam_audit::output::Output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize output system
    Output::init();

    // Check for completion generation request
    if let Ok(shell) = std::env::var("IAM_AUDIT_GENERATE_COMPLETIONS") {
        let mut app = cli::Cli::command();
        cli::generate_completions(&shell, &mut app);
        return Ok(());
    }

    let opts = cli::parse();

    // Load configuration
    let config = Config::load(opts.config.as_deref())?;

    match &opts.command {
        Commands::Audit {
            format,
            output,
            max_key_age,
            inactive_days,
            no_write,
        } => {
            cmd_audit(
                &config,
                format,
                output.clone(),
                *max_key_age,
                *inactive_days,
                *no_write,
                opts.verbose,
            )
            .await?;
        }
        Commands::Checks => {
            cmd_checks(&config);
        }
    }

    Ok(())
}

async fn cmd_audit(
    config: &Config,
    format: &str,
    output: Option<PathBuf>,
    max_key_age: Option<i64>,
    inactive_days: Option<i64>,
    no_write: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    Output::heading("🔐 IAM Security Audit");

    // Thresholds from config, overridable per run
    let mut thresholds = config.thresholds;
    if let Some(days) = max_key_age {
        thresholds.max_access_key_age_days = days;
    }
    if let Some(days) = inactive_days {
        thresholds.inactive_key_days = days;
    }
    if let Err(e) = thresholds.validate() {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            Output::error(&e.to_string());
            eprintln!("Hint: export AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY before running.");
            return Err(e.into());
        }
    };

    let client = match &config.aws.endpoint {
        Some(endpoint) => IamClient::with_endpoint(credentials, &config.aws.region, endpoint)?,
        None => IamClient::new(credentials, &config.aws.region)?,
    };

    if verbose {
        Output::info(&format!("Signing region: {}", config.aws.region));
        Output::info(&format!(
            "Thresholds: key age > {} days, inactivity > {} days",
            thresholds.max_access_key_age_days, thresholds.inactive_key_days
        ));
    }

    let spinner = Output::spinner("Fetching IAM users, MFA devices and access keys...");
    let snapshots = match collect_snapshots(&client).await {
        Ok(snapshots) => {
            spinner.finish_and_clear();
            snapshots
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Audit aborted, no report written: {}", e));
            return Err(e.into());
        }
    };

    let reference_time = Utc::now();
    let total_users = snapshots.len();
    let total_keys = snapshots.values().map(|u| u.access_keys.len()).sum();

    if verbose {
        Output::info(&format!(
            "Fetched {} user(s) with {} access key(s)",
            total_users, total_keys
        ));
    }

    let findings = evaluate(&snapshots, reference_time, &thresholds)?;
    let report = AuditReport::build(findings, total_users, total_keys, reference_time);

    match format {
        "json" => println!("{}", report.render_json()?),
        _ => print!("{}", report.render_text()),
    }

    if !no_write {
        let folder = output.unwrap_or_else(|| config.report.folder.clone());
        let (html_path, json_path) = write_reports(&report, &folder)?;
        if verbose || format != "json" {
            Output::info(&format!("HTML report: {}", html_path.display()));
            Output::info(&format!("JSON report: {}", json_path.display()));
        }
    }

    if report.summary.high > 0 {
        Output::warning(&format!(
            "{} high severity issue(s) need attention",
            report.summary.high
        ));
    }
    Output::summary("Audit complete:", report.summary.total());

    Ok(())
}

fn write_reports(report: &AuditReport, folder: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    if let Err(e) = fs::create_dir_all(folder) {
        eprintln!("Warning: Could not create report directory {:?}: {}", folder, e);
        eprintln!("Hint: Choose a writable directory with --output.");
        return Err(e.into());
    }

    let stamp = report.generated_at.format("%Y%m%d_%H%M%S");
    let html_path = folder.join(format!("iam_audit_{}.html", stamp));
    let json_path = folder.join(format!("iam_audit_{}.json", stamp));
    fs::write(&html_path, report.render_html())?;
    fs::write(&json_path, report.render_json()?)?;

    Ok((html_path, json_path))
}

fn cmd_checks(config: &Config) {
    Output::heading("🔎 Security Checks");

    let checks = [
        (
            FindingKind::NoMfa,
            "IAM user has no MFA device attached".to_string(),
        ),
        (
            FindingKind::OldAccessKey,
            format!(
                "Active access key older than {} days",
                config.thresholds.max_access_key_age_days
            ),
        ),
        (
            FindingKind::UnusedAccessKey,
            format!(
                "Active access key unused for more than {} days",
                config.thresholds.inactive_key_days
            ),
        ),
    ];

    let mut table = Output::table();
    table.set_header(vec!["Finding", "Severity", "Description"]);
    for (kind, description) in checks {
        table.add_row(vec![
            comfy_table::Cell::new(kind.label()),
            Output::severity_cell(kind.severity()),
            comfy_table::Cell::new(description),
        ]);
    }
    println!("{}", table);

    Output::list_item("Inactive (deactivated) keys are skipped by both key checks.");
    Output::list_item("Never-used keys count as unused once older than the inactivity window.");
}
