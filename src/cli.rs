use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{about-with-newline}

{usage-heading}
  {usage}

{tab}Commands:
{subcommands}

{tab}Global Options:
{options}

{after-help}
";

#[derive(Parser)]
#[command(name = "iam-audit")]
#[command(about = "Audit AWS IAM users for common security misconfigurations")]
#[command(
    long_about = "iam-audit scans the IAM users of an AWS account and flags common\n\
    security misconfigurations: users without MFA, access keys past their\n\
    rotation age, and access keys that have gone unused.\n\n\
    Features:\n\
    • Read-only: never modifies the audited account\n\
    • Reports as colorized terminal text, JSON and self-contained HTML\n\
    • Configurable age and inactivity thresholds\n\
    • Signed requests straight to the IAM API, no SDK required"
)]
#[command(
    help_template = HELP_TEMPLATE,
    after_help = "Examples:\n\
    \n\
    Run a full audit and write reports:\n\
      $ iam-audit audit\n\
    \n\
    Print the machine-readable report instead of text:\n\
      $ iam-audit audit --format json\n\
    \n\
    Tighten the rotation threshold for one run:\n\
      $ iam-audit audit --max-key-age 60\n\
    \n\
    List the checks this tool performs:\n\
      $ iam-audit checks\n\
    \n\
    Credentials are read from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY\n\
    (and AWS_SESSION_TOKEN when set)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    ///
    /// Defaults to config.toml under the user configuration directory.
    /// A default file is written there on first run.
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output
    ///
    /// Enables detailed output including per-user fetch progress and
    /// report file locations.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the IAM security audit
    ///
    /// Fetches all IAM users with their MFA devices and access keys,
    /// evaluates the configured checks and emits the reports. The process
    /// exits 0 whenever the audit completes, regardless of findings.
    ///
    /// Examples:
    ///   $ iam-audit audit
    ///   $ iam-audit audit --format json     # JSON on stdout
    ///   $ iam-audit audit --no-write        # Skip report files
    #[command(alias = "run")]
    Audit {
        /// Stdout format (text or json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Directory for the report files
        ///
        /// Overrides the report folder from the configuration file.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Flag active keys older than this many days
        #[arg(long = "max-key-age", value_name = "DAYS")]
        max_key_age: Option<i64>,

        /// Flag active keys unused for this many days
        #[arg(long = "inactive-days", value_name = "DAYS")]
        inactive_days: Option<i64>,

        /// Do not write HTML/JSON report files
        #[arg(long = "no-write")]
        no_write: bool,
    },

    /// List the security checks this tool performs
    ///
    /// Shows each check with its finding kind and fixed severity.
    ///
    /// Examples:
    ///   $ iam-audit checks
    Checks,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Generate shell completion scripts
pub fn generate_completions(shell: &str, app: &mut clap::Command) {
    use clap_complete::{generate, shells};
    match shell {
        "zsh" => {
            generate(shells::Zsh, app, "iam-audit", &mut std::io::stdout());
        }
        "fish" => {
            generate(shells::Fish, app, "iam-audit", &mut std::io::stdout());
        }
        "bash" => {
            generate(shells::Bash, app, "iam-audit", &mut std::io::stdout());
        }
        "powershell" => {
            generate(shells::PowerShell, app, "iam-audit", &mut std::io::stdout());
        }
        _ => {
            eprintln!("Unsupported shell: {}", shell);
            eprintln!("Supported shells: zsh, fish, bash, powershell");
        }
    }
}
