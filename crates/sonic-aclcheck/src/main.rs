//! aclcheck - ACL line reachability and flow classification
//!
//! Loads a snapshot of node filters and answers one question about the
//! filters selected with `--node` / `--filter`:
//!
//! ```bash
//! aclcheck reachability --snapshot net.yaml --node 'as1.*'
//! aclcheck test-filters --snapshot net.yaml --src-ip 1.0.1.2 --dst-ip 2.128.0.101 \
//!     --protocol udp --dst-port 53
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sonic_aclcheck::{
    AclCheckConfig, BatchRunner, ClassifyRequest, ClassifyResponse, ErrorRow, FlowSpec, LineMatch,
    ReachabilityRequest, ReachabilityResponse, Snapshot, DEFAULT_CONFIG_PATH,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when the deadline cut the analysis short.
const EXIT_INCOMPLETE: u8 = 3;

/// Exit status on a usage, input or engine error.
const EXIT_ERROR: u8 = 2;

/// ACL line reachability and flow classification
#[derive(Parser, Debug)]
#[command(name = "aclcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (defaults are used if it does not exist)
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify flows against the selected filters
    TestFilters(TestFiltersArgs),
    /// Report lines of the selected filters that can never match first
    Reachability(ReachabilityArgs),
}

#[derive(Args, Debug)]
struct Selection {
    /// Snapshot file (.json, otherwise YAML)
    #[arg(short = 's', long)]
    snapshot: PathBuf,

    /// Node name regex (full match, case-insensitive)
    #[arg(short = 'n', long)]
    node: Option<String>,

    /// Filter name regex (full match, case-insensitive)
    #[arg(short = 'f', long)]
    filter: Option<String>,

    /// Batch deadline in milliseconds, overriding the config (0 disables)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Concurrent analysis units, overriding the config
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args, Debug)]
struct TestFiltersArgs {
    #[command(flatten)]
    selection: Selection,

    /// File with a list of flows (.json, otherwise YAML), classified after
    /// the flow given on the command line
    #[arg(long)]
    flows: Option<PathBuf>,

    #[arg(long)]
    src_ip: Option<String>,

    #[arg(long)]
    dst_ip: Option<String>,

    /// Protocol name or number (tcp, udp, icmp, 47, ...)
    #[arg(short = 'p', long)]
    protocol: Option<String>,

    #[arg(long)]
    src_port: Option<u16>,

    #[arg(long)]
    dst_port: Option<u16>,

    /// Flags that are set, e.g. "syn,ack"
    #[arg(long)]
    tcp_flags: Option<String>,

    #[arg(long)]
    icmp_type: Option<u8>,

    #[arg(long)]
    icmp_code: Option<u8>,

    #[arg(long)]
    packet_length: Option<u16>,

    #[arg(long)]
    fragment_offset: Option<u16>,
}

#[derive(Args, Debug)]
struct ReachabilityArgs {
    #[command(flatten)]
    selection: Selection,
}

impl TestFiltersArgs {
    fn command_line_flow(&self) -> Option<FlowSpec> {
        if self.src_ip.is_none() && self.dst_ip.is_none() {
            return None;
        }
        Some(FlowSpec {
            src_ip: self.src_ip.clone(),
            dst_ip: self.dst_ip.clone(),
            ip_protocol: self.protocol.clone(),
            src_port: self.src_port,
            dst_port: self.dst_port,
            tcp_flags: self.tcp_flags.clone(),
            icmp_type: self.icmp_type,
            icmp_code: self.icmp_code,
            packet_length: self.packet_length,
            fragment_offset: self.fragment_offset,
        })
    }

    fn request(&self) -> Result<ClassifyRequest> {
        let flows = match &self.flows {
            Some(path) => read_flows(path)?,
            None => Vec::new(),
        };
        let flow = self.command_line_flow();
        if flow.is_none() && flows.is_empty() {
            bail!("no flow given: use --src-ip/--dst-ip or --flows");
        }
        Ok(ClassifyRequest {
            flow,
            flows,
            node_regex: self.selection.node.clone(),
            filter_regex: self.selection.filter.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("aclcheck: {:#}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "aclcheck: exiting with error");
            eprintln!("aclcheck: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Logs go to stderr so stdout carries only results.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set logger: {}", e))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AclCheckConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Command::TestFilters(args) => {
            let request = args.request()?;
            let runner = build_runner(&args.selection, &config)?;
            let response = runner.classify(&request).await?;
            emit(cli.format, &response, render_classify)?;
            Ok(exit_code(response.incomplete))
        }
        Command::Reachability(args) => {
            let request = ReachabilityRequest {
                node_regex: args.selection.node.clone(),
                acl_regex: args.selection.filter.clone(),
            };
            let runner = build_runner(&args.selection, &config)?;
            let response = runner.reachability(&request).await?;
            emit(cli.format, &response, render_reachability)?;
            Ok(exit_code(response.incomplete))
        }
    }
}

fn build_runner(selection: &Selection, config: &AclCheckConfig) -> Result<BatchRunner> {
    let snapshot = Snapshot::load(&selection.snapshot, config.analysis.default_action)
        .with_context(|| format!("loading snapshot {}", selection.snapshot.display()))?;

    let mut runner = BatchRunner::new(Arc::new(snapshot), config);
    if let Some(ms) = selection.deadline_ms {
        runner = runner.with_deadline((ms > 0).then(|| Duration::from_millis(ms)));
    }
    if let Some(workers) = selection.workers {
        runner = runner.with_workers(workers);
    }
    info!(snapshot = %selection.snapshot.display(), "aclcheck: snapshot ready");
    Ok(runner)
}

fn read_flows(path: &Path) -> Result<Vec<FlowSpec>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading flows {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let flows = if is_json {
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
    };
    Ok(flows)
}

fn exit_code(incomplete: bool) -> ExitCode {
    if incomplete {
        ExitCode::from(EXIT_INCOMPLETE)
    } else {
        ExitCode::SUCCESS
    }
}

fn emit<T: Serialize>(format: OutputFormat, response: &T, text: fn(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
        OutputFormat::Text => print!("{}", text(response)),
    }
    Ok(())
}

fn render_classify(response: &ClassifyResponse) -> String {
    let mut out = String::new();
    for row in &response.rows {
        out.push_str(&format!("{}: {}\n", row.node, row.filter_name));
        out.push_str(&format!("  flow:   {}\n", row.flow));
        let verdict = row
            .action
            .map_or_else(|| "INDETERMINATE".to_string(), |a| a.to_string());
        out.push_str(&format!(
            "  result: {} at [index {}] {}\n",
            verdict, row.line_number, row.line_content
        ));
        if let Some(reason) = &row.indeterminate_reason {
            out.push_str(&format!("  reason: {}\n", reason));
        }
        out.push_str("  trace:\n");
        for entry in &row.trace {
            let result = match &entry.result {
                LineMatch::Match => "match".to_string(),
                LineMatch::NoMatch { field } => format!("no match ({})", field),
                LineMatch::Indeterminate { reason } => format!("indeterminate ({})", reason),
            };
            out.push_str(&format!(
                "    [index {}] {}: {}\n",
                entry.index, entry.line, result
            ));
        }
        out.push('\n');
    }
    render_tail(&mut out, &response.errors, response.incomplete, &response.pending);
    out
}

fn render_reachability(response: &ReachabilityResponse) -> String {
    let mut out = String::new();
    if response.rows.is_empty() && response.errors.is_empty() && !response.incomplete {
        out.push_str("All lines are reachable.\n");
    }
    for row in &response.rows {
        out.push_str(&row.message);
        out.push_str("\n\n");
    }
    render_tail(&mut out, &response.errors, response.incomplete, &response.pending);
    out
}

fn render_tail(
    out: &mut String,
    errors: &[ErrorRow],
    incomplete: bool,
    pending: &[sonic_aclcheck::AclSource],
) {
    for row in errors {
        out.push_str(&format!("error: {}: {}: {}\n", row.node, row.filter, row.error));
    }
    if incomplete {
        out.push_str(&format!(
            "incomplete: deadline expired with {} filter(s) pending\n",
            pending.len()
        ));
        for source in pending {
            out.push_str(&format!("  pending: {}\n", source));
        }
    }
}
