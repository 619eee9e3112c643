//! CLI entry point for `imapattach`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use imapattach::config::{self, Config};
use imapattach::imap::{ImapConnector, ReadOnlyConnection, Transport};
use imapattach::search::parse_query;
use imapattach::{AttachmentFetcher, SavedAttachment};

#[derive(Parser)]
#[command(
    name = "imapattach",
    version,
    about = "Download email attachments from an IMAP mailbox"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the attachments of every message matching QUERY
    Fetch {
        /// Search query, e.g. `from:alice unseen since:2024-01-01`. Empty means ALL.
        #[arg(default_value = "")]
        query: String,
        /// IMAP server host
        #[arg(long)]
        host: Option<String>,
        /// IMAP server port
        #[arg(long)]
        port: Option<u16>,
        /// Login name
        #[arg(short, long)]
        user: Option<String>,
        /// Password
        #[arg(long, env = "IMAPATTACH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Mailbox to search
        #[arg(short, long)]
        mailbox: Option<String>,
        /// Upgrade a plain connection with STARTTLS instead of implicit TLS
        #[arg(long)]
        starttls: bool,
        /// Do not verify the server certificate
        #[arg(long)]
        insecure: bool,
        /// Charset of the search strings
        #[arg(long)]
        charset: Option<String>,
        /// Also save attachments found inside nested multiparts
        #[arg(long)]
        nested: bool,
        /// Directory to save attachments into
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Print the saved attachments as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the IMAP SEARCH string a query translates to
    Query {
        /// Search query, e.g. `subject:"data file" since:2021-03-05`. Empty means ALL.
        #[arg(default_value = "")]
        query: String,
        /// Charset of the search strings (defaults to the configured one)
        #[arg(long)]
        charset: Option<String>,
    },
    /// Show the configuration file location and its effective contents
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Connection and output options given on the command line.
struct FetchArgs {
    query: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    mailbox: Option<String>,
    starttls: bool,
    insecure: bool,
    charset: Option<String>,
    nested: bool,
    output: Option<PathBuf>,
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => config::load_config_from(path)?,
        None => config::load_config(),
    };
    let config_path = cli
        .config
        .clone()
        .or_else(config::config_file_path)
        .unwrap_or_default();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch {
            query,
            host,
            port,
            user,
            password,
            mailbox,
            starttls,
            insecure,
            charset,
            nested,
            output,
            json,
        } => cmd_fetch(
            &config,
            &config_path,
            FetchArgs {
                query,
                host,
                port,
                user,
                password,
                mailbox,
                starttls,
                insecure,
                charset,
                nested,
                output,
                json,
            },
        ),
        Commands::Query { query, charset } => cmd_query(&config, &query, charset.as_deref()),
        Commands::Config { default } => cmd_config(&config, default),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "imapattach.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Connect, search and save attachments, then print what was saved.
fn cmd_fetch(config: &Config, config_path: &Path, args: FetchArgs) -> anyhow::Result<()> {
    let charset = args.charset.as_deref().unwrap_or(&config.fetch.charset);
    let criteria = parse_query(&args.query, charset)?;

    let mut account = config.account.clone();
    if args.host.is_some() {
        account.host = args.host;
    }
    if args.user.is_some() {
        account.user = args.user;
    }
    if args.password.is_some() {
        account.password = args.password;
    }
    if let Some(mailbox) = args.mailbox {
        account.mailbox = mailbox;
    }
    if args.starttls {
        account.transport = Transport::StartTls;
        if args.port.is_none() && account.port == 993 {
            account.port = 143;
        }
    }
    if let Some(port) = args.port {
        account.port = port;
    }
    if args.insecure {
        account.validate_certs = false;
    }
    let settings = account
        .connection_settings(config_path)
        .context("pass --host and --user or set them in the config file")?;

    let save_dir = args.output.or_else(|| config.fetch.save_dir.clone());
    let nested = args.nested || config.fetch.nested_parts;

    let connection = ReadOnlyConnection::new(ImapConnector::new(settings));
    let mut fetcher = AttachmentFetcher::new(connection, save_dir).with_nested_parts(nested);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Fetching [{bar:40.cyan/blue}] {pos}/{len} messages")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let saved = fetcher.fetch_attachments_with_progress(&criteria, &|done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish_and_clear();
    tracing::info!(count = saved.len(), elapsed = ?start.elapsed(), "Fetch finished");

    if args.json {
        print_attachments_json(&saved)?;
    } else {
        print_attachments_table(&saved, fetcher.save_dir());
    }

    Ok(())
}

/// Print the SEARCH string for a query without connecting anywhere.
fn cmd_query(config: &Config, query: &str, charset: Option<&str>) -> anyhow::Result<()> {
    let charset = charset.unwrap_or(&config.fetch.charset);
    let criteria = parse_query(query, charset)?;
    if criteria.charset().is_empty() {
        println!("{criteria}");
    } else {
        println!("CHARSET {} {}", criteria.charset(), criteria);
    }
    Ok(())
}

/// Print the config file path and the configuration in effect.
fn cmd_config(config: &Config, default: bool) -> anyhow::Result<()> {
    let shown = if default {
        Config::default()
    } else {
        config.clone()
    };
    let path = config::config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());

    println!("# Config file: {path}");
    println!("# Log file:    {}", config::log_file_path(config).display());
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "imapattach", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print saved attachments as a human-readable table.
fn print_attachments_table(saved: &[SavedAttachment], dir: &std::path::Path) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {} attachment(s) saved to {}", saved.len(), dir.display());
    println!();

    if saved.is_empty() {
        return;
    }

    println!(
        "  {:<6} {:<8} {:<40} {:>10}  {}",
        "Msg", "Part", "Name", "Size", "File"
    );
    println!("  {}", "-".repeat(98));

    for att in saved {
        let name: String = att.display_name().chars().take(39).collect();
        let file = att
            .filepath
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "  {:<6} {:<8} {:<40} {:>10}  {}",
            att.message,
            att.section,
            name,
            format_size(att.size, BINARY),
            file
        );
    }
    println!();
}

/// Print saved attachments as JSON.
fn print_attachments_json(saved: &[SavedAttachment]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "attachment_count": saved.len(),
        "attachments": saved,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
