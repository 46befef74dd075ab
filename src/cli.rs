use chime::config::{AppConfig, DEFAULT_VAPID_SUBJECT, WatchConfig};
use chime::push::MatchWindow;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::UtcOffset;
use time::format_description::FormatItem;
use time::macros::format_description;

const UTC_OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig, SocketAddr),
    Watch(WatchConfig),
    Exit(i32),
}

pub(crate) struct Invocation {
    pub(crate) outcome: RunOutcome,
    pub(crate) log_level: String,
}

pub(crate) fn run() -> Invocation {
    let cli = Cli::parse();
    let log_level = cli.log_level.clone();
    Invocation {
        outcome: resolve(cli),
        log_level,
    }
}

fn resolve(cli: Cli) -> RunOutcome {
    let utc_offset = match resolve_utc_offset(cli.utc_offset.as_deref()) {
        Ok(offset) => offset,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    match cli.command {
        Some(Command::Init(args)) => RunOutcome::Exit(run_init(args)),
        Some(Command::Watch(args)) => RunOutcome::Watch(WatchConfig {
            server: args.server,
            utc_offset,
        }),
        None => {
            let match_window = match MatchWindow::new(cli.match_window_secs) {
                Ok(window) => window,
                Err(err) => {
                    eprintln!("error: {err}");
                    return RunOutcome::Exit(2);
                }
            };
            RunOutcome::Serve(
                AppConfig {
                    data_dir: cli.data_dir,
                    vapid_private_key: cli.vapid_private_key,
                    vapid_public_key: cli.vapid_public_key,
                    vapid_subject: cli
                        .vapid_subject
                        .unwrap_or_else(|| DEFAULT_VAPID_SUBJECT.to_string()),
                    match_window,
                    utc_offset,
                },
                cli.bind,
            )
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "chime", version, about = "Alarm clock server with web push")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "CHIME_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, env = "CHIME_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, env = "CHIME_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "CHIME_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "CHIME_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    /// Seconds at the start of each minute during which push alarms may fire.
    #[arg(long, env = "CHIME_MATCH_WINDOW_SECS", default_value_t = MatchWindow::DEFAULT.seconds())]
    match_window_secs: u8,
    /// Fixed offset such as `+02:00`. Defaults to the system local offset.
    #[arg(long, env = "CHIME_UTC_OFFSET")]
    utc_offset: Option<String>,
    #[arg(long, env = "CHIME_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh VAPID key pair.
    Init(InitArgs),
    /// Ring alarms from a running server in this terminal.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long, env = "CHIME_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match chime::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => (DEFAULT_VAPID_SUBJECT.to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("CHIME_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("CHIME_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("CHIME_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace CHIME_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!(
        "--vapid-private-key \"{}\" --vapid-public-key \"{}\" --vapid-subject \"{subject}\"",
        credentials.private_key, credentials.public_key
    );
    0
}

/// Must run before the multi-threaded runtime starts; the local offset lookup
/// refuses to answer once other threads exist.
fn resolve_utc_offset(raw: Option<&str>) -> Result<UtcOffset, String> {
    if let Some(raw) = raw {
        return parse_utc_offset(raw);
    }
    Ok(UtcOffset::current_local_offset().unwrap_or_else(|err| {
        eprintln!("warning: could not determine local UTC offset ({err}); using UTC");
        UtcOffset::UTC
    }))
}

fn parse_utc_offset(raw: &str) -> Result<UtcOffset, String> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(value, UTC_OFFSET_FORMAT)
        .map_err(|_| format!("invalid utc offset '{value}'; expected +HH:MM or UTC"))
}
