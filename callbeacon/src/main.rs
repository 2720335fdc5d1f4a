//! callbeacon - CLI tool for inspecting and exercising usage telemetry
//!
//! This tool provides commands for:
//! - Checking telemetry configuration
//! - Querying the clock-skew time authority
//! - Previewing what a call event looks like after redaction
//! - Sending a test event to the collection endpoint
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/callbeacon/config.toml (~/.config/callbeacon/config.toml)
//! - Logs: $XDG_STATE_HOME/callbeacon/ (~/.local/state/callbeacon/)

use std::sync::Arc;

use anyhow::{Context, Result};
use callbeacon_core::telemetry::{self, HttpClock, SkewResolver, TelemetryClient};
use callbeacon_core::types::{AuthDescriptor, PreparedRecord, PrivacyConfig, RawEvent, Skew};
use callbeacon_core::{ClientInfo, Config};
use chrono::Utc;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "callbeacon")]
#[command(about = "Inspect and exercise callbeacon usage telemetry")]
#[command(version)]
struct Args {
    /// Log pipeline activity to stderr and to the state directory
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show telemetry configuration
    Status,

    /// Query the time authority and print the clock skew
    Skew,

    /// Print the record an event would produce under the configured privacy policy
    Preview {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Submit one test event and upload it immediately
    Send {
        #[command(flatten)]
        event: EventArgs,
    },
}

/// Fields of the synthetic call event
#[derive(clap::Args)]
struct EventArgs {
    /// Library method name
    #[arg(long, default_value = "get")]
    method: String,

    /// Response status code
    #[arg(long, default_value_t = 200)]
    status: u16,

    /// Authentication scheme
    #[arg(long, default_value = "none")]
    auth: String,

    /// Call duration in milliseconds
    #[arg(long, default_value_t = 120)]
    duration_ms: i64,
}

impl EventArgs {
    fn to_event(&self) -> RawEvent {
        let finished_at = Utc::now();
        let client = ClientInfo::current();
        RawEvent {
            version: client.version,
            hash: client.hash,
            method: self.method.clone(),
            has_middleware: false,
            has_callback: false,
            has_body: false,
            has_query: false,
            has_headers: false,
            auth: AuthDescriptor::new(self.auth.clone()),
            status_code: self.status,
            started_at: finished_at - chrono::Duration::milliseconds(self.duration_ms),
            finished_at,
            paginated: None,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(
            callbeacon_core::logging::init(&config.logging, true)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Skew => cmd_skew(&config),
        Command::Preview { event } => cmd_preview(&config, &event),
        Command::Send { event } => cmd_send(&config, &event),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")
}

fn describe_privacy(privacy: &PrivacyConfig) -> String {
    match privacy {
        PrivacyConfig::Flag(true) => "all fields".to_string(),
        PrivacyConfig::Flag(false) => "nothing (telemetry off)".to_string(),
        PrivacyConfig::Fields(perms) if perms.is_empty() => "nothing (empty policy)".to_string(),
        PrivacyConfig::Fields(perms) => {
            let switch = |allowed: bool| if allowed { "on" } else { "off" };
            format!(
                "auth_type={} status_code={} timings={}",
                switch(perms.allows_auth_type()),
                switch(perms.allows_status_code()),
                switch(perms.allows_timings())
            )
        }
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Telemetry Configuration");
    println!("=======================");
    println!();

    let telemetry = &config.telemetry;

    println!(
        "Endpoint:        {}",
        telemetry.endpoint.as_deref().unwrap_or("<not set>")
    );
    println!("Clock URL:       {}", telemetry.clock_url);
    println!("Debounce:        {}ms", telemetry.debounce_ms);
    println!("Timeout:         {}s", telemetry.timeout_secs);
    println!("Sends:           {}", describe_privacy(&telemetry.privacy));
    println!("Client Version:  {}", ClientInfo::current().version);

    println!();
    if telemetry.is_ready() {
        println!("Status: Ready to upload");
    } else if telemetry.endpoint.is_none() {
        println!("Status: Not ready (set telemetry.endpoint in config.toml)");
        println!();
        println!("  [telemetry]");
        println!("  endpoint = \"https://telemetry.example.com/v1/events\"");
    } else {
        println!("Status: Disabled by privacy policy");
    }

    Ok(())
}

fn cmd_skew(config: &Config) -> Result<()> {
    let clock = HttpClock::new(&config.telemetry).context("failed to create clock client")?;
    let resolver = SkewResolver::new(Arc::new(clock));

    let skew = runtime()?.block_on(resolver.resolve());

    println!("Clock URL:  {}", config.telemetry.clock_url);
    println!("Skew:       {}", skew);
    Ok(())
}

fn cmd_preview(config: &Config, args: &EventArgs) -> Result<()> {
    let event = args.to_event();
    let fields = telemetry::prepare(&event, &config.telemetry.privacy);

    if fields.is_empty() {
        println!("Privacy policy withholds every field; this event would not be sent.");
        return Ok(());
    }

    let record = PreparedRecord::new(fields, &ClientInfo::current(), Skew::Unknown);
    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("failed to serialize record")?
    );
    Ok(())
}

fn cmd_send(config: &Config, args: &EventArgs) -> Result<()> {
    let Some(client) =
        TelemetryClient::from_config(&config.telemetry).context("failed to create telemetry client")?
    else {
        println!("Telemetry is not configured. Run 'status' for details.");
        return Ok(());
    };

    let event = args.to_event();
    tracing::info!(method = %event.method, status = event.status_code, "Sending test event");

    let dispatched = runtime()?.block_on(async {
        if !client.record(event).await {
            return None;
        }
        Some(client.flush_now().await)
    });

    match dispatched {
        None => println!("Privacy policy withheld every field; nothing was sent."),
        Some(count) => {
            println!(
                "Dispatched {} event(s) to {}",
                count,
                config.telemetry.endpoint.as_deref().unwrap_or("<not set>")
            );
            println!(
                "Upload failures are only logged; rerun with --verbose and check {}",
                callbeacon_core::logging::log_file_path().display()
            );
        }
    }
    Ok(())
}
