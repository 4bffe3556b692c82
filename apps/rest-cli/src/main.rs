//! Issue a single REST call through the declarative client.
//!
//! ```bash
//! # Templated path against the first endpoint of a config file
//! modkit-rest --config rest.yaml /users/{id} -p id=42
//!
//! # Ad-hoc endpoint, query parameters and pretty JSON output
//! modkit-rest --base-url https://api.example.com /search -q q="a b" --pretty
//!
//! # Form POST to an absolute URL
//! modkit-rest --base-url https://api.example.com -X POST https://api.example.com/users -q name=ada
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod args;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use http::Method;
use modkit_rest::{
    CallDescriptor, EndpointConfig, ErrorKind, NetworkResponse, RestClientConfig, RestError,
};
use tracing_subscriber::EnvFilter;

use crate::args::{is_absolute_url, parse_duration, parse_header, parse_method, parse_pair};

/// Execute one REST call and print the response body.
#[derive(Parser, Debug)]
#[command(name = "modkit-rest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path template (`/users/{id}`) or absolute URL
    #[arg(value_name = "TARGET")]
    target: String,

    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ad-hoc endpoint registered ahead of the configured ones
    #[arg(long)]
    base_url: Option<String>,

    /// Allow plain http:// for the ad-hoc endpoint
    #[arg(long)]
    insecure: bool,

    /// Named endpoint to call (defaults to the first registered one)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[arg(short = 'X', long, default_value = "GET", value_parser = parse_method)]
    method: Method,

    /// Path placeholder value (repeatable)
    #[arg(short, long = "path-param", value_name = "NAME=VALUE", value_parser = parse_pair)]
    path_param: Vec<(String, String)>,

    /// Query parameter for GET/HEAD, form field otherwise (repeatable)
    #[arg(short = 'q', long = "param", value_name = "NAME=VALUE", value_parser = parse_pair)]
    param: Vec<(String, String)>,

    /// Request header (repeatable)
    #[arg(short = 'H', long, value_name = "NAME: VALUE", value_parser = parse_header)]
    header: Vec<(String, String)>,

    /// Raw request body; replaces form fields
    #[arg(short, long)]
    data: Option<String>,

    /// Initial per-attempt timeout (e.g. `500ms`, `3s`)
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Retry budget for this call
    #[arg(long)]
    retries: Option<u32>,

    /// Print status line and response headers before the body
    #[arg(short, long)]
    include: bool,

    /// Pretty-print JSON bodies
    #[arg(long)]
    pretty: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<RestClientConfig> {
    let mut config = RestClientConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.endpoints.insert(
            0,
            EndpointConfig {
                name: "cli".to_owned(),
                base_url: base_url.clone(),
                default_headers: std::collections::BTreeMap::new(),
                user_agent: None,
                connect_timeout: None,
                allow_insecure_http: cli.insecure,
            },
        );
    }
    if config.endpoints.is_empty() {
        anyhow::bail!("no endpoint configured: pass --config or --base-url");
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let client = config
        .client_builder()
        .context("failed to build REST client")?
        .build();

    let absolute = is_absolute_url(&cli.target);
    let mut descriptor = if absolute {
        CallDescriptor::dynamic("cli", cli.method.clone())
    } else {
        CallDescriptor::templated("cli", cli.method.clone(), cli.target.as_str())?
    };
    if let Some(endpoint) = &cli.endpoint {
        descriptor = descriptor.on_endpoint(endpoint.as_str());
    }

    let mut call = if absolute {
        client.call_dynamic(&descriptor, cli.target.as_str())
    } else {
        client.call(&descriptor)
    };
    for (name, value) in &cli.path_param {
        call = call.path_param(name, value.as_str());
    }
    for (name, value) in &cli.param {
        call = call.param(name.as_str(), value.as_str());
    }
    for (name, value) in &cli.header {
        call = call.header(name.as_str(), value.as_str());
    }
    if let Some(data) = &cli.data {
        call = call.body(data.clone());
    }
    if let Some(timeout) = cli.timeout {
        call = call.timeout(timeout);
    }
    if let Some(retries) = cli.retries {
        call = call.retries(retries);
    }

    match call.execute() {
        Ok(result) => {
            print_response(cli, &result.response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if let Some(response) = err.response() {
                print_response(cli, response)?;
            }
            eprintln!("error: {err}");
            Ok(ExitCode::from(exit_code(&err)))
        }
    }
}

fn print_response(cli: &Cli, response: &NetworkResponse) -> Result<()> {
    if cli.include {
        let status = response.status;
        println!("{status}");
        for (name, value) in &response.headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            println!("{name}: {value}");
        }
        println!();
    }

    if cli.pretty
        && let Ok(json) = serde_json::from_slice::<serde_json::Value>(&response.data)
    {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", String::from_utf8_lossy(&response.data));
    }
    Ok(())
}

/// Distinct exit status per failure class.
fn exit_code(err: &RestError) -> u8 {
    match err.kind() {
        ErrorKind::Configuration | ErrorKind::Programming => 2,
        ErrorKind::Connectivity => 3,
        ErrorKind::Timeout => 4,
        ErrorKind::Authorization => 5,
        ErrorKind::Server => 6,
        ErrorKind::Conversion => 7,
        _ => 1,
    }
}
