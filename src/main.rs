use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use purl::{
    doc,
    fetcher::{Body, FetchOutcome, FetchRequest, Fetcher},
    headers::{format_response_headers, parse_headers},
    output::{
        print_headers, print_request_info, report_error, write_body, write_to_file,
        write_to_stdout,
    },
};

/// Transfer data from URLs
#[derive(Parser, Debug)]
#[command(name = "purl", disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// URL to fetch
    url: Option<String>,
    /// Show help
    #[arg(short, long)]
    help: bool,
    /// Show version
    #[arg(short = 'v', long)]
    version: bool,
    /// Write output to file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Add header
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,
    /// HTTP method
    #[arg(short = 'X', long = "request", value_name = "METHOD", default_value = "GET")]
    method: String,
    /// HTTP request body
    #[arg(short, long, value_name = "DATA", allow_hyphen_values = true)]
    data: Option<String>,
    /// Include response headers
    #[arg(short, long)]
    include: bool,
    /// Follow redirects (not implemented, 3xx responses are reported as errors)
    #[arg(short = 'L', long)]
    location: bool,
    /// Verbose output
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("PURL_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    if run(cli) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Returns whether the invocation succeeded. Failures have been reported on
/// stderr by the time this returns.
fn run(cli: Cli) -> bool {
    if cli.help || cli.version {
        return show_doc(&mut io::stdout().lock(), cli.help);
    }

    let Some(url) = cli.url else {
        report_error("URL required");
        eprintln!("Try 'purl --help' for more information");
        return false;
    };

    let headers = parse_headers(&cli.headers);
    if cli.location {
        tracing::debug!("--location given, redirects are not followed");
    }
    if cli.verbose {
        print_request_info(&cli.method, &url, &headers);
    }

    let request = FetchRequest::new(url)
        .method(cli.method)
        .headers(headers)
        .body(cli.data.map(Body::Text));
    let response = match Fetcher::new().fetch(&request) {
        FetchOutcome::Success(response) => response,
        failure => {
            report_error(failure.message().unwrap_or_default());
            return false;
        }
    };

    if cli.include || cli.verbose {
        print_headers(&format_response_headers(&response));
    }

    let written = match &cli.output {
        Some(path) => write_to_file(response.body(), path, cli.verbose),
        None => write_to_stdout(response.body()),
    };
    match written {
        Ok(()) => true,
        Err(error) => {
            report_error(format!("{error:#}"));
            false
        }
    }
}

/// Prints the help text, or the version when `help` is false.
fn show_doc(out: &mut impl Write, help: bool) -> bool {
    let doc = doc::read_app_doc(&doc::default_sources());
    let text = if help {
        doc::render_help(&doc)
    } else {
        doc::render_version(&doc)
    };
    match write_body(out, text.as_bytes()) {
        Ok(()) => true,
        Err(error) => {
            report_error(format!("{error:#}"));
            false
        }
    }
}
