//! Auth0 CLI
//!
//! Small binary over the Management API client:
//! 1. Loads tenant, HTTP and proxy settings from TOML plus env secrets
//! 2. Builds the default transport stack from those settings
//! 3. Lists users or organizations as JSON lines on stdout

mod config;
mod metrics;

use anyhow::{Context, Result, bail};
use auth0_api::{ManagementApi, PageFilter, UserFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::DefaultHttpClient;

use crate::config::Config;

const USAGE: &str = "usage: auth0-cli [--config PATH] [--metrics] \
users [--query Q] [--page N] [--per-page N] | organizations [--from F] [--take N]";

#[derive(Debug, PartialEq)]
enum Command {
    Users {
        query: Option<String>,
        page: Option<i32>,
        per_page: Option<i32>,
    },
    Organizations {
        from: Option<String>,
        take: Option<i32>,
    },
}

#[derive(Debug, PartialEq)]
struct Args {
    config: Option<String>,
    metrics: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config = None;
    let mut metrics = false;
    let mut command = None;
    let mut query = None;
    let mut page = None;
    let mut per_page = None;
    let mut from = None;
    let mut take = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .with_context(|| format!("{arg} requires a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--config" => config = Some(value()?),
            "--metrics" => metrics = true,
            "--query" => query = Some(value()?),
            "--page" => page = Some(parse_number(arg, &value()?)?),
            "--per-page" => per_page = Some(parse_number(arg, &value()?)?),
            "--from" => from = Some(value()?),
            "--take" => take = Some(parse_number(arg, &value()?)?),
            "users" | "organizations" if command.is_none() => command = Some(arg.clone()),
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }

    let command = match command.as_deref() {
        Some("users") => {
            if from.is_some() || take.is_some() {
                bail!("--from/--take only apply to organizations\n{USAGE}");
            }
            Command::Users { query, page, per_page }
        }
        Some(_) => {
            if query.is_some() || page.is_some() || per_page.is_some() {
                bail!("--query/--page/--per-page only apply to users\n{USAGE}");
            }
            Command::Organizations { from, take }
        }
        None => bail!("missing command\n{USAGE}"),
    };
    Ok(Args {
        config,
        metrics,
        command,
    })
}

fn parse_number(flag: &str, raw: &str) -> Result<i32> {
    raw.parse()
        .with_context(|| format!("{flag} expects a number, got {raw:?}"))
}

fn print_lines<T: Serialize>(items: &[T]) -> Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

async fn run(api: &ManagementApi, command: Command) -> Result<()> {
    match command {
        Command::Users { query, page, per_page } => {
            let mut filter = UserFilter::new().with_totals(true);
            if let Some(query) = &query {
                filter = filter.with_query(query);
            }
            if page.is_some() || per_page.is_some() {
                filter = filter.with_page(page.unwrap_or(0), per_page.unwrap_or(50));
            }
            let page = api.users().list(&filter).execute_async().await?.into_body();
            info!(count = page.items.len(), total = ?page.total, "listed users");
            print_lines(&page.items)
        }
        Command::Organizations { from, take } => {
            let mut filter = PageFilter::new();
            if let Some(from) = &from {
                filter = filter.with_from(from);
            }
            if let Some(take) = take {
                filter = filter.with_take(take);
            }
            let page = api
                .organizations()
                .list(&filter)
                .execute_async()
                .await?
                .into_body();
            info!(count = page.items.len(), next = ?page.next, "listed organizations");
            print_lines(&page.items)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let prometheus = if args.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let options = config.http_options().context("invalid [http] or [proxy] settings")?;

    info!(
        domain = %config.tenant.domain,
        max_retries = options.max_retries(),
        max_requests = options.max_requests(),
        proxy = options.proxy().is_some(),
        "configuration loaded"
    );

    let client = DefaultHttpClient::with_options(options).context("failed to build HTTP client")?;
    let mut builder = ManagementApi::builder(&config.tenant.domain).http_client(Arc::new(client));
    match config.tenant.api_token.clone() {
        Some(token) => builder = builder.token(token),
        None => bail!("no API token: set {} or tenant.api_token_file", config::TOKEN_ENV),
    }
    let api = builder.build().context("failed to build Management API client")?;

    let result = run(&api, args.command).await;

    if let Some(handle) = prometheus {
        eprint!("{}", handle.render());
    }
    result
}
