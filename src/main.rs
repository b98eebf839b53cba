use anyhow::Context;
use clap::Parser;
use log::info;

use rsq::{QueryClient, QueryOptions, UserQuery, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};

/// Query Source/GoldSource game servers for info, players, rules and ping.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Servers to query, as HOST or HOST:PORT
    #[arg(required = true)]
    servers: Vec<String>,

    /// Overall deadline for the whole run, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
}

fn parse_server(arg: &str) -> anyhow::Result<UserQuery> {
    match arg.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {:?}", arg))?;
            Ok(UserQuery::new(host, port))
        }
        None => Ok(UserQuery::new(arg, DEFAULT_PORT)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let queries = args
        .servers
        .iter()
        .map(|s| parse_server(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    info!(
        "querying {} server(s), timeout {} ms",
        queries.len(),
        args.timeout_ms
    );

    let client = QueryClient::new(QueryOptions::with_timeout_ms(args.timeout_ms));
    let endpoints = client.query(queries).await.context("query run failed")?;

    println!("{}", serde_json::to_string_pretty(&endpoints)?);
    Ok(())
}
