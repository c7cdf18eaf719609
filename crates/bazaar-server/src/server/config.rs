use crate::server::{
    module::EngineConfig,
    pool::{WorkerPool, manager::shutdown_timeout_for},
};
use anyhow::{Context, bail};
use bazaar_core::Marketplace;
use clap::Parser;
use core::time::Duration;
use std::net::SocketAddr;

/// Runtime configuration for the `bazaar-server` binary.
///
/// Every value can be given as a CLI flag or an environment variable (a
/// `.env` file is loaded first). Defaults are suitable for a single host.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bazaar-server",
    version,
    about = "Aggregates marketplace offers over a concurrent worker pool"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Number of long-lived workers executing provider calls.
    ///
    /// Defaults to four workers per available CPU, since jobs spend most of
    /// their time waiting on the network.
    ///
    /// Environment variable: `MAX_WORKERS`
    #[arg(long, env = "MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Deadline for a single provider call, in milliseconds. A call that
    /// overruns it is reported as a failed provider result.
    ///
    /// Environment variable: `JOB_TIMEOUT_MS`
    #[arg(long, env = "JOB_TIMEOUT_MS", default_value_t = 10_000)]
    pub job_timeout_ms: u64,

    /// Seconds each worker is given to finish its in-flight job during
    /// shutdown before it is aborted. Defaults to the job timeout plus one
    /// second.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: Option<u64>,

    /// Marketplaces queried for `us` requests, comma separated.
    ///
    /// Environment variable: `MARKETPLACE_PROVIDERS`
    #[arg(
        long,
        env = "MARKETPLACE_PROVIDERS",
        default_value = "walmart.com,bestbuy.com,ebay.com,amazon.com"
    )]
    pub marketplace_providers: String,

    /// Marketplaces queried for `ca` requests, comma separated.
    ///
    /// Environment variable: `MARKETPLACE_PROVIDERS_CANADA`
    #[arg(
        long,
        env = "MARKETPLACE_PROVIDERS_CANADA",
        default_value = "walmart.com,bestbuy.com"
    )]
    pub marketplace_providers_canada: String,

    /// Initial capacity of the aggregated offer list.
    ///
    /// Environment variable: `DEFAULT_OFFER_LIST_CAPACITY`
    #[arg(long, env = "DEFAULT_OFFER_LIST_CAPACITY", default_value_t = 100)]
    pub default_offer_list_capacity: usize,

    /// Translation endpoint per marketplace as `token=url` pairs, e.g.
    /// `walmart.com=http://walmart-adapter:8000`.
    ///
    /// Marketplaces without an endpoint are skipped at request time.
    ///
    /// Environment variable: `PROVIDER_ENDPOINTS`
    #[arg(long, env = "PROVIDER_ENDPOINTS", value_delimiter = ',')]
    pub provider_endpoints: Vec<String>,

    /// Timeout for a single outbound HTTP request, in milliseconds.
    ///
    /// Environment variable: `PROVIDER_HTTP_TIMEOUT_MS`
    #[arg(long, env = "PROVIDER_HTTP_TIMEOUT_MS", default_value_t = 8_000)]
    pub provider_http_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub max_workers: usize,
    pub job_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub providers_us: Vec<Marketplace>,
    pub providers_ca: Vec<Marketplace>,
    pub offer_list_capacity: usize,
    pub endpoints: Vec<(Marketplace, String)>,
    pub provider_http_timeout: Duration,
}

impl ServerConfig {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_workers: self.max_workers,
            job_timeout: self.job_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr: SocketAddr = args
            .server_addr
            .parse()
            .with_context(|| format!("SERVER_ADDR is not a socket address: {}", args.server_addr))?;

        let max_workers = args.max_workers.unwrap_or_else(WorkerPool::default_size);
        if max_workers == 0 {
            bail!("MAX_WORKERS must be greater than 0");
        }
        if args.job_timeout_ms == 0 {
            bail!("JOB_TIMEOUT_MS must be greater than 0");
        }
        if args.shutdown_timeout == Some(0) {
            bail!("SHUTDOWN_TIMEOUT must be greater than 0");
        }
        if args.provider_http_timeout_ms == 0 {
            bail!("PROVIDER_HTTP_TIMEOUT_MS must be greater than 0");
        }

        let providers_us = Marketplace::parse_list(&args.marketplace_providers)
            .context("invalid MARKETPLACE_PROVIDERS")?;
        let providers_ca = Marketplace::parse_list(&args.marketplace_providers_canada)
            .context("invalid MARKETPLACE_PROVIDERS_CANADA")?;

        let mut endpoints = Vec::with_capacity(args.provider_endpoints.len());
        for pair in args.provider_endpoints.iter().map(|p| p.trim()) {
            if pair.is_empty() {
                continue;
            }
            let Some((token, url)) = pair.split_once('=') else {
                bail!("PROVIDER_ENDPOINTS entry `{pair}` is not of the form token=url");
            };
            let marketplace: Marketplace = token
                .parse()
                .with_context(|| format!("invalid PROVIDER_ENDPOINTS entry `{pair}`"))?;
            if endpoints.iter().any(|(m, _)| *m == marketplace) {
                bail!("PROVIDER_ENDPOINTS lists {marketplace} more than once");
            }
            endpoints.push((marketplace, url.trim().to_string()));
        }

        let job_timeout = Duration::from_millis(args.job_timeout_ms);
        let shutdown_timeout = args
            .shutdown_timeout
            .map_or_else(|| shutdown_timeout_for(job_timeout), Duration::from_secs);

        Ok(Self {
            server_addr,
            max_workers,
            job_timeout,
            shutdown_timeout,
            providers_us,
            providers_ca,
            offer_list_capacity: args.default_offer_list_capacity,
            endpoints,
            provider_http_timeout: Duration::from_millis(args.provider_http_timeout_ms),
        })
    }
}
