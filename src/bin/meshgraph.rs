//! Meshgraph CLI: build and render a traffic graph from a YAML fixture.
//!
//! Usage:
//!   meshgraph --fixture mesh.yaml --namespace bookinfo [--graph-type workload]

use clap::Parser;
use meshgraph::appender::AggregateOptions;
use meshgraph::{render, GraphConfig, GraphEngine, GraphRequest, GraphType, RenderOptions, StaticFixture};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshgraph", version, about = "Service-mesh traffic graph builder")]
struct Cli {
    /// YAML fixture with workloads, mesh config, service entries, health and metric samples
    #[arg(long)]
    fixture: PathBuf,
    /// Engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Namespace to graph (repeatable)
    #[arg(long = "namespace", short = 'n', required = true)]
    namespaces: Vec<String>,
    /// One of app, service, versionedApp, workload
    #[arg(long, default_value = "versionedApp")]
    graph_type: GraphType,
    /// Comma-separated appender names; the default set when omitted
    #[arg(long, value_delimiter = ',')]
    appenders: Option<Vec<String>>,
    #[arg(long)]
    inject_services: bool,
    #[arg(long)]
    include_istio: bool,
    #[arg(long)]
    group_by_version: bool,
    /// Request label for the aggregateNode appender
    #[arg(long)]
    aggregate: Option<String>,
    /// Only aggregate requests carrying this label value
    #[arg(long, requires = "aggregate")]
    aggregate_value: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => GraphConfig::load(path)?,
        None => GraphConfig::default(),
    };
    let fixture = StaticFixture::from_yaml_str(&std::fs::read_to_string(&cli.fixture)?)?;
    let engine = GraphEngine::new(fixture.into_sources(), config);

    let mut request = GraphRequest::new(cli.graph_type, chrono::Utc::now())
        .with_service_injection(cli.inject_services)
        .with_istio(cli.include_istio);
    for ns in &cli.namespaces {
        request = request.with_namespace(ns.as_str());
    }
    if let Some(names) = cli.appenders {
        request = request.with_appenders(names);
    }
    if let Some(label) = cli.aggregate {
        let mut aggregate = AggregateOptions::new(label);
        if let Some(value) = cli.aggregate_value {
            aggregate = aggregate.with_value(value);
        }
        request = request.with_aggregate(aggregate);
    }

    let traffic = engine.build(&request).await?;
    let options = RenderOptions::from_request(&request).with_group_by_version(cli.group_by_version);
    println!("{}", render(&traffic, &options).to_json()?);
    Ok(())
}
