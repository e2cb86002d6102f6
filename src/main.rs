use anyhow::Context;
use clap::Parser;
use mentorgraph::config::{AppConfig, GraphBackend};
use mentorgraph::graph::{GraphAdmin, MemoryGraph, Neo4jGraph};
use mentorgraph::http::HttpServer;
use mentorgraph::{ModelRegistry, QaService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mentorgraph", version, about = "Question-answering server for the mentorship graph")]
struct Args {
    /// YAML configuration file; defaults apply when omitted
    #[arg(long, env = "MENTORGRAPH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Mentorgraph v{}", mentorgraph::version());

    let config = load_config(args.config.as_deref())?;
    let models = ModelRegistry::from_config(&config.models).context("configuring model backends")?;
    info!("Model backends: {:?}", models.available());

    match config.graph.backend {
        GraphBackend::Memory => {
            info!("Using in-memory graph");
            serve(Arc::new(MemoryGraph::new()), models, &config).await
        }
        GraphBackend::Neo4j => {
            info!("Using Neo4j at {}", config.graph.neo4j.url);
            let graph = Neo4jGraph::new(&config.graph.neo4j).context("connecting to Neo4j")?;
            serve(Arc::new(graph), models, &config).await
        }
    }
}

/// Config file if given, then environment overrides
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            AppConfig::load(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => AppConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

async fn serve<S: GraphAdmin + 'static>(store: Arc<S>, models: ModelRegistry, config: &AppConfig) -> anyhow::Result<()> {
    let service = Arc::new(
        QaService::start(store, models, config)
            .await
            .context("reading graph schema")?,
    );

    let server = HttpServer::new(Arc::clone(&service), &config.server.address, config.server.port);
    let result = server.start().await.map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e));

    if let Err(e) = service.close().await {
        warn!("Closing graph store: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_config_flag() {
        let args = Args::try_parse_from(["mentorgraph", "--config", "config.yaml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("config.yaml")));
    }

    #[test]
    fn test_help_is_not_a_config_path() {
        let err = Args::try_parse_from(["mentorgraph", "--help"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        // a bare argument is no longer taken as the config file
        assert!(Args::try_parse_from(["mentorgraph", "config.yaml"]).is_err());
    }
}
