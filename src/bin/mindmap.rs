//! Mindmap CLI: serve the HTTP API or run one step from the command line.
//!
//! Usage:
//!   mindmap serve [--bind addr]
//!   mindmap extract <file> [--out path]
//!   mindmap verify <concept>
//!   mindmap regenerate <concept>
//!   mindmap export <graph.json> --format pdf|jpeg [--out path]

use clap::{Parser, Subcommand};
use mindmap::document::{TextExtractor, Utf8Extractor};
use mindmap::llm::AnthropicModel;
use mindmap::server::{self, AppState};
use mindmap::{Config, ExportFormat, Exporter, Gateways, Graph, Upload};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Parser)]
#[command(
    name = "mindmap",
    version,
    about = "Turn medical documents into verifiable concept maps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to config file (defaults to <config dir>/mindmap/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on, overriding the config
        #[arg(long)]
        bind: Option<String>,
    },
    /// Extract a concept map from a document
    Extract {
        /// PDF, or .txt for plain text
        file: PathBuf,
        /// Write the graph JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fact-check a concept
    Verify {
        concept: String,
    },
    /// Ask for a more precise label for a concept
    Regenerate {
        concept: String,
    },
    /// Render a graph JSON file to PDF or JPEG
    Export {
        /// Graph JSON as produced by `extract`
        graph: PathBuf,
        #[arg(long, default_value = "pdf")]
        format: ExportFormat,
        /// Output path (defaults to mindmap.pdf / mindmap.jpg)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn runtime() -> Result<Runtime, String> {
    Runtime::new().map_err(|e| format!("cannot start async runtime: {}", e))
}

fn gateways(config: &Config) -> Gateways {
    let model = AnthropicModel::new(config.model.anthropic_settings());
    Gateways::new(Arc::new(model), config.model.budgets)
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_serve(config: &Config, bind: Option<String>) -> i32 {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = match bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Error: invalid bind address '{}': {}", bind, e);
            return 1;
        }
    };
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    rt.block_on(server::run_server(state, addr));
    0
}

fn cmd_extract(config: &Config, file: &Path, out: Option<&Path>) -> i32 {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    let is_text = file
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    let extractor: Box<dyn TextExtractor> = if is_text {
        Box::new(Utf8Extractor)
    } else {
        let upload = Upload::new(file.to_string_lossy(), None, bytes.clone());
        if let Err(e) = upload.ensure_pdf() {
            eprintln!("Error: {}", e);
            return 1;
        }
        config.document.extractor.build()
    };

    let text = match extractor.extract_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let graph = match rt.block_on(gateways(config).extraction.extract(&text)) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match out {
        Some(path) => {
            let json = match serde_json::to_string_pretty(&graph) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("Error: cannot write '{}': {}", path.display(), e);
                return 1;
            }
            println!(
                "Extracted {} concepts and {} connections to {}",
                graph.node_count(),
                graph.edge_count(),
                path.display()
            );
            0
        }
        None => print_json(&graph),
    }
}

fn cmd_verify(config: &Config, concept: &str) -> i32 {
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match rt.block_on(gateways(config).verification.verify(concept)) {
        Ok(result) => print_json(&result),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_regenerate(config: &Config, concept: &str) -> i32 {
    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match rt.block_on(gateways(config).regeneration.regenerate(concept)) {
        Ok(suggestion) => print_json(&serde_json::json!({ "suggestion": suggestion })),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_export(config: &Config, graph_path: &Path, format: ExportFormat, out: Option<PathBuf>) -> i32 {
    let text = match std::fs::read_to_string(graph_path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", graph_path.display(), e);
            return 1;
        }
    };
    let graph: Graph = match serde_json::from_str(&text) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error: invalid graph JSON: {}", e);
            return 1;
        }
    };
    let exporter = match Exporter::new(config.export.clone()) {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let bytes = match exporter.export(&graph, format) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let out = out.unwrap_or_else(|| PathBuf::from(format.file_name()));
    match std::fs::write(&out, bytes) {
        Ok(()) => {
            println!("Wrote {}", out.display());
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write '{}': {}", out.display(), e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    let code = match cli.command {
        Commands::Serve { bind } => cmd_serve(&config, bind),
        Commands::Extract { file, out } => cmd_extract(&config, &file, out.as_deref()),
        Commands::Verify { concept } => cmd_verify(&config, &concept),
        Commands::Regenerate { concept } => cmd_regenerate(&config, &concept),
        Commands::Export { graph, format, out } => cmd_export(&config, &graph, format, out),
    };
    std::process::exit(code);
}
