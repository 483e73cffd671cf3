use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use netlab::config_loader::{build_lab, load_config};
use netlab::reachability::reachability_matrix;
use netlab::report::{run_queries, LabReport};
use netlab::routing::auto_generate_routes;

/// Topology and reachability engine for networking labs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the lab YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Write a JSON report to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Evaluate every ordered pair of devices
    #[arg(long)]
    matrix: bool,

    /// Generate routing tables for every router and include them in the report
    #[arg(long)]
    routes: bool,
}

/// Log level named in the lab file, if it has one. Read ahead of the full
/// load so the logger is configured before loading starts.
fn lab_log_level(config_path: &Path) -> Option<String> {
    let content = fs::read_to_string(config_path).ok()?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
    value
        .get("general")?
        .get("log_level")?
        .as_str()
        .map(|level| level.to_ascii_lowercase())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // RUST_LOG wins over the lab file, which wins over "info"
    let default_level = lab_log_level(&args.config).unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Starting netlab");
    info!("Lab file: {:?}", args.config);

    let config = load_config(&args.config)?;
    let mut topology = build_lab(&config)?;

    if args.routes {
        let routers: Vec<String> = topology
            .devices()
            .filter(|device| device.is_router())
            .map(|device| device.id().to_string())
            .collect();
        for router in &routers {
            auto_generate_routes(&mut topology, router)?;
        }
        topology.refresh_connection_kinds();
    }

    let queries = run_queries(&topology, &config.queries)?;
    let mut report = LabReport::new(&topology, queries);

    if args.routes || config.general.auto_routes {
        report = report.with_routing_tables(&topology);
    }

    if args.matrix {
        report = report.with_matrix(reachability_matrix(&topology));
    }

    report.log_summary();

    if let Some(output) = &args.output {
        report.write_json(output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["netlab", "--config", "lab.yaml"]);
        assert_eq!(args.config, PathBuf::from("lab.yaml"));
        assert!(args.output.is_none());
        assert!(!args.matrix);
        assert!(!args.routes);
    }

    #[test]
    fn test_report_args() {
        let args = Args::parse_from([
            "netlab",
            "-c",
            "lab.yaml",
            "--output",
            "report.json",
            "--matrix",
            "--routes",
        ]);
        assert_eq!(args.output, Some(PathBuf::from("report.json")));
        assert!(args.matrix);
        assert!(args.routes);
    }

    #[test]
    fn test_config_is_required() {
        assert!(Args::try_parse_from(["netlab"]).is_err());
    }

    #[test]
    fn test_lab_log_level() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        write!(temp_file, "general:\n  log_level: DEBUG\ndevices: []\n").unwrap();
        assert_eq!(lab_log_level(temp_file.path()), Some("debug".to_string()));
        assert_eq!(lab_log_level(Path::new("/nonexistent/lab.yaml")), None);
    }
}
