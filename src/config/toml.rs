//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Cli, ExecutionMode};
use crate::config::cli_convert::{parse_duration_secs, parse_size};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Mode follows the execution mode; only the coordinator counts remotely
    match cli.mode {
        ExecutionMode::Coordinator => config.mode = Mode::Remote,
        ExecutionMode::Local | ExecutionMode::Benchmark => config.mode = Mode::Local,
        ExecutionMode::Worker | ExecutionMode::ChunkWorker => {}
    }

    // Override input
    if let Some(ref path) = cli.input {
        config.input.path = Some(path.clone());
        config.input.synthetic = None;
    }
    if let Some(count) = cli.generate {
        config.input.path = None;
        config.input.synthetic = Some(SyntheticConfig {
            count,
            max_value: default_max_value(),
            seed: 0,
        });
    }
    if let Some(ref mut synthetic) = config.input.synthetic {
        if let Some(max_value) = cli.max_value {
            synthetic.max_value = max_value;
        }
        if let Some(seed) = cli.seed {
            synthetic.seed = seed;
        }
    }

    // Override network settings
    if let Some(ref host) = cli.host {
        config.network.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(ref size) = cli.buffer_size {
        config.network.buffer_size = parse_size(size)?;
    }
    if let Some(ref timeout) = cli.timeout {
        config.network.io_timeout_secs = parse_duration_secs(timeout)?;
    }
    if let Some(ref timeout) = cli.accept_timeout {
        config.network.accept_timeout_secs = Some(parse_duration_secs(timeout)?);
    }
    if let Some(ref size) = cli.max_payload {
        config.network.max_payload_bytes = parse_size(size)?;
    }

    // Override worker settings
    if let Some(count) = cli.workers {
        config.workers.count = count;
    }
    if let Some(backend) = cli.backend {
        config.workers.backend = backend;
    }
    if let Some(threads) = cli.threads_per_process {
        config.workers.threads_per_process = threads;
    }
    if let Some(units) = cli.node_units {
        config.workers.node_units = Some(units);
    }

    // Override output settings
    if let Some(ref path) = cli.json {
        config.output.json = Some(path.clone());
    }
    if cli.no_per_worker {
        config.output.per_worker = false;
    }

    Ok(config)
}

/// Build the effective configuration: TOML file (if any) overridden by CLI flags
pub fn build_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    merge_cli_with_config(cli, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("primeshard").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
mode = "remote"

[network]
host = "0.0.0.0"
port = 7000
io_timeout_secs = 0

[workers]
count = 4
backend = "processes"

[input]
path = "/data/numbers.csv"
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.mode, Mode::Remote);
        assert_eq!(config.network.address(), "0.0.0.0:7000");
        assert_eq!(config.network.io_timeout(), None);
        assert_eq!(config.network.buffer_size, 65536);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.workers.backend, Backend::Processes);
        assert_eq!(config.input.path, Some(PathBuf::from("/data/numbers.csv")));
    }

    #[test]
    fn test_parse_toml_empty_uses_defaults() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config.mode, Mode::Local);
        assert_eq!(config.workers.count, 3);
        assert!(config.output.per_worker);
    }

    #[test]
    fn test_parse_toml_synthetic() {
        let toml = r#"
[input.synthetic]
count = 1000
seed = 42
"#;

        let config = parse_toml_string(toml).unwrap();
        let synthetic = config.input.synthetic.unwrap();
        assert_eq!(synthetic.count, 1000);
        assert_eq!(synthetic.seed, 42);
        assert_eq!(synthetic.max_value, 1_000_000);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_backend() {
        let toml = r#"
[workers]
backend = "gpu"
"#;
        assert!(parse_toml_string(toml).is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workers]\ncount = 7").unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.workers.count, 7);

        let err = parse_toml_file(Path::new("/nonexistent/primeshard.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = r#"
[network]
port = 7000
buffer_size = 1024

[workers]
count = 4
"#;
        let config = parse_toml_string(toml).unwrap();
        let cli = cli(&[
            "--mode",
            "coordinator",
            "-w",
            "2",
            "--port",
            "9000",
            "--timeout",
            "30s",
            "--max-payload",
            "16M",
        ]);

        let merged = merge_cli_with_config(&cli, config).unwrap();
        assert_eq!(merged.mode, Mode::Remote);
        assert_eq!(merged.workers.count, 2);
        assert_eq!(merged.network.port, 9000);
        assert_eq!(merged.network.buffer_size, 1024);
        assert_eq!(merged.network.io_timeout_secs, 30);
        assert_eq!(merged.network.max_payload_bytes, 16 << 20);
    }

    #[test]
    fn test_cli_generate_replaces_path() {
        let mut config = Config::default();
        config.input.path = Some(PathBuf::from("numbers.csv"));

        let merged = merge_cli_with_config(&cli(&["--generate", "50", "--seed", "9"]), config).unwrap();
        assert_eq!(merged.input.path, None);
        let synthetic = merged.input.synthetic.unwrap();
        assert_eq!(synthetic.count, 50);
        assert_eq!(synthetic.seed, 9);
    }

    #[test]
    fn test_cli_bad_timeout() {
        let result = merge_cli_with_config(&cli(&["--timeout", "forever"]), Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_build_config_without_file() {
        let config = build_config(&cli(&["--backend", "sequential", "--no-per-worker"])).unwrap();
        assert_eq!(config.workers.backend, Backend::Sequential);
        assert!(!config.output.per_worker);
    }
}
