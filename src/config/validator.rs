//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
///
/// `needs_input` is false for modes that receive their data over the wire.
pub fn validate_config(config: &Config, needs_input: bool) -> Result<()> {
    validate_network(&config.network)?;
    validate_workers(&config.workers)?;
    if needs_input {
        validate_input(&config.input)?;
    }

    Ok(())
}

/// Validate network configuration
pub fn validate_network(network: &NetworkConfig) -> Result<()> {
    if network.host.trim().is_empty() {
        anyhow::bail!("host must not be empty");
    }

    if network.buffer_size == 0 {
        anyhow::bail!("buffer_size must be at least 1");
    }

    if network.max_payload_bytes == 0 {
        anyhow::bail!("max_payload_bytes must be at least 1");
    }

    if network.accept_timeout_secs == Some(0) {
        anyhow::bail!("accept_timeout_secs must be at least 1 (omit it to wait forever)");
    }

    Ok(())
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 {
        anyhow::bail!("workers.count must be at least 1");
    }

    if workers.threads_per_process == 0 {
        anyhow::bail!("threads_per_process must be at least 1");
    }

    if workers.node_units == Some(0) {
        anyhow::bail!("node_units must be at least 1");
    }

    Ok(())
}

/// Validate input configuration
pub fn validate_input(input: &InputConfig) -> Result<()> {
    match (&input.path, &input.synthetic) {
        (None, None) => {
            anyhow::bail!("no input given: pass an INPUT file, --generate, or an [input] section")
        }
        (Some(_), Some(_)) => anyhow::bail!("input.path and input.synthetic are mutually exclusive"),
        (None, Some(synthetic)) => {
            if synthetic.max_value <= 0 {
                anyhow::bail!("synthetic max_value must be positive, got {}", synthetic.max_value);
            }
            Ok(())
        }
        (Some(_), None) => Ok(()),
    }
}
