//! zkaudit-bridge
//!
//! One command per invocation. The JSON response goes to stdout, logs go to
//! stderr. Unparseable arguments print a JSON error to stderr and exit 1.

use std::ffi::OsString;
use std::io::Write;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zkaudit_bridge::{error_response, Bridge, BridgeConfig, BridgeError};

const DEFAULT_LOG_FILTER: &str = "zkaudit_bridge=info,zkaudit_wallet=info,zkaudit_ledger=info";

#[derive(Parser)]
#[command(
    name = "zkaudit-bridge",
    about = "Deploy, join and submit audits to the zkaudit ledger"
)]
struct Cli {
    /// init, submit_audit, query_audit, get_ledger, network_health,
    /// wallet_balance, wallet_address or query_transaction.
    operation: String,
    /// JSON payload for the operation.
    #[arg(default_value = "{}")]
    payload: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("ZKAUDIT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Parse the command line and its JSON payload. Help and version requests
/// exit through clap as usual; any other bad input becomes a validation error.
fn parse_args<I, T>(args: I) -> Result<(Cli, serde_json::Value), BridgeError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => return Err(BridgeError::Validation(e.to_string().trim_end().to_string())),
    };
    let payload = serde_json::from_str(&cli.payload)
        .map_err(|e| BridgeError::Validation(format!("invalid JSON payload: {e}")))?;
    Ok((cli, payload))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let (cli, payload) = match parse_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", error_response(e));
            std::process::exit(1);
        }
    };

    let response = match BridgeConfig::from_env().and_then(Bridge::from_config) {
        Ok(bridge) => {
            info!(operation = %cli.operation, environment = %bridge.config().environment, "running command");
            bridge.handle(&cli.operation, payload).await
        }
        Err(e) => error_response(e),
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{response}").context("failed to write response")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_to_empty_object() {
        let (cli, payload) = parse_args(["zkaudit-bridge", "get_ledger"]).unwrap();
        assert_eq!(cli.operation, "get_ledger");
        assert_eq!(payload, serde_json::json!({}));
    }

    #[test]
    fn missing_operation_is_a_validation_error() {
        let err = parse_args(["zkaudit-bridge"]).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");

        let response = error_response(err);
        assert_eq!(response["success"], false);
        assert_eq!(response["error_kind"], "ValidationError");
        assert!(response["error"].as_str().unwrap().contains("<OPERATION>"), "{response}");
    }

    #[test]
    fn unexpected_argument_is_a_validation_error() {
        let err = parse_args(["zkaudit-bridge", "init", "{}", "extra"]).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn malformed_payload_is_a_validation_error() {
        let err = parse_args(["zkaudit-bridge", "init", "{mode:"]).err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("invalid JSON payload"), "{err}");
    }
}
