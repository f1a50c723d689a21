//! One-shot gateway call.

use std::io::Write;
use std::time::Duration;

use claw_link::ConnectionConfig;
use tracing::info;

use crate::cli::CallArgs;
use crate::commands::{open, parse_params};
use crate::error::CliError;
use crate::output::{CallResult, OutputFormat};

/// Call command executor.
pub struct CallCommand {
    config: ConnectionConfig,
    connect_timeout: Duration,
}

impl CallCommand {
    /// Create a new call command.
    #[must_use]
    pub const fn new(config: ConnectionConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }

    /// Invoke `args.method` and print the final response.
    ///
    /// Interim "accepted" acknowledgments are absorbed by the connection;
    /// only the terminal payload is printed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are not JSON, the connection fails,
    /// the gateway answers with an error, or the timeout expires.
    pub async fn execute<W: Write>(
        self,
        writer: &mut W,
        format: &OutputFormat,
        args: &CallArgs,
    ) -> Result<(), CliError> {
        let params = parse_params(args.params.as_deref())?;
        let mut config = self.config;
        if let Some(secs) = args.timeout {
            if secs == 0 {
                return Err(CliError::InvalidArgument("--timeout must be positive".to_string()));
            }
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        let conn = open(config, self.connect_timeout).await?;
        info!(method = %args.method, "calling gateway method");
        let outcome = conn.request(&args.method, params).await;
        conn.stop().await?;

        let result = CallResult {
            method: args.method.clone(),
            result: outcome?,
        };
        format.write(writer, &result)
    }
}
