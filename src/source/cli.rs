use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::{fingerprint, OrderSource, SourceOutput};
use crate::logging::{debug, log_fetch, obj, v_str, warn, Domain};
use crate::table::COLUMN_SEPARATOR;

/// Runs the marketplace CLI and captures its table output.
pub struct CliSource {
    bin: String,
    args: Vec<String>,
}

impl CliSource {
    pub fn new(bin: String, args: Vec<String>) -> Self {
        Self { bin, args }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.bin.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl OrderSource for CliSource {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn fetch(&self) -> Result<SourceOutput> {
        let cmdline = self.command_line();
        debug(Domain::Source, "spawn", obj(&[("command", v_str(&cmdline))]));

        let output = Command::new(&self.bin)
            .args(&self.args)
            .output()
            .await
            .with_context(|| format!("failed to run `{}`", cmdline))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            if !stdout.contains(COLUMN_SEPARATOR) {
                bail!("`{}` exited with {}: {}", cmdline, code, stderr.trim());
            }
            warn(
                Domain::Source,
                "nonzero_exit",
                obj(&[
                    ("msg", v_str(stderr.trim())),
                    ("command", v_str(&cmdline)),
                    ("code", v_str(&code)),
                ]),
            );
        } else if !stderr.trim().is_empty() {
            debug(Domain::Source, "stderr", obj(&[("msg", v_str(stderr.trim()))]));
        }

        log_fetch(self.name(), output.stdout.len(), &fingerprint(&output.stdout));
        Ok(SourceOutput::Table(stdout))
    }
}
