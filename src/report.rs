//! Sweep result records, run metadata, and the JSON/CSV/console outputs.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_derive::Serialize;

/// Outcome for a single swept host. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingResult {
    /// The probed address.
    pub ip: IpAddr,
    /// Whether the final probe attempt exited with status 0.
    pub online: bool,
    /// Always `None`: the sweep decides reachability from exit status alone
    /// and deliberately never parses ping output for round-trip times.
    pub rtt_ms: Option<f64>,
    /// Diagnostic text for offline hosts, when the probe produced any.
    pub error: Option<String>,
}

/// Run-level context captured once at sweep start and attached unchanged to
/// every export.
#[derive(Debug, Clone, Serialize)]
pub struct SweepMetadata {
    /// Sweep start time.
    pub generated_at: DateTime<Utc>,
    /// The network argument as the user gave it.
    pub network: String,
    /// Per-host ping timeout in seconds.
    pub timeout_s: f64,
    /// Maximum in-flight probes.
    pub concurrency: usize,
    /// Echo requests per host.
    pub count: u32,
    /// OS and architecture this sweep ran on.
    pub platform: String,
}

impl SweepMetadata {
    /// Captures metadata for a sweep that is about to start.
    pub fn capture(network: &str, timeout_s: f64, concurrency: usize, count: u32) -> Self {
        Self {
            generated_at: Utc::now(),
            network: network.to_owned(),
            timeout_s,
            concurrency,
            count,
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

#[derive(Serialize)]
struct SweepReport<'a> {
    meta: &'a SweepMetadata,
    results: &'a [PingResult],
}

/// Writes the `{meta, results}` report as pretty-printed JSON.
pub fn write_json(path: &Path, meta: &SweepMetadata, results: &[PingResult]) -> io::Result<()> {
    let report = SweepReport { meta, results };
    let mut payload = serde_json::to_string_pretty(&report)?;
    payload.push('\n');
    fs::write(path, payload)
}

/// Writes the report as CSV: four `# key=value` comment lines for the
/// metadata, an `ip,online,rtt_ms,error` header, then one row per result.
/// `online` renders as `True`/`False` and `rtt_ms` stays empty.
pub fn write_csv(path: &Path, meta: &SweepMetadata, results: &[PingResult]) -> io::Result<()> {
    // Debug-format the timeout so whole numbers keep their decimal point
    // (`1.0`, not `1`), matching the JSON serialization of the same field.
    let mut out = format!(
        "# generated_at={}\n# network={}\n# timeout_s={:?}\n# concurrency={}\nip,online,rtt_ms,error\n",
        meta.generated_at.to_rfc3339(),
        meta.network,
        meta.timeout_s,
        meta.concurrency,
    );

    for result in results {
        let online = if result.online { "True" } else { "False" };
        let error = result.error.as_deref().unwrap_or("");
        out.push_str(&format!(
            "{},{},,{}\n",
            result.ip,
            online,
            csv_field(error)
        ));
    }

    fs::write(path, out)
}

/// Quotes a CSV field only when it needs it.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Prints the human summary: total online count, then one address per line
/// for the hosts that answered.
pub fn print_summary(network: &str, results: &[PingResult]) {
    let online: Vec<&PingResult> = results.iter().filter(|result| result.online).collect();

    println!("Network: {network}");
    println!("Online hosts: {}", online.len().to_string().green());
    for result in online {
        println!("{}", result.ip);
    }
}
