//! Builds and executes system ping invocations.
//!
//! The probe never parses ping's stdout; reachability is decided from the
//! child's exit status alone, which keeps the probe portable across the
//! wildly different output formats of the platform ping implementations.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::process::Command;
use tokio::time;

/// Primary echo-utility binary name on every platform.
pub const PING_COMMAND: &str = "ping";
/// Alternate IPv6 binary used when `ping -6` is rejected on older unices.
pub const PING6_COMMAND: &str = "ping6";

/// Synthetic exit status for a child that outlived its wall-clock budget.
pub const STATUS_TIMEOUT: i32 = 124;
/// Synthetic exit status for a probe binary missing from `PATH`.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Synthetic exit status for any other launch failure.
pub const STATUS_LAUNCH_FAILURE: i32 = 1;

/// The one piece of real platform variance: which flags the local ping
/// accepts. Everything else in the sweep is platform-neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// `ping -n <count> -w <ms>`.
    Windows,
    /// `ping -c <count> -W <seconds>` (iputils).
    Linux,
    /// `ping -c <count> -W <ms>` (BSD-derived, including macOS).
    OtherUnix,
}

impl PlatformFamily {
    /// The family this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformFamily::Windows
        } else if cfg!(target_os = "linux") {
            PlatformFamily::Linux
        } else {
            PlatformFamily::OtherUnix
        }
    }

    /// Whether the `ping6` fallback is even worth considering here.
    pub fn is_unix_like(self) -> bool {
        self != PlatformFamily::Windows
    }
}

/// Builds the ping argument vector for one target.
///
/// Pure; nothing is executed. The target address is always the final
/// argument and the binary name is always [`PING_COMMAND`]; swapping in the
/// fallback binary is the orchestrator's call, not the builder's.
pub fn build_probe_command(
    platform: PlatformFamily,
    addr: IpAddr,
    count: u32,
    timeout_s: f64,
    prefer_ipv6: bool,
) -> Vec<String> {
    let timeout_ms = ((timeout_s * 1000.0).round() as u64).max(1);
    let timeout_s_floor = (timeout_s.floor() as u64).max(1);

    let mut argv = vec![PING_COMMAND.to_owned()];
    if prefer_ipv6 {
        argv.push("-6".to_owned());
    }

    match platform {
        PlatformFamily::Windows => {
            argv.extend([
                "-n".to_owned(),
                count.to_string(),
                "-w".to_owned(),
                timeout_ms.to_string(),
            ]);
        }
        PlatformFamily::Linux => {
            argv.extend([
                "-c".to_owned(),
                count.to_string(),
                "-W".to_owned(),
                timeout_s_floor.to_string(),
            ]);
        }
        PlatformFamily::OtherUnix => {
            argv.extend([
                "-c".to_owned(),
                count.to_string(),
                "-W".to_owned(),
                timeout_ms.to_string(),
            ]);
        }
    }

    argv.push(addr.to_string());
    argv
}

/// What a single probe attempt produced: an exit status (real or synthetic)
/// and whatever the child wrote to stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Exit status; `0` means the host answered.
    pub status: i32,
    /// Trimmed stderr, or a synthetic diagnostic for timeouts and launch
    /// failures. Empty on a clean success.
    pub diagnostic: String,
}

impl ProbeOutcome {
    fn launch_failure(kind: ErrorKind, error: &std::io::Error) -> Self {
        ProbeOutcome {
            status: STATUS_LAUNCH_FAILURE,
            diagnostic: format!("{kind}: {error}"),
        }
    }
}

/// Runs one probe invocation as a child process.
///
/// Stdout is discarded, stderr captured. The child gets `process_timeout` of
/// wall clock to finish; past that it is force-killed and the outcome is the
/// synthetic [`STATUS_TIMEOUT`]. Launch failures are folded into the outcome
/// as well, so this function never fails the sweep.
pub async fn run_probe(argv: &[String], process_timeout: Duration) -> ProbeOutcome {
    let Some((program, args)) = argv.split_first() else {
        return ProbeOutcome {
            status: STATUS_LAUNCH_FAILURE,
            diagnostic: "empty probe invocation".to_owned(),
        };
    };

    debug!("spawning {argv:?} with {process_timeout:?} budget");

    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        // Dropping the wait future on timeout must reap the child too.
        .kill_on_drop(true)
        .spawn();

    let child = match spawned {
        Ok(child) => child,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return ProbeOutcome {
                status: STATUS_NOT_FOUND,
                diagnostic: format!("command not found: {program}"),
            };
        }
        Err(error) => return ProbeOutcome::launch_failure(error.kind(), &error),
    };

    match time::timeout(process_timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => ProbeOutcome {
            // Signal-terminated children carry no code; treat as failure.
            status: output.status.code().unwrap_or(STATUS_LAUNCH_FAILURE),
            diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        },
        Ok(Err(error)) => ProbeOutcome::launch_failure(error.kind(), &error),
        Err(_) => ProbeOutcome {
            status: STATUS_TIMEOUT,
            diagnostic: "timeout".to_owned(),
        },
    }
}

/// Whether stderr looks like the binary rejected a flag rather than the host
/// being unreachable. Locale-sensitive by nature; see the project notes.
pub fn flag_rejected(diagnostic: &str) -> bool {
    let lowered = diagnostic.to_lowercase();
    ["usage", "unknown option", "invalid option"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// Checks `PATH` for an executable, ala `which`.
pub fn command_on_path(name: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    command_in_dirs(name, std::env::split_paths(&paths))
}

fn command_in_dirs(name: &str, dirs: impl IntoIterator<Item = std::path::PathBuf>) -> bool {
    dirs.into_iter().any(|dir| is_executable(&dir.join(name)))
}

// A file on PATH without the executable bit would spawn-fail, not run; do
// not let it trigger a doomed fallback attempt.
#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}
