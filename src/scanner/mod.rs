//! Core functionality for actual sweeping behaviour.
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::stream::{self, StreamExt};
use ipnet::IpNet;
use log::debug;

use crate::address::host_iter;
use crate::probe::{
    self, build_probe_command, run_probe, PlatformFamily, ProbeOutcome,
};
use crate::report::PingResult;

/// Extra wall clock granted past the ping's own timeout, so the utility gets
/// first chance to exit cleanly before we force-kill it.
const PROCESS_TIMEOUT_CUSHION_S: f64 = 0.5;

/// Probes a single host and owns the fallback policy.
#[derive(Debug)]
struct Prober {
    platform: PlatformFamily,
    count: u32,
    timeout_s: f64,
    process_timeout: Duration,
}

impl Prober {
    /// Probes one address and folds every possible failure into the result.
    ///
    /// The primary attempt uses `ping` (with `-6` for IPv6 targets). If an
    /// IPv6 probe on a Unix-like platform exits non-zero with stderr that
    /// smells like a rejected flag, and a `ping6` binary exists, one fallback
    /// attempt is made with the same flags and its outcome is authoritative.
    async fn probe(&self, ip: IpAddr) -> PingResult {
        let prefer_ipv6 = ip.is_ipv6();
        let argv =
            build_probe_command(self.platform, ip, self.count, self.timeout_s, prefer_ipv6);
        let mut outcome = run_probe(&argv, self.process_timeout).await;

        if prefer_ipv6 && self.should_fall_back(&outcome) {
            debug!("{ip}: `{}` rejected a flag, retrying with `{}`", argv[0], probe::PING6_COMMAND);
            let mut fallback = argv;
            fallback[0] = probe::PING6_COMMAND.to_owned();
            outcome = run_probe(&fallback, self.process_timeout).await;
        }

        let online = outcome.status == 0;
        let error = if online || outcome.diagnostic.is_empty() {
            None
        } else {
            Some(outcome.diagnostic)
        };

        PingResult {
            ip,
            online,
            rtt_ms: None,
            error,
        }
    }

    fn should_fall_back(&self, outcome: &ProbeOutcome) -> bool {
        self.platform.is_unix_like()
            && outcome.status != 0
            && probe::flag_rejected(&outcome.diagnostic)
            && probe::command_on_path(probe::PING6_COMMAND)
    }
}

/// Drives one sweep: enumerates the network's hosts, fans probes out under a
/// concurrency bound, and gathers a sorted result list.
#[derive(Debug)]
pub struct Sweeper {
    network: IpNet,
    concurrency: usize,
    only_online: bool,
    prober: Arc<Prober>,
}

impl Sweeper {
    /// Configures a sweep of `network`.
    ///
    /// `concurrency` bounds simultaneous in-flight probes (clamped to at
    /// least 1), `timeout_s` is the per-host ping timeout, `count` the echo
    /// requests per host. With `only_online` set, unreachable hosts are
    /// dropped from the result list.
    pub fn new(
        network: IpNet,
        concurrency: usize,
        timeout_s: f64,
        count: u32,
        only_online: bool,
    ) -> Self {
        Self {
            network,
            concurrency: concurrency.max(1),
            only_online,
            prober: Arc::new(Prober {
                platform: PlatformFamily::current(),
                count,
                timeout_s,
                process_timeout: Duration::from_secs_f64(
                    (timeout_s + PROCESS_TIMEOUT_CUSHION_S).max(1.0),
                ),
            }),
        }
    }

    /// Runs the sweep to completion.
    ///
    /// One task per enumerated host, at most `concurrency` holding a live
    /// child process at any instant; the rest queue. Individual probe
    /// failures become `online=false` results and never abort the sweep.
    /// Returns only after every task has finished, sorted by numeric address
    /// value.
    pub async fn run(&self) -> Vec<PingResult> {
        debug!(
            "sweeping {} with at most {} in-flight probes",
            self.network, self.concurrency
        );

        let only_online = self.only_online;
        let mut results: Vec<PingResult> = stream::iter(host_iter(self.network))
            .map(|ip| {
                let prober = Arc::clone(&self.prober);
                async move { prober.probe(ip).await }
            })
            .buffer_unordered(self.concurrency)
            .filter(|result| future::ready(!only_online || result.online))
            .collect()
            .await;

        debug!("sweep of {} finished with {} results", self.network, results.len());

        // Completion order is scheduler noise; the contract is numeric order.
        results.sort_unstable_by_key(|result| result.ip);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::parse_network;

    fn sweeper(network: &str, only_online: bool) -> Sweeper {
        Sweeper::new(parse_network(network).unwrap(), 4, 0.2, 1, only_online)
    }

    #[tokio::test]
    async fn loopback_sweep_yields_one_result_per_host() {
        let results = sweeper("127.0.0.0/30", false).run().await;

        let ips: Vec<IpAddr> = results.iter().map(|r| r.ip).collect();
        assert_eq!(
            ips,
            vec![
                "127.0.0.1".parse::<IpAddr>().unwrap(),
                "127.0.0.2".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn results_are_sorted_and_unique() {
        let results = sweeper("127.0.0.0/29", false).run().await;

        assert_eq!(results.len(), 6);
        assert!(results.windows(2).all(|pair| pair[0].ip < pair[1].ip));
    }

    #[tokio::test]
    async fn only_online_filter_never_leaks_offline_hosts() {
        let results = sweeper("127.0.0.0/30", true).run().await;

        assert!(results.iter().all(|r| r.online));
    }

    #[tokio::test]
    async fn rtt_is_always_absent() {
        let results = sweeper("127.0.0.1/32", false).run().await;

        assert_eq!(results.len(), 1);
        assert!(results[0].rtt_ms.is_none());
    }

    #[tokio::test]
    async fn ipv6_single_host_sweep_completes() {
        // Whether ::1 answers depends on the environment; the contract is
        // one result either way.
        let results = sweeper("::1/128", false).run().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ip, "::1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_not_deadlocked() {
        let results = Sweeper::new(parse_network("127.0.0.1/32").unwrap(), 0, 0.2, 1, false)
            .run()
            .await;

        assert_eq!(results.len(), 1);
    }

    #[test]
    fn fallback_requires_a_flag_rejection() {
        let prober = Prober {
            platform: PlatformFamily::Linux,
            count: 1,
            timeout_s: 1.0,
            process_timeout: Duration::from_secs(1),
        };

        let success = ProbeOutcome {
            status: 0,
            diagnostic: String::new(),
        };
        assert!(!prober.should_fall_back(&success));

        let unreachable = ProbeOutcome {
            status: 1,
            diagnostic: "ping: connect: Network is unreachable".to_owned(),
        };
        assert!(!prober.should_fall_back(&unreachable));
    }

    // These drive the sweep against stub ping binaries planted on PATH, so
    // they exercise the real spawn path without touching the network.
    #[cfg(unix)]
    mod stub_ping {
        use super::*;
        use std::ffi::OsString;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use std::sync::{Mutex, PoisonError};

        // PATH is process-global; tests that rewrite it take turns.
        static PATH_LOCK: Mutex<()> = Mutex::new(());

        struct PathOverride {
            saved: OsString,
        }

        impl PathOverride {
            fn prepend(dir: &Path) -> Self {
                let saved = std::env::var_os("PATH").unwrap_or_default();
                let mut paths = vec![dir.to_path_buf()];
                paths.extend(std::env::split_paths(&saved));
                std::env::set_var("PATH", std::env::join_paths(paths).unwrap());
                Self { saved }
            }
        }

        impl Drop for PathOverride {
            fn drop(&mut self) {
                std::env::set_var("PATH", &self.saved);
            }
        }

        fn scratch_dir(name: &str) -> PathBuf {
            let dir = std::env::temp_dir()
                .join(format!("pingsweep-stub-{}-{name}", std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            dir
        }

        fn write_stub(dir: &Path, name: &str, body: &str) {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        #[tokio::test]
        async fn rejected_ipv6_flag_falls_back_to_ping6_exactly_once() {
            let _turn = PATH_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let dir = scratch_dir("fallback");
            let calls = dir.join("calls");
            write_stub(
                &dir,
                "ping",
                &format!(
                    "echo \"ping: invalid option -- '6'\" >&2\necho ping >> {}\nexit 2",
                    calls.display()
                ),
            );
            write_stub(
                &dir,
                "ping6",
                &format!("echo ping6 >> {}\nexit 0", calls.display()),
            );
            let _path = PathOverride::prepend(&dir);

            let results = Sweeper::new(parse_network("2001:db8::1/128").unwrap(), 1, 0.2, 1, false)
                .run()
                .await;

            // The second attempt's success is authoritative.
            assert_eq!(results.len(), 1);
            assert!(results[0].online);
            assert!(results[0].error.is_none());

            let log = fs::read_to_string(&calls).unwrap();
            assert_eq!(log.lines().filter(|line| *line == "ping").count(), 1);
            assert_eq!(log.lines().filter(|line| *line == "ping6").count(), 1);

            let _ = fs::remove_dir_all(&dir);
        }

        #[tokio::test]
        async fn ipv4_probes_never_fall_back() {
            let _turn = PATH_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let dir = scratch_dir("no-fallback");
            let calls = dir.join("calls");
            write_stub(
                &dir,
                "ping",
                &format!("echo usage >&2\necho ping >> {}\nexit 2", calls.display()),
            );
            write_stub(
                &dir,
                "ping6",
                &format!("echo ping6 >> {}\nexit 0", calls.display()),
            );
            let _path = PathOverride::prepend(&dir);

            let results = Sweeper::new(parse_network("10.99.0.1/32").unwrap(), 1, 0.2, 1, false)
                .run()
                .await;

            assert_eq!(results.len(), 1);
            assert!(!results[0].online);
            assert_eq!(results[0].error.as_deref(), Some("usage"));

            let log = fs::read_to_string(&calls).unwrap();
            assert_eq!(log.lines().filter(|line| *line == "ping").count(), 1);
            assert_eq!(log.lines().filter(|line| *line == "ping6").count(), 0);

            let _ = fs::remove_dir_all(&dir);
        }

        #[tokio::test]
        async fn in_flight_probes_never_exceed_the_concurrency_bound() {
            let _turn = PATH_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let dir = scratch_dir("bound");
            let live = dir.join("live");
            fs::create_dir_all(&live).unwrap();
            let counts = dir.join("counts");
            // Each stub marks itself live, samples how many are live with
            // it, lingers, then unmarks. A marker only exists while its
            // probe's child process does, so no sample can exceed the gate.
            write_stub(
                &dir,
                "ping",
                &format!(
                    "touch {live}/live.$$\nls {live} | wc -l >> {counts}\nsleep 0.3\nrm -f {live}/live.$$\nexit 0",
                    live = live.display(),
                    counts = counts.display()
                ),
            );
            let _path = PathOverride::prepend(&dir);

            let results = Sweeper::new(parse_network("10.99.0.0/29").unwrap(), 2, 0.2, 1, false)
                .run()
                .await;
            assert_eq!(results.len(), 6);

            let observed: Vec<usize> = fs::read_to_string(&counts)
                .unwrap()
                .lines()
                .map(|line| line.trim().parse().unwrap())
                .collect();
            assert_eq!(observed.len(), 6);
            assert!(
                observed.iter().all(|&n| (1..=2).contains(&n)),
                "live-probe samples exceeded the bound: {observed:?}"
            );

            let _ = fs::remove_dir_all(&dir);
        }
    }

    #[test]
    fn fallback_never_fires_on_windows() {
        let prober = Prober {
            platform: PlatformFamily::Windows,
            count: 1,
            timeout_s: 1.0,
            process_timeout: Duration::from_secs(1),
        };

        let rejected = ProbeOutcome {
            status: 2,
            diagnostic: "ping: invalid option -- '6'".to_owned(),
        };
        assert!(!prober.should_fall_back(&rejected));
    }
}
