//! Library behind the `pingsweep` binary: concurrent reachability sweeps
//! over IPv4/IPv6 networks using the platform's `ping` utility.
//!
//! The sweep engine expands a CIDR block into its usable host addresses,
//! fans one probe task out per host under a bounded concurrency limit, and
//! gathers a result list sorted by numeric address value. Each probe shells
//! out to the system ping and decides reachability purely from the child's
//! exit status; no raw sockets, no privileges, and deliberately no parsing
//! of ping's output (round-trip times are always absent from results).
//!
//! The flow is:
//!
//! 1. [`address::parse_network`] validates the CIDR and normalizes it to the
//!    containing network.
//! 2. [`scanner::Sweeper`] enumerates hosts via [`address::host_iter`],
//!    builds the platform-appropriate ping invocation and runs it
//!    ([`probe`]), retrying IPv6 targets once with `ping6` when the primary
//!    binary rejects the `-6` flag.
//! 3. [`report`] serializes the results as JSON or CSV and prints the
//!    console summary.
//!
//! ```no_run
//! use pingsweep::address::parse_network;
//! use pingsweep::scanner::Sweeper;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let network = parse_network("192.168.1.0/30")?;
//! let sweeper = Sweeper::new(network, 64, 1.0, 1, false);
//! for result in sweeper.run().await {
//!     println!("{} online={}", result.ip, result.online);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Individual probe failures (timeouts, missing binaries, non-zero exits)
//! never abort a sweep; they surface as `online=false` results with an
//! `error` field. The only fatal error is an unparseable network.
#![warn(missing_docs)]

pub mod address;

pub mod input;

pub mod probe;

pub mod report;

pub mod scanner;
