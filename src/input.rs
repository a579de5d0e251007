//! Provides a means to read, parse and hold configuration options for sweeps.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pingsweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nARGS:\n{positionals}\n\nOPTIONS:\n{options}",
)]
/// Concurrent ping sweep for IPv4/IPv6 networks with JSON/CSV output.
/// Reachability is decided from the system ping's exit status; no root or
/// raw sockets required.
pub struct Opts {
    /// Target network in CIDR notation, e.g. 192.168.1.0/24 or 2001:db8::/64.
    pub network: String,

    /// Number of concurrent ping probes.
    #[arg(short, long, default_value = "200")]
    pub concurrency: usize,

    /// Per-host timeout in seconds.
    #[arg(short, long, default_value = "1.0")]
    pub timeout: f64,

    /// Echo request count per host.
    #[arg(long, default_value = "1")]
    pub count: u32,

    /// Keep only the hosts that answered in output and exports.
    #[arg(long)]
    pub only_online: bool,

    /// Write results as JSON to this file path.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write results as CSV to this file path.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Suppress console output (useful when only exporting).
    #[arg(short, long)]
    pub quiet: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,
}

impl Opts {
    /// Reads the command line arguments into an Opts struct.
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values found within the user configuration file into the
    /// command line arguments.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(concurrency, timeout, count, only_online, quiet);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(json, csv);
    }

    /// Checks the numeric parameters before any probing starts.
    ///
    /// These are sweep-wide configuration errors: the caller should print
    /// the message and bail with a usage exit code rather than start a
    /// partial sweep.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency < 1 {
            return Err("concurrency must be >= 1".to_owned());
        }
        if !(self.timeout > 0.0 && self.timeout.is_finite()) {
            return Err("timeout must be > 0".to_owned());
        }
        if self.count < 1 {
            return Err("count must be >= 1".to_owned());
        }
        Ok(())
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            network: String::new(),
            concurrency: 200,
            timeout: 1.0,
            count: 1,
            only_online: false,
            json: None,
            csv: None,
            quiet: false,
            no_config: true,
            config_path: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[derive(Debug, Deserialize)]
pub struct Config {
    concurrency: Option<usize>,
    timeout: Option<f64>,
    count: Option<u32>,
    only_online: Option<bool>,
    quiet: Option<bool>,
    json: Option<PathBuf>,
    csv: Option<PathBuf>,
}

impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// concurrency = 100
    /// timeout = 2.5
    /// count = 2
    /// only_online = true
    /// quiet = false
    /// csv = "sweep.csv"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = fs::read_to_string(config_path).unwrap_or_default();
        }

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("Found {e} in configuration file.\nAborting sweep.\n");
                std::process::exit(1);
            }
        }
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".pingsweep.toml");
    config_path
}
