use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::server::LaunchSpec;

/// Azurite Benchmark - compare blob-storage emulator implementations
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Path to the azurite-rs binary under test
    #[clap(long, default_value = crate::defaults::AZURITE_RS_BINARY)]
    pub binary: PathBuf,

    /// Path to the Azurite (Node.js) checkout used as the baseline
    #[clap(long, default_value = crate::defaults::AZURITE_DIR)]
    pub azurite: PathBuf,

    /// Number of operations per benchmark batch
    #[clap(long, default_value_t = crate::defaults::OPERATIONS)]
    pub operations: usize,

    /// Comma-separated blob payload sizes in bytes
    #[clap(long, value_delimiter = ',', default_value = crate::defaults::BLOB_SIZES)]
    pub blob_sizes: Vec<usize>,

    /// Comma-separated concurrency levels (client counts)
    #[clap(long, value_delimiter = ',', default_value = crate::defaults::CLIENTS)]
    pub clients: Vec<usize>,

    /// Only benchmark a single implementation
    #[clap(long, value_enum)]
    pub only: Option<Implementation>,

    /// Run protocol compatibility checks against each server before its
    /// benchmark pass
    #[clap(long, default_value_t = false)]
    pub verify: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Reject degenerate sweep parameters before any server is spawned.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.operations == 0 {
            anyhow::bail!("operation count cannot be zero");
        }
        if self.blob_sizes.is_empty() {
            anyhow::bail!("at least one blob size is required");
        }
        if let Some(&size) = self.blob_sizes.iter().find(|&&s| s == 0) {
            anyhow::bail!("blob size {} is invalid (must be non-zero)", size);
        }
        if self.clients.is_empty() {
            anyhow::bail!("at least one client count is required");
        }
        if let Some(&clients) = self.clients.iter().find(|&&c| c == 0) {
            anyhow::bail!("client count {} is invalid (must be non-zero)", clients);
        }
        Ok(())
    }
}

/// Emulator implementations the harness can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Implementation {
    /// The Rust emulator (candidate)
    #[clap(name = "azurite-rs")]
    AzuriteRs,

    /// The Node.js emulator (baseline)
    #[clap(name = "azurite")]
    Azurite,
}

impl Implementation {
    /// All implementations, candidate first. This is also the pass order of
    /// a full comparison run.
    pub fn all() -> [Implementation; 2] {
        [Implementation::AzuriteRs, Implementation::Azurite]
    }

    /// The label used in results and in the rendered report.
    pub fn label(&self) -> &'static str {
        match self {
            Implementation::AzuriteRs => "azurite-rs",
            Implementation::Azurite => "azurite",
        }
    }

    /// Build the launch description for this implementation.
    ///
    /// azurite-rs is a plain binary; Azurite is launched through `node`
    /// against its built blob entry point, with the API version check
    /// disabled since the harness pins no particular SDK version.
    pub fn launch_spec(&self, args: &Args) -> LaunchSpec {
        match self {
            Implementation::AzuriteRs => LaunchSpec {
                label: self.label().to_string(),
                program: args.binary.clone().into_os_string(),
                port_flag: "--blob-port".to_string(),
                extra_args: vec!["--in-memory".to_string(), "--silent".to_string()],
                cwd: None,
            },
            Implementation::Azurite => LaunchSpec {
                label: self.label().to_string(),
                program: "node".into(),
                port_flag: "--blobPort".to_string(),
                extra_args: vec![
                    args.azurite
                        .join("dist/src/blob/main.js")
                        .to_string_lossy()
                        .into_owned(),
                    "--inMemoryPersistence".to_string(),
                    "--silent".to_string(),
                    "--skipApiVersionCheck".to_string(),
                ],
                cwd: Some(args.azurite.clone()),
            },
        }
    }
}

impl std::fmt::Display for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["azurite-bench"]);
        assert_eq!(args.operations, 1000);
        assert_eq!(args.blob_sizes, vec![1024, 10240, 102400, 1048576]);
        assert_eq!(args.clients, vec![1, 4, 16]);
        assert_eq!(args.only, None);
        assert!(!args.verify);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_list_parsing() {
        let args = Args::parse_from([
            "azurite-bench",
            "--blob-sizes",
            "512,2048",
            "--clients",
            "2,8",
        ]);
        assert_eq!(args.blob_sizes, vec![512, 2048]);
        assert_eq!(args.clients, vec![2, 8]);
    }

    #[test]
    fn test_only_selector() {
        let args = Args::parse_from(["azurite-bench", "--only", "azurite-rs"]);
        assert_eq!(args.only, Some(Implementation::AzuriteRs));

        let args = Args::parse_from(["azurite-bench", "--only", "azurite"]);
        assert_eq!(args.only, Some(Implementation::Azurite));
    }

    #[test]
    fn test_validate_rejects_degenerate_sweeps() {
        let mut args = Args::parse_from(["azurite-bench"]);
        args.operations = 0;
        assert!(args.validate().is_err());

        let mut args = Args::parse_from(["azurite-bench"]);
        args.blob_sizes = vec![1024, 0];
        assert!(args.validate().is_err());

        let mut args = Args::parse_from(["azurite-bench"]);
        args.clients.clear();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_implementation_labels() {
        assert_eq!(Implementation::AzuriteRs.to_string(), "azurite-rs");
        assert_eq!(Implementation::Azurite.to_string(), "azurite");
    }

    #[test]
    fn test_launch_specs() {
        let args = Args::parse_from(["azurite-bench", "--azurite", "/opt/Azurite"]);

        let spec = Implementation::AzuriteRs.launch_spec(&args);
        assert_eq!(spec.port_flag, "--blob-port");
        assert!(spec.extra_args.contains(&"--in-memory".to_string()));
        assert!(spec.cwd.is_none());

        let spec = Implementation::Azurite.launch_spec(&args);
        assert_eq!(spec.program, "node");
        assert_eq!(spec.port_flag, "--blobPort");
        assert!(spec
            .extra_args
            .contains(&"--skipApiVersionCheck".to_string()));
        assert_eq!(spec.cwd.as_deref(), Some(std::path::Path::new("/opt/Azurite")));
    }
}
