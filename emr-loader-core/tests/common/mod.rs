//! Common test utilities for emr-loader-core tests.

use emr_loader_core::LoaderConfig;
use std::path::PathBuf;
use tempfile::TempDir;

/// Script files and a config pointing at them.
#[allow(dead_code)]
pub struct Fixture {
    /// Holds the scripts (kept alive for the test duration).
    _dir: TempDir,
    /// Local bootstrap script.
    pub bootstrap: PathBuf,
    /// Local setup script.
    pub setup: PathBuf,
    /// Path of the written config file.
    pub config_path: PathBuf,
}

#[allow(dead_code)]
impl Fixture {
    /// Write both scripts and a config file with `extra` appended under `emr`.
    pub fn new(extra: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let bootstrap = dir.path().join("bootstrap_actions.sh");
        let setup = dir.path().join("pyspark_quick_setup.sh");
        std::fs::write(&bootstrap, "#!/bin/bash\necho bootstrap\n").unwrap();
        std::fs::write(&setup, "#!/bin/bash\necho setup \"$1\"\n").unwrap();

        let yaml = format!(
            "emr:\n  \
             region_name: eu-west-1\n  \
             cluster_name: analytics\n  \
             instance_count: 3\n  \
             key_name: k1\n  \
             subnet_id: subnet-1\n  \
             software_version: emr-6.15.0\n  \
             script_bucket_name: scripts\n  \
             bootstrap_script: {}\n  \
             setup_script: {}\n{}",
            bootstrap.display(),
            setup.display(),
            extra
        );
        let config_path = dir.path().join("config.yml");
        std::fs::write(&config_path, yaml).unwrap();

        Self {
            _dir: dir,
            bootstrap,
            setup,
            config_path,
        }
    }

    /// Load the written config.
    pub fn config(&self) -> LoaderConfig {
        LoaderConfig::from_file(&self.config_path).expect("fixture config is valid")
    }
}
