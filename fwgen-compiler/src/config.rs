// Configuration for fwgen code generation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "fwgen.json";

/// Code generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Directory the artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Source file holding the generated setup code
    #[serde(default = "default_main_file")]
    pub main_file: String,

    /// Header holding the collected defines
    #[serde(default = "default_defines_file")]
    pub defines_file: String,

    /// PlatformIO project file receiving `lib_deps`
    #[serde(default = "default_libraries_file")]
    pub libraries_file: String,

    /// Number of spaces for indentation inside `setup()`
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Colored diagnostics
    #[serde(default = "default_true")]
    pub color: bool,

    /// Report diagnostics as JSON
    #[serde(default)]
    pub json_diagnostics: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}
fn default_main_file() -> String {
    "main.cpp".to_string()
}
fn default_defines_file() -> String {
    "defines.h".to_string()
}
fn default_libraries_file() -> String {
    "platformio.ini".to_string()
}
fn default_indent() -> usize {
    2
}
fn default_true() -> bool {
    true
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            main_file: default_main_file(),
            defines_file: default_defines_file(),
            libraries_file: default_libraries_file(),
            indent: default_indent(),
            color: true,
            json_diagnostics: false,
        }
    }
}

impl CodegenConfig {
    /// Load configuration from a fwgen.json file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: CodegenConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from directory (searches for fwgen.json)
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut current = Some(dir.as_ref());
        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                log::debug!("using {}", config_path.display());
                return Self::from_file(config_path);
            }
            current = dir.parent();
        }

        // No config found, use defaults
        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Create example configuration file
    pub fn example() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::default())?)
    }

    pub fn main_path(&self) -> PathBuf {
        self.output_dir.join(&self.main_file)
    }

    pub fn defines_path(&self) -> PathBuf {
        self.output_dir.join(&self.defines_file)
    }

    pub fn libraries_path(&self) -> PathBuf {
        self.output_dir.join(&self.libraries_file)
    }
}
