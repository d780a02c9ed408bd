//! Locating the ffmpeg executable.
//!
//! Discovery happens once at startup. A configured path wins when it points
//! at an existing file; otherwise `PATH` is searched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cafconvert_core::config::ToolsConfig;
use cafconvert_core::{Error, Result};
use serde::{Deserialize, Serialize};

const KNOWN_TOOLS: &[&str] = &["ffmpeg"];

/// How a tool's path was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Configured,
    SearchPath,
}

/// A tool found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTool {
    pub name: String,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Availability report for one tool, as served by `/api/tools` and printed
/// by `check-tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ToolSource>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    found: BTreeMap<&'static str, LocatedTool>,
}

impl ToolRegistry {
    /// Locate every known tool. Missing tools are simply absent.
    pub fn discover(config: &ToolsConfig) -> Self {
        let found = KNOWN_TOOLS
            .iter()
            .filter_map(|&name| {
                let override_path = match name {
                    "ffmpeg" => config.ffmpeg_path.as_deref(),
                    _ => None,
                };
                locate(name, override_path).map(|tool| (name, tool))
            })
            .collect();

        Self { found }
    }

    /// # Errors
    ///
    /// [`Error::Tool`] when `name` was not found during discovery.
    pub fn require(&self, name: &str) -> Result<&LocatedTool> {
        self.found
            .get(name)
            .ok_or_else(|| Error::tool(name, format!("{name} not found; is it installed and in PATH?")))
    }

    /// Probe each known tool for its version. Blocks on `-version`.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                let found = self.found.get(name);
                ToolInfo {
                    name: name.to_string(),
                    available: found.is_some(),
                    version: found.and_then(|t| probe_version(&t.path)),
                    path: found.map(|t| t.path.clone()),
                    source: found.map(|t| t.source),
                }
            })
            .collect()
    }
}

fn locate(name: &str, override_path: Option<&Path>) -> Option<LocatedTool> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Some(LocatedTool {
                name: name.to_string(),
                path: path.to_path_buf(),
                source: ToolSource::Configured,
            });
        }
        tracing::warn!(tool = name, path = %path.display(), "Configured tool path is missing; searching PATH");
    }

    match which::which(name) {
        Ok(path) => Some(LocatedTool {
            name: name.to_string(),
            path,
            source: ToolSource::SearchPath,
        }),
        Err(e) => {
            tracing::debug!(tool = name, "Not found in PATH: {e}");
            None
        }
    }
}

fn probe_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(str::to_owned)
}
