//! Directory conversion for the command line.
//!
//! Unlike a submission, a local run works on files the user already owns:
//! inputs are left in place and every output is kept.

use std::path::{Path, PathBuf};

use cafconvert_av::{convert_one, Transcoder};
use cafconvert_core::naming;
use cafconvert_core::{Error, Result};
use walkdir::WalkDir;

/// Outcome of converting one directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Number of `.caf` files found.
    pub found: usize,
    /// Outputs written, in processing order.
    pub converted: Vec<PathBuf>,
    /// Inputs that failed to convert.
    pub failed: Vec<PathBuf>,
}

impl DirectoryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Summary line printed at the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "Conversion complete: {} of {} files successfully converted.",
            self.converted.len(),
            self.found
        )
    }
}

/// List the `.caf` files directly inside `dir`, sorted by name.
pub fn find_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Validation(format!(
            "Input directory does not exist: {}",
            dir.display()
        )));
    }

    let sources = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| naming::is_eligible(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();

    Ok(sources)
}

/// Progress notifications from [`convert_directory_with_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryEvent<'a> {
    /// Sources were listed; `total` files will be attempted.
    Found { total: usize },
    /// Conversion of `source` is about to start.
    Started { source: &'a Path },
    /// Conversion of `source` finished.
    Finished { source: &'a Path, converted: bool },
}

/// Convert every `.caf` file directly inside `input_dir`.
///
/// Outputs go to `output_dir` (created if missing) or next to each input.
/// Each output keeps the input's stem.
pub async fn convert_directory(
    transcoder: &dyn Transcoder,
    input_dir: &Path,
    output_dir: Option<&Path>,
) -> Result<DirectoryReport> {
    convert_directory_with_progress(transcoder, input_dir, output_dir, |_| {}).await
}

/// [`convert_directory`], reporting each step to `on_event`.
pub async fn convert_directory_with_progress<F>(
    transcoder: &dyn Transcoder,
    input_dir: &Path,
    output_dir: Option<&Path>,
    mut on_event: F,
) -> Result<DirectoryReport>
where
    F: FnMut(DirectoryEvent<'_>),
{
    let sources = find_sources(input_dir)?;

    if let Some(dir) = output_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut report = DirectoryReport {
        found: sources.len(),
        ..DirectoryReport::default()
    };
    on_event(DirectoryEvent::Found {
        total: sources.len(),
    });

    for source in sources {
        let output = output_path(&source, output_dir);
        tracing::debug!(
            "Converting {} -> {}",
            source.display(),
            output.display()
        );
        on_event(DirectoryEvent::Started { source: &source });

        let converted = convert_one(transcoder, &source, &output).await;
        on_event(DirectoryEvent::Finished {
            source: &source,
            converted,
        });

        if converted {
            report.converted.push(output);
        } else {
            report.failed.push(source);
        }
    }

    Ok(report)
}

fn output_path(source: &Path, output_dir: Option<&Path>) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|n| naming::output_file_name(&n.to_string_lossy()))
        .unwrap_or_else(|| format!("output.{}", naming::TARGET_EXTENSION));

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => source.with_file_name(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTranscoder;

    #[async_trait]
    impl Transcoder for EchoTranscoder {
        async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
            let data = tokio::fs::read(input).await?;
            if data.is_empty() {
                return Err(Error::transcode("Invalid data found when processing input"));
            }
            tokio::fs::write(output, data).await?;
            Ok(())
        }
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_sources(&dir.path().join("absent"));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn only_top_level_caf_files_are_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.caf"), b"x").unwrap();
        std::fs::write(dir.path().join("a.CAF"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.caf"), b"x").unwrap();

        let names: Vec<String> = find_sources(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.CAF", "b.caf"]);
    }

    #[tokio::test]
    async fn outputs_next_to_inputs_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memo.caf"), b"audio").unwrap();

        let report = convert_directory(&EchoTranscoder, dir.path(), None)
            .await
            .unwrap();

        assert_eq!(report.converted, vec![dir.path().join("memo.mp3")]);
        assert!(dir.path().join("memo.caf").exists());
        assert!(report.is_complete());
        assert_eq!(
            report.summary(),
            "Conversion complete: 1 of 1 files successfully converted."
        );
    }

    #[tokio::test]
    async fn failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::write(dir.path().join("good.caf"), b"audio").unwrap();
        std::fs::write(dir.path().join("bad.caf"), b"").unwrap();

        let report = convert_directory(&EchoTranscoder, dir.path(), Some(&out))
            .await
            .unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.converted, vec![out.join("good.mp3")]);
        assert_eq!(report.failed, vec![dir.path().join("bad.caf")]);
        assert!(!report.is_complete());
        assert_eq!(
            report.summary(),
            "Conversion complete: 1 of 2 files successfully converted."
        );
    }

    #[tokio::test]
    async fn progress_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.caf"), b"audio").unwrap();
        std::fs::write(dir.path().join("b.caf"), b"").unwrap();

        let mut seen = Vec::new();
        convert_directory_with_progress(&EchoTranscoder, dir.path(), None, |event| {
            seen.push(match event {
                DirectoryEvent::Found { total } => format!("found {total}"),
                DirectoryEvent::Started { source } => {
                    format!("start {}", source.file_name().unwrap().to_string_lossy())
                }
                DirectoryEvent::Finished { source, converted } => format!(
                    "done {} {converted}",
                    source.file_name().unwrap().to_string_lossy()
                ),
            });
        })
        .await
        .unwrap();

        assert_eq!(
            seen,
            vec![
                "found 2",
                "start a.caf",
                "done a.caf true",
                "start b.caf",
                "done b.caf false",
            ]
        );
    }

    #[tokio::test]
    async fn empty_directory_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = convert_directory(&EchoTranscoder, dir.path(), None)
            .await
            .unwrap();
        assert_eq!(report.found, 0);
        assert!(report.is_complete());
    }
}
