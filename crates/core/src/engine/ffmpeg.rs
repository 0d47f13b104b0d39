//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, OnceCell};
use tracing::debug;
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::Engine;
use super::types::{EngineEvent, LoadProgress};
use crate::asset::MediaContent;

/// Number of trailing stderr lines kept as a fallback diagnostic.
const DIAGNOSTIC_TAIL: usize = 8;

/// Engine that runs the `ffmpeg` executable against a private scratch
/// directory.
pub struct FfmpegEngine {
    config: EngineConfig,
    /// `<scratch_dir>/<instance id>`, created by `load`.
    workdir: PathBuf,
    loaded: OnceCell<()>,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let workdir = config.scratch_dir.join(Uuid::new_v4().to_string());
        Self {
            config,
            workdir,
            loaded: OnceCell::new(),
        }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// The directory scratch files live in.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolves a scratch name to a path inside the workdir.
    fn scratch_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.workdir.join(name)),
            _ => Err(EngineError::InvalidFileName {
                name: name.to_string(),
            }),
        }
    }

    fn ensure_loaded(&self) -> Result<(), EngineError> {
        if self.loaded.initialized() {
            Ok(())
        } else {
            Err(EngineError::NotLoaded)
        }
    }

    /// Builds the full ffmpeg command line for a job's argv.
    fn build_command_args(&self, argv: Vec<String>) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];

        let mut argv = argv;
        let output = argv.pop();
        args.extend(argv);
        args.extend(self.config.extra_args.iter().cloned());
        args.extend(output);
        args
    }
}

/// Parses `Duration: 00:01:02.50` from an ffmpeg banner line into seconds.
fn parse_duration_line(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let hours = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let minutes = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let seconds = caps.get(3)?.as_str().parse::<f64>().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parses `out_time_ms=<microseconds>` from `-progress` output into seconds.
fn parse_out_time(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some(micros / 1_000_000.0)
}

/// Lines emitted by `-progress` that carry no diagnostic value.
fn is_progress_key(line: &str) -> bool {
    const KEYS: [&str; 12] = [
        "frame=", "fps=", "stream_", "bitrate=", "total_size=", "out_time", "dup_frames=",
        "drop_frames=", "speed=", "progress=", "packet=", "chapter=",
    ];
    KEYS.iter().any(|k| line.starts_with(k))
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self, progress_tx: mpsc::Sender<LoadProgress>) -> Result<(), EngineError> {
        let _ = progress_tx.try_send(LoadProgress { percent: 0.0 });

        tokio::fs::create_dir_all(&self.workdir)
            .await
            .map_err(|e| {
                EngineError::load_failed(format!(
                    "cannot create scratch dir {}: {}",
                    self.workdir.display(),
                    e
                ))
            })?;
        let _ = progress_tx.try_send(LoadProgress { percent: 50.0 });

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Unavailable {
                        reason: format!(
                            "ffmpeg not found at {}",
                            self.config.ffmpeg_path.display()
                        ),
                    }
                } else {
                    EngineError::load_failed(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::load_failed(format!(
                "ffmpeg -version exited with {:?}",
                output.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        debug!(
            version = version.lines().next().unwrap_or("unknown"),
            workdir = %self.workdir.display(),
            "FFmpeg ready"
        );

        let _ = self.loaded.set(());
        let _ = progress_tx.try_send(LoadProgress { percent: 100.0 });
        Ok(())
    }

    async fn write_file(&self, name: &str, content: MediaContent) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let path = self.scratch_path(name)?;
        tokio::fs::write(&path, content.as_bytes()).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<MediaContent, EngineError> {
        self.ensure_loaded()?;
        let path = self.scratch_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(MediaContent::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::FileNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(EngineError::Io(e)),
        }
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.scratch_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::FileNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(EngineError::Io(e)),
        }
    }

    async fn exec(
        &self,
        argv: Vec<String>,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let args = self.build_command_args(argv);
        debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Unavailable {
                        reason: format!(
                            "ffmpeg not found at {}",
                            self.config.ffmpeg_path.display()
                        ),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::exec_failed(None, "stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let duration_regex = Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").ok();
        let time_regex = Regex::new(r"^out_time_ms=(\d+)").ok();

        let mut total_secs: Option<f64> = None;
        let mut error_output = String::new();
        let mut tail: Vec<String> = Vec::new();

        while let Some(line) = reader.next_line().await? {
            if total_secs.is_none() {
                if let Some(ref re) = duration_regex {
                    total_secs = parse_duration_line(re, &line);
                }
            }

            if let Some(time) = time_regex.as_ref().and_then(|re| parse_out_time(re, &line)) {
                if let Some(total) = total_secs.filter(|t| *t > 0.0) {
                    let _ = events.try_send(EngineEvent::Progress {
                        ratio: (time / total).clamp(0.0, 1.0),
                        time_secs: Some(time),
                    });
                }
                continue;
            }

            if line == "progress=end" {
                let _ = events.try_send(EngineEvent::Progress {
                    ratio: 1.0,
                    time_secs: total_secs,
                });
                continue;
            }

            if is_progress_key(&line) {
                continue;
            }

            if line.contains("Error") || line.contains("error") || line.contains("Invalid") {
                error_output.push_str(&line);
                error_output.push('\n');
            }
            tail.push(line.clone());
            if tail.len() > DIAGNOSTIC_TAIL {
                tail.remove(0);
            }
            let _ = events.try_send(EngineEvent::Log { message: line });
        }

        let status = child.wait().await?;
        if !status.success() {
            let diagnostic = if error_output.is_empty() {
                tail.join("\n")
            } else {
                error_output.trim_end().to_string()
            };
            return Err(EngineError::exec_failed(status.code(), diagnostic));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_in(dir: &TempDir) -> FfmpegEngine {
        FfmpegEngine::new(EngineConfig::default().with_scratch_dir(dir.path().to_path_buf()))
    }

    #[test]
    fn test_scratch_path_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        assert!(engine.scratch_path("input.avi").is_ok());
        assert!(matches!(
            engine.scratch_path("../escape.avi"),
            Err(EngineError::InvalidFileName { .. })
        ));
        assert!(engine.scratch_path("a/b.avi").is_err());
        assert!(engine.scratch_path("/etc/passwd").is_err());
        assert!(engine.scratch_path("").is_err());
    }

    #[test]
    fn test_build_command_args_places_extra_args_before_output() {
        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::default().with_scratch_dir(dir.path().to_path_buf());
        config.extra_args = vec!["-threads".to_string(), "2".to_string()];
        let engine = FfmpegEngine::new(config);

        let args = engine.build_command_args(vec![
            "-i".to_string(),
            "input.avi".to_string(),
            "output.mp4".to_string(),
        ]);

        assert_eq!(&args[..3], &["-y", "-hide_banner", "-nostats"]);
        assert!(args.contains(&"pipe:2".to_string()));
        let n = args.len();
        assert_eq!(&args[n - 3..], &["-threads", "2", "output.mp4"]);
        assert_eq!(&args[n - 5..n - 3], &["-i", "input.avi"]);
    }

    #[test]
    fn test_parse_duration_line() {
        let re = Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").unwrap();
        let line = "  Duration: 01:02:03.50, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_duration_line(&re, line), Some(3723.5));
        assert_eq!(parse_duration_line(&re, "Stream #0:0: Video: mpeg4"), None);
    }

    #[test]
    fn test_parse_out_time() {
        let re = Regex::new(r"^out_time_ms=(\d+)").unwrap();
        assert_eq!(parse_out_time(&re, "out_time_ms=2500000"), Some(2.5));
        assert_eq!(parse_out_time(&re, "out_time=00:00:02.500000"), None);
    }

    #[test]
    fn test_is_progress_key() {
        assert!(is_progress_key("frame=120"));
        assert!(is_progress_key("speed=2.01x"));
        assert!(!is_progress_key("[avi @ 0x55] Invalid data"));
    }

    #[tokio::test]
    async fn test_file_ops_require_load() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let result = engine
            .write_file("input.avi", MediaContent::from(vec![1u8]))
            .await;
        assert!(matches!(result, Err(EngineError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::with_ffmpeg_path(PathBuf::from("/nonexistent/ffmpeg"))
            .with_scratch_dir(dir.path().to_path_buf());
        let engine = FfmpegEngine::new(config);

        let (tx, mut rx) = mpsc::channel(8);
        let result = engine.load(tx).await;

        assert!(matches!(result, Err(EngineError::Unavailable { .. })));
        assert_eq!(rx.recv().await, Some(LoadProgress { percent: 0.0 }));
    }
}
