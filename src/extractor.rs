use std::{future::Future, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
    error::ExtractorError,
    orchestrator::{DownloadConfiguration, PostProcessing},
};

/// What the extraction library reports for a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    pub title: Option<String>,
    /// Filename templated before post-processing; its extension may be stale.
    pub reported_path: PathBuf,
}

/// Resolves a URL and downloads it with the given configuration.
pub trait MediaExtractor: Send + Sync {
    fn extract(
        &self,
        url: &str,
        configuration: &DownloadConfiguration,
    ) -> impl Future<Output = Result<ExtractedMedia, ExtractorError>> + Send;
}

#[derive(Debug, Deserialize)]
struct YtDlpDownloadInfo {
    title: Option<String>,
    #[serde(rename = "_filename")]
    templated_filename: Option<String>,
    filename: Option<String>,
}

/// Drives the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl MediaExtractor for YtDlp {
    async fn extract(
        &self,
        url: &str,
        configuration: &DownloadConfiguration,
    ) -> Result<ExtractedMedia, ExtractorError> {
        let args = build_args(url, configuration);
        debug!("Ejecutando {:?} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ExtractorError::NotInstalled
                } else {
                    ExtractorError::Spawn(error)
                }
            })?;

        if !output.status.success() {
            return Err(ExtractorError::Failed(run_error_message(&output.stderr)));
        }

        parse_download_report(&output.stdout)
    }
}

fn build_args(url: &str, configuration: &DownloadConfiguration) -> Vec<String> {
    let mut args = vec![
        "--no-playlist".to_string(),
        "--dump-json".to_string(),
        "--no-simulate".to_string(),
        "-o".to_string(),
        configuration.output_template.to_string_lossy().into_owned(),
        "-f".to_string(),
        configuration.format.to_string(),
    ];

    if configuration.skip_certificate_check {
        args.push("--no-check-certificates".to_string());
    }

    if let Some(location) = &configuration.processor_location {
        args.push("--ffmpeg-location".to_string());
        args.push(location.to_string_lossy().into_owned());
    }

    match configuration.post_processing {
        PostProcessing::None => {}
        PostProcessing::ExtractAudio { codec, quality } => {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(codec.to_string());
            args.push("--audio-quality".to_string());
            args.push(quality.to_string());
        }
        PostProcessing::MergeInto { container } => {
            args.push("--merge-output-format".to_string());
            args.push(container.to_string());
        }
    }

    // Keeps URLs that start with '-' from being read as options.
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

fn parse_download_report(stdout: &[u8]) -> Result<ExtractedMedia, ExtractorError> {
    let info = String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str::<YtDlpDownloadInfo>(line).ok())
        .next_back()
        .ok_or_else(|| {
            ExtractorError::InvalidReport("no se recibio informacion de la descarga".to_string())
        })?;

    let filename = info
        .templated_filename
        .or(info.filename)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            ExtractorError::InvalidReport("falta el nombre del archivo descargado".to_string())
        })?;

    Ok(ExtractedMedia {
        title: info.title.filter(|value| !value.trim().is_empty()),
        reported_path: PathBuf::from(filename),
    })
}

fn run_error_message(stderr: &[u8]) -> String {
    let message = String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp no pudo completar la operacion")
        .to_string();

    if message.to_ascii_lowercase().contains("unsupported url") {
        format!("URL no soportada o invalida para descarga. ({message})")
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DownloadSettings, orchestrator::FormatSelector, tools::ToolAvailability};

    fn configuration(selector: FormatSelector, processor: Option<&str>) -> DownloadConfiguration {
        DownloadConfiguration::select(
            selector,
            &ToolAvailability {
                processor_path: processor.map(PathBuf::from),
            },
            &DownloadSettings {
                download_dir: PathBuf::from("/srv/downloads"),
                skip_certificate_check: true,
            },
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|index| args.get(index + 1))
            .map(String::as_str)
    }

    #[test]
    fn audio_args_request_mp3_extraction() {
        let args = build_args(
            "https://example.com/watch?v=abc",
            &configuration(FormatSelector::Audio, Some("/usr/bin/ffmpeg")),
        );

        assert_eq!(value_after(&args, "-f"), Some("bestaudio/best"));
        assert!(args.contains(&"-x".to_string()));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("192"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/usr/bin"));
        assert_eq!(
            value_after(&args, "-o"),
            Some("/srv/downloads/%(title)s.%(ext)s")
        );
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=abc"));
    }

    #[test]
    fn merged_video_args() {
        let args = build_args(
            "https://example.com/v",
            &configuration(FormatSelector::Video, Some("/usr/local/bin/ffmpeg")),
        );

        assert_eq!(value_after(&args, "-f"), Some("bestvideo+bestaudio/best"));
        assert_eq!(value_after(&args, "--merge-output-format"), Some("mp4"));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn premuxed_video_args_skip_post_processing() {
        let args = build_args(
            "https://example.com/v",
            &configuration(FormatSelector::Video, None),
        );

        assert_eq!(value_after(&args, "-f"), Some("best[ext=mp4]"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn parses_last_json_report_line() {
        let stdout = br#"[download] Destination: ignored
{"title": "Old", "_filename": "/srv/downloads/Old.webm"}
{"title": "Clip", "_filename": "/srv/downloads/Clip.webm", "ext": "webm"}
"#;

        let media = parse_download_report(stdout).unwrap();
        assert_eq!(media.title.as_deref(), Some("Clip"));
        assert_eq!(media.reported_path, PathBuf::from("/srv/downloads/Clip.webm"));
    }

    #[test]
    fn falls_back_to_public_filename() {
        let media =
            parse_download_report(br#"{"filename": "/srv/downloads/Clip.mp4"}"#).unwrap();
        assert_eq!(media.title, None);
        assert_eq!(media.reported_path, PathBuf::from("/srv/downloads/Clip.mp4"));

        let media = parse_download_report(
            br#"{"filename": "Clip.mp4", "_filename": "/srv/downloads/Clip.mp4"}"#,
        )
        .unwrap();
        assert_eq!(media.reported_path, PathBuf::from("/srv/downloads/Clip.mp4"));
    }

    #[test]
    fn report_without_filename_is_invalid() {
        let error = parse_download_report(br#"{"title": "Clip"}"#).unwrap_err();
        assert!(matches!(error, ExtractorError::InvalidReport(_)));

        let error = parse_download_report(b"not json").unwrap_err();
        assert!(matches!(error, ExtractorError::InvalidReport(_)));
    }

    #[test]
    fn error_message_uses_last_stderr_line() {
        let stderr = b"WARNING: something\n\nERROR: [generic] network unreachable\n";
        assert_eq!(
            run_error_message(stderr),
            "ERROR: [generic] network unreachable"
        );
        assert_eq!(
            run_error_message(b""),
            "yt-dlp no pudo completar la operacion"
        );
        assert!(
            run_error_message(b"ERROR: Unsupported URL: https://example.com")
                .starts_with("URL no soportada")
        );
    }

    #[tokio::test]
    async fn missing_binary_is_reported_as_not_installed() {
        let extractor = YtDlp::new("/nonexistent/yt-dlp-binary");
        let error = extractor
            .extract(
                "https://example.com/v",
                &configuration(FormatSelector::Video, None),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, ExtractorError::NotInstalled));
    }
}
