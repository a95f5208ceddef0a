use std::path::{Path, PathBuf};

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    config::DownloadSettings,
    error::DownloadError,
    extractor::{ExtractedMedia, MediaExtractor},
    tools::{ToolAvailability, ToolLocator},
};

pub const AUDIO_CODEC: &str = "mp3";
pub const AUDIO_QUALITY: &str = "192";
pub const MERGED_CONTAINER: &str = "mp4";

const AUDIO_FORMAT: &str = "bestaudio/best";
const MERGED_VIDEO_FORMAT: &str = "bestvideo+bestaudio/best";
const PREMUXED_VIDEO_FORMAT: &str = "best[ext=mp4]";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSelector {
    Video,
    Audio,
}

impl FormatSelector {
    /// Anything other than `audio` asks for video.
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("audio") => Self::Audio,
            _ => Self::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_url: String,
    pub format_selector: FormatSelector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessing {
    None,
    ExtractAudio {
        codec: &'static str,
        quality: &'static str,
    },
    MergeInto {
        container: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfiguration {
    pub output_template: PathBuf,
    pub format: &'static str,
    pub post_processing: PostProcessing,
    pub skip_certificate_check: bool,
    pub processor_location: Option<PathBuf>,
}

impl DownloadConfiguration {
    pub fn select(
        selector: FormatSelector,
        tools: &ToolAvailability,
        settings: &DownloadSettings,
    ) -> Self {
        let (format, post_processing) = match (selector, tools.is_available()) {
            (FormatSelector::Audio, _) => (
                AUDIO_FORMAT,
                PostProcessing::ExtractAudio {
                    codec: AUDIO_CODEC,
                    quality: AUDIO_QUALITY,
                },
            ),
            (FormatSelector::Video, true) => (
                MERGED_VIDEO_FORMAT,
                PostProcessing::MergeInto {
                    container: MERGED_CONTAINER,
                },
            ),
            // Without a muxer only a single pre-muxed stream is usable.
            (FormatSelector::Video, false) => (PREMUXED_VIDEO_FORMAT, PostProcessing::None),
        };

        Self {
            output_template: settings.download_dir.join(OUTPUT_TEMPLATE),
            format,
            post_processing,
            skip_certificate_check: settings.skip_certificate_check,
            processor_location: tools.processor_dir(),
        }
    }

    /// Post-processing rewrites the extension on disk after yt-dlp reports
    /// the templated filename.
    pub fn resolve_output_path(&self, reported: &Path) -> PathBuf {
        match self.post_processing {
            PostProcessing::None => reported.to_path_buf(),
            PostProcessing::ExtractAudio { codec, .. } => reported.with_extension(codec),
            PostProcessing::MergeInto { container } => reported.with_extension(container),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub output_file_path: PathBuf,
    pub title: Option<String>,
}

pub struct Orchestrator<E> {
    extractor: E,
    locator: ToolLocator,
    settings: DownloadSettings,
}

impl<E: MediaExtractor> Orchestrator<E> {
    pub fn new(extractor: E, locator: ToolLocator, settings: DownloadSettings) -> Self {
        Self {
            extractor,
            locator,
            settings,
        }
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    pub async fn execute(&self, request: DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let url = request.source_url.trim();
        if url.is_empty() {
            return Err(DownloadError::InvalidInput);
        }

        let span = info_span!(
            "download",
            request_id = %Uuid::new_v4(),
            format = request.format_selector.as_str()
        );

        async {
            let tools = self.locator.locate_processor();
            let configuration =
                DownloadConfiguration::select(request.format_selector, &tools, &self.settings);

            info!("Descargando {url:?}");
            debug!("Configuracion de descarga: {:?}", configuration);

            let ExtractedMedia {
                title,
                reported_path,
            } = self
                .extractor
                .extract(url, &configuration)
                .await
                .map_err(|error| {
                    warn!("yt-dlp fallo para URL {:?}: {error}", url);
                    DownloadError::ExtractionFailed(error.to_string())
                })?;

            let output_file_path = configuration.resolve_output_path(&reported_path);
            info!("Descarga lista en {:?}", output_file_path);

            Ok(DownloadResult {
                output_file_path,
                title,
            })
        }
        .instrument(span)
        .await
    }
}
