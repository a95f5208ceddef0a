use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tracing::debug;

pub const PROCESSOR_BINARY: &str = "ffmpeg";

/// Package-manager install locations probed when `PATH` has no match.
pub const WELL_KNOWN_PROCESSOR_PATHS: [&str; 3] = [
    "/opt/homebrew/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/usr/bin/ffmpeg",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    pub processor_path: Option<PathBuf>,
}

impl ToolAvailability {
    pub fn is_available(&self) -> bool {
        self.processor_path.is_some()
    }

    /// Directory holding the processor binary, the form yt-dlp expects for
    /// `--ffmpeg-location`.
    pub fn processor_dir(&self) -> Option<PathBuf> {
        self.processor_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

/// Finds the media processor on every call; results are never cached.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    binary_name: String,
    search_path: Option<OsString>,
    well_known_paths: Vec<PathBuf>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::for_processor()
    }
}

impl ToolLocator {
    pub fn for_processor() -> Self {
        Self {
            binary_name: PROCESSOR_BINARY.to_string(),
            search_path: None,
            well_known_paths: WELL_KNOWN_PROCESSOR_PATHS
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }

    /// Replaces the process `PATH` with a fixed value.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_well_known_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.well_known_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn locate_processor(&self) -> ToolAvailability {
        let processor_path = self
            .find_in_search_path()
            .or_else(|| self.find_in_well_known_paths());

        debug!(
            "Busqueda de {} resuelta en {:?}",
            self.binary_name, processor_path
        );

        ToolAvailability { processor_path }
    }

    fn find_in_search_path(&self) -> Option<PathBuf> {
        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;

        std::env::split_paths(&search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(&self.binary_name))
            .find(|candidate| is_executable_file(candidate))
    }

    fn find_in_well_known_paths(&self) -> Option<PathBuf> {
        self.well_known_paths
            .iter()
            .find(|candidate| is_executable_file(candidate))
            .cloned()
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
