use std::path::{Path, PathBuf};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5050";
pub const DEFAULT_DOWNLOAD_DIR_NAME: &str = "downloads";
pub const DEFAULT_EXTRACTOR_BINARY: &str = "yt-dlp";

/// Settings the orchestrator needs for every download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub download_dir: PathBuf,
    pub skip_certificate_check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub extractor_binary: PathBuf,
    pub download: DownloadSettings,
}

impl AppConfig {
    pub fn from_env(working_dir: &Path) -> Self {
        Self::from_lookup(working_dir, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(working_dir: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let download_dir = lookup("DOWNLOAD_DIR")
            .as_deref()
            .and_then(non_empty)
            .map(PathBuf::from)
            .map(|dir| {
                if dir.is_absolute() {
                    dir
                } else {
                    working_dir.join(dir)
                }
            })
            .unwrap_or_else(|| working_dir.join(DEFAULT_DOWNLOAD_DIR_NAME));

        let extractor_binary = lookup("YT_DLP_BIN")
            .as_deref()
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXTRACTOR_BINARY));

        let check_certificates = lookup("YT_DLP_CHECK_CERTIFICATES")
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false);

        Self {
            bind_addr: resolve_bind_addr(&lookup),
            extractor_binary,
            download: DownloadSettings {
                download_dir,
                skip_certificate_check: !check_certificates,
            },
        }
    }
}

fn resolve_bind_addr<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(configured) = lookup("APP_ADDR")
        .as_deref()
        .and_then(non_empty)
        .map(ToString::to_string)
    {
        return configured;
    }

    if let Some(port) = lookup("PORT").and_then(|value| value.trim().parse::<u16>().ok()) {
        return format!("0.0.0.0:{port}");
    }

    DEFAULT_BIND_ADDR.to_string()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(Path::new("/srv/app"), |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.extractor_binary, PathBuf::from("yt-dlp"));
        assert_eq!(
            config.download.download_dir,
            PathBuf::from("/srv/app/downloads")
        );
        assert!(config.download.skip_certificate_check);
    }

    #[test]
    fn app_addr_wins_over_port() {
        let config = config_from(&[("APP_ADDR", "0.0.0.0:9000"), ("PORT", "7000")]);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn port_binds_all_interfaces() {
        let config = config_from(&[("PORT", " 7000 ")]);
        assert_eq!(config.bind_addr, "0.0.0.0:7000");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let config = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn relative_download_dir_is_joined_to_working_dir() {
        let config = config_from(&[("DOWNLOAD_DIR", "media")]);
        assert_eq!(config.download.download_dir, PathBuf::from("/srv/app/media"));

        let config = config_from(&[("DOWNLOAD_DIR", "/var/media")]);
        assert_eq!(config.download.download_dir, PathBuf::from("/var/media"));
    }

    #[test]
    fn certificate_check_can_be_enabled() {
        let config = config_from(&[("YT_DLP_CHECK_CERTIFICATES", "yes")]);
        assert!(!config.download.skip_certificate_check);

        let config = config_from(&[("YT_DLP_CHECK_CERTIFICATES", "maybe")]);
        assert!(config.download.skip_certificate_check);
    }

    #[test]
    fn custom_extractor_binary() {
        let config = config_from(&[("YT_DLP_BIN", "/opt/bin/yt-dlp")]);
        assert_eq!(config.extractor_binary, PathBuf::from("/opt/bin/yt-dlp"));
    }
}
