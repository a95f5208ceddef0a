use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the download orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Por favor ingresa una URL válida")]
    InvalidInput,
    #[error("Error al descargar: {0}")]
    ExtractionFailed(String),
}

/// Failures reported by the extraction library adapter.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("yt-dlp no esta instalado en el sistema. Instala yt-dlp y reinicia el servidor.")]
    NotInstalled,
    #[error("No se pudo ejecutar yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{0}")]
    Failed(String),
    #[error("Respuesta invalida de yt-dlp: {0}")]
    InvalidReport(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("No se pudo crear la carpeta de descargas {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No se pudo leer el directorio de trabajo: {0}")]
    WorkingDir(#[source] std::io::Error),
    #[error("No se pudo iniciar el puerto {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error del servidor HTTP: {0}")]
    Serve(#[source] std::io::Error),
}
