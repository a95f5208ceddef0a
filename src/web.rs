use std::{path::Path, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    extractor::MediaExtractor,
    orchestrator::{DownloadRequest, FormatSelector, Orchestrator},
};

const FLASH_COOKIE: &str = "flash";
const FLASH_MAX_AGE_SECONDS: u32 = 60;

pub struct AppState<E> {
    orchestrator: Arc<Orchestrator<E>>,
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<E> AppState<E> {
    pub fn new(orchestrator: Orchestrator<E>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadForm {
    url: Option<String>,
    format: Option<String>,
}

pub fn router<E>(state: AppState<E>) -> Router
where
    E: MediaExtractor + 'static,
{
    Router::new()
        .route("/", get(index::<E>))
        .route("/download", post(download::<E>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index<E>(State(state): State<AppState<E>>, headers: HeaderMap) -> Response
where
    E: MediaExtractor + 'static,
{
    let processor_available = state
        .orchestrator
        .locator()
        .locate_processor()
        .is_available();
    let flash = read_flash(&headers);

    let page = Html(render_index(processor_available, flash.as_deref()));
    if flash.is_some() {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(SET_COOKIE, HeaderValue::from_static(CLEAR_FLASH_COOKIE));
        (response_headers, page).into_response()
    } else {
        page.into_response()
    }
}

async fn download<E>(
    State(state): State<AppState<E>>,
    Form(form): Form<DownloadForm>,
) -> Response
where
    E: MediaExtractor + 'static,
{
    let request = DownloadRequest {
        source_url: form.url.unwrap_or_default(),
        format_selector: FormatSelector::from_form_value(form.format.as_deref()),
    };

    let result = match state.orchestrator.execute(request).await {
        Ok(result) => result,
        Err(error) => return redirect_with_flash(&error.to_string()),
    };

    match attachment_response(&result.output_file_path).await {
        Ok(response) => response,
        Err(message) => {
            warn!("{message}");
            redirect_with_flash(&message)
        }
    }
}

async fn attachment_response(path: &Path) -> Result<Response, String> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| "download.bin".to_string());

    let file = tokio::fs::File::open(path).await.map_err(|error| {
        format!("Error al descargar: no se pudo abrir el archivo {filename:?}: {error}")
    })?;
    let metadata = file.metadata().await.map_err(|error| {
        format!("Error al descargar: no se pudo leer metadata del archivo: {error}")
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(&filename)),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&filename))
            .map_err(|_| "Error al descargar: no se pudo crear la cabecera de descarga.")?,
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

const CLEAR_FLASH_COOKIE: &str = "flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

fn redirect_with_flash(message: &str) -> Response {
    let cookie = format!(
        "{FLASH_COOKIE}={}; Path=/; Max-Age={FLASH_MAX_AGE_SECONDS}; HttpOnly; SameSite=Lax",
        urlencoding::encode(message)
    );

    let mut response = Redirect::to("/").into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

fn read_flash(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == FLASH_COOKIE)
        .filter_map(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
        .find(|value| !value.trim().is_empty())
}

fn render_index(processor_available: bool, flash: Option<&str>) -> String {
    let flash_block = flash
        .map(|message| format!("<p class=\"flash\">{}</p>", escape_html(message)))
        .unwrap_or_default();
    let processor_notice = if processor_available {
        "<p class=\"tool ok\">FFmpeg detectado: video en maxima calidad y audio MP3 disponibles.</p>"
    } else {
        "<p class=\"tool missing\">FFmpeg no encontrado: la conversion a MP3 fallara y los videos pueden estar limitados a 720p.</p>"
    };

    format!(
        r#"<!doctype html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>Esencial Downloader</title>
</head>
<body>
<h1>Esencial Downloader</h1>
{flash_block}
{processor_notice}
<form method="post" action="/download">
<input type="url" name="url" placeholder="https://..." required>
<label><input type="radio" name="format" value="video" checked> Video</label>
<label><input type="radio" name="format" value="audio"> Audio (MP3)</label>
<button type="submit">Descargar</button>
</form>
</body>
</html>
"#
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(character),
        }
    }
    escaped
}

fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

fn build_content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}
