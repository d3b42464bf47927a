use std::{
    convert::Infallible,
    io,
    net::SocketAddr,
    path::{Path as FsPath, PathBuf},
    sync::Arc,
};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, State, rejection::PathRejection},
    http::{HeaderName, header, request::Parts},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;

use crate::response::ApiError;
use crate::sanitize::{content_disposition, extension_of};

/// Extensions the gatekeeper is willing to serve, with the content type sent for each.
/// Anything not listed here is treated as absent.
pub const MEDIA_TYPES: [(&str, &str); 10] = [
    (".pdf", "application/pdf"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".webp", "image/webp"),
    (".mp3", "audio/mpeg"),
    (".wav", "audio/wav"),
    (".m4a", "audio/x-m4a"),
    (".ogg", "audio/ogg"),
];

/// Bytes read from the start of a file for content sniffing.
const SNIFF_LEN: u64 = 1024;

/// content_type_for
///
/// Looks up the allow-listed content type for a lowercase extension (with its dot).
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, content_type)| *content_type)
}

/// MediaRejection
///
/// Internal reason a media request was refused. It is logged for auditing and never shown
/// to the client, which always receives the same 404.
#[derive(Debug, Error)]
pub enum MediaRejection {
    #[error("empty or parent-relative path")]
    InvalidPath,
    #[error("path resolves outside the media root")]
    Traversal,
    #[error("file not found")]
    Missing,
    #[error("path is not a regular file")]
    NotAFile,
    #[error("file type not allowed: {0}")]
    DisallowedType(String),
    #[error("file could not be read: {0}")]
    Unreadable(#[from] io::Error),
}

/// ResolvedMedia
///
/// A file that passed every gatekeeper check, opened and rewound to offset 0.
#[derive(Debug)]
pub struct ResolvedMedia {
    pub file: File,
    pub path: PathBuf,
    pub content_type: &'static str,
    /// `Content-Disposition` value naming the file inline.
    pub disposition: String,
    pub size: u64,
}

/// MediaGatekeeper
///
/// Resolves client-supplied relative paths against a single media root and refuses anything
/// that escapes it, is not a regular file, or does not have an allow-listed extension.
///
/// The root is canonicalized once on construction and the gatekeeper is then shared
/// read-only across requests.
#[derive(Debug, Clone)]
pub struct MediaGatekeeper {
    root: PathBuf,
}

impl MediaGatekeeper {
    /// new
    ///
    /// Creates the media root if needed and stores its canonical form.
    pub fn new(root: impl AsRef<FsPath>) -> io::Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &FsPath {
        &self.root
    }

    /// resolve
    ///
    /// Two independent traversal layers run here: a cheap substring rejection of `..`
    /// before touching the filesystem, and a canonical prefix check afterwards that also
    /// catches symlinks and absolute-path injection.
    pub async fn resolve(&self, requested: &str) -> Result<ResolvedMedia, MediaRejection> {
        let relative = requested.trim().trim_start_matches('/');

        if relative.is_empty() || relative.contains("..") {
            return Err(MediaRejection::InvalidPath);
        }

        let canonical = match tokio::fs::canonicalize(self.root.join(relative)).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(MediaRejection::Missing),
            Err(e) => return Err(MediaRejection::Unreadable(e)),
        };

        if !canonical.starts_with(&self.root) {
            return Err(MediaRejection::Traversal);
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if !metadata.is_file() {
            return Err(MediaRejection::NotAFile);
        }

        let file_name = canonical
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = extension_of(&file_name);
        let content_type = content_type_for(&extension)
            .ok_or_else(|| MediaRejection::DisallowedType(extension.clone()))?;

        let mut file = File::open(&canonical).await?;
        let mut head = Vec::with_capacity(SNIFF_LEN as usize);
        (&mut file).take(SNIFF_LEN).read_to_end(&mut head).await?;
        file.rewind().await?;

        if let Some(kind) = infer::get(&head) {
            if kind.mime_type() != content_type {
                // The allow-list wins over the sniffer.
                tracing::debug!(
                    path = %relative,
                    detected = kind.mime_type(),
                    serving = content_type,
                    "MIME type mismatch"
                );
            }
        }

        Ok(ResolvedMedia {
            file,
            path: canonical,
            content_type,
            disposition: content_disposition("inline", &file_name),
            size: metadata.len(),
        })
    }
}

/// ClientAddr
///
/// Best-effort peer address for audit logs. Reads the `ConnectInfo` installed by
/// `into_make_service_with_connect_info` and falls back to `unknown` (e.g. in tests driven
/// through `oneshot`).
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientAddr(addr))
    }
}

/// serve_media_file
///
/// [Public Route] `GET /media/{*file_path}`. Streams an uploaded file after the gatekeeper
/// approves it. Every rejection, whatever the cause, is answered with the same 404 so the
/// response never reveals whether a path exists.
pub async fn serve_media_file(
    State(media): State<Arc<MediaGatekeeper>>,
    ClientAddr(client): ClientAddr,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let requested = match path {
        Ok(Path(requested)) => requested,
        Err(rejection) => {
            tracing::warn!(client = %client, error = %rejection, "Undecodable media path");
            return Err(ApiError::NotFound);
        }
    };

    let resolved = match media.resolve(&requested).await {
        Ok(resolved) => resolved,
        Err(rejection) => {
            log_rejection(&requested, &client, &rejection);
            return Err(ApiError::NotFound);
        }
    };

    tracing::info!(
        path = %requested,
        client = %client,
        size = resolved.size,
        "Media file served"
    );

    let headers = [
        (header::CONTENT_TYPE, resolved.content_type.to_string()),
        (header::CONTENT_LENGTH, resolved.size.to_string()),
        (header::CONTENT_DISPOSITION, resolved.disposition),
        (
            HeaderName::from_static("x-content-type-options"),
            "nosniff".to_string(),
        ),
    ];

    let body = Body::from_stream(ReaderStream::new(resolved.file));
    Ok((headers, body).into_response())
}

fn log_rejection(requested: &str, client: &str, rejection: &MediaRejection) {
    match rejection {
        MediaRejection::Missing => {
            tracing::info!(path = %requested, client = %client, "Media file not found");
        }
        MediaRejection::Traversal => {
            tracing::warn!(path = %requested, client = %client, "Directory traversal attempt detected");
        }
        MediaRejection::Unreadable(e) => {
            tracing::error!(path = %requested, client = %client, error = %e, "Error reading media file");
        }
        other => {
            tracing::warn!(path = %requested, client = %client, reason = %other, "Media request rejected");
        }
    }
}
