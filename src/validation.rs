use std::io::{self, Cursor, Read, Seek, SeekFrom};

use bytes::Bytes;
use thiserror::Error;

use crate::media::content_type_for;
use crate::sanitize::{extension_of, sanitize_filename};

const MB: u64 = 1024 * 1024;

/// Number of leading bytes handed to the content sniffer.
const SNIFF_LEN: usize = 1024;

const PDF_MAGIC: &[u8] = b"%PDF";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// UploadPolicy
///
/// Per-field upload rules: which extensions are accepted, how large the file may be and the
/// human-readable hint shown when the extension is rejected. Policies are plain constants,
/// shared read-only by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_extensions: &'static [&'static str],
    pub max_bytes: u64,
    pub type_hint: &'static str,
}

/// Publication documents.
pub const PDF_DOCUMENT: UploadPolicy = UploadPolicy {
    allowed_extensions: &[".pdf"],
    max_bytes: 50 * MB,
    type_hint: "Only PDF files are allowed.",
};

/// Publication covers and the current nasheen portrait.
pub const COVER_IMAGE: UploadPolicy = UploadPolicy {
    allowed_extensions: &[".jpg", ".jpeg", ".png", ".webp"],
    max_bytes: 5 * MB,
    type_hint: "Only image files (JPG, PNG, WebP) are allowed.",
};

/// Gallery and photo-collection images.
pub const GALLERY_IMAGE: UploadPolicy = UploadPolicy {
    allowed_extensions: &[".jpg", ".jpeg", ".png", ".gif", ".webp"],
    max_bytes: 5 * MB,
    type_hint: "Only image files (JPG, PNG, GIF, WebP) are allowed.",
};

/// Audio recordings.
pub const AUDIO_FILE: UploadPolicy = UploadPolicy {
    allowed_extensions: &[".mp3", ".wav", ".m4a", ".ogg"],
    max_bytes: 100 * MB,
    type_hint: "Only audio files (MP3, WAV, M4A, OGG) are allowed.",
};

/// MimeMode
///
/// Controls what happens when the sniffed content type disagrees with the extension.
/// `Lenient` only logs the mismatch; `Strict` rejects the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MimeMode {
    #[default]
    Lenient,
    Strict,
}

/// UploadError
///
/// Every reason an upload can be refused. The `Display` text is what ends up in the
/// field-level `errors` list of the response envelope.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{hint} Got: {}", display_extension(.extension))]
    DisallowedExtension {
        hint: &'static str,
        extension: String,
    },

    #[error("File size too large. Maximum size is {max_mb}MB")]
    TooLarge { max_mb: u64 },

    #[error("File does not appear to be a valid {format}")]
    InvalidSignature { format: &'static str },

    #[error("File MIME type '{detected}' does not match extension '{extension}'")]
    MimeMismatch { detected: String, extension: String },

    #[error("Could not read uploaded file")]
    Io(#[from] io::Error),
}

fn display_extension(extension: &str) -> &str {
    if extension.is_empty() { "(none)" } else { extension }
}

/// UploadCandidate
///
/// A single uploaded file awaiting validation. The filename is sanitized on construction so
/// every later check works on the safe name. `content` only needs to be seekable: each peek
/// rewinds it to offset 0 before returning.
pub struct UploadCandidate<R> {
    pub filename: String,
    pub declared_size: u64,
    pub content: R,
}

impl<R: Read + Seek> UploadCandidate<R> {
    pub fn new(raw_filename: &str, declared_size: u64, content: R) -> Self {
        Self {
            filename: sanitize_filename(raw_filename),
            declared_size,
            content,
        }
    }
}

impl UploadCandidate<Cursor<Bytes>> {
    /// Wraps an in-memory multipart field.
    pub fn from_bytes(raw_filename: &str, bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self::new(raw_filename, size, Cursor::new(bytes))
    }
}

/// ValidatedUpload
///
/// What the storage layer needs once a candidate has passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub filename: String,
    pub extension: String,
    pub content_type: &'static str,
    pub size: u64,
}

/// validate_upload
///
/// Runs the upload checks in order, stopping at the first hard failure:
///
/// 1. the extension must be in `policy.allowed_extensions`;
/// 2. the declared size must not exceed `policy.max_bytes`;
/// 3. PDF, JPEG and PNG files must start with their magic bytes;
/// 4. the sniffed content type is compared with the extension. A mismatch is only
///    logged unless `mode` is [`MimeMode::Strict`].
///
/// Formats other than PDF, JPEG and PNG are not signature-checked; step 4 is the only
/// content check they get.
pub fn validate_upload<R: Read + Seek>(
    candidate: &mut UploadCandidate<R>,
    policy: &UploadPolicy,
    mode: MimeMode,
) -> Result<ValidatedUpload, UploadError> {
    let extension = extension_of(&candidate.filename);

    if !policy.allowed_extensions.contains(&extension.as_str()) {
        tracing::warn!(
            filename = %candidate.filename,
            extension = %extension,
            "Rejected upload with disallowed extension"
        );
        return Err(UploadError::DisallowedExtension {
            hint: policy.type_hint,
            extension,
        });
    }

    if candidate.declared_size > policy.max_bytes {
        tracing::warn!(
            filename = %candidate.filename,
            size = candidate.declared_size,
            max = policy.max_bytes,
            "Rejected oversized upload"
        );
        return Err(UploadError::TooLarge {
            max_mb: policy.max_bytes / MB,
        });
    }

    check_signature(&mut candidate.content, &extension)?;
    check_sniffed_type(candidate, &extension, mode)?;

    let content_type = content_type_for(&extension).unwrap_or("application/octet-stream");

    tracing::info!(
        filename = %candidate.filename,
        size = candidate.declared_size,
        content_type,
        "Upload validated"
    );

    Ok(ValidatedUpload {
        filename: candidate.filename.clone(),
        extension,
        content_type,
        size: candidate.declared_size,
    })
}

/// Hard signature check for the three formats we can verify cheaply.
fn check_signature<R: Read + Seek>(content: &mut R, extension: &str) -> Result<(), UploadError> {
    let (magic, format): (&[u8], &'static str) = match extension {
        ".pdf" => (PDF_MAGIC, "PDF file"),
        ".jpg" | ".jpeg" => (JPEG_MAGIC, "JPEG image"),
        ".png" => (PNG_MAGIC, "PNG image"),
        _ => return Ok(()),
    };

    let header = peek(content, magic.len())?;
    if header != magic {
        tracing::warn!(extension, "Upload signature does not match its extension");
        return Err(UploadError::InvalidSignature { format });
    }
    Ok(())
}

fn check_sniffed_type<R: Read + Seek>(
    candidate: &mut UploadCandidate<R>,
    extension: &str,
    mode: MimeMode,
) -> Result<(), UploadError> {
    let expected = expected_mime_types(extension);
    if expected.is_empty() {
        return Ok(());
    }

    let head = peek(&mut candidate.content, SNIFF_LEN)?;
    let Some(detected) = infer::get(&head).map(|kind| kind.mime_type()) else {
        return Ok(());
    };

    if expected.contains(&detected) {
        return Ok(());
    }

    tracing::warn!(
        filename = %candidate.filename,
        detected,
        ?expected,
        "MIME type mismatch"
    );

    match mode {
        MimeMode::Lenient => Ok(()),
        MimeMode::Strict => Err(UploadError::MimeMismatch {
            detected: detected.to_string(),
            extension: extension.to_string(),
        }),
    }
}

/// expected_mime_types
///
/// MIME types a sniffer may legitimately report for an accepted extension. The first entry
/// is the canonical type served for it; the rest are aliases that sniffers commonly emit.
pub fn expected_mime_types(extension: &str) -> &'static [&'static str] {
    match extension {
        ".pdf" => &["application/pdf"],
        ".jpg" | ".jpeg" => &["image/jpeg"],
        ".png" => &["image/png"],
        ".gif" => &["image/gif"],
        ".webp" => &["image/webp"],
        ".mp3" => &["audio/mpeg"],
        ".wav" => &["audio/wav", "audio/x-wav", "audio/wave"],
        ".m4a" => &["audio/x-m4a", "audio/m4a", "audio/mp4"],
        ".ogg" => &["audio/ogg", "audio/vorbis"],
        _ => &[],
    }
}

/// peek
///
/// Reads up to `len` bytes from the start of `reader` and rewinds it to offset 0.
fn peek<R: Read + Seek>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R',
    ];

    fn candidate(name: &str, bytes: &[u8]) -> UploadCandidate<Cursor<Bytes>> {
        UploadCandidate::from_bytes(name, Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn accepts_real_pdf() {
        let mut upload = candidate("report.PDF", b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
        let validated = validate_upload(&mut upload, &PDF_DOCUMENT, MimeMode::Lenient).unwrap();
        assert_eq!(validated.extension, ".pdf");
        assert_eq!(validated.content_type, "application/pdf");
        assert_eq!(upload.content.position(), 0);
    }

    #[test]
    fn rejects_disallowed_extension_regardless_of_content() {
        for name in ["malware.exe", "script.php", "noextension", "report.pdf.exe"] {
            let mut upload = candidate(name, b"%PDF-1.4");
            let err = validate_upload(&mut upload, &PDF_DOCUMENT, MimeMode::Lenient).unwrap_err();
            assert!(matches!(err, UploadError::DisallowedExtension { .. }), "{name}");
        }
    }

    #[test]
    fn disallowed_extension_message_names_the_extension() {
        let mut upload = candidate("notes.docx", b"PK\x03\x04");
        let err = validate_upload(&mut upload, &PDF_DOCUMENT, MimeMode::Lenient).unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are allowed. Got: .docx");
    }

    #[test]
    fn rejects_gif_disguised_as_pdf() {
        let mut upload = candidate("evil.pdf", b"GIF89a\x01\x00\x01\x00");
        let err = validate_upload(&mut upload, &PDF_DOCUMENT, MimeMode::Lenient).unwrap_err();
        assert!(matches!(err, UploadError::InvalidSignature { format: "PDF file" }));
        assert_eq!(err.to_string(), "File does not appear to be a valid PDF file");
    }

    #[test]
    fn rejects_oversized_before_reading_content() {
        let mut upload = UploadCandidate::new(
            "cover.png",
            6 * MB,
            Cursor::new(Bytes::from_static(b"not even a png")),
        );
        let err = validate_upload(&mut upload, &COVER_IMAGE, MimeMode::Lenient).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { max_mb: 5 }));
        assert_eq!(err.to_string(), "File size too large. Maximum size is 5MB");
    }

    #[test]
    fn checks_jpeg_and_png_signatures() {
        let mut jpeg = candidate("photo.jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
        assert!(validate_upload(&mut jpeg, &COVER_IMAGE, MimeMode::Lenient).is_ok());

        let mut fake_jpeg = candidate("photo.jpg", PNG_BYTES);
        let err = validate_upload(&mut fake_jpeg, &COVER_IMAGE, MimeMode::Lenient).unwrap_err();
        assert_eq!(err.to_string(), "File does not appear to be a valid JPEG image");

        let mut png = candidate("logo.png", PNG_BYTES);
        assert!(validate_upload(&mut png, &COVER_IMAGE, MimeMode::Lenient).is_ok());

        let mut fake_png = candidate("logo.png", b"\x89PNX\r\n\x1a\n");
        assert!(matches!(
            validate_upload(&mut fake_png, &COVER_IMAGE, MimeMode::Lenient),
            Err(UploadError::InvalidSignature { format: "PNG image" })
        ));
    }

    #[test]
    fn unchecked_formats_only_warn_in_lenient_mode() {
        // A PNG payload declared as webp has no hard signature check.
        let mut upload = candidate("banner.webp", PNG_BYTES);
        let validated = validate_upload(&mut upload, &COVER_IMAGE, MimeMode::Lenient).unwrap();
        assert_eq!(validated.content_type, "image/webp");
    }

    #[test]
    fn strict_mode_rejects_sniffed_mismatch() {
        let mut upload = candidate("banner.webp", PNG_BYTES);
        let err = validate_upload(&mut upload, &COVER_IMAGE, MimeMode::Strict).unwrap_err();
        assert!(matches!(err, UploadError::MimeMismatch { .. }));
    }

    #[test]
    fn unrecognised_content_passes_sniffing() {
        let mut upload = candidate("talk.mp3", b"just some bytes that are not audio");
        assert!(validate_upload(&mut upload, &AUDIO_FILE, MimeMode::Strict).is_ok());
    }

    #[test]
    fn sanitizes_before_checking() {
        let mut upload = candidate("../../uploads/../evil.pdf", b"%PDF-1.5");
        let validated = validate_upload(&mut upload, &PDF_DOCUMENT, MimeMode::Lenient).unwrap();
        assert_eq!(validated.filename, "evil.pdf");
    }

    #[test]
    fn peek_rewinds_reader() {
        let mut cursor = Cursor::new(b"%PDF-1.7 trailing".to_vec());
        cursor.set_position(9);
        let head = peek(&mut cursor, 4).unwrap();
        assert_eq!(head, b"%PDF");
        assert_eq!(cursor.position(), 0);
    }
}
