/// Substrings that are never allowed to reach the filesystem. Order matters: `..` is
/// replaced before the single-character separators.
const DANGEROUS_SEQUENCES: [&str; 10] = ["..", "/", "\\", ":", "*", "?", "\"", "<", ">", "|"];

/// Longest filename (in characters) we are willing to store.
pub const MAX_FILENAME_LEN: usize = 255;

/// Stem length kept when a long name is truncated and the extension is short.
const TRUNCATED_STEM_LEN: usize = 250;

/// sanitize_filename
///
/// Turns an arbitrary, user-supplied filename into something safe to use as the last
/// component of a storage key or a `Content-Disposition` value.
///
/// 1. Only the base name (text after the last `/`) is kept.
/// 2. Every dangerous sequence is replaced with `_`.
/// 3. Names longer than 255 characters have their stem truncated while the extension is kept.
///
/// Never fails. An empty input yields an empty output; callers that need a non-empty name
/// must check for it themselves.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit('/').next().unwrap_or(filename);

    let mut sanitized = base.to_string();
    for sequence in DANGEROUS_SEQUENCES {
        sanitized = sanitized.replace(sequence, "_");
    }

    if sanitized.chars().count() > MAX_FILENAME_LEN {
        sanitized = truncate_preserving_extension(&sanitized);
    }

    sanitized
}

/// split_extension
///
/// Splits `name` into `(stem, extension)` where the extension includes its leading dot.
/// Leading dots do not start an extension, so `.env` has no extension and `archive.tar.gz`
/// has the extension `.gz`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// extension_of
///
/// Lowercased extension (with its dot) of an already sanitized filename, or an empty
/// string when there is none.
pub fn extension_of(name: &str) -> String {
    split_extension(name).1.to_lowercase()
}

fn truncate_preserving_extension(name: &str) -> String {
    let (stem, ext) = split_extension(name);
    let ext_len = ext.chars().count();

    if ext_len >= MAX_FILENAME_LEN {
        // Nothing sensible can be preserved.
        return name.chars().take(MAX_FILENAME_LEN).collect();
    }

    let stem_len = TRUNCATED_STEM_LEN.min(MAX_FILENAME_LEN - ext_len);
    let mut truncated: String = stem.chars().take(stem_len).collect();
    truncated.push_str(ext);
    truncated
}

/// content_disposition_filename
///
/// Narrows a sanitized filename further to the characters that are safe inside a quoted
/// HTTP header parameter: ASCII alphanumerics, `-`, `_` and `.`. Whitespace becomes `_`,
/// anything else is dropped. A stem left without any letter or digit (typically an Urdu
/// name) is replaced by `file`, keeping the extension.
pub fn content_disposition_filename(name: &str) -> String {
    let sanitized = sanitize_filename(name.trim());
    let (stem, ext) = split_extension(&sanitized);
    let (stem, ext) = (header_safe(stem), header_safe(ext));

    if stem.chars().any(|c| c.is_ascii_alphanumeric()) {
        format!("{stem}{ext}")
    } else {
        format!("file{ext}")
    }
}

fn header_safe(part: &str) -> String {
    part.chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect()
}

/// content_disposition
///
/// Full `Content-Disposition` value for `name`. Names that are not plain ASCII also get an
/// RFC 6266 `filename*` parameter carrying the UTF-8 name percent-encoded, next to the ASCII
/// fallback for older clients.
pub fn content_disposition(disposition: &str, name: &str) -> String {
    let sanitized = sanitize_filename(name.trim());
    let fallback = content_disposition_filename(&sanitized);

    if sanitized.is_ascii() || sanitized.is_empty() {
        format!("{disposition}; filename=\"{fallback}\"")
    } else {
        format!(
            "{disposition}; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(&sanitized)
        )
    }
}
