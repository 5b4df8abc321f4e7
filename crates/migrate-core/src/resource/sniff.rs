//! Content-type inference and upload-safe filenames.

const TEXT_SNIFF_BYTES: usize = 2000;

const ALLOWED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".pdf", ".txt", ".csv", ".docx", ".xlsx", ".pptx",
    ".mp4", ".mp3", ".wav",
];

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type from the leading bytes, if they carry a known signature.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    sniff_text(bytes)
}

fn sniff_text(bytes: &[u8]) -> Option<&'static str> {
    let head = &bytes[..bytes.len().min(TEXT_SNIFF_BYTES)];
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // A multi-byte character cut by the sniff window is still text.
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
            std::str::from_utf8(&head[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };
    let lower = text.to_lowercase();
    if lower.contains("<svg") {
        return Some("image/svg+xml");
    }
    if lower.contains("<html") || lower.contains("<!doctype html") {
        return Some("text/html");
    }
    Some("text/plain")
}

pub fn content_type_from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" | "svgz" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(ct)
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let ext = match content_type {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        // Vector images are uploaded under an image extension the destination accepts.
        "image/svg+xml" => ".png",
        "application/pdf" => ".pdf",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "video/mp4" => ".mp4",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/wav" | "audio/x-wav" => ".wav",
        _ => return None,
    };
    Some(ext)
}

fn usable_header(header: Option<&str>) -> Option<String> {
    let ct = header?.split(';').next()?.trim().to_ascii_lowercase();
    (!ct.is_empty() && ct != OCTET_STREAM).then_some(ct)
}

/// Picks the content type: a meaningful header first, then the declared type
/// from the markup, then byte sniffing, then the name's extension.
pub fn choose_content_type(
    bytes: &[u8],
    header: Option<&str>,
    declared: Option<&str>,
    name: &str,
) -> String {
    usable_header(header)
        .or_else(|| usable_header(declared))
        .or_else(|| sniff_content_type(bytes).map(str::to_string))
        .or_else(|| content_type_from_extension(name).map(str::to_string))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Filename with an extension the destination accepts, and the content type
/// to upload under. Unsupported types are coerced to a generic image, text or
/// document type.
pub fn safe_filename(base: &str, content_type: &str) -> (String, String) {
    let stem = sanitize_stem(base);
    if let Some(ext) = extension_for(content_type).filter(|e| ALLOWED_EXTENSIONS.contains(e)) {
        return (format!("{stem}{ext}"), content_type.to_string());
    }
    let (ext, ct) = if content_type.starts_with("image/") {
        (".png", "image/png")
    } else if content_type.starts_with("text/") {
        (".txt", "text/plain")
    } else {
        (".pdf", "application/pdf")
    };
    (format!("{stem}{ext}"), ct.to_string())
}

fn sanitize_stem(base: &str) -> String {
    let name = base.rsplit(['/', '\\']).next().unwrap_or(base);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let cleaned: String = stem
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '<' | '>' | '|' | '?' | '*' | ':'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\nrest"), Some("image/png"));
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_content_type(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8"), Some("image/webp"));
        assert_eq!(sniff_content_type(b"<svg xmlns='x'/>"), Some("image/svg+xml"));
        assert_eq!(sniff_content_type(b"hello"), Some("text/plain"));
        assert_eq!(sniff_content_type(&[0x00, 0xFF, 0xFE, 0x80]), None);
    }

    #[test]
    fn markup_found_past_a_prologue() {
        let svg = b"<!-- exported --><!DOCTYPE svg><svg viewBox='0 0 1 1'></svg>";
        assert_eq!(sniff_content_type(svg), Some("image/svg+xml"));
        let html = b"\n<!-- saved page -->\n<HTML><body>x</body></HTML>";
        assert_eq!(sniff_content_type(html), Some("text/html"));
    }

    #[test]
    fn text_sniff_tolerates_cut_character() {
        let mut bytes = "a".repeat(1999).into_bytes();
        bytes.extend_from_slice("é".as_bytes());
        assert_eq!(sniff_content_type(&bytes), Some("text/plain"));
    }

    #[test]
    fn octet_stream_header_is_ignored() {
        let ct = choose_content_type(b"%PDF-1.4", Some("application/octet-stream"), None, "x");
        assert_eq!(ct, "application/pdf");
        let ct = choose_content_type(b"%PDF-1.4", Some("image/png; charset=binary"), None, "x");
        assert_eq!(ct, "image/png");
    }

    #[test]
    fn disallowed_types_are_coerced() {
        assert_eq!(
            safe_filename("report.bin", "application/zip"),
            ("report.pdf".to_string(), "application/pdf".to_string())
        );
        assert_eq!(
            safe_filename("shot", "image/bmp"),
            ("shot.png".to_string(), "image/png".to_string())
        );
        assert_eq!(
            safe_filename("notes.md", "text/markdown"),
            ("notes.txt".to_string(), "text/plain".to_string())
        );
        assert_eq!(
            safe_filename("photo.jpeg", "image/jpeg"),
            ("photo.jpg".to_string(), "image/jpeg".to_string())
        );
    }
}
