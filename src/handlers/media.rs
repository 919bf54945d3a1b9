use crate::events::MediaKind;
use crate::replies::Language;

/// Pick a mime type for downloaded content.
///
/// Magic bytes win, then the file extension, then a usable `Content-Type`
/// header, then a per-kind default.
pub fn mime_type(
    kind: MediaKind,
    file_name: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
) -> String {
    if let Some(sniffed) = sniff(data) {
        return sniffed.to_string();
    }
    if let Some(by_ext) = file_name.and_then(from_extension) {
        return by_ext.to_string();
    }
    if let Some(header) = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
    {
        return header.to_string();
    }
    match kind {
        MediaKind::Image => "image/jpeg",
        MediaKind::Audio => "audio/mp4",
        MediaKind::Video => "video/mp4",
        MediaKind::File => "application/octet-stream",
    }
    .to_string()
}

fn sniff(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
        Some("audio/wav")
    } else if data.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if data.starts_with(b"OggS") {
        Some("audio/ogg")
    } else if data.starts_with(b"ID3") {
        Some("audio/mpeg")
    } else {
        None
    }
}

fn from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

/// Instruction sent with the attachment.
pub fn prompt(kind: MediaKind, file_name: Option<&str>, lang: Language) -> String {
    let task = match kind {
        MediaKind::Image => "Describe this image and answer any question it suggests.".to_string(),
        MediaKind::Audio => "Transcribe this audio message and summarize what was said.".to_string(),
        MediaKind::Video => "Describe what happens in this video.".to_string(),
        MediaKind::File => match file_name {
            Some(name) => format!("Summarize the key points of the attached document \"{}\".", name),
            None => "Summarize the key points of the attached document.".to_string(),
        },
    };
    format!("{} Reply in {}.", task, lang.name())
}

/// What the user's side of the conversation history records for an upload.
pub fn history_entry(kind: MediaKind, file_name: Option<&str>) -> String {
    match (kind, file_name) {
        (MediaKind::File, Some(name)) => format!("[User sent file: {}]", name),
        _ => format!("[User sent {}]", kind.as_str()),
    }
}
