use base64::Engine;
use chrono::{DateTime, Local, TimeZone};
use image::ImageEncoder;

pub const FALLBACK_FILE_STEM: &str = "step_guide";

/// Screenshot bytes pulled out of a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decodes `data:<mime>;base64,<payload>`. Anything else yields `None`.
pub fn decode_data_url(url: &str) -> Option<DataUrl> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    Some(DataUrl {
        mime: mime.to_string(),
        bytes,
    })
}

/// Image data with format metadata for export.
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub ext: &'static str,
}

impl OptimizedImage {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Target format for image optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    /// WebP for standalone HTML / Markdown (smallest for web).
    Web,
    /// JPEG for PDF (PDF supports JPEG natively via DCTDecode).
    Pdf,
}

/// Keeps the bytes as they are, labelled with their sniffed format.
fn unchanged(bytes: &[u8]) -> OptimizedImage {
    let (mime, ext) = match image::guess_format(bytes) {
        Ok(format) => (
            format.to_mime_type(),
            format.extensions_str().first().copied().unwrap_or("bin"),
        ),
        Err(_) => ("application/octet-stream", "bin"),
    };
    OptimizedImage {
        bytes: bytes.to_vec(),
        mime,
        ext,
    }
}

/// Convert to WebP. Keeps the original if conversion fails or the WebP
/// output is not smaller.
pub fn to_webp_or_original(bytes: &[u8]) -> OptimizedImage {
    if let Ok(img) = image::load_from_memory(bytes) {
        let mut buf = std::io::Cursor::new(Vec::new());
        if img.write_to(&mut buf, image::ImageFormat::WebP).is_ok() {
            let webp_bytes = buf.into_inner();
            if webp_bytes.len() < bytes.len() {
                return OptimizedImage {
                    bytes: webp_bytes,
                    mime: "image/webp",
                    ext: "webp",
                };
            }
        }
    }
    unchanged(bytes)
}

/// Encodes a decoded image as JPEG at quality 85.
pub fn encode_jpeg(img: &image::DynamicImage) -> Option<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .ok()?;
    Some(buf.into_inner())
}

/// Convert to JPEG. Keeps the original on failure.
pub fn to_jpeg(bytes: &[u8]) -> OptimizedImage {
    match image::load_from_memory(bytes).ok().as_ref().and_then(encode_jpeg) {
        Some(jpeg) => OptimizedImage {
            bytes: jpeg,
            mime: "image/jpeg",
            ext: "jpg",
        },
        None => unchanged(bytes),
    }
}

/// Decode a step screenshot and re-encode it for `target`.
pub fn optimize_screenshot(data_url: &str, target: ImageTarget) -> Option<OptimizedImage> {
    let decoded = decode_data_url(data_url)?;
    Some(match target {
        ImageTarget::Web => to_webp_or_original(&decoded.bytes),
        ImageTarget::Pdf => to_jpeg(&decoded.bytes),
    })
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// File name for an export: the title lowercased, every character other
/// than an ASCII letter or digit replaced by `_`.
pub fn export_file_name(title: &str, ext: &str) -> String {
    format!("{}.{ext}", file_stem(title))
}

pub fn file_stem(title: &str) -> String {
    if title.is_empty() {
        return FALLBACK_FILE_STEM.to_string();
    }
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

pub fn format_date(at: &DateTime<Local>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

/// Local wall-clock time of a step timestamp (Unix milliseconds).
pub fn format_step_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(at) => at.format("%-I:%M:%S %p").to_string(),
        None => String::new(),
    }
}
