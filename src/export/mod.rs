pub mod helpers;
pub mod html;
pub mod markdown;
pub mod pdf;

use crate::recorder::storage::GuideSettings;
use crate::recorder::types::Step;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Title used in documents when the guide has none.
pub const FALLBACK_TITLE: &str = "Step Guide";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
    #[error("Invalid output path: \"{0}\"")]
    InvalidPath(PathBuf),
    #[error("{0}")]
    NotWritable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    /// The `.md` file alone; screenshots go to a sibling folder on write.
    Markdown,
    /// Zip archive with the `.md` file and its screenshots.
    MarkdownBundle,
    Pdf,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "md" => Ok(Self::Markdown),
            "zip" => Ok(Self::MarkdownBundle),
            "pdf" => Ok(Self::Pdf),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
            Self::MarkdownBundle => "zip",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Markdown => "text/markdown",
            Self::MarkdownBundle => "application/zip",
            Self::Pdf => "application/pdf",
        }
    }
}

/// Everything an exporter needs, with steps in id order.
#[derive(Debug, Clone)]
pub struct GuideDocument {
    pub title: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub generated: DateTime<Local>,
}

impl GuideDocument {
    pub fn new(settings: &GuideSettings, steps: &[Step]) -> Self {
        let mut steps = steps.to_vec();
        // captures may have completed out of order
        steps.sort_by_key(|s| s.id);
        let title = settings.title.trim();
        Self {
            title: if title.is_empty() {
                FALLBACK_TITLE.to_string()
            } else {
                title.to_string()
            },
            description: settings.description.trim().to_string(),
            steps,
            generated: Local::now(),
        }
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        helpers::export_file_name(&self.title, format.extension())
    }
}

/// A rendered export, ready to be downloaded or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn render(doc: &GuideDocument, format: ExportFormat) -> Result<ExportedFile, ExportError> {
    let file_name = doc.file_name(format);
    let stem = helpers::file_stem(&doc.title);
    let bytes = match format {
        ExportFormat::Html => html::generate(doc).into_bytes(),
        ExportFormat::Markdown => {
            let images = markdown::prepare_images(doc, &markdown::images_dir_name(&stem));
            markdown::generate_content(doc, &images).into_bytes()
        }
        ExportFormat::MarkdownBundle => markdown::bundle(doc, &stem)?,
        ExportFormat::Pdf => pdf::generate(doc),
    };
    tracing::debug!(file = %file_name, size = bytes.len(), "export rendered");
    Ok(ExportedFile {
        file_name,
        mime: format.mime_type().to_string(),
        bytes,
    })
}

/// Turn an IO error into a user-friendly message.
fn friendly_write_error(e: &std::io::Error, path: &Path) -> ExportError {
    let path = path.display();
    ExportError::NotWritable(match e.kind() {
        std::io::ErrorKind::PermissionDenied => format!(
            "Cannot save to \"{path}\": permission denied. Is the file open in another app or the folder read-only?"
        ),
        std::io::ErrorKind::NotFound => format!("The folder for \"{path}\" does not exist."),
        _ => format!("Could not save file: {e}"),
    })
}

/// Pre-validate that we can write to `output_path` before doing expensive work.
fn validate_write_access(output_path: &Path) -> Result<(), ExportError> {
    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Err(ExportError::InvalidPath(output_path.to_path_buf())),
    };

    if !parent.exists() {
        return Err(ExportError::NotWritable(format!(
            "The folder \"{}\" does not exist.",
            parent.display()
        )));
    }

    // Probe writability with a temp file in the same directory
    let probe_path = parent.join(format!(".guidecast_probe_{}", std::process::id()));
    match std::fs::File::create(&probe_path) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe_path);
        }
        Err(e) => {
            let _ = std::fs::remove_file(&probe_path);
            return Err(ExportError::NotWritable(match e.kind() {
                std::io::ErrorKind::PermissionDenied => format!(
                    "Cannot write to folder \"{}\": permission denied.",
                    parent.display()
                ),
                _ => format!("Cannot write to folder \"{}\": {e}", parent.display()),
            }));
        }
    }

    // Existing target must be writable (opens without truncating)
    if output_path.exists() {
        if let Err(e) = std::fs::OpenOptions::new().write(true).open(output_path) {
            return Err(ExportError::NotWritable(match e.kind() {
                std::io::ErrorKind::PermissionDenied => format!(
                    "Cannot overwrite \"{}\": the file is read-only or locked.",
                    output_path.display()
                ),
                _ => format!("Cannot write to \"{}\": {e}", output_path.display()),
            }));
        }
    }

    Ok(())
}

/// Writes the export to `output_path`. Plain Markdown also writes its
/// screenshots into `<stem>-images/` next to the file.
pub fn export(doc: &GuideDocument, format: ExportFormat, output_path: &Path) -> Result<(), ExportError> {
    validate_write_access(output_path)?;

    match format {
        ExportFormat::Markdown => markdown::write(doc, output_path),
        _ => {
            let file = render(doc, format)?;
            std::fs::write(output_path, file.bytes)
                .map_err(|e| friendly_write_error(&e, output_path))
        }
    }?;
    tracing::info!(path = %output_path.display(), ?format, steps = doc.steps.len(), "guide exported");
    Ok(())
}
