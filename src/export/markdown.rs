use super::helpers::{format_date, format_step_time, optimize_screenshot, ImageTarget};
use super::{ExportError, GuideDocument};
use std::fs;
use std::io::{Cursor, Write as _};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A screenshot written next to the Markdown file.
pub struct MarkdownImage {
    pub step: u32,
    /// Path relative to the `.md` file, e.g. `guide-images/step-1.webp`.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// "my_guide" → "my_guide-images"
pub fn images_dir_name(stem: &str) -> String {
    format!("{stem}-images")
}

/// Decodes and optimizes every screenshot in the guide.
pub fn prepare_images(doc: &GuideDocument, images_dir: &str) -> Vec<MarkdownImage> {
    doc.steps
        .iter()
        .filter_map(|step| {
            let img = optimize_screenshot(step.screenshot.as_deref()?, ImageTarget::Web)?;
            Some(MarkdownImage {
                step: step.id,
                path: format!("{images_dir}/step-{}.{}", step.id, img.ext),
                bytes: img.bytes,
            })
        })
        .collect()
}

/// Generate markdown content referencing `images` by relative path.
pub fn generate_content(doc: &GuideDocument, images: &[MarkdownImage]) -> String {
    let count = doc.steps.len();
    let mut md = format!("# {}\n\n", doc.title);
    if !doc.description.is_empty() {
        md.push_str(&format!("{}\n\n", doc.description));
    }
    md.push_str(&format!(
        "_Generated on {} \u{2022} {count} step{}_\n\n",
        format_date(&doc.generated),
        if count == 1 { "" } else { "s" },
    ));

    for step in &doc.steps {
        let num = step.id;
        md.push_str(&format!("## Step {num}\n\n"));
        md.push_str(&format!("**{}**\n\n", step.description));
        md.push_str(&format!(
            "Action: `{}` \u{2022} Time: {}\n\n",
            step.action,
            format_step_time(step.timestamp)
        ));

        if let Some(image) = images.iter().find(|img| img.step == num) {
            md.push_str(&format!("![Step {num}](<./{}>)\n\n", image.path));
        }
    }

    md
}

/// Build a zip archive containing `<stem>.md` and its screenshot images.
pub fn bundle(doc: &GuideDocument, stem: &str) -> Result<Vec<u8>, ExportError> {
    let images = prepare_images(doc, &images_dir_name(stem));
    let content = generate_content(doc, &images);

    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(format!("{stem}.md"), opts)?;
    zip.write_all(content.as_bytes())?;

    for image in &images {
        zip.start_file(image.path.as_str(), opts)?;
        zip.write_all(&image.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Write the `.md` file and its `<stem>-images/` folder.
pub fn write(doc: &GuideDocument, output_path: &Path) -> Result<(), ExportError> {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let parent = output_path.parent().unwrap_or_else(|| Path::new("."));

    let images = prepare_images(doc, &images_dir_name(stem));
    if !images.is_empty() {
        fs::create_dir_all(parent.join(images_dir_name(stem)))?;
    }
    for image in &images {
        fs::write(parent.join(&image.path), &image.bytes)?;
    }
    fs::write(output_path, generate_content(doc, &images))?;
    Ok(())
}
