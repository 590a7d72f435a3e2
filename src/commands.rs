use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use tracing::info;

use crate::model::{Feature, SegmentMode};
use crate::reco::{annotate, Detection};
use crate::report;
use crate::req::http::{ReadOptions, VisionClient};

pub const DEFAULT_OBJECTS_IMAGE: &str = "images/pic_a.jpg";
pub const DEFAULT_PEOPLE_IMAGE: &str = "images/pic_c.jpg";
pub const DEFAULT_DOCUMENT_IMAGE: &str = "images/bi.png";

pub const OBJECTS_OUTPUT: &str = "objects.jpg";
pub const PEOPLE_OUTPUT: &str = "people.jpg";
pub const BACKGROUND_OUTPUT: &str = "background_removed.png";
pub const FOREGROUND_OUTPUT: &str = "foreground_matted.png";

pub fn load_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !path.is_file() {
        bail!(
            "The file '{}' does not exist. Please provide a valid image path.",
            path.display()
        );
    }
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn objects(
    client: &VisionClient,
    image_file: &Path,
    output: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    writeln!(out, "\nAnalyzing image: {}", image_file.display())?;

    let result = client.analyze(&image, &[Feature::Objects])?;
    report::objects(&result, out)?;

    let detections: Vec<Detection> = result.objects().iter().map(Detection::from_object).collect();
    if detections.is_empty() {
        return Ok(());
    }
    annotate(&image, &detections, output)?;
    info!(count = detections.len(), output = %output.display(), "annotated objects");
    writeln!(out, "Results saved in {}", output.display())?;
    Ok(())
}

pub fn people(
    client: &VisionClient,
    image_file: &Path,
    output: &Path,
    min_confidence: f32,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    writeln!(out, "\nAnalyzing image: {}", image_file.display())?;

    let result = client.analyze(&image, &[Feature::People])?;
    report::people(result.people(), out)?;

    let detections: Vec<Detection> = result
        .people()
        .iter()
        .filter(|p| p.confidence >= min_confidence)
        .map(Detection::from_person)
        .collect();
    if detections.is_empty() {
        if !result.people().is_empty() {
            writeln!(out, "No person reached confidence {:.2}; nothing drawn.", min_confidence)?;
        }
        return Ok(());
    }
    annotate(&image, &detections, output)?;
    info!(count = detections.len(), output = %output.display(), "annotated people");
    writeln!(out, "Results saved in {}", output.display())?;
    Ok(())
}

pub fn segment(
    client: &VisionClient,
    image_file: &Path,
    mode: SegmentMode,
    output: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    let png = client.segment(&image, mode)?;
    fs::write(output, &png).with_context(|| format!("failed to write {}", output.display()))?;

    let done = match mode {
        SegmentMode::BackgroundRemoval => "Background removed",
        SegmentMode::ForegroundMatting => "Foreground matted",
    };
    writeln!(out, "{} and saved in {}", done, output.display())?;
    Ok(())
}

pub fn caption(client: &VisionClient, image_file: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    writeln!(out, "\nAnalyzing image: {}", image_file.display())?;

    let result = client.analyze(&image, &[Feature::Caption, Feature::DenseCaptions])?;
    report::captions(&result, out)?;
    Ok(())
}

pub fn tags(client: &VisionClient, image_file: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    writeln!(out, "\nAnalyzing image: {}", image_file.display())?;

    let result = client.analyze(&image, &[Feature::Tags])?;
    report::tags(&result, out)?;
    Ok(())
}

pub fn read(
    client: &VisionClient,
    image_file: &Path,
    options: ReadOptions,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let image = load_image(image_file)?;
    writeln!(out, "\nReading text from image: {}", image_file.display())?;

    let pages = client.read_text(&image, options)?;
    report::text(&pages, out)?;
    Ok(())
}

pub fn image_or_default(image: Option<PathBuf>, default: &str) -> PathBuf {
    image.unwrap_or_else(|| PathBuf::from(default))
}
