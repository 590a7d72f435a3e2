use std::io::Write;

use crate::model::{AnalysisResult, DetectedPerson, ReadPage};

fn percent(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}

pub fn objects(result: &AnalysisResult, out: &mut impl Write) -> std::io::Result<()> {
    if result.objects().is_empty() {
        return writeln!(out, "No objects detected in the image.");
    }

    writeln!(out, "\nObjects in image:")?;
    for object in result.objects() {
        let (name, confidence) = object
            .top_tag()
            .map_or(("unknown", 0.0), |t| (t.name.as_str(), t.confidence));
        writeln!(out, " {} (confidence: {})", name, percent(confidence))?;
    }
    Ok(())
}

pub fn people(people: &[DetectedPerson], out: &mut impl Write) -> std::io::Result<()> {
    if people.is_empty() {
        return writeln!(out, "No people detected in the image.");
    }

    writeln!(out, "\nPeople in image:")?;
    for person in people {
        let b = person.bounding_box;
        writeln!(
            out,
            " Person (confidence: {}) at [{}, {}, {}, {}]",
            percent(person.confidence),
            b.x,
            b.y,
            b.w,
            b.h
        )?;
    }
    Ok(())
}

pub fn captions(result: &AnalysisResult, out: &mut impl Write) -> std::io::Result<()> {
    if let Some(caption) = &result.caption_result {
        writeln!(out, "\nCaption:")?;
        writeln!(
            out,
            " Caption: '{}' (confidence: {})",
            caption.text,
            percent(caption.confidence)
        )?;
    }

    if let Some(dense) = &result.dense_captions_result {
        writeln!(out, "\nDense Captions:")?;
        for caption in &dense.values {
            writeln!(
                out,
                " Caption: '{}' (confidence: {})",
                caption.text,
                percent(caption.confidence)
            )?;
        }
    }
    Ok(())
}

pub fn tags(result: &AnalysisResult, out: &mut impl Write) -> std::io::Result<()> {
    if result.tags().is_empty() {
        return writeln!(out, "No tags detected.");
    }

    writeln!(out, "\nTags:")?;
    for tag in result.tags() {
        writeln!(out, " Tag: '{}' (confidence: {})", tag.name, percent(tag.confidence))?;
    }
    Ok(())
}

pub fn text(pages: &[ReadPage], out: &mut impl Write) -> std::io::Result<()> {
    for line in pages.iter().flat_map(|page| &page.lines) {
        writeln!(out, " Text: {}", line.content)?;
    }
    Ok(())
}
