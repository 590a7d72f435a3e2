use std::path::Path;

use anyhow::{bail, Context};
use opencv::{self as cv, prelude::*};
use tracing::debug;

use crate::model::{BoundingBox, DetectedObject, DetectedPerson};

const BOX_THICKNESS: i32 = 3;
const FONT_SCALE: f64 = 0.6;
const FONT_THICKNESS: i32 = 1;
const LABEL_PADDING: i32 = 3;

/// Matplotlib's "cyan", in BGR order.
fn cyan() -> cv::core::Scalar {
    cv::core::Scalar::new(255., 255., 0., 0.)
}

fn black() -> cv::core::Scalar {
    cv::core::Scalar::new(0., 0., 0., 0.)
}

#[derive(Debug)]
pub struct Detection {
    pub label: Option<String>,
    pub position: cv::core::Rect,
    pub confidence: f32,
}

impl Detection {
    pub fn from_object(object: &DetectedObject) -> Self {
        let tag = object.top_tag();
        Detection {
            label: tag.map(|t| t.name.clone()),
            position: rect(object.bounding_box),
            confidence: tag.map_or(0.0, |t| t.confidence),
        }
    }

    pub fn from_person(person: &DetectedPerson) -> Self {
        Detection {
            label: None,
            position: rect(person.bounding_box),
            confidence: person.confidence,
        }
    }
}

fn rect(b: BoundingBox) -> cv::core::Rect {
    cv::core::Rect::new(b.x, b.y, b.w, b.h)
}

/// Draws every detection on the encoded source image and writes the result
/// to `output`; the output extension picks the encoder.
pub fn annotate(image: &[u8], detections: &[Detection], output: &Path) -> anyhow::Result<()> {
    let image_stream: cv::core::Vector<u8> = image.to_vec().into();
    let mut image_mat = cv::imgcodecs::imdecode(&image_stream, cv::imgcodecs::IMREAD_COLOR)?;
    if image_mat.cols() == 0 || image_mat.rows() == 0 {
        bail!("the image could not be decoded");
    }

    for detection in detections {
        debug!(label = ?detection.label, confidence = detection.confidence, "drawing detection");
        cv::imgproc::rectangle(
            &mut image_mat,
            detection.position,
            cyan(),
            BOX_THICKNESS,
            cv::imgproc::LINE_8,
            0,
        )?;
    }

    // labels go on after all boxes so a neighbouring box never covers them
    for detection in detections {
        if let Some(label) = &detection.label {
            draw_label(&mut image_mat, label, detection.position)?;
        }
    }

    let output_name = output
        .to_str()
        .with_context(|| format!("output path {} is not valid UTF-8", output.display()))?;
    let written = cv::imgcodecs::imwrite(output_name, &image_mat, &cv::core::Vector::new())?;
    if !written {
        bail!("could not write {}", output.display());
    }

    Ok(())
}

fn draw_label(image_mat: &mut cv::core::Mat, label: &str, anchor: cv::core::Rect) -> anyhow::Result<()> {
    let mut baseline = 0;
    let size = cv::imgproc::get_text_size(
        label,
        cv::imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        FONT_THICKNESS,
        &mut baseline,
    )?;

    let width = size.width + 2 * LABEL_PADDING;
    let height = size.height + baseline + 2 * LABEL_PADDING;
    let max_x = (image_mat.cols() - width).max(0);
    let max_y = (image_mat.rows() - height).max(0);
    let x = anchor.x.clamp(0, max_x);
    let y = anchor.y.clamp(0, max_y);

    cv::imgproc::rectangle(
        &mut *image_mat,
        cv::core::Rect::new(x, y, width, height),
        cyan(),
        cv::imgproc::FILLED,
        cv::imgproc::LINE_8,
        0,
    )?;

    cv::imgproc::put_text(
        &mut *image_mat,
        label,
        cv::core::Point::new(x + LABEL_PADDING, y + LABEL_PADDING + size.height),
        cv::imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        black(),
        FONT_THICKNESS,
        cv::imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Tag;

    /// A plain grey PNG, encoded in memory.
    pub(crate) fn grey_png(width: i32, height: i32) -> Vec<u8> {
        let mat = cv::core::Mat::new_rows_cols_with_default(
            height,
            width,
            cv::core::CV_8UC3,
            cv::core::Scalar::all(128.),
        )
        .unwrap();
        let mut buf = cv::core::Vector::<u8>::new();
        cv::imgcodecs::imencode(".png", &mat, &mut buf, &cv::core::Vector::new()).unwrap();
        buf.to_vec()
    }

    fn pixel(mat: &cv::core::Mat, x: i32, y: i32) -> [u8; 3] {
        let px = mat.at_2d::<cv::core::Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    #[test]
    fn draws_boxes_in_cyan() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("annotated.png");
        let detections = vec![Detection {
            label: None,
            position: cv::core::Rect::new(20, 20, 40, 30),
            confidence: 0.9,
        }];

        annotate(&grey_png(100, 80), &detections, &output).unwrap();

        let mat = cv::imgcodecs::imread(output.to_str().unwrap(), cv::imgcodecs::IMREAD_COLOR).unwrap();
        assert_eq!((mat.cols(), mat.rows()), (100, 80));
        assert_eq!(pixel(&mat, 40, 20), [255, 255, 0]);
        assert_eq!(pixel(&mat, 40, 40), [128, 128, 128]);
        assert_eq!(pixel(&mat, 5, 5), [128, 128, 128]);
    }

    #[test]
    fn label_strip_stays_inside_image() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("labelled.png");
        let detections = vec![Detection {
            label: Some("dog".into()),
            position: cv::core::Rect::new(-10, -10, 30, 30),
            confidence: 0.5,
        }];

        annotate(&grey_png(120, 90), &detections, &output).unwrap();

        let mat = cv::imgcodecs::imread(output.to_str().unwrap(), cv::imgcodecs::IMREAD_COLOR).unwrap();
        // the filled strip starts at the clamped corner
        assert_eq!(pixel(&mat, 0, 0), [255, 255, 0]);
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("never.png");
        let err = annotate(b"definitely not an image", &[], &output).unwrap_err();
        assert!(err.to_string().contains("could not be decoded"));
        assert!(!output.exists());
    }

    #[test]
    fn object_detection_takes_top_tag() {
        let object = DetectedObject {
            bounding_box: BoundingBox { x: 1, y: 2, w: 3, h: 4 },
            tags: vec![
                Tag { name: "cat".into(), confidence: 0.8 },
                Tag { name: "mammal".into(), confidence: 0.7 },
            ],
        };
        let detection = Detection::from_object(&object);
        assert_eq!(detection.label.as_deref(), Some("cat"));
        assert_eq!(detection.position, cv::core::Rect::new(1, 2, 3, 4));
        assert!((detection.confidence - 0.8).abs() < f32::EPSILON);
    }
}
