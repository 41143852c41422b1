use crate::analysis::FaceAnalysis;
use opencv::core::{self, Point, Rect, Scalar};
use opencv::imgproc;
use opencv::prelude::*;

fn overlay_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

const LINE_THICKNESS: i32 = 2;
const LABEL_SCALE: f64 = 0.9;
const LABEL_OFFSET: i32 = 10;

/// Flips a frame horizontally so the preview behaves like a mirror.
pub fn mirror(frame: &Mat) -> opencv::Result<Mat> {
    let mut mirrored = Mat::default();
    core::flip(frame, &mut mirrored, 1)?;
    Ok(mirrored)
}

/// Draws a box and the upper-cased dominant emotion for each face.
///
/// Faces with an empty region are skipped. Returns how many faces were drawn.
pub fn draw_analysis(frame: &mut Mat, faces: &[FaceAnalysis]) -> opencv::Result<usize> {
    let mut drawn = 0;
    for face in faces.iter().filter(|face| !face.region.is_empty()) {
        let rect = Rect::from(face.region);
        imgproc::rectangle(
            frame,
            rect,
            overlay_color(),
            LINE_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        if let Some(emotion) = face.dominant_emotion {
            imgproc::put_text(
                frame,
                &emotion.label().to_uppercase(),
                Point::new(rect.x, rect.y - LABEL_OFFSET),
                imgproc::FONT_HERSHEY_SIMPLEX,
                LABEL_SCALE,
                overlay_color(),
                LINE_THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
        }
        drawn += 1;
    }
    Ok(drawn)
}
