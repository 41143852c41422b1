use crate::detector::{convert_to_grayscale, FaceDetector};
use crate::emotion::{dominant, preprocess_face, Emotion, EmotionClassifier, Normalization};
use crate::error::AnalysisError;
use opencv::core::Rect;
use opencv::prelude::*;
use std::path::Path;
use tracing::trace;

/// Face bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection with a `frame_width` x `frame_height` frame, `None` when nothing is left.
    pub fn clamp_to(&self, frame_width: i32, frame_height: i32) -> Option<Rect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_width);
        let y2 = (self.y + self.height).min(frame_height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }
}

impl From<Rect> for FaceRegion {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<FaceRegion> for Rect {
    fn from(region: FaceRegion) -> Self {
        Rect::new(region.x, region.y, region.width, region.height)
    }
}

/// One detected face and what the classifier made of it.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceAnalysis {
    pub region: FaceRegion,
    pub dominant_emotion: Option<Emotion>,
    /// Probability per label, in model order.
    pub scores: Vec<(Emotion, f32)>,
}

impl FaceAnalysis {
    pub fn new(region: FaceRegion, scores: Vec<(Emotion, f32)>) -> Self {
        Self {
            region,
            dominant_emotion: dominant(&scores),
            scores,
        }
    }
}

pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &Mat) -> Result<Vec<FaceAnalysis>, AnalysisError>;
}

/// Haar cascade detection followed by ONNX emotion classification of every face.
pub struct EmotionAnalyzer {
    detector: FaceDetector,
    classifier: EmotionClassifier,
}

impl EmotionAnalyzer {
    pub fn new(
        cascade: Option<&Path>,
        model_path: &Path,
        normalization: Normalization,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            detector: FaceDetector::new(cascade)?,
            classifier: EmotionClassifier::new(model_path, normalization)?,
        })
    }
}

impl FaceAnalyzer for EmotionAnalyzer {
    fn analyze(&mut self, frame: &Mat) -> Result<Vec<FaceAnalysis>, AnalysisError> {
        let gray = convert_to_grayscale(frame)?;
        let regions = self.detector.detect(&gray)?;

        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let input = preprocess_face(&gray, &region, self.classifier.layout())?;
            let scores = self.classifier.classify(input)?;
            let face = FaceAnalysis::new(region, scores);
            trace!(region = ?face.region, emotion = ?face.dominant_emotion, "Classified face");
            faces.push(face);
        }
        Ok(faces)
    }
}
