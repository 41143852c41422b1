//! Emotion classification with a pretrained ONNX model.
//!
//! Two label layouts are understood, picked by the length of the model output:
//! FER+ (8 classes) and FER2013 (7 classes).

use crate::analysis::FaceRegion;
use crate::error::AnalysisError;
use ndarray::Array4;
use opencv::core::Size;
use opencv::imgproc;
use opencv::prelude::*;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Fallback side length when the model input shape is dynamic.
pub const DEFAULT_INPUT_SIZE: i32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
    Contempt,
}

impl Emotion {
    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
            Emotion::Contempt => "contempt",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const FERPLUS_LABELS: [Emotion; 8] = [
    Emotion::Neutral,
    Emotion::Happy,
    Emotion::Surprise,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Disgust,
    Emotion::Fear,
    Emotion::Contempt,
];

const FER2013_LABELS: [Emotion; 7] = [
    Emotion::Angry,
    Emotion::Disgust,
    Emotion::Fear,
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Surprise,
    Emotion::Neutral,
];

/// Label order for a model with `outputs` classes.
pub fn labels_for(outputs: usize) -> Result<&'static [Emotion], AnalysisError> {
    match outputs {
        8 => Ok(&FERPLUS_LABELS),
        7 => Ok(&FER2013_LABELS),
        n => Err(AnalysisError::UnexpectedOutput(format!(
            "expected 7 or 8 emotion scores, got {n}"
        ))),
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|x| x / sum).collect()
}

/// Turns raw model output into labelled probabilities, in model order.
pub fn score_logits(logits: &[f32]) -> Result<Vec<(Emotion, f32)>, AnalysisError> {
    let labels = labels_for(logits.len())?;
    Ok(labels.iter().copied().zip(softmax(logits)).collect())
}

/// Highest scoring emotion. Ties go to the earlier label.
pub fn dominant(scores: &[(Emotion, f32)]) -> Option<Emotion> {
    scores
        .iter()
        .fold(None, |best: Option<(Emotion, f32)>, &(emotion, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((emotion, score)),
        })
        .map(|(emotion, _)| emotion)
}

/// Pixel scaling expected by the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Normalization {
    /// Pixels stay in 0..255 (FER+)
    #[default]
    Raw,
    /// Pixels scaled to 0..1 (FER2013 models)
    Unit,
}

impl Normalization {
    fn scale(self) -> f32 {
        match self {
            Normalization::Raw => 1.0,
            Normalization::Unit => 1.0 / 255.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelLayout {
    pub input_size: i32,
    pub normalization: Normalization,
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            normalization: Normalization::default(),
        }
    }
}

/// Crops `region` out of a grayscale frame and packs it as a `[1, 1, S, S]` tensor.
pub fn preprocess_face(
    gray: &Mat,
    region: &FaceRegion,
    layout: &ModelLayout,
) -> Result<Array4<f32>, AnalysisError> {
    let frame_size = gray.size()?;
    let rect = region
        .clamp_to(frame_size.width, frame_size.height)
        .ok_or(AnalysisError::EmptyRegion(*region))?;

    let face = Mat::roi(gray, rect)?.try_clone()?;
    let side = layout.input_size;
    let mut resized = Mat::default();
    imgproc::resize(
        &face,
        &mut resized,
        Size::new(side, side),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    let scale = layout.normalization.scale();
    let data: Vec<f32> = resized
        .data_bytes()?
        .iter()
        .map(|&pixel| pixel as f32 * scale)
        .collect();
    Ok(Array4::from_shape_vec(
        (1, 1, side as usize, side as usize),
        data,
    )?)
}

pub struct EmotionClassifier {
    session: ort::session::Session,
    layout: ModelLayout,
}

impl EmotionClassifier {
    /// Loads the model. The input size is taken from its NCHW input shape when fixed.
    pub fn new(model_path: &Path, normalization: Normalization) -> Result<Self, AnalysisError> {
        let session = ort::session::Session::builder()
            .map_err(|e| AnalysisError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| {
                AnalysisError::ModelLoad(format!("{}: {e}", model_path.display()))
            })?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as i32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        debug!(model = %model_path.display(), input_size, "Loaded emotion model");
        Ok(Self {
            session,
            layout: ModelLayout {
                input_size,
                normalization,
            },
        })
    }

    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    pub fn classify(&mut self, input: Array4<f32>) -> Result<Vec<(Emotion, f32)>, AnalysisError> {
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err(AnalysisError::UnexpectedOutput(
                "model produced no outputs".to_string(),
            ));
        }
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits: Vec<f32> = logits.iter().copied().collect();
        score_logits(&logits)
    }
}
