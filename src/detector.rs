use crate::analysis::FaceRegion;
use crate::error::AnalysisError;
use opencv::prelude::*;
use opencv::{core, imgproc, objdetect};
use std::path::Path;
use tracing::debug;

/// Haar cascade bundled with OpenCV, looked up through `find_file`.
pub const DEFAULT_CASCADE: &str = "haarcascades/haarcascade_frontalface_alt.xml";

pub struct FaceDetector {
    classifier: objdetect::CascadeClassifier,
}

impl FaceDetector {
    /// Loads `cascade` if given, otherwise the frontal face cascade shipped with OpenCV.
    pub fn new(cascade: Option<&Path>) -> Result<Self, AnalysisError> {
        let xml = match cascade {
            Some(path) => path.to_string_lossy().into_owned(),
            None => core::find_file_def(DEFAULT_CASCADE)?,
        };
        let classifier = objdetect::CascadeClassifier::new(&xml)?;
        if classifier.empty()? {
            return Err(AnalysisError::ModelLoad(format!(
                "Haar cascade {xml} is empty"
            )));
        }
        debug!(cascade = %xml, "Loaded face cascade");
        Ok(Self { classifier })
    }

    /// Detects faces in a grayscale image.
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<FaceRegion>, AnalysisError> {
        let mut faces = core::Vector::<core::Rect>::new();

        self.classifier.detect_multi_scale(
            image,
            &mut faces,
            1.1,
            5,
            objdetect::CASCADE_SCALE_IMAGE,
            core::Size {
                width: 30,
                height: 30,
            },
            core::Size {
                width: 0,
                height: 0,
            },
        )?;
        Ok(faces.iter().map(FaceRegion::from).collect())
    }
}

pub fn convert_to_grayscale(image: &Mat) -> Result<Mat, AnalysisError> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}
