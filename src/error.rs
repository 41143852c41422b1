use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Could not open camera {0}. Please ensure a camera is connected")]
    Open(i32),
    #[error("Failed to capture frame from camera")]
    Read,
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("OpenCV error {0:?}")]
    OpenCv(#[from] opencv::Error),
    #[error("ONNX Runtime error {0}")]
    Ort(#[from] ort::Error),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Bad input tensor shape {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("Face region {0:?} lies outside the frame")]
    EmptyRegion(crate::FaceRegion),
}
