pub mod arcface_embedder;
pub mod execution_provider;
pub mod onnx_face_engine;
pub mod onnx_yolo_detector;
