use crate::classifier::DishModel;
use crate::error::{Error, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

/// Trained classifier exported to ONNX. Expects a `1 x S x S x 3` float
/// input scaled to [0, 1] and returns one score per class.
pub struct OnnxDishModel {
    session: Session,
}

impl OnnxDishModel {
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = build_session(model_path)?;
        log::info!("Loaded food model: {}", model_path.display());
        Ok(Self { session })
    }
}

impl DishModel for OnnxDishModel {
    fn predict(&mut self, input: Array4<f32>) -> Result<Vec<f32>> {
        let session = &mut self.session;
        let run = || -> Result<Vec<f32>> {
            let tensor = Tensor::from_array(input)
                .map_err(|e| Error::Model(format!("Invalid model tensor: {e}")))?;
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| Error::Model(format!("Failed to run food model: {e}")))?;
            let (_, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Model(format!("Unexpected model output: {e}")))?;
            Ok(scores.to_vec())
        };
        match catch_unwind(AssertUnwindSafe(run)) {
            Ok(res) => res,
            Err(_) => Err(Error::Model("ONNX runtime panic".into())),
        }
    }
}

/// Resizes to `size` x `size` and scales channels to [0, 1], NHWC order.
pub fn model_input(img: &DynamicImage, size: u32) -> Result<Array4<f32>> {
    let resized = img.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let side = size as usize;
    let mut input: Vec<f32> = Vec::with_capacity(side * side * 3);
    for pixel in resized.pixels() {
        input.extend_from_slice(&[
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
        ]);
    }
    Array4::from_shape_vec((1, side, side, 3), input)
        .map_err(|e| Error::Model(format!("Invalid input tensor shape: {e}")))
}

fn ensure_environment() -> Result<()> {
    ort::init()
        .with_name("food-classifier")
        .commit()
        .map_err(|e| Error::Model(format!("Failed to init ORT environment: {e}")))?;
    Ok(())
}

pub fn build_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        return Err(Error::Model(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }
    let build = || -> Result<Session> {
        ensure_environment()?;
        Session::builder()
            .map_err(|e| Error::Model(format!("{e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| Error::Model(format!("{e}")))?
            .with_parallel_execution(false)
            .map_err(|e| Error::Model(format!("{e}")))?
            .commit_from_file(model_path)
            .map_err(|e| Error::Model(format!("{e}")))
    };
    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(res) => res,
        Err(_) => Err(Error::Model(
            "ONNX Runtime panicked while building session".into(),
        )),
    }
}
