use ndarray::{Array2, ArrayView4};
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::{Classifier, InferenceError};

/// TorchScript export of the trained pneumonia model.
///
/// `CModule` makes no promise about concurrent `forward` calls, so calls are
/// serialised behind a mutex.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let mut module = CModule::load_on_device(model_path, device)?;
        module.set_eval();
        log::info!("Loaded TorchScript model {} on {:?}", model_path.display(), device);
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        let dims: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let contiguous = batch.as_standard_layout();
        let values = contiguous
            .as_slice()
            .ok_or_else(|| InferenceError::Backend("input tensor is not contiguous".to_string()))?;

        let input = Tensor::from_slice(values)
            .view(dims.as_slice())
            .to_device(self.device);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Backend("classifier lock poisoned".to_string()))?;
            tch::no_grad(|| module.forward_ts(&[input]))?
        };

        let output = output.to_kind(Kind::Float).to_device(Device::Cpu);
        let size = output.size();
        let (rows, cols) = match size.as_slice() {
            [rows, cols] => (*rows as usize, *cols as usize),
            other => {
                return Err(InferenceError::InvalidOutput(format!(
                    "expected a 2-D output, got shape {:?}",
                    other
                )));
            }
        };

        let flat: Vec<f32> = Vec::try_from(&output.view([-1]))?;
        Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| InferenceError::InvalidOutput(e.to_string()))
    }
}
