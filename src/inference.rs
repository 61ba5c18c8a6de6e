use std::path::Path;

use log::{debug, info};
use ort::{self, inputs, CPUExecutionProvider, GraphOptimizationLevel};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::preprocessing::{FeatureVector, FEATURE_VECTOR_LENGTH};
use crate::ranking::ScoreVector;

/// Anything that can turn a feature vector into one score per class.
/// The pipeline borrows a single instance for the whole process; implementations
/// must not keep per-request state.
pub trait InferenceBackend
{
    fn infer(&self, features: &FeatureVector) -> Result<ScoreVector>;
}

/// The names and input shape baked into the exported model.
/// These have to match the model file exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBinding
{
    pub input_name: String,
    pub output_name: String,
    pub input_shape: Vec<i64>,
}

impl Default for ModelBinding
{
    fn default() -> Self
    {
        ModelBinding {
            input_name: "reshape_1_input".to_string(),
            output_name: "dense_2/Softmax".to_string(),
            input_shape: vec![1, FEATURE_VECTOR_LENGTH as i64],
        }
    }
}

/// A tensor declared by a model. `shape` is None for non-tensor values;
/// dynamic dimensions are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TensorInfo
{
    pub name: String,
    pub shape: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescription
{
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
}

impl ModelBinding
{
    /// Checks the binding against what a model actually declares.
    pub fn check(&self, description: &ModelDescription) -> Result<()>
    {
        if self.input_shape.iter().any(|dim| *dim <= 0)
            || self.input_shape.iter().product::<i64>() != FEATURE_VECTOR_LENGTH as i64
        {
            return Err(Error::ModelBinding(format!(
                "input shape {:?} does not hold exactly {} features", self.input_shape, FEATURE_VECTOR_LENGTH)));
        }

        let input = match description.inputs.as_slice()
        {
            [input] => input,
            inputs => {
                return Err(Error::ModelBinding(format!(
                    "model declares {} inputs, expected exactly one named {:?}", inputs.len(), self.input_name)));
            }
        };

        if input.name != self.input_name
        {
            return Err(Error::ModelBinding(format!(
                "model input is named {:?}, expected {:?}", input.name, self.input_name)));
        }

        match &input.shape
        {
            Some(shape) if !shapes_compatible(shape, &self.input_shape) => {
                return Err(Error::ModelBinding(format!(
                    "model input {:?} has shape {:?}, expected {:?}", input.name, shape, self.input_shape)));
            },
            Some(_) => {},
            None => {
                return Err(Error::ModelBinding(format!(
                    "model input {:?} is not a tensor", input.name)));
            },
        }

        if !description.outputs.iter().any(|output| output.name == self.output_name)
        {
            let names: Vec<&str> = description.outputs.iter().map(|output| output.name.as_str()).collect();
            return Err(Error::ModelBinding(format!(
                "model has no output named {:?}, available outputs: {:?}", self.output_name, names)));
        }

        Ok(())
    }

    /// Only meaningful after `check()` has passed.
    fn input_dims(&self) -> Vec<usize>
    {
        self.input_shape.iter().map(|dim| *dim as usize).collect()
    }
}

// Dynamic dimensions (negative) match anything.
fn shapes_compatible(declared: &[i64], expected: &[i64]) -> bool
{
    declared.len() == expected.len()
        && declared.iter().zip(expected).all(|(declared, expected)| *declared < 0 || declared == expected)
}

/// The CIFAR-10 model, run through the ONNX runtime.
/// Load it once at startup and hand out references; building the session is by far
/// the most expensive step of the whole pipeline.
pub struct OnnxClassifier
{
    session: ort::Session,
    binding: ModelBinding,
}

impl OnnxClassifier
{
    /// Fails with `Error::ModelBinding` if the file can't be loaded or doesn't match `binding`.
    pub fn load(model_path: &Path, binding: ModelBinding, intra_threads: usize) -> Result<Self>
    {
        if !model_path.is_file()
        {
            return Err(Error::ModelBinding(format!("model file not found: {:?}", model_path)));
        }

        info!("Loading model from {:?}...", model_path);
        let now = std::time::Instant::now();

        let session = Self::build_session(model_path, intra_threads)
            .map_err(|e| Error::ModelBinding(format!("could not load model {:?}: {}", model_path, e)))?;

        let classifier = OnnxClassifier { session, binding };
        classifier.binding.check(&classifier.describe())?;

        info!("Model load took {:?}", now.elapsed());
        Ok(classifier)
    }

    fn build_session(model_path: &Path, intra_threads: usize) -> ort::Result<ort::Session>
    {
        ort::Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .commit_from_file(model_path)
    }

    /// The inputs and outputs the model declares, whatever the binding says.
    pub fn describe(&self) -> ModelDescription
    {
        describe_session(&self.session)
    }

    pub fn binding(&self) -> &ModelBinding
    {
        &self.binding
    }
}

/// Opens a model just to list what it declares, without checking any binding.
/// Useful for finding out the names to bind to.
pub fn describe_model(model_path: &Path) -> Result<ModelDescription>
{
    if !model_path.is_file()
    {
        return Err(Error::ModelBinding(format!("model file not found: {:?}", model_path)));
    }

    let session = OnnxClassifier::build_session(model_path, 1)
        .map_err(|e| Error::ModelBinding(format!("could not load model {:?}: {}", model_path, e)))?;

    Ok(describe_session(&session))
}

fn describe_session(session: &ort::Session) -> ModelDescription
{
    ModelDescription {
        inputs: session.inputs.iter()
            .map(|input| TensorInfo { name: input.name.clone(), shape: tensor_shape(&input.input_type) })
            .collect(),
        outputs: session.outputs.iter()
            .map(|output| TensorInfo { name: output.name.clone(), shape: tensor_shape(&output.output_type) })
            .collect(),
    }
}

fn tensor_shape(value_type: &ort::ValueType) -> Option<Vec<i64>>
{
    match value_type
    {
        ort::ValueType::Tensor { dimensions, .. } => Some(dimensions.clone()),
        _ => None,
    }
}

impl InferenceBackend for OnnxClassifier
{
    fn infer(&self, features: &FeatureVector) -> Result<ScoreVector>
    {
        let input = features.to_input_array(&self.binding.input_dims())?;

        // `check()` guarantees the model has exactly one input, so it can be fed positionally.
        let outputs = self.session.run(inputs![input]?)?;

        let output = outputs[self.binding.output_name.as_str()].try_extract_tensor::<f32>()?;
        let scores: Vec<f32> = output.iter().copied().collect();

        debug!("Model returned {} scores: {:?}", scores.len(), scores);

        Ok(ScoreVector(scores))
    }
}
