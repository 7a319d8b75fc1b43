//! Encoder half of the trained autoencoder, evaluated with ndarray.
//!
//! The training notebook builds `input -> 256 -> 128 -> 64` dense layers with
//! ReLU activations; only the encoder weights are exported because the
//! recommendation pipeline never reconstructs inputs.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Deserialize;

use super::{Embedder, ModelError, ModelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
        }
    }
}

/// One fully connected layer. `weights` has one row per input and one column per output.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(weights: Array2<f32>, bias: Array1<f32>, activation: Activation) -> ModelResult<Self> {
        if weights.ncols() != bias.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "layer has {} outputs but {} biases",
                weights.ncols(),
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut out = input.dot(&self.weights) + &self.bias;
        let activation = self.activation;
        out.mapv_inplace(|x| activation.apply(x));
        out
    }
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default)]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct DenseEncoderFile {
    input_dim: usize,
    layers: Vec<LayerFile>,
}

/// Feed-forward encoder mapping a feature vector onto the latent space.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "DenseEncoderFile")]
pub struct DenseEncoder {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl TryFrom<DenseEncoderFile> for DenseEncoder {
    type Error = ModelError;

    fn try_from(file: DenseEncoderFile) -> ModelResult<Self> {
        let layers = file
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, layer)| {
                let rows = layer.weights.len();
                let cols = layer.weights.first().map_or(0, Vec::len);
                if layer.weights.iter().any(|row| row.len() != cols) {
                    return Err(ModelError::InvalidArtifact(format!(
                        "layer {} has ragged weight rows",
                        index
                    )));
                }
                let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((rows, cols), flat).map_err(|e| {
                    ModelError::InvalidArtifact(format!("layer {} weights: {}", index, e))
                })?;
                DenseLayer::new(weights, Array1::from(layer.bias), layer.activation)
            })
            .collect::<ModelResult<Vec<_>>>()?;

        DenseEncoder::new(file.input_dim, layers)
    }
}

impl DenseEncoder {
    pub fn new(input_dim: usize, layers: Vec<DenseLayer>) -> ModelResult<Self> {
        if layers.is_empty() {
            return Err(ModelError::InvalidArtifact(
                "encoder has no layers".to_string(),
            ));
        }

        let mut width = input_dim;
        for (index, layer) in layers.iter().enumerate() {
            if layer.inputs() != width {
                return Err(ModelError::InvalidArtifact(format!(
                    "layer {} expects {} inputs but receives {}",
                    index,
                    layer.inputs(),
                    width
                )));
            }
            width = layer.outputs();
        }

        Ok(Self { input_dim, layers })
    }

    fn check_width(&self, got: usize) -> ModelResult<()> {
        if got != self.input_dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.input_dim,
                got,
            });
        }
        Ok(())
    }
}

impl Embedder for DenseEncoder {
    fn input_width(&self) -> usize {
        self.input_dim
    }

    fn output_width(&self) -> usize {
        self.layers.last().map_or(self.input_dim, DenseLayer::outputs)
    }

    fn embed(&self, features: ArrayView1<'_, f32>) -> ModelResult<Array1<f32>> {
        let batch = features.insert_axis(Axis(0));
        let out = self.embed_batch(batch)?;
        Ok(out.index_axis_move(Axis(0), 0))
    }

    fn embed_batch(&self, features: ArrayView2<'_, f32>) -> ModelResult<Array2<f32>> {
        self.check_width(features.ncols())?;

        let mut activations = self.layers[0].forward(features);
        for layer in &self.layers[1..] {
            activations = layer.forward(activations.view());
        }
        Ok(activations)
    }
}
