//! Execution engines: the thing that actually runs a training step.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparsewatch_sdk::{DataFormat, FetchResults};

/// Result of running one step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Training loss for the step.
    pub loss: f32,
    /// Values of the tensors requested for the step.
    pub fetched: FetchResults,
}

/// Runs training steps and returns requested intermediate values alongside
/// the update, so introspection never costs a second forward pass.
pub trait ExecutionEngine: Send {
    /// Run step `step`, fetching the tensors named in `fetch`.
    fn run(&mut self, step: u64, fetch: &[String]) -> Result<StepOutput>;

    /// Tensors the engine can return, in a stable order.
    fn candidates(&self) -> Vec<String>;

    /// Short human-readable description, for logs.
    fn description(&self) -> String {
        "execution engine".to_string()
    }
}

/// Shape of one layer's activations, independent of layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerShape {
    /// Height, width, channels.
    Conv(usize, usize, usize),
    /// Features.
    Dense(usize),
}

#[derive(Debug, Clone)]
struct Layer {
    name: &'static str,
    shape: LayerShape,
    /// Fraction of dead activations at the start of training.
    initial_sparsity: f64,
    /// Fraction of dead activations once training has converged.
    final_sparsity: f64,
}

impl Layer {
    fn sparsity_at(&self, progress: f64) -> f64 {
        self.initial_sparsity + (self.final_sparsity - self.initial_sparsity) * progress
    }
}

/// A deterministic stand-in for a small ReLU convolutional network.
///
/// Loss decays exponentially with noise. Activations are post-ReLU: each
/// layer's fraction of zeros drifts from an initial to a final level as
/// training progresses, with dead units clustering towards the borders of
/// the feature map so that spatial masks show structure.
#[derive(Debug)]
pub struct SyntheticEngine {
    layers: Vec<Layer>,
    data_format: DataFormat,
    batch_size: usize,
    horizon: u64,
    rng: StdRng,
}

impl SyntheticEngine {
    /// Create an engine whose sparsity drift completes over `horizon` steps.
    pub fn new(data_format: DataFormat, batch_size: usize, horizon: u64, seed: u64) -> Self {
        let layers = vec![
            Layer {
                name: "conv1/relu",
                shape: LayerShape::Conv(16, 16, 16),
                initial_sparsity: 0.35,
                final_sparsity: 0.45,
            },
            Layer {
                name: "res2a/relu",
                shape: LayerShape::Conv(16, 16, 32),
                initial_sparsity: 0.40,
                final_sparsity: 0.60,
            },
            Layer {
                name: "res3a/relu",
                shape: LayerShape::Conv(8, 8, 64),
                initial_sparsity: 0.45,
                final_sparsity: 0.70,
            },
            Layer {
                name: "res4a/relu",
                shape: LayerShape::Conv(4, 4, 128),
                initial_sparsity: 0.50,
                final_sparsity: 0.85,
            },
            Layer {
                name: "fc1/relu",
                shape: LayerShape::Dense(256),
                initial_sparsity: 0.50,
                final_sparsity: 0.75,
            },
        ];
        Self {
            layers,
            data_format,
            batch_size: batch_size.max(1),
            horizon: horizon.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn progress(&self, step: u64) -> f64 {
        (step as f64 / self.horizon as f64).min(1.0)
    }

    fn loss(&mut self, step: u64) -> f32 {
        let decay = (-3.0 * self.progress(step)).exp();
        let noise = self.rng.random_range(-0.05..0.05);
        (0.3 + 6.6 * decay + noise) as f32
    }

    fn activations(&mut self, layer: &Layer, progress: f64) -> ArrayD<f32> {
        let sparsity = layer.sparsity_at(progress);
        let batch = self.batch_size;

        match layer.shape {
            LayerShape::Dense(features) => {
                let data = (0..batch * features)
                    .map(|_| self.relu_sample(sparsity))
                    .collect();
                ArrayD::from_shape_vec(IxDyn(&[batch, features]), data)
                    .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[batch, features])))
            }
            LayerShape::Conv(height, width, channels) => {
                // Generated as NHWC, permuted afterwards for NCHW.
                let mut data = Vec::with_capacity(batch * height * width * channels);
                for _ in 0..batch {
                    for h in 0..height {
                        for w in 0..width {
                            let cell = border_bias(h, height) + border_bias(w, width);
                            let p = (sparsity + 0.15 * (cell - 1.0)).clamp(0.0, 1.0);
                            // Some locations die entirely across all channels.
                            let dead = self.rng.random_bool(p * p * 0.6);
                            for _ in 0..channels {
                                data.push(if dead { 0.0 } else { self.relu_sample(p) });
                            }
                        }
                    }
                }
                let nhwc = ArrayD::from_shape_vec(IxDyn(&[batch, height, width, channels]), data)
                    .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[batch, height, width, channels])));
                match self.data_format {
                    DataFormat::Nhwc => nhwc,
                    DataFormat::Nchw => nhwc
                        .permuted_axes(IxDyn(&[0, 3, 1, 2]))
                        .as_standard_layout()
                        .into_owned(),
                }
            }
        }
    }

    fn relu_sample(&mut self, zero_probability: f64) -> f32 {
        if self.rng.random_bool(zero_probability.clamp(0.0, 1.0)) {
            0.0
        } else {
            self.rng.random_range(0.01..2.0)
        }
    }
}

/// 0.0 at the centre of an axis, 1.0 at its edges.
fn border_bias(index: usize, len: usize) -> f64 {
    if len <= 1 {
        return 0.0;
    }
    let centre = (len - 1) as f64 / 2.0;
    (index as f64 - centre).abs() / centre
}

impl ExecutionEngine for SyntheticEngine {
    fn run(&mut self, step: u64, fetch: &[String]) -> Result<StepOutput> {
        let progress = self.progress(step);
        let loss = self.loss(step);

        let mut fetched = BTreeMap::new();
        for name in fetch {
            let Some(layer) = self.layers.iter().find(|l| l.name == name.as_str()).cloned() else {
                bail!("Unknown tensor requested: {}", name);
            };
            let values = self.activations(&layer, progress);
            fetched.insert(name.clone(), values);
        }

        Ok(StepOutput { loss, fetched })
    }

    fn candidates(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name.to_string()).collect()
    }

    fn description(&self) -> String {
        format!(
            "synthetic ReLU network ({} layers, batch {}, {})",
            self.layers.len(),
            self.batch_size,
            self.data_format
        )
    }
}
