use rand::Rng;

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::{ BaseOps, NumericOps, RealOps, Hops },
};


/// Layer sizes used when none are configured: flattened 28×28 images,
/// two hidden layers and one output per digit.

pub const DEFAULT_SIZES: [usize; 4] = [784, 128, 64, 10];


/// Fully connected layer computing `x·W + b`.

#[derive(Debug, Clone)]
pub struct Linear<T: Real> {
  pub weights: Variable<T>,
  pub bias: Variable<T>,
}

impl<T: Real> Linear<T> {
  /// He-initialized weights of shape `[input, output]` and a zero bias.

  pub fn new<R: Rng>(input: usize, output: usize, rng: &mut R) -> Self {
    let gain = T::from(2.0 / input.max(1) as f64).unwrap().sqrt();
    let weights = Tensor::randn(&[input, output], rng) * gain;
    Self::from_tensors(weights, Tensor::zeros(&[output]))
  }

  pub fn from_tensors(weights: Tensor<T>, bias: Tensor<T>) -> Self {
    assert_eq!(weights.rank(), 2, "Weights must be a matrix, got {}", weights.shape());
    assert_eq!(bias.shape().dims, vec![weights.dim(1)],
      "Bias {} doesn't match weights {}", bias.shape(), weights.shape());
    Self {
      weights: weights.trained(),
      bias: bias.trained(),
    }
  }

  pub fn input_size(&self) -> usize {
    self.weights.dim(0)
  }

  pub fn output_size(&self) -> usize {
    self.weights.dim(1)
  }

  pub fn run(&self, x: &Variable<T>) -> Variable<T> {
    x.mm(&self.weights) + &self.bias
  }

  // Same computation on plain tensors, without recording a graph
  fn apply(&self, x: &Tensor<T>) -> Tensor<T> {
    x.mm(self.weights.tensor()) + self.bias.tensor()
  }
}


/// Multilayer perceptron with three linear layers and ReLU
/// activations between them.

#[derive(Debug, Clone)]
pub struct Mlp<T: Real> {
  layers: [Linear<T>; 3],
}

impl<T: Real> Mlp<T> {
  /// Build a freshly initialized network from `[input, hidden1, hidden2, classes]`.

  pub fn new<R: Rng>(sizes: [usize; 4], rng: &mut R) -> Self {
    Self {
      layers: [
        Linear::new(sizes[0], sizes[1], rng),
        Linear::new(sizes[1], sizes[2], rng),
        Linear::new(sizes[2], sizes[3], rng),
      ],
    }
  }

  pub fn from_layers(layers: [Linear<T>; 3]) -> Self {
    for pair in layers.windows(2) {
      assert_eq!(pair[0].output_size(), pair[1].input_size(),
        "Layer sizes don't chain: {} into {}", pair[0].weights.shape(), pair[1].weights.shape());
    }
    Self { layers }
  }

  pub fn layers(&self) -> &[Linear<T>; 3] {
    &self.layers
  }

  pub fn sizes(&self) -> [usize; 4] {
    [
      self.layers[0].input_size(),
      self.layers[1].input_size(),
      self.layers[2].input_size(),
      self.layers[2].output_size(),
    ]
  }

  pub fn classes(&self) -> usize {
    self.layers[2].output_size()
  }

  /// Unnormalized class scores for a batch of flattened images.

  pub fn logits(&self, x: &Variable<T>) -> Variable<T> {
    let [l1, l2, l3] = &self.layers;
    let h1 = l1.run(x).relu();
    let h2 = l2.run(&h1).relu();
    l3.run(&h2)
  }

  /// Class probabilities for a batch.

  pub fn forward(&self, x: &Variable<T>) -> Variable<T> {
    self.logits(x).softmax()
  }

  /// Mean cross-entropy of the batch against its labels.

  pub fn loss(&self, x: &Variable<T>, labels: &Tensor<u8>) -> Variable<T> {
    let targets = labels.one_hot::<T>(self.classes()).tracked();
    self.logits(x).cross_entropy(&targets)
  }

  /// Class probabilities computed directly on tensors, for evaluation.

  pub fn predict(&self, images: &Tensor<T>) -> Tensor<T> {
    let [l1, l2, l3] = &self.layers;
    let h1 = l1.apply(images).relu();
    let h2 = l2.apply(&h1).relu();
    l3.apply(&h2).softmax()
  }

  /// Most probable digit for every image in the batch.

  pub fn classify(&self, images: &Tensor<T>) -> Tensor<u8> {
    self.predict(images).argmax(-1)
  }

  /// Trainable variables, as weights and bias per layer in order.

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.layers.iter()
      .flat_map(|layer| [layer.weights.clone(), layer.bias.clone()] )
      .collect()
  }

  pub fn num_parameters(&self) -> usize {
    self.parameters().iter().map(|param| param.size() ).sum()
  }
}
