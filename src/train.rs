use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Instant;

use itertools::Itertools;
use log::{ debug, info, warn };
use rand::Rng;
use serde::{ Serialize, Deserialize };

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  model::{ Mlp, DEFAULT_SIZES },
  data::{ Dataset, Mnist },
  optimize::{ Optimizer, Strategy },
};


/// Hyperparameters and file locations for a training run.
///
/// Every field is optional in JSON form and falls back to its default.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
  /// Directory holding the four MNIST IDX files.
  pub data_dir: PathBuf,
  /// Widths of the two hidden layers.
  pub hidden: [usize; 2],
  pub learning_rate: f32,
  pub batch_size: usize,
  pub epochs: usize,
  /// Seeds weight initialization and shuffling.
  pub seed: u64,
  /// Shuffle training samples every epoch.
  pub shuffle: bool,
  /// Only use the first n training samples.
  pub train_limit: Option<usize>,
  /// Only use the first n test samples.
  pub test_limit: Option<usize>,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("data"),
      hidden: [DEFAULT_SIZES[1], DEFAULT_SIZES[2]],
      learning_rate: 0.1,
      batch_size: 64,
      epochs: 10,
      seed: 0,
      shuffle: true,
      train_limit: None,
      test_limit: None,
    }
  }
}

impl TrainConfig {
  /// Load a JSON configuration file and validate it.

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let content = fs::read_to_string(path)?;
    let config: Self = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.epochs == 0 {
      return Err(Error::Config("epochs must be at least 1".to_string()))
    }
    if self.batch_size == 0 {
      return Err(Error::Config("batch_size must be at least 1".to_string()))
    }
    if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
      return Err(Error::Config(format!("learning_rate must be positive, got {}", self.learning_rate)))
    }
    if self.hidden.contains(&0) {
      return Err(Error::Config(format!("hidden layers must not be empty, got {:?}", self.hidden)))
    }
    Ok(())
  }

  /// Build a configuration from positional command line arguments
  /// `[DATA_DIR] [CONFIG.json]`, excluding the program name.
  ///
  /// The config file, if given, provides the base values and an
  /// explicit data directory overrides its `data_dir`.

  pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
    if args.len() > 2 {
      return Err(Error::Config(format!("Expected at most 2 arguments, got {}", args.len())))
    }
    let mut config = match args.get(1) {
      Some(path) => Self::from_file(path.as_ref())?,
      None => Self::default(),
    };
    if let Some(dir) = args.first() {
      config.data_dir = PathBuf::from(dir.as_ref());
    }
    config.validate()?;
    Ok(config)
  }

  /// Restrict both splits to the configured subset sizes.

  pub fn apply_limits(&self, mnist: Mnist) -> Mnist {
    Mnist {
      train: limit(mnist.train, self.train_limit, "train"),
      test: limit(mnist.test, self.test_limit, "test"),
    }
  }

  /// Full layer sizes for images with `features` pixels.

  pub fn sizes(&self, features: usize) -> [usize; 4] {
    [features, self.hidden[0], self.hidden[1], DEFAULT_SIZES[3]]
  }
}


fn limit(data: Dataset, limit: Option<usize>, name: &str) -> Dataset {
  match limit {
    Some(n) if n > data.len() => {
      warn!("{name}_limit {n} exceeds the {} available samples, using all of them", data.len());
      data
    },
    Some(n) => data.take(n),
    None => data,
  }
}


/// Outcome of a single training epoch.

#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
  pub epoch: usize,
  pub loss: f32,
  pub accuracy: f32,
  pub seconds: f32,
}

impl std::fmt::Display for EpochReport {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Epoch {}: Test accuracy {:.3}, Time {:.3} (s)", self.epoch, self.accuracy, self.seconds)
  }
}


/// Mini-batch training loop for an [Mlp].

#[derive(Debug)]
pub struct Trainer<S: Strategy<f32>> {
  pub model: Mlp<f32>,
  optimizer: Optimizer<f32, S>,
  config: TrainConfig,
}

impl<S: Strategy<f32>> Trainer<S> {
  pub fn new(model: Mlp<f32>, strategy: S, config: TrainConfig) -> Self {
    let optimizer = Optimizer::new(config.learning_rate, strategy);
    info!("Model {} with {} parameters",
      model.sizes().iter().join(" -> "), model.num_parameters());
    Self { model, optimizer, config }
  }

  pub fn config(&self) -> &TrainConfig {
    &self.config
  }

  /// Run one pass over `data`, updating the model after every batch.
  ///
  /// Returns the mean loss per sample.

  pub fn train_epoch<R: Rng>(&mut self, data: &Dataset, rng: &mut R) -> f32 {
    let batches = if self.config.shuffle {
      data.shuffled(self.config.batch_size, rng)
    } else {
      data.batches(self.config.batch_size)
    };
    let params = self.model.parameters();
    let mut total = 0.0;
    for (i, (images, labels)) in batches.enumerate() {
      let loss = self.model.loss(&images.tracked(), &labels);
      let value = loss.item();
      self.optimizer.minimize(&loss, &params);
      total += value * labels.size() as f32;
      if i % 100 == 0 {
        debug!("Batch {}: loss {:.4}", i, value);
      }
    }
    if data.is_empty() { 0.0 } else { total / data.len() as f32 }
  }

  /// Fraction of correctly classified samples in `data`.

  pub fn evaluate(&self, data: &Dataset) -> f32 {
    let predictions: Vec<u8> = data.batches(self.config.batch_size)
      .flat_map(|(images, _)| self.model.classify(&images).into_raw() )
      .collect();
    Tensor::vec(&predictions).accuracy(&data.labels)
  }

  /// Train for the configured number of epochs, evaluating on `test`
  /// after each one and handing its report to `on_epoch`.

  pub fn fit<R, F>(&mut self, train: &Dataset, test: &Dataset, rng: &mut R, mut on_epoch: F) -> Vec<EpochReport>
  where
    R: Rng,
    F: FnMut(&EpochReport),
  {
    (1..=self.config.epochs).map(|epoch| {
      let start = Instant::now();
      let loss = self.train_epoch(train, rng);
      let accuracy = self.evaluate(test);
      let report = EpochReport {
        epoch,
        loss,
        accuracy,
        seconds: start.elapsed().as_secs_f32(),
      };
      info!("Epoch {} finished with mean loss {:.4}", epoch, loss);
      on_epoch(&report);
      report
    }).collect()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::optimize::SGD;

  // Two separable classes: bright left half or bright right half
  fn halves(n: usize) -> Dataset {
    let mut pixels = vec![];
    let mut labels = vec![];
    for i in 0..n {
      let label = (i % 2) as u8;
      for p in 0..8 {
        let bright = (p < 4) == (label == 0);
        pixels.push(if bright { 0.9 } else { 0.1 });
      }
      labels.push(label);
    }
    Dataset::new(Tensor::new(&[n, 8], pixels), Tensor::vec(&labels)).unwrap()
  }

  #[test]
  fn defaults() {
    let config: TrainConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, TrainConfig::default());
    assert_eq!(config.learning_rate, 0.1);
    assert_eq!(config.batch_size, 64);
    assert_eq!(config.sizes(784), DEFAULT_SIZES);
  }

  #[test]
  fn partial_json() {
    let config: TrainConfig = serde_json::from_str(r#"{ "epochs": 3, "hidden": [32, 16] }"#).unwrap();
    assert_eq!(config.epochs, 3);
    assert_eq!(config.sizes(4), [4, 32, 16, 10]);
    assert_eq!(config.batch_size, 64);
  }

  #[test]
  fn validation() {
    assert!(TrainConfig::default().validate().is_ok());
    let invalid = [
      TrainConfig { epochs: 0, ..Default::default() },
      TrainConfig { batch_size: 0, ..Default::default() },
      TrainConfig { learning_rate: -0.1, ..Default::default() },
      TrainConfig { learning_rate: f32::NAN, ..Default::default() },
      TrainConfig { hidden: [0, 8], ..Default::default() },
    ];
    for config in invalid {
      assert!(matches!(config.validate(), Err(Error::Config(_))), "{config:?}");
    }
  }

  #[test]
  fn positional_arguments() {
    let config = TrainConfig::from_args::<&str>(&[]).unwrap();
    assert_eq!(config, TrainConfig::default());

    let config = TrainConfig::from_args(&["mnist"]).unwrap();
    assert_eq!(config.data_dir, PathBuf::from("mnist"));

    let path = std::env::temp_dir().join(format!("digitgrad_args_{}.json", std::process::id()));
    fs::write(&path, r#"{ "data_dir": "elsewhere", "epochs": 2 }"#).unwrap();
    let file = path.to_string_lossy().into_owned();
    let from_file = TrainConfig::from_args(&["elsewhere".to_string(), file.clone()]).unwrap();
    assert_eq!(from_file.epochs, 2);
    let overridden = TrainConfig::from_args(&["mnist".to_string(), file.clone()]).unwrap();
    assert_eq!(overridden.data_dir, PathBuf::from("mnist"));
    assert_eq!(overridden.epochs, 2);
    fs::remove_file(&path).unwrap();

    assert!(matches!(TrainConfig::from_args(&["a", "b", "c"]), Err(Error::Config(_))));
    assert!(matches!(TrainConfig::from_args(&["mnist", "missing.json"]), Err(Error::Io(_))));
  }

  #[test]
  fn limits() {
    let mnist = Mnist { train: halves(10), test: halves(6) };
    let config = TrainConfig { train_limit: Some(4), test_limit: Some(6), ..Default::default() };
    let limited = config.apply_limits(mnist.clone());
    assert_eq!(limited.train.len(), 4);
    assert_eq!(limited.train.labels, Tensor::vec(&[0, 1, 0, 1]));
    assert_eq!(limited.test.len(), 6);

    let config = TrainConfig { train_limit: Some(50), ..Default::default() };
    let limited = config.apply_limits(mnist);
    assert_eq!(limited.train.len(), 10);
    assert_eq!(limited.test.len(), 6);
  }

  #[test]
  fn report_line() {
    let report = EpochReport { epoch: 2, loss: 0.5, accuracy: 0.91234, seconds: 1.5 };
    assert_eq!(report.to_string(), "Epoch 2: Test accuracy 0.912, Time 1.500 (s)");
  }

  #[test]
  fn learns_separable_data() {
    let mut rng = StdRng::seed_from_u64(0);
    let data = halves(64);
    let config = TrainConfig { hidden: [16, 16], batch_size: 8, epochs: 8, ..Default::default() };
    let model = Mlp::new(config.sizes(8), &mut rng);
    let mut trainer = Trainer::new(model, SGD, config);

    let mut seen = vec![];
    let reports = trainer.fit(&data, &data, &mut rng, |report| seen.push(report.epoch) );
    assert_eq!(seen, (1..=8).collect::<Vec<_>>());
    assert_eq!(reports.len(), 8);
    assert!(reports[7].loss < reports[0].loss);
    assert_eq!(reports[7].accuracy, 1.0);
    assert_eq!(trainer.evaluate(&data), 1.0);
  }

  #[test]
  fn empty_evaluation() {
    let mut rng = StdRng::seed_from_u64(1);
    let model = Mlp::new([8, 4, 4, 10], &mut rng);
    let trainer = Trainer::new(model, SGD, TrainConfig::default());
    assert_eq!(trainer.evaluate(&halves(0)), 0.0);
  }
}
