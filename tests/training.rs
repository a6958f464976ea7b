use std::fs;
use std::path::{ Path, PathBuf };

use rand::{ Rng, SeedableRng, rngs::StdRng };

use digitgrad::{ optimize::SGD, Mlp, Mnist, TrainConfig, Trainer };


// Each digit lights up its own pixel of a 4x4 image, on top of faint noise
fn write_split(dir: &Path, prefix: &str, count: usize, rng: &mut StdRng) {
  let mut images = vec![];
  let mut labels = vec![];
  for word in [2051u32, count as u32, 4, 4] {
    images.extend_from_slice(&word.to_be_bytes());
  }
  for word in [2049u32, count as u32] {
    labels.extend_from_slice(&word.to_be_bytes());
  }
  for i in 0..count {
    let digit = (i % 10) as u8;
    for p in 0..16 {
      images.push(if p == digit as usize { 255 } else { rng.gen_range(0, 40) });
    }
    labels.push(digit);
  }
  fs::write(dir.join(format!("{prefix}-images-idx3-ubyte")), images).unwrap();
  fs::write(dir.join(format!("{prefix}-labels-idx1-ubyte")), labels).unwrap();
}

fn synthetic_mnist(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("digitgrad_{}_{}", name, std::process::id()));
  fs::create_dir_all(&dir).unwrap();
  let mut rng = StdRng::seed_from_u64(42);
  write_split(&dir, "train", 200, &mut rng);
  write_split(&dir, "t10k", 50, &mut rng);
  dir
}

#[test]
fn trains_on_idx_files() {
  let dir = synthetic_mnist("train");
  let mnist = Mnist::load(&dir).unwrap();
  assert_eq!(mnist.train.len(), 200);
  assert_eq!(mnist.test.len(), 50);
  assert_eq!(mnist.train.features(), 16);

  let config = TrainConfig {
    data_dir: dir.clone(),
    hidden: [32, 16],
    batch_size: 10,
    epochs: 10,
    ..Default::default()
  };
  config.validate().unwrap();

  let mut rng = StdRng::seed_from_u64(config.seed);
  let model = Mlp::new(config.sizes(mnist.train.features()), &mut rng);
  let mut trainer = Trainer::new(model, SGD, config);

  let mut lines = vec![];
  let reports = trainer.fit(&mnist.train, &mnist.test, &mut rng, |report| lines.push(report.to_string()) );
  assert_eq!(reports.len(), 10);
  assert!(lines[0].starts_with("Epoch 1: Test accuracy "));
  assert!(reports.last().unwrap().loss < reports[0].loss);
  assert!(reports.last().unwrap().accuracy > 0.9, "{:?}", reports.last());

  let predictions = trainer.model.classify(&mnist.test.images);
  assert_eq!(predictions.size(), 50);
  assert!(predictions.accuracy::<f32>(&mnist.test.labels) > 0.9);

  fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn config_file_overrides_defaults() {
  let dir = synthetic_mnist("config");
  let path = dir.join("config.json");
  fs::write(&path, r#"{ "learning_rate": 0.05, "epochs": 2, "train_limit": 20 }"#).unwrap();
  let config = TrainConfig::from_file(&path).unwrap();
  assert_eq!(config.learning_rate, 0.05);
  assert_eq!(config.epochs, 2);
  assert_eq!(config.train_limit, Some(20));
  assert_eq!(config.batch_size, 64);

  fs::write(&path, r#"{ "batch_size": 0 }"#).unwrap();
  assert!(matches!(TrainConfig::from_file(&path), Err(digitgrad::Error::Config(_))));

  fs::write(&path, "not json").unwrap();
  assert!(matches!(TrainConfig::from_file(&path), Err(digitgrad::Error::Json(_))));

  fs::remove_dir_all(&dir).unwrap();
}
