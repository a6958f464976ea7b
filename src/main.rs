use anyhow::{ Context, Result };
use log::info;
use rand::{ SeedableRng, rngs::StdRng };

use digitgrad::{ optimize::SGD, Mlp, Mnist, TrainConfig, Trainer };


fn print_usage() {
  println!("Usage: digitgrad [DATA_DIR] [CONFIG.json]");
  println!();
  println!("Trains a three layer perceptron on the MNIST IDX files in DATA_DIR");
  println!("and prints the test accuracy after every epoch.");
  println!();
  println!("Set RUST_LOG=info for progress details.");
}

fn main() -> Result<()> {
  env_logger::init();

  let args: Vec<String> = std::env::args().collect();
  if args.iter().skip(1).any(|arg| arg == "--help" || arg == "-h" ) {
    print_usage();
    return Ok(())
  }

  let config = TrainConfig::from_args(&args[1..])
    .context("Invalid arguments or configuration")?;
  info!("{:?}", config);

  let mnist = Mnist::load(&config.data_dir)
    .with_context(|| format!("Could not load MNIST from {}", config.data_dir.display()))?;
  let Mnist { train, test } = config.apply_limits(mnist);

  let mut rng = StdRng::seed_from_u64(config.seed);
  let model = Mlp::new(config.sizes(train.features()), &mut rng);
  let mut trainer = Trainer::new(model, SGD, config);

  let reports = trainer.fit(&train, &test, &mut rng, |report| println!("{report}") );
  if let Some(best) = reports.iter().max_by(|a, b| a.accuracy.total_cmp(&b.accuracy) ) {
    info!("Best test accuracy {:.3} after epoch {}", best.accuracy, best.epoch);
  }

  Ok(())
}
