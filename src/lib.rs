//! Handwritten digit classification with a multilayer perceptron,
//! built on a tiny tensor and automatic differentiation core.
//!
//! # Features
//!
//! - **Reverse-mode auto-grad** — Tensors wrapped in a [Variable] record every
//! operation applied to them, so that gradients can be computed with a single call
//! to [backward](Variable::backward).
//!
//! - **Broadcasting** — Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically for arithmetic operations.
//!
//! - **Zero-copy views** — Tensors may be broadcasted, reshaped and transposed
//! without copying any data in most situations.
//!
//! - **MNIST** — Reads the IDX files of the MNIST database and trains a three layer
//! perceptron on them with plain stochastic gradient descent.
//!
//! # Examples
//!
//! Minimizing a simple function:
//! ```
//! use digitgrad::{ ops::*, Tensor, optimize::{ Optimizer, SGD } };
//!
//! let w = Tensor::vec(&[1.0f64, -2.0]).trained();
//! let mut optimizer = Optimizer::new(0.1, SGD);
//!
//! for _ in 0..50 {
//!   let loss = (&w * &w).sum(0);
//!   optimizer.minimize(&loss, &loss.parameters());
//! }
//! assert!(w.tensor().to_vec().iter().all(|v| v.abs() < 1e-3 ));
//! ```
//!
//! Training a digit classifier:
//! ```no_run
//! use rand::{ SeedableRng, rngs::StdRng };
//! use digitgrad::{ Mlp, Mnist, Trainer, TrainConfig, optimize::SGD };
//!
//! let mnist = Mnist::load("data")?;
//! let config = TrainConfig::default();
//! let mut rng = StdRng::seed_from_u64(config.seed);
//! let model = Mlp::new(config.sizes(mnist.train.features()), &mut rng);
//! let mut trainer = Trainer::new(model, SGD, config);
//! trainer.fit(&mnist.train, &mnist.test, &mut rng, |report| println!("{report}") );
//! # Ok::<(), digitgrad::Error>(())
//! ```
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)* — Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon` — Multi-threaded fallback matrix multiplication over rows.

mod internal;
mod shape;
mod tensor;
mod variable;
mod error;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod model;
pub mod data;
pub mod train;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp };
pub use error::{ Error, Result };
pub use model::{ Linear, Mlp };
pub use data::{ Dataset, Mnist };
pub use train::{ Trainer, TrainConfig, EpochReport };
