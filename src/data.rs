use std::fs;
use std::path::{ Path, PathBuf };

use log::{ debug, info };
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  ops::BaseOps,
};


const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;
const CLASSES: u8 = 10;


fn read_be_u32(bytes: &[u8], offset: &mut usize) -> Result<u32> {
  let end = *offset + 4;
  let word = bytes.get(*offset..end)
    .ok_or_else(|| Error::Format("IDX header is truncated".to_string()) )?;
  *offset = end;
  Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

fn check_magic(bytes: &[u8], offset: &mut usize, expected: u32) -> Result<()> {
  let magic = read_be_u32(bytes, offset)?;
  if magic != expected {
    return Err(Error::Format(format!("Expected IDX magic number {expected}, found {magic}")))
  }
  Ok(())
}

fn truncated(len: impl std::fmt::Display, bytes: &[u8], offset: usize) -> Error {
  Error::Format(format!(
    "IDX payload is truncated: expected {} bytes, found {}", len, bytes.len().saturating_sub(offset)
  ))
}

fn payload(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
  offset.checked_add(len)
    .and_then(|end| bytes.get(offset..end) )
    .ok_or_else(|| truncated(len, bytes, offset) )
}

/// Decode an IDX image file into a `[count, rows * cols]` tensor
/// with pixel intensities scaled to `[0, 1]`.

pub fn parse_images(bytes: &[u8]) -> Result<Tensor<f32>> {
  let mut offset = 0;
  check_magic(bytes, &mut offset, IMAGE_MAGIC)?;
  let count = read_be_u32(bytes, &mut offset)? as usize;
  let rows = read_be_u32(bytes, &mut offset)? as usize;
  let cols = read_be_u32(bytes, &mut offset)? as usize;
  // Untrusted header words may overflow
  let pixels_per_image = rows.checked_mul(cols)
    .ok_or_else(|| truncated(format!("{rows}x{cols} pixels per image"), bytes, offset) )?;
  let len = count.checked_mul(pixels_per_image)
    .ok_or_else(|| truncated(format!("{count} images of {pixels_per_image}"), bytes, offset) )?;
  let pixels = payload(bytes, offset, len)?;
  let data = pixels.iter().map(|&p| p as f32 / 255.0 ).collect();
  Ok(Tensor::new(&[count, pixels_per_image], data))
}

/// Decode an IDX label file into a vector of digits.

pub fn parse_labels(bytes: &[u8]) -> Result<Tensor<u8>> {
  let mut offset = 0;
  check_magic(bytes, &mut offset, LABEL_MAGIC)?;
  let count = read_be_u32(bytes, &mut offset)? as usize;
  let labels = payload(bytes, offset, count)?;
  if let Some(label) = labels.iter().find(|&&label| label >= CLASSES ) {
    return Err(Error::Format(format!("Label {label} is not a digit")))
  }
  Ok(Tensor::vec(labels))
}

// Accept both the canonical hyphenated names and the dotted variants
fn locate(dir: &Path, name: &str, kind: &str) -> PathBuf {
  let hyphen = dir.join(format!("{name}-{kind}"));
  if hyphen.exists() { return hyphen }
  let dotted = dir.join(format!("{name}.{kind}"));
  if dotted.exists() { dotted } else { hyphen }
}

fn read(path: &Path) -> Result<Vec<u8>> {
  fs::read(path).map_err(|err| {
    Error::Io(std::io::Error::new(err.kind(), format!("{}: {}", path.display(), err)))
  })
}


/// Flattened images paired with their digit labels.

#[derive(Debug, Clone)]
pub struct Dataset {
  pub images: Tensor<f32>,
  pub labels: Tensor<u8>,
}

impl Dataset {
  pub fn new(images: Tensor<f32>, labels: Tensor<u8>) -> Result<Self> {
    if images.rank() != 2 || labels.rank() != 1 {
      return Err(Error::Format(format!(
        "Expected images [N, pixels] and labels [N], got {} and {}", images.shape(), labels.shape()
      )))
    }
    if images.dim(0) != labels.dim(0) {
      return Err(Error::Format(format!(
        "Found {} images but {} labels", images.dim(0), labels.dim(0)
      )))
    }
    Ok(Self { images, labels })
  }

  /// Read a pair of IDX files.

  pub fn from_files(images: impl AsRef<Path>, labels: impl AsRef<Path>) -> Result<Self> {
    let images = parse_images(&read(images.as_ref())?)?;
    let labels = parse_labels(&read(labels.as_ref())?)?;
    Self::new(images, labels)
  }

  pub fn len(&self) -> usize {
    self.labels.size()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of pixels per image.

  pub fn features(&self) -> usize {
    self.images.dim(1)
  }

  /// The first `n` samples, or all of them if there are fewer.

  pub fn take(&self, n: usize) -> Self {
    let indices: Vec<usize> = (0..n.min(self.len())).collect();
    Self {
      images: self.images.gather_rows(&indices),
      labels: self.labels.gather_rows(&indices),
    }
  }

  /// Iterate over batches in storage order. The last batch may be smaller.

  pub fn batches(&self, size: usize) -> Batches<'_> {
    Batches::new(self, (0..self.len()).collect(), size)
  }

  /// Iterate over batches in an order freshly shuffled by `rng`.

  pub fn shuffled<R: Rng>(&self, size: usize, rng: &mut R) -> Batches<'_> {
    let mut order: Vec<usize> = (0..self.len()).collect();
    order.shuffle(rng);
    debug!("Shuffled {} samples into batches of {}", order.len(), size);
    Batches::new(self, order, size)
  }
}


/// Iterator over `(images, labels)` batches of a [Dataset].

#[derive(Debug)]
pub struct Batches<'a> {
  dataset: &'a Dataset,
  order: Vec<usize>,
  size: usize,
  cursor: usize,
}

impl<'a> Batches<'a> {
  fn new(dataset: &'a Dataset, order: Vec<usize>, size: usize) -> Self {
    assert!(size > 0, "Batch size must be positive");
    Self { dataset, order, size, cursor: 0 }
  }
}

impl Iterator for Batches<'_> {
  type Item = (Tensor<f32>, Tensor<u8>);

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor >= self.order.len() { return None }
    let end = (self.cursor + self.size).min(self.order.len());
    let indices = &self.order[self.cursor..end];
    self.cursor = end;
    Some((
      self.dataset.images.gather_rows(indices),
      self.dataset.labels.gather_rows(indices),
    ))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = (self.order.len() - self.cursor + self.size - 1) / self.size;
    (remaining, Some(remaining))
  }
}

impl ExactSizeIterator for Batches<'_> {}


/// MNIST training and test splits.

#[derive(Debug, Clone)]
pub struct Mnist {
  pub train: Dataset,
  pub test: Dataset,
}

impl Mnist {
  /// Load the four IDX files found in `dir`.

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref();
    let train = Dataset::from_files(
      locate(dir, "train-images", "idx3-ubyte"),
      locate(dir, "train-labels", "idx1-ubyte"),
    )?;
    let test = Dataset::from_files(
      locate(dir, "t10k-images", "idx3-ubyte"),
      locate(dir, "t10k-labels", "idx1-ubyte"),
    )?;
    if train.features() != test.features() {
      return Err(Error::Format(format!(
        "Training images have {} pixels but test images have {}", train.features(), test.features()
      )))
    }
    info!("Loaded {} training and {} test images from {}", train.len(), test.len(), dir.display());
    Ok(Self { train, test })
  }
}
