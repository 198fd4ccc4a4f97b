pub mod image;

pub use self::image::{
    normalize_bytes, normalize_file, NormalizationError, NormalizedTensor, INPUT_SHAPE, INPUT_SIZE,
};
