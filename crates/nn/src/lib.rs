//! Inference side of the cost model: descriptor encoders, the flat-model
//! loader, the batch runtime and the result cache.
//!
//! Nothing here prices workloads directly; the model crate's facade wires
//! these pieces to the sanitizer and the analytical fallbacks.

pub mod cache;
pub mod error;
pub mod layers;
pub mod model;
pub mod preprocessor;
pub mod runtime;
pub mod tensor;
pub mod version;

pub use cache::{DescriptorKey, LruCache};
pub use error::{EncodeError, ModelError};
pub use layers::LayerOp;
pub use model::{encode_model, ModelBlob, NnModel};
pub use preprocessor::Preprocessor;
pub use runtime::InferenceRuntime;
pub use tensor::Tensor;
pub use version::{ModelVersion, PostProcessing};
