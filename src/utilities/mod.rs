pub mod enums;
pub mod helpers;

pub use enums::Kernel;
pub use helpers::{detect_best_batch_kernel, detect_best_kernel};
