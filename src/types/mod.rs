mod mask;
mod models;

pub use mask::Mask;
pub use models::*;
