pub mod image;
pub mod reconcile;
pub mod version;

pub use image::*;
pub use reconcile::*;
pub use version::*;
