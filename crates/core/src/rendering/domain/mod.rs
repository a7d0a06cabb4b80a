pub mod overlay;
pub mod surface;
