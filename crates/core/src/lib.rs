pub mod capture;
pub mod classification;
pub mod detection;
pub mod rendering;
pub mod sampling;
pub mod shared;
pub mod transport;
pub mod video;
