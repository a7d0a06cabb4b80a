pub mod config;
pub mod constants;
pub mod crop_rect;
pub mod frame;
pub mod stream_state;
