#[cfg(feature = "camera-ffmpeg")]
pub mod ffmpeg_camera_source;
pub mod image_file_writer;
pub mod still_image_source;
