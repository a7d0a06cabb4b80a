pub mod encoded_image;
pub mod frame_sampler;
pub mod sampling_buffer;
