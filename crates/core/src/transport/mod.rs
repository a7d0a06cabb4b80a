pub mod infrastructure;
pub mod transport_error;
pub mod wire;
