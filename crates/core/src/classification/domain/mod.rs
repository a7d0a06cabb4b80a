pub mod classification_client;
pub mod classification_result;
