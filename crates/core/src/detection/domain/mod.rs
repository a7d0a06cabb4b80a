pub mod bounding_box_set;
pub mod detection_box;
pub mod detection_client;
