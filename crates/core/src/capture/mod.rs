pub mod capture_error;
pub mod capture_session;
pub mod classify_frame_use_case;
pub mod result_display;
