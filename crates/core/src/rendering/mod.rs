pub mod domain;
pub mod infrastructure;
pub mod preview_renderer;
pub mod render_loop;
