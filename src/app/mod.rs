pub mod dispatch;
pub mod render;
