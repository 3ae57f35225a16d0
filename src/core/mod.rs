pub mod bookmark;
pub mod item;
