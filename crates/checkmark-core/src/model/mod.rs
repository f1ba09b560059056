pub mod item;
pub mod section;

pub use item::{Item, ItemChange, ItemId};
pub use section::Section;
