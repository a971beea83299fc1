mod slotted_page;
pub mod slotted_page_format;
mod traits;

pub use slotted_page::*;
pub use traits::*;
