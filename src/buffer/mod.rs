mod buffer_manager;
mod clock_replacer;
mod frame;

pub use buffer_manager::*;
pub use clock_replacer::*;
pub use frame::*;
