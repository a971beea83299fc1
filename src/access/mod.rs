mod access_manager;
mod heap_file;

pub use access_manager::*;
pub use heap_file::*;
