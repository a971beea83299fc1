mod disk_manager;
mod disk_scheduler;
mod memory_disk_manager;

pub use disk_manager::{DiskManager, FileDiskManager};
pub use disk_scheduler::*;
pub use memory_disk_manager::*;
