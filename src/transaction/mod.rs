mod lock_manager;
mod lock_mode;
mod lock_table_entry;
mod transaction_id;

pub use lock_manager::*;
pub use lock_mode::*;
pub use lock_table_entry::*;
pub use transaction_id::*;
