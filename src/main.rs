use std::sync::Arc;

use strata::access::{AccessManager, HeapFile};
use strata::common::StorageConfig;
use strata::storage::disk::FileDiskManager;
use strata::transaction::TransactionId;
use strata::tuple::{DataType, Schema, TupleBuilder};

fn main() -> strata::Result<()> {
    env_logger::init();

    println!("Strata - a transactional page cache");
    println!("===================================\n");

    let db_dir = std::env::temp_dir().join("strata_demo");
    let config = StorageConfig::default().with_buffer_pool_size(8);
    let disk_manager = Arc::new(FileDiskManager::new(&db_dir, config.page_size)?);
    println!("Opened table files under {}", db_dir.display());

    let access_manager = Arc::new(AccessManager::with_config(&config, disk_manager)?);
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(16))
        .column("balance", DataType::BigInt)
        .build_arc();
    println!("Schema: {}\n", schema);
    let accounts = HeapFile::new(1, schema.clone(), access_manager.clone())?;

    // Committed with the force policy: on disk once commit returns
    let t1 = TransactionId::new();
    for (id, name, balance) in [(1, "alice", 120i64), (2, "bob", 75), (3, "carol", 310)] {
        let mut tuple = TupleBuilder::new(schema.clone())
            .value(id)
            .value(name)
            .value(balance)
            .build()?;
        let record_id = accounts.insert_tuple(t1, &mut tuple)?;
        println!("{} inserted {} at {}", t1, tuple, record_id);
    }
    access_manager.commit_transaction(t1)?;
    println!("{} committed\n", t1);

    // Aborted: the dirty page is dropped from the pool
    let t2 = TransactionId::new();
    let mut doomed = TupleBuilder::new(schema.clone())
        .value(4)
        .value("mallory")
        .value(1_000_000i64)
        .build()?;
    accounts.insert_tuple(t2, &mut doomed)?;
    access_manager.abort_transaction(t2)?;
    println!("{} aborted its insert of {}\n", t2, doomed);

    let t3 = TransactionId::new();
    println!("{} scanning {} pages:", t3, accounts.num_pages());
    for tuple in accounts.scan(t3) {
        println!("  - {}", tuple?);
    }
    access_manager.commit_transaction(t3)?;

    std::fs::remove_dir_all(&db_dir).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
