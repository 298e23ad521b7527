use std::sync::Arc;

use futures_util::StreamExt;
use table_scan::field::FieldDef;
use table_scan::field::FieldType;
use table_scan::impls::mem_store::MemStore;
use table_scan::key::PrimaryKey;
use table_scan::scan::multi_get;
use table_scan::scan::parallel_scan;
use table_scan::scan::OrderFn;
use table_scan::scan::Row;
use table_scan::scan::RowConverter;
use table_scan::scan::ScanConfig;
use table_scan::scan::ScanOptions;
use table_scan::scan::TableScanIterator;
use table_scan::scan::TargetTables;
use table_scan::scan::Topology;
use table_scan::table::Table;
use table_scan::table::Tables;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // orders(custId, orderId), sharded by custId
    let orders = Table::new_top_level(
        1,
        "orders",
        vec![
            FieldDef::new("custId", FieldType::Long),
            FieldDef::new("orderId", FieldType::Long),
        ],
        1,
    );
    let tables = Arc::new(Tables::new().with(&orders));
    let topology = Topology::new(4);

    let mut store = MemStore::new(topology);
    for cust in 0..4i64 {
        for order in 0..3i64 {
            let key = PrimaryKey::new(&orders)
                .with("custId", cust)?
                .with("orderId", order)?;
            store.put(&key, format!("{}-{}", cust, order).into_bytes())?;
        }
    }
    // Delete one order: the scan skips its tombstone
    let deleted = PrimaryKey::new(&orders)
        .with("custId", 2i64)?
        .with("orderId", 1i64)?;
    store.delete(&deleted)?;
    let store = Arc::new(store);

    // The shard key routes the scan to a single partition
    let key = PrimaryKey::new(&orders).with("custId", 2i64)?;
    let targets = TargetTables::new(&orders);
    let config = ScanConfig::new(&key, targets, topology, ScanOptions::default())?;
    println!("custId=2 lives in partition {:?}", config.single_partition());

    let converter = RowConverter::new(tables.clone());
    let it = TableScanIterator::new(Arc::new(config), store.clone(), converter);
    for row in it {
        let row = row?;
        let value = String::from_utf8_lossy(&row.value);
        println!("Row: {}, Value: {}", row.store_key, value);
    }

    // Page through all partitions with continuation tokens
    let all = ScanConfig::new(
        &PrimaryKey::new(&orders),
        TargetTables::new(&orders),
        topology,
        ScanOptions::default().with_batch_size(4),
    )?;
    let converter = RowConverter::new(tables.clone());

    let mut token: Option<Vec<u8>> = None;
    loop {
        let batch = multi_get(&all, store.as_ref(), &converter, token.as_deref())?;
        println!("Page of {} rows, read {} KB", batch.items.len(), batch.read_kb);

        match batch.continuation {
            Some(t) => token = Some(t),
            None => break,
        }
    }

    // Scan all partitions concurrently, merged in primary-key order
    let order: OrderFn<Row> = Arc::new(Row::by_store_key);
    let mut strm = parallel_scan(Arc::new(all), store, Arc::new(converter), order);
    while let Some(row) = strm.next().await {
        let row = row?;
        println!("Merged: {}", row.store_key);
    }

    Ok(())
}
