//! Property-based tests for the queue engines

use ganadero_core::Method;
use ganadero_storage::{InMemoryQueueStore, NewOperation, QueueStore};
use proptest::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;

/// Create a runtime for tests
fn create_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create runtime")
}

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(u32),
    // Index into the live entries at the time of removal
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        3 => any::<u32>().prop_map(QueueOp::Enqueue),
        1 => (0usize..32).prop_map(QueueOp::Remove),
    ]
}

fn operation(tag: u32) -> NewOperation {
    NewOperation::new(Method::Post, "/api/v1/animales")
        .expect("POST is queueable")
        .with_data(json!({ "arete": tag }))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever is removed, the survivors keep insertion order and ids only grow
    #[test]
    fn prop_memory_queue_stays_fifo(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let rt = create_runtime();
        rt.block_on(async {
            let queue = InMemoryQueueStore::new();
            let mut model: Vec<(u64, u32)> = Vec::new();
            let mut last_id = 0;

            for op in ops {
                match op {
                    QueueOp::Enqueue(tag) => {
                        let queued = queue.enqueue(operation(tag)).await.unwrap();
                        prop_assert!(queued.id > last_id);
                        last_id = queued.id;
                        model.push((queued.id, tag));
                    }
                    QueueOp::Remove(index) => {
                        if !model.is_empty() {
                            let (id, _) = model.remove(index % model.len());
                            queue.remove(id).await.unwrap();
                        }
                    }
                }
            }

            let stored: Vec<(u64, u32)> = queue
                .list_all()
                .await
                .unwrap()
                .into_iter()
                .map(|op| (op.id, op.data.and_then(|d| d["arete"].as_u64()).unwrap_or_default() as u32))
                .collect();
            prop_assert_eq!(stored, model);
            Ok(())
        })?;
    }
}

#[cfg(feature = "sqlite")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_sqlite_queue_stays_fifo(tags in prop::collection::vec(any::<u32>(), 1..24), removals in prop::collection::vec(0usize..24, 0..8)) {
        let rt = create_runtime();
        rt.block_on(async {
            let dir = tempfile::TempDir::new().unwrap();
            let queue = ganadero_storage::SqliteQueueStore::new(dir.path().join("queue.db"));
            let mut model = Vec::new();

            for tag in &tags {
                model.push(queue.enqueue(operation(*tag)).await.unwrap().id);
            }
            for index in removals {
                if !model.is_empty() {
                    let id = model.remove(index % model.len());
                    queue.remove(id).await.unwrap();
                }
            }

            let stored: Vec<u64> = queue.list_all().await.unwrap().iter().map(|op| op.id).collect();
            prop_assert_eq!(stored, model);
            Ok(())
        })?;
    }
}
