#[path = "../src/store.rs"]
mod store;

use std::time::Duration;

use store::{UtilStore, ACCESS_TOKEN_UTIL_NAME};

#[tokio::test]
async fn util_records_round_trip_through_postgres() {
    let Some(database_url) = std::env::var("GITGATE_TEST_DATABASE_URL").ok() else {
        eprintln!("skipping util store integration test: set GITGATE_TEST_DATABASE_URL to run it");
        return;
    };

    let store = UtilStore::connect_postgres(&database_url, 2, Duration::from_secs(5))
        .await
        .expect("store should connect and migrate");
    UtilStore::connect_postgres(&database_url, 1, Duration::from_secs(5))
        .await
        .expect("migrations should be idempotent");

    let name = format!("{ACCESS_TOKEN_UTIL_NAME}-it-{}", std::process::id());

    assert_eq!(store.get(&name).await.expect("lookup should succeed"), None);
    store.put(&name, "first").await.expect("insert should succeed");
    store.put(&name, "second").await.expect("upsert should succeed");
    assert_eq!(store.get(&name).await.expect("lookup should succeed").as_deref(), Some("second"));
    assert_eq!(store.backend_name(), "postgres");
}
