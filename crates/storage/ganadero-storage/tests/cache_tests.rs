//! Cache partition behaviour over every key-value backend

mod common;

use common::*;
use ganadero_core::{Request, Response, ResponseKind};
use pretty_assertions::assert_eq;

async fn test_response_stored_verbatim(fixture: CacheTestFixture) {
    let partition = fixture.cache.open("erp-ganadero-api-v1").await.unwrap();
    let request = Request::get("http://localhost:8000/api/v1/animales?page=2");
    let response = Response::new(200, br#"[{"id":1,"arete":"MX-001"}]"#.to_vec())
        .with_header("Content-Type", "application/json")
        .with_header("ETag", "\"v7\"")
        .with_kind(ResponseKind::Cors);

    partition.put(&request, &response).await.unwrap();
    let hit = partition.match_request(&request).await.unwrap().unwrap();

    assert_eq!(hit, response);
}

test_all_caches!(response_stored_verbatim, test_response_stored_verbatim);

async fn test_put_replaces_entry(fixture: CacheTestFixture) {
    let partition = fixture.cache.open("static").await.unwrap();
    let request = Request::get("/index.css");

    partition.put(&request, &Response::text(200, "body{}")).await.unwrap();
    partition.put(&request, &Response::text(200, "body{margin:0}")).await.unwrap();

    let hit = partition.match_request(&request).await.unwrap().unwrap();
    assert_eq!(&hit.body[..], b"body{margin:0}");
    assert_eq!(partition.len().await.unwrap(), 1);
}

test_all_caches!(put_replaces_entry, test_put_replaces_entry);

async fn test_query_string_is_part_of_the_key(fixture: CacheTestFixture) {
    let partition = fixture.cache.open("api").await.unwrap();
    partition
        .put(&Request::get("/api/v1/animales?page=1"), &Response::text(200, "one"))
        .await
        .unwrap();

    assert!(partition
        .match_request(&Request::get("/api/v1/animales?page=2"))
        .await
        .unwrap()
        .is_none());
}

test_all_caches!(query_string_is_part_of_the_key, test_query_string_is_part_of_the_key);

async fn test_delete_entry(fixture: CacheTestFixture) {
    let partition = fixture.cache.open("static").await.unwrap();
    let request = Request::get("/manifest.json");
    partition.put(&request, &Response::text(200, "{}")).await.unwrap();

    assert!(partition.delete(&request).await.unwrap());
    assert!(!partition.delete(&request).await.unwrap());
    assert!(partition.match_request(&request).await.unwrap().is_none());
}

test_all_caches!(delete_entry, test_delete_entry);

async fn test_partition_listing(fixture: CacheTestFixture) {
    let cache = &fixture.cache;
    cache.open("erp-ganadero-v1").await.unwrap();
    cache.open("erp-ganadero-v2-1.0.0").await.unwrap();
    cache.open("erp-ganadero-api-v1").await.unwrap();

    assert_eq!(
        cache.keys().await.unwrap(),
        vec![
            "erp-ganadero-api-v1".to_string(),
            "erp-ganadero-v1".to_string(),
            "erp-ganadero-v2-1.0.0".to_string(),
        ]
    );

    assert!(cache.delete("erp-ganadero-v1").await.unwrap());
    assert!(!cache.has("erp-ganadero-v1").await.unwrap());
    assert_eq!(cache.keys().await.unwrap().len(), 2);
}

test_all_caches!(partition_listing, test_partition_listing);

#[tokio::test]
async fn test_file_cache_survives_restart() {
    use ganadero_storage::backends::FileStorage;
    use ganadero_storage::CacheStorage;
    use std::sync::Arc;

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    let request = Request::get("/index.html");

    {
        let cache = CacheStorage::new(Arc::new(FileStorage::new(&path).unwrap()));
        let partition = cache.open("erp-ganadero-v2-1.0.0").await.unwrap();
        partition.put(&request, &Response::text(200, "<html></html>")).await.unwrap();
    }

    let cache = CacheStorage::new(Arc::new(FileStorage::new(&path).unwrap()));
    assert!(cache.has("erp-ganadero-v2-1.0.0").await.unwrap());
    let partition = cache.open("erp-ganadero-v2-1.0.0").await.unwrap();
    let hit = partition.match_request(&request).await.unwrap().unwrap();
    assert_eq!(&hit.body[..], b"<html></html>");
}
