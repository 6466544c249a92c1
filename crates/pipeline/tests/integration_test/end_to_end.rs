use seenkey_core::{NormalizeOptions, Normalizer, UriNormalizer};
use seenkey_pipeline::report;
use seenkey_store::ExistsCode;

use crate::helpers::{open_store, parse_jsonl, test_data_dir};

#[tokio::test]
async fn test_normalize_record_and_report() {
    let data_dir = test_data_dir();
    let store = open_store(&data_dir);
    let normalizer = UriNormalizer::new(NormalizeOptions::default());

    assert_eq!(
        normalizer.normalize("HTTP://Example.com/foo?q=1#frag").unwrap(),
        "http://example.com/foo?q=1"
    );

    let key = normalizer.normalize("http://example.com/").unwrap();
    let first = store.set(&key, "id1").unwrap();
    assert_eq!(first.code, ExistsCode::NewKey);
    assert_eq!(first.ids, vec!["id1".to_string()]);

    let second = store.set(&key, "id2").unwrap();
    assert_eq!(second.code, ExistsCode::NewId);
    assert_eq!(second.ids, vec!["id1".to_string(), "id2".to_string()]);

    let mut out = Vec::new();
    let stats = report(store.clone(), &mut out, None).await.unwrap();
    assert_eq!(stats.duplicate_keys, 1);
    assert_eq!(stats.duplicate_ids, 2);

    let lines = parse_jsonl(&out);
    assert_eq!(
        lines,
        vec![serde_json::json!({"key": "http://example.com/", "ids": ["id1", "id2"]})]
    );

    store.close().unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
}

#[tokio::test]
async fn test_report_survives_reopen() {
    let data_dir = test_data_dir();
    {
        let store = open_store(&data_dir);
        store.set("http://a.example/", "1").unwrap();
        store.set("http://a.example/", "2").unwrap();
        store.set("http://b.example/", "3").unwrap();
        store.close().unwrap();
    }

    let store = open_store(&data_dir);
    let mut out = Vec::new();
    let stats = report(store.clone(), &mut out, None).await.unwrap();
    assert_eq!(stats.duplicate_keys, 1);
    assert_eq!(parse_jsonl(&out)[0]["key"], "http://a.example/");

    store.close().unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
}
