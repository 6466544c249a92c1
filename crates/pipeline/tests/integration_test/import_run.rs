use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use seenkey_core::{Kind, NormalizeOptions, RemoteObject, UriNormalizer};
use seenkey_pipeline::{
    import_existing, report, Accepted, CandidateRecord, DedupProcessor, DedupStats, ErrorLog, Executor,
    ExecutorStats, InputFormat, RecordReader,
};
use seenkey_store::DedupStore;

use crate::helpers::{open_store, parse_jsonl, test_data_dir, write_input, FixedLister};

struct RunResult {
    executor: ExecutorStats,
    dedup: DedupStats,
    accepted: Vec<Accepted>,
    errors: Vec<serde_json::Value>,
}

async fn run_import(store: Arc<DedupStore>, input: &Path) -> RunResult {
    let (tx, mut rx) = mpsc::channel(4);
    let collector = tokio::spawn(async move {
        let mut accepted = Vec::new();
        while let Some(record) = rx.recv().await {
            accepted.push(record);
        }
        accepted
    });

    let normalizer = Box::new(UriNormalizer::new(NormalizeOptions::default()));
    let processor = Arc::new(DedupProcessor::new(store, normalizer, tx));
    let error_log = Arc::new(Mutex::new(ErrorLog::new(Vec::new())));
    let sink = Arc::clone(&error_log);
    let executor = Executor::<CandidateRecord>::new(4, processor.clone(), move |job| {
        sink.lock().unwrap().record_or_warn(&job);
    })
    .unwrap();

    for job in RecordReader::new(&[input.to_path_buf()], InputFormat::Lines) {
        executor.submit(job).await.unwrap();
    }
    let stats = executor.wait().await;
    let dedup = processor.stats();
    drop(processor);
    let accepted = collector.await.unwrap();

    let log = Arc::try_unwrap(error_log).ok().unwrap().into_inner().unwrap();
    let errors = parse_jsonl(&log.into_inner().unwrap());

    RunResult {
        executor: stats,
        dedup,
        accepted,
        errors,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_import_against_existing_state() {
    let data_dir = test_data_dir();
    let store = open_store(&data_dir);

    let lister = FixedLister(vec![RemoteObject::new("remote-1", "http://Existing.example/page")]);
    let normalizer = UriNormalizer::new(NormalizeOptions::default());
    let imported = import_existing(store.clone(), &lister, Kind::Seed, &normalizer)
        .await
        .unwrap();
    assert_eq!(imported.imported, 1);

    let input = write_input(
        &data_dir,
        "seeds.txt",
        &[
            "http://existing.example/page",
            "http://new.example/",
            "http://",
            "HTTP://new.example/#x",
            "http://other.example/a?b=1",
        ],
    );
    let source = input.display().to_string();
    let id_base = std::fs::canonicalize(&input).unwrap().display().to_string();

    let first = run_import(store.clone(), &input).await;
    assert_eq!(first.executor, ExecutorStats { total: 5, succeeded: 4, failed: 1 });
    assert_eq!(first.dedup, DedupStats { accepted: 2, duplicates: 2, resumed: 0 });

    let mut keys: Vec<&str> = first.accepted.iter().map(|a| a.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["http://new.example/", "http://other.example/a?b=1"]);

    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0]["record_number"], 3);
    assert_eq!(first.errors[0]["source"], source.as_str());
    assert!(first.errors[0]["error"]
        .as_str()
        .unwrap()
        .contains("normalizing identity"));

    // A rerun over the same input recognizes its own earlier work.
    let second = run_import(store.clone(), &input).await;
    assert_eq!(second.executor, ExecutorStats { total: 5, succeeded: 4, failed: 1 });
    assert_eq!(second.dedup, DedupStats { accepted: 0, duplicates: 0, resumed: 4 });
    assert!(second.accepted.is_empty());

    let mut out = Vec::new();
    let stats = report(store.clone(), &mut out, None).await.unwrap();
    assert_eq!(stats.duplicate_keys, 2);
    let lines = parse_jsonl(&out);
    assert_eq!(lines[0]["key"], "http://existing.example/page");
    assert_eq!(
        lines[0]["ids"],
        serde_json::json!(["remote-1", format!("{id_base}:1")])
    );
    assert_eq!(lines[1]["key"], "http://new.example/");
    assert_eq!(
        lines[1]["ids"],
        serde_json::json!([format!("{id_base}:2"), format!("{id_base}:4")])
    );

    store.close().unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
}

#[tokio::test]
async fn test_empty_input_drains_cleanly() {
    let data_dir = test_data_dir();
    let store = open_store(&data_dir);
    let input = write_input(&data_dir, "empty.txt", &["# nothing here"]);

    let result = run_import(store.clone(), &input).await;
    assert_eq!(result.executor, ExecutorStats::default());
    assert_eq!(result.dedup, DedupStats::default());
    assert!(result.errors.is_empty());

    store.close().unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
}
