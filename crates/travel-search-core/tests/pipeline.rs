//! Pipeline tests against the in-memory collection.
//!
//! The keyword embedder maps a text to a vector with one dimension per
//! vocabulary term (1.0 if the term occurs), so cosine similarity between
//! two texts is fully predictable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use travel_search_core::embedding::{DistanceSpace, EmbeddingProvider};
use travel_search_core::error::PipelineError;
use travel_search_core::filter::{FilterSpec, Where};
use travel_search_core::ingest::{ingest, IngestOptions};
use travel_search_core::models::{Metadata, NormalizedRecord, SourceRow};
use travel_search_core::patch::{rename_store, search_and_rename};
use travel_search_core::search::{search, SearchParams};
use travel_search_core::store::memory::InMemoryCollection;
use travel_search_core::store::{Collection, QueryCandidate, StoredRecord};

// ─── Test doubles ───────────────────────────────────────────────────

struct KeywordEmbedder {
    vocab: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self {
            vocab: vec!["茶", "田媽媽", "蕎麥麵", "溫泉", "咖啡"],
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }
    fn dims(&self) -> usize {
        self.vocab.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.vocab
                    .iter()
                    .map(|term| if t.contains(term) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

/// Delegates to an in-memory collection but fails the `fail_on`-th upsert.
struct FlakyCollection {
    inner: InMemoryCollection,
    upserts: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl Collection for FlakyCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn space(&self) -> DistanceSpace {
        self.inner.space()
    }
    async fn ids(&self) -> Result<HashSet<String>> {
        self.inner.ids().await
    }
    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<()> {
        if self.upserts.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            bail!("embedding service unavailable");
        }
        self.inner.upsert(records).await
    }
    async fn get_by_filter(&self, filter: Option<&Where>) -> Result<Vec<StoredRecord>> {
        self.inner.get_by_filter(filter).await
    }
    async fn update_metadata(&self, id: &str, metadata: &Metadata) -> Result<()> {
        self.inner.update_metadata(id, metadata).await
    }
    async fn query_by_text(
        &self,
        text: &str,
        filter: Option<&Where>,
        n: usize,
    ) -> Result<Vec<QueryCandidate>> {
        self.inner.query_by_text(text, filter, n).await
    }
    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

const HEADERS: [&str; 8] = [
    "Name",
    "Type",
    "Address",
    "Tel",
    "City",
    "Town",
    "CreateDate",
    "HostWords",
];

fn headers() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

fn row(name: &str, store_type: &str, city: &str, date: &str, words: &str) -> SourceRow {
    SourceRow {
        name: Some(name.into()),
        store_type: Some(store_type.into()),
        address: Some(String::new()),
        tel: Some(String::new()),
        city: Some(city.into()),
        town: Some("某鄉".into()),
        create_date: Some(date.into()),
        host_words: Some(words.into()),
    }
}

fn sample_rows() -> Vec<SourceRow> {
    vec![
        row("茶香小館", "美食", "宜蘭縣", "2024-04-10", "手工茶點"),
        row("古早味茶坊", "美食", "新北市", "2024-04-20", "古早味茶飲"),
        row("山城茶棧", "美食", "台中市", "2024-04-12", "高山茶"),
        row("老街茶屋", "美食", "宜蘭縣", "2023-01-01", "老茶"),
        row("溫泉會館", "住宿", "宜蘭縣", "2024-04-15", "溫泉 茶"),
        row("耄饕客棧", "美食", "南投縣", "2024-03-01", "田媽媽 蕎麥麵"),
        row("田媽媽社區餐廳", "美食", "南投縣", "2024-03-02", "田媽媽 招牌蕎麥麵"),
        row("壞日期咖啡", "美食", "南投縣", "03/02/2024", "咖啡"),
    ]
}

fn ok_rows(rows: Vec<SourceRow>) -> Vec<Result<SourceRow>> {
    rows.into_iter().map(Ok).collect()
}

fn collection() -> (InMemoryCollection, Arc<KeywordEmbedder>) {
    let embedder = Arc::new(KeywordEmbedder::new());
    let coll = InMemoryCollection::new("TRAVEL", DistanceSpace::Cosine, embedder.clone());
    (coll, embedder)
}

fn opts(batch_size: usize) -> IngestOptions {
    IngestOptions {
        batch_size,
        file_name: "COA_OpenData.csv".into(),
        debug: false,
    }
}

fn ts(date: &str) -> i64 {
    travel_search_core::normalize::parse_date(date).unwrap()
}

fn names(hits: &[travel_search_core::models::SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.name.as_str()).collect()
}

// ─── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let (coll, _) = collection();

    let first = ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(3))
        .await
        .unwrap();
    assert_eq!(first.added, 8);
    assert_eq!(first.batches, 3);
    assert_eq!(coll.count().await.unwrap(), 8);

    let second = ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(3))
        .await
        .unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.skipped, 8);
    assert_eq!(second.batches, 0);
    assert_eq!(coll.count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_ingest_batches_embedding_calls() {
    let (coll, embedder) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ingest_appends_new_rows_only() {
    let (coll, _) = collection();
    let mut rows = sample_rows();
    let extra = rows.split_off(5);
    ingest(&coll, &headers(), ok_rows(rows.clone()), &opts(2))
        .await
        .unwrap();

    rows.extend(extra);
    let report = ingest(&coll, &headers(), ok_rows(rows), &opts(2))
        .await
        .unwrap();
    assert_eq!(report.skipped, 5);
    assert_eq!(report.added, 3);
    assert_eq!(coll.count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_malformed_date_does_not_abort() {
    let (coll, _) = collection();
    let report = ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();
    assert_eq!(report.date_fallbacks, 1);

    let by_name = Where::Eq(
        travel_search_core::filter::MetaField::Name,
        "壞日期咖啡".into(),
    );
    let stored = coll.get_by_filter(Some(&by_name)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metadata.date, 0);
    assert_eq!(stored[0].id, "travel_7");
}

#[tokio::test]
async fn test_schema_error_before_any_write() {
    let (coll, embedder) = collection();
    let headers: Vec<String> = HEADERS[1..].iter().map(|h| h.to_string()).collect();
    let err = ingest(&coll, &headers, ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap_err();
    match err {
        PipelineError::Schema { missing } => assert_eq!(missing, vec!["Name"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(coll.count().await.unwrap(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_field_row_is_not_ingested() {
    let (coll, _) = collection();
    let mut rows = sample_rows();
    rows[1].name = None;
    let err = ingest(&coll, &headers(), ok_rows(rows), &opts(100))
        .await
        .unwrap_err();
    match err {
        PipelineError::MissingField { row, column } => {
            assert_eq!(row, 1);
            assert_eq!(column, "Name");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!coll.ids().await.unwrap().contains("travel_1"));
}

#[tokio::test]
async fn test_failed_batch_keeps_prior_batches_and_retry_completes() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let flaky = FlakyCollection {
        inner: InMemoryCollection::new("TRAVEL", DistanceSpace::Cosine, embedder),
        upserts: AtomicUsize::new(0),
        fail_on: 1,
    };

    let err = ingest(&flaky, &headers(), ok_rows(sample_rows()), &opts(3))
        .await
        .unwrap_err();
    match &err {
        PipelineError::Ingestion {
            batch,
            added_before,
            ..
        } => {
            assert_eq!(*batch, 1);
            assert_eq!(*added_before, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(flaky.count().await.unwrap(), 3);

    let retry = ingest(&flaky, &headers(), ok_rows(sample_rows()), &opts(3))
        .await
        .unwrap();
    assert_eq!(retry.skipped, 3);
    assert_eq!(retry.added, 5);
    assert_eq!(flaky.count().await.unwrap(), 8);
}

#[tokio::test]
async fn test_unreadable_row_is_reported() {
    let (coll, _) = collection();
    let rows: Vec<Result<SourceRow>> = vec![
        Ok(sample_rows().remove(0)),
        Err(anyhow::anyhow!("invalid UTF-8")),
    ];
    let err = ingest(&coll, &headers(), rows, &opts(100)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Source { row: 1, .. }));
}

// ─── Search ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_by_city_type_and_date() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();

    let filters = FilterSpec::new()
        .cities(["宜蘭縣", "新北市"])
        .store_types(["美食"])
        .date_range(Some(ts("2024-04-01")), Some(ts("2024-05-01")));
    let hits = search(&coll, "我想要找有關茶餐點的店家", &filters, &SearchParams::default())
        .await
        .unwrap();

    let got: HashSet<&str> = names(&hits).into_iter().collect();
    assert_eq!(got, HashSet::from(["茶香小館", "古早味茶坊"]));
}

#[tokio::test]
async fn test_empty_filter_equals_unfiltered() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();

    let params = SearchParams::default();
    let filtered = search(&coll, "茶", &FilterSpec::new(), &params)
        .await
        .unwrap();
    let raw = coll.query_by_text("茶", None, params.candidate_k).await.unwrap();
    let expected: HashSet<&str> = raw
        .iter()
        .filter(|c| 1.0 - c.distance >= params.threshold)
        .map(|c| c.metadata.name.as_str())
        .collect();
    let got: HashSet<&str> = names(&filtered).into_iter().collect();
    assert_eq!(got, expected);
    assert_eq!(got.len(), 4);
}

#[tokio::test]
async fn test_search_does_not_mutate_collection() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();
    let before = coll.get_by_filter(None).await.unwrap();
    search(&coll, "茶", &FilterSpec::new(), &SearchParams::default())
        .await
        .unwrap();
    assert_eq!(coll.get_by_filter(None).await.unwrap(), before);
}

#[tokio::test]
async fn test_search_rejects_non_cosine_space() {
    let coll = InMemoryCollection::new("L2", DistanceSpace::L2, Arc::new(KeywordEmbedder::new()));
    let err = search(&coll, "茶", &FilterSpec::new(), &SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DistanceSpace(_)));
}

#[tokio::test]
async fn test_duplicate_names_collapse() {
    let (coll, _) = collection();
    let rows = vec![
        row("連鎖茶館", "美食", "宜蘭縣", "2024-04-10", "茶"),
        row("連鎖茶館", "美食", "宜蘭縣", "2024-04-11", "茶 咖啡"),
    ];
    ingest(&coll, &headers(), ok_rows(rows), &opts(100))
        .await
        .unwrap();
    let params = SearchParams {
        threshold: 0.5,
        ..SearchParams::default()
    };
    let hits = search(&coll, "茶", &FilterSpec::new(), &params).await.unwrap();
    assert_eq!(names(&hits), vec!["連鎖茶館"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

// ─── Rename ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rename_then_search_shows_new_name_once() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();

    let filters = FilterSpec::new().cities(["南投縣"]).store_types(["美食"]);
    let hits = search_and_rename(
        &coll,
        "找南投縣的田媽媽餐廳，招牌是蕎麥麵",
        "耄饕客棧",
        "田媽媽（耄饕客棧）",
        &filters,
        &SearchParams::default(),
    )
    .await
    .unwrap();

    let got = names(&hits);
    assert!(got.contains(&"田媽媽（耄饕客棧）"), "got {:?}", got);
    assert!(got.contains(&"田媽媽社區餐廳"), "got {:?}", got);
    assert!(!got.contains(&"耄饕客棧"), "got {:?}", got);
    assert_eq!(got.len(), 2);
}

#[tokio::test]
async fn test_rename_keeps_every_other_field() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();
    let before = coll.get_by_filter(None).await.unwrap();

    let outcome = rename_store(&coll, "耄饕客棧", "田媽媽（耄饕客棧）")
        .await
        .unwrap();
    assert_eq!(outcome.updated, vec!["travel_5".to_string()]);

    let after = coll.get_by_filter(None).await.unwrap();
    for (b, a) in before.iter().zip(after.iter()) {
        if a.id == "travel_5" {
            let mut expected = b.metadata.clone();
            expected.new_store_name = Some("田媽媽（耄饕客棧）".into());
            assert_eq!(a.metadata, expected);
        } else {
            assert_eq!(a, b);
        }
    }
}

#[tokio::test]
async fn test_rename_unknown_store_still_searches() {
    let (coll, _) = collection();
    ingest(&coll, &headers(), ok_rows(sample_rows()), &opts(100))
        .await
        .unwrap();

    let err = rename_store(&coll, "不存在的店", "新名").await.unwrap_err();
    assert!(matches!(err, PipelineError::Lookup { .. }));

    let filters = FilterSpec::new().cities(["南投縣"]);
    let hits = search_and_rename(
        &coll,
        "田媽媽 蕎麥麵",
        "不存在的店",
        "新名",
        &filters,
        &SearchParams::default(),
    )
    .await
    .unwrap();
    let got = names(&hits);
    assert!(got.contains(&"耄饕客棧"));
    assert!(got.contains(&"田媽媽社區餐廳"));
}
