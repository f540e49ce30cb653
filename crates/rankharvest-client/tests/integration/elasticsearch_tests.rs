use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rankharvest_client::ElasticsearchSink;
use rankharvest_core::error::HarvestError;
use rankharvest_core::models::{KeywordTask, ResultRecord, ResultRow};
use rankharvest_core::retry_queue::{RetryPolicy, RetryQueue};
use rankharvest_core::session::{SessionConfig, TracingSessionReporter};
use rankharvest_core::settle::PollerConfig;
use rankharvest_core::traits::{PersistenceSink, RenderingSurface, SurfaceConnector};
use rankharvest_core::SessionPool;

use crate::integration::common::{TEST_INDEX, count_documents, setup_test_es};

/// Surface that answers reads from a fixed script, then settles on no rows.
#[derive(Clone, Default)]
struct ScriptedSurface {
    reads: Arc<Mutex<VecDeque<Vec<ResultRow>>>>,
}

impl RenderingSurface for ScriptedSurface {
    async fn submit(&self, _cell: &str, _query: &str) -> Result<(), HarvestError> {
        Ok(())
    }

    async fn read_cells(&self, _max_rows: u32) -> Result<Vec<ResultRow>, HarvestError> {
        Ok(self.reads.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[derive(Clone)]
struct ScriptedConnector(ScriptedSurface);

impl SurfaceConnector for ScriptedConnector {
    type Surface = ScriptedSurface;

    async fn connect(&self, _worksheet: &str) -> Result<ScriptedSurface, HarvestError> {
        Ok(self.0.clone())
    }
}

fn record(position: u32) -> ResultRecord {
    ResultRecord {
        keyword: "shoes".into(),
        group: "apparel".into(),
        date: "2024-03-09T14:05:07.000Z".into(),
        url: format!("https://site{position}.example"),
        anchor_text: format!("Result {position}"),
        position,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn write_records_and_count() {
    let (base_url, _container) = setup_test_es().await;
    let sink = ElasticsearchSink::new(&base_url, TEST_INDEX, "_doc").unwrap();

    for position in 0..3 {
        sink.write(&record(position)).await.unwrap();
    }

    assert_eq!(count_documents(&base_url).await, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn stored_document_keeps_record_fields() {
    let (base_url, _container) = setup_test_es().await;
    let sink = ElasticsearchSink::new(&base_url, TEST_INDEX, "_doc").unwrap();
    sink.write(&record(4)).await.unwrap();
    count_documents(&base_url).await;

    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{base_url}/{TEST_INDEX}/_search"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let source = &body["hits"]["hits"][0]["_source"];

    assert_eq!(source["keyword"], "shoes");
    assert_eq!(source["group"], "apparel");
    assert_eq!(source["url"], "https://site4.example");
    assert_eq!(source["anchor_text"], "Result 4");
    assert_eq!(source["position"], 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn pool_persists_extracted_rows() {
    let (base_url, _container) = setup_test_es().await;
    let sink = ElasticsearchSink::new(&base_url, TEST_INDEX, "_doc").unwrap();

    let surface = ScriptedSurface::default();
    surface.reads.lock().unwrap().extend([
        vec![ResultRow::new("Loading...", "Loading...")],
        vec![
            ResultRow::new("Shop", "/url?q=https://shop.example/shoes"),
            ResultRow::new("Images", "/search?q=shoes&tbm=isch"),
            ResultRow::new("Blog", "/url?q=http://blog.example/post"),
        ],
    ]);

    let queue = RetryQueue::with_tasks(RetryPolicy::new(2), [KeywordTask::new("shoes", "apparel")]);
    let config = SessionConfig {
        request_delay: Duration::from_millis(10),
        run_date: "2024-03-09T14:05:07.000Z".into(),
        poller: PollerConfig {
            submit_delay: Duration::from_millis(10),
            poll_delay: Duration::from_millis(10),
            ..PollerConfig::default()
        },
    };

    let pool = SessionPool::new(
        ScriptedConnector(surface),
        sink,
        queue,
        vec!["sheet-1".into()],
        config,
    );
    let report = pool.run(Arc::new(TracingSessionReporter)).await;

    assert_eq!(report.records_written(), 2);
    assert_eq!(report.write_errors(), 0);
    assert!(report.failed_keywords.is_empty());
    assert_eq!(count_documents(&base_url).await, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn ping_reports_cluster() {
    let (base_url, _container) = setup_test_es().await;
    let sink = ElasticsearchSink::new(&base_url, TEST_INDEX, "_doc").unwrap();
    sink.ping().await.unwrap();
}
