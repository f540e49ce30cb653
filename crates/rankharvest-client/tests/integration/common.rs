use std::time::Duration;

use rankharvest_client::ElasticsearchSink;
use testcontainers::core::ContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

pub const TEST_INDEX: &str = "rankings_test";

/// Spins up a single-node Elasticsearch container and returns its base URL.
///
/// Keep the returned `ContainerAsync` alive for the test; dropping it stops the container.
pub async fn setup_test_es() -> (String, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("docker.elastic.co/elasticsearch/elasticsearch", "8.13.4")
        .with_exposed_port(ContainerPort::Tcp(9200))
        .with_env_var("discovery.type", "single-node")
        .with_env_var("xpack.security.enabled", "false")
        .with_env_var("ES_JAVA_OPTS", "-Xms512m -Xmx512m")
        .start()
        .await
        .expect("Failed to start Elasticsearch container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(9200)
        .await
        .expect("Failed to get port");
    let base_url = format!("http://{host}:{port}");

    // Retry until the node answers
    const MAX_RETRIES: u32 = 120;
    let sink = ElasticsearchSink::new(&base_url, TEST_INDEX, "_doc").unwrap();
    let mut retries = 0;
    loop {
        match sink.ping().await {
            Ok(()) => break,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Elasticsearch not ready after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    (base_url, container)
}

/// Refresh the test index and return its document count.
pub async fn count_documents(base_url: &str) -> u64 {
    let client = reqwest::Client::new();
    client
        .post(format!("{base_url}/{TEST_INDEX}/_refresh"))
        .send()
        .await
        .expect("refresh failed");

    let body: serde_json::Value = client
        .get(format!("{base_url}/{TEST_INDEX}/_count"))
        .send()
        .await
        .expect("count failed")
        .json()
        .await
        .expect("count response is JSON");
    body["count"].as_u64().expect("count field")
}
