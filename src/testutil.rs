// src/testutil.rs
//! Helpers shared by the in-crate tests.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::model::Dataset;

pub const SAMPLE_JSON: &str = r#"{
    "title": "Education",
    "headers": ["School", "Degree", "Year"],
    "data": [
        {"school": "Boston University", "degree": "BSc Computer Science", "year": "2020"},
        {"school": "MIT", "degree": "MSc Software Engineering", "year": "2022"}
    ]
}"#;

pub fn init_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_target(false)
        .with_test_writer()
        .try_init();
}

pub fn sample_dataset() -> Dataset {
    serde_json::from_str(SAMPLE_JSON).unwrap()
}

/// Serve `body` with `status` to every request until the runtime shuts down.
pub async fn serve(status: u16, body: &'static str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    Url::parse(&format!("http://{}/data/education.json", addr)).unwrap()
}

/// A URL nothing is listening on.
pub async fn unused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}/data/education.json", addr)).unwrap()
}
