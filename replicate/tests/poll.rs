//! Poller behavior tests against a local stub server.
//!
//! The stub speaks just enough HTTP/1.1 for reqwest: it routes on method
//! and path and answers with canned JSON, so these tests exercise the real
//! request/poll code without touching the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use replicate::{Error, GenerationInput, Replicate};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

/// Spawn a stub server and return its base URL.
async fn spawn_stub<F>(handler: F) -> String
where
    F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler: Arc<Handler> = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            tokio::spawn(serve_connection(socket, handler));
        }
    });

    format!("http://{addr}")
}

async fn serve_connection(mut socket: TcpStream, handler: Arc<Handler>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 1024];

    loop {
        // Read until the end of the request headers.
        let header_end = loop {
            if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                break pos;
            }
            match socket.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();

        let content_length = head
            .lines()
            .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
            .and_then(|l| l.split(':').nth(1))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        // Drain the body before answering so keep-alive framing stays intact.
        let body_start = header_end + 4;
        while buf.len() < body_start + content_length {
            match socket.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
        buf.drain(..body_start + content_length);

        let (status, body) = handler(&method, &path);
        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn sample_input() -> GenerationInput {
    GenerationInput {
        prompt: "Continue the story.".to_string(),
        max_tokens: 400,
        temperature: 0.75,
        top_p: 0.92,
    }
}

fn fast_client(base_url: &str) -> Replicate {
    Replicate::new("test-token")
        .with_base_url(base_url.to_string())
        .with_poll_interval(Duration::from_millis(10))
        .with_max_wait(Duration::from_millis(80))
}

#[tokio::test]
async fn prediction_stuck_in_processing_times_out() {
    let base = spawn_stub(|method, path| match (method, path) {
        ("POST", p) if p.ends_with("/predictions") => {
            (200, r#"{"id":"p1","status":"starting"}"#.to_string())
        }
        ("GET", "/predictions/p1") => (200, r#"{"id":"p1","status":"processing"}"#.to_string()),
        _ => (404, r#"{"detail":"not found"}"#.to_string()),
    })
    .await;

    let client = fast_client(&base);
    let result = client.run(&sample_input()).await;

    assert!(matches!(result, Err(Error::Timeout)), "got {result:?}");
}

#[tokio::test]
async fn pending_then_succeeded_returns_joined_output() {
    let polls = Arc::new(AtomicUsize::new(0));
    let polls_in_handler = polls.clone();

    let base = spawn_stub(move |method, path| match (method, path) {
        ("POST", p) if p.ends_with("/predictions") => {
            (200, r#"{"id":"p2","status":"starting"}"#.to_string())
        }
        ("GET", "/predictions/p2") => {
            if polls_in_handler.fetch_add(1, Ordering::SeqCst) == 0 {
                (200, r#"{"id":"p2","status":"processing"}"#.to_string())
            } else {
                (
                    200,
                    r#"{"id":"p2","status":"succeeded","output":["  The door ","creaks open.\n"]}"#
                        .to_string(),
                )
            }
        }
        _ => (404, r#"{"detail":"not found"}"#.to_string()),
    })
    .await;

    let client = fast_client(&base);
    let text = client.run(&sample_input()).await.unwrap();

    assert_eq!(text, "The door creaks open.");
    assert!(polls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn failed_prediction_surfaces_service_error() {
    let base = spawn_stub(|method, path| match (method, path) {
        ("POST", p) if p.ends_with("/predictions") => {
            (200, r#"{"id":"p3","status":"starting"}"#.to_string())
        }
        ("GET", "/predictions/p3") => (
            200,
            r#"{"id":"p3","status":"failed","error":"model exploded"}"#.to_string(),
        ),
        _ => (404, r#"{"detail":"not found"}"#.to_string()),
    })
    .await;

    let client = fast_client(&base);
    let result = client.run(&sample_input()).await;

    match result {
        Err(Error::Failed(message)) => assert!(message.contains("model exploded")),
        other => panic!("expected Error::Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn canceled_prediction_is_a_failure() {
    let base = spawn_stub(|method, path| match (method, path) {
        ("POST", p) if p.ends_with("/predictions") => {
            (200, r#"{"id":"p4","status":"starting"}"#.to_string())
        }
        ("GET", "/predictions/p4") => (200, r#"{"id":"p4","status":"canceled"}"#.to_string()),
        _ => (404, r#"{"detail":"not found"}"#.to_string()),
    })
    .await;

    let client = fast_client(&base);
    let result = client.run(&sample_input()).await;

    assert!(matches!(result, Err(Error::Failed(_))), "got {result:?}");
}

#[tokio::test]
async fn submission_http_error_propagates_immediately() {
    let base = spawn_stub(|method, _path| match method {
        "POST" => (402, r#"{"detail":"insufficient credit"}"#.to_string()),
        _ => (404, r#"{"detail":"not found"}"#.to_string()),
    })
    .await;

    let client = fast_client(&base);
    let result = client.create_prediction(&sample_input()).await;

    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 402);
            assert!(message.contains("insufficient credit"));
        }
        other => panic!("expected Error::Api, got {other:?}"),
    }
}
