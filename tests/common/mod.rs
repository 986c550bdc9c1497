#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use bytes::Bytes;
use futures::stream;

pub const WORKED_EXAMPLE: &str = concat!(
    "{\"type\":\"tool_name\",\"content\":\"search\"}\n",
    "{\"type\":\"tool_args\",\"content\":{\"q\":\"x\"}}\n",
    "{\"type\":\"tool_content\",\"content\":\"42\"}\n",
    "{\"type\":\"answer\",\"content\":\"The answer is 42\"}\n",
    "{\"input_tokens\":12,\"output_tokens\":4,\"total_tokens\":16}\n",
);

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_backend(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A response body delivered in pieces of `size` bytes.
pub fn chunked_body(body: &'static str, size: usize) -> Body {
    let pieces: Vec<Result<Bytes, std::io::Error>> = body
        .as_bytes()
        .chunks(size)
        .map(|piece| Ok(Bytes::copy_from_slice(piece)))
        .collect();
    Body::from_stream(stream::iter(pieces))
}
