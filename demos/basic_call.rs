//! Basic example demonstrating simple GET and POST calls.
//!
//! This example shows how to:
//! - Make a typed GET call with a response schema
//! - Make a POST call with a JSON payload
//! - Inspect a classified error
//!
//! Run with: `cargo run --example basic_call`

use http::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use typed_fetch::{
    typed_fetch, typed_fetch_as, ErrorKind, FetchOptions, SerdeSchema, TracingLogger, TypedError,
};

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), TypedError> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("typed_fetch=debug,basic_call=info")
        .init();

    let options = FetchOptions::new()
        .host("https://jsonplaceholder.typicode.com")
        .logger(Arc::new(TracingLogger));

    println!("=== GET Request Example ===");
    let post: Post = typed_fetch_as("posts/1", &options).await?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let created = typed_fetch(
        "posts",
        &options
            .clone()
            .method(Method::POST)
            .payload(&new_post)
            .response_schema(SerdeSchema::<Post>::new()),
    )
    .await?;
    println!("Created: {created}");
    println!();

    println!("=== Error Example ===");
    match typed_fetch("posts/999999/missing", &options).await {
        Ok(value) => println!("Unexpected success: {value}"),
        Err(e) if e.kind == ErrorKind::RequestError => {
            println!("HTTP {} from {}", e.status, e.url.as_deref().unwrap_or("?"));
            println!("Serialized: {}", serde_json::to_string_pretty(&e).unwrap_or_default());
        }
        Err(e) => println!("{}: {e}", e.kind),
    }

    Ok(())
}
