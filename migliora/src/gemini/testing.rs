//! In-process stand-in for the Gemini endpoint, used by tests.
//!
//! Replies echo the last user turn back inside the tags the default prompt
//! asks for, plus the number of turns received so history can be checked.
//! Special inputs:
//! - API key [`BAD_KEY`] gets the service's 400 "API key not valid" response
//! - text `plain` gets an untagged reply
//! - text `fail` gets a 500
//! - text `html` gets a 502 with an HTML page, as from a proxy

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

pub const BAD_KEY: &str = "bad-key";

/// Start the fake endpoint on a random port and return its base URL.
pub async fn spawn_fake_gemini() -> String {
    let app = Router::new().route("/v1beta/models/{call}", post(generate_content));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn generate_content(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if key == BAD_KEY {
        let error = json!({"error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT"
        }});
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }

    let contents = body["contents"].as_array().cloned().unwrap_or_default();
    let last = contents
        .last()
        .and_then(|c| c["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();

    let reply = match last.as_str() {
        "fail" => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
        }
        "html" => {
            let page = "<html><head><title>502 Bad Gateway</title></head><body><h1>Bad Gateway</h1></body></html>";
            return (StatusCode::BAD_GATEWAY, page).into_response();
        }
        "plain" => "Just plain text".to_string(),
        _ => format!(
            "<improved_text>{}.</improved_text><explanation>turns={}</explanation>",
            capitalize(&last),
            contents.len()
        ),
    };

    Json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": reply}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 7, "totalTokenCount": 12}
    }))
    .into_response()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
