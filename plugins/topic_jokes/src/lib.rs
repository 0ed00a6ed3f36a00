//! Topic jokes plugin for Trellis.
//!
//! `POST /custom/topic-joke` takes `{topic, language}` and answers with
//! `{joke, user_id}`. Both payloads are declared as schemas, so malformed
//! requests never reach the handler.

use serde::Deserialize;
use trellis_sdk::prelude::*;

pub const PLUGIN_ID: &str = "topic_jokes";

#[derive(Debug, Deserialize)]
struct TopicRequest {
    topic: String,
    language: String,
}

pub struct TopicJokesPlugin;

impl Plugin for TopicJokesPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Tells a joke about a topic in a given language"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::post("/topic-joke")
                .tag("Jokes")
                .summary("Tell a joke about a topic")
                .requires_named("CONVERSATION", "WRITE")
                .input(
                    Schema::object()
                        .described("topic", Schema::NonBlankString, "What the joke is about")
                        .described("language", Schema::String, "Language to tell it in")
                        .build(),
                )
                .output(
                    Schema::object()
                        .field("joke", Schema::String)
                        .field("user_id", Schema::String)
                        .build(),
                )
                .handle(|req| async move {
                    let request: TopicRequest = req.input_as()?;
                    Ok(json!({
                        "joke": compose(&request.topic, &request.language),
                        "user_id": req.user_id().unwrap_or(ANONYMOUS_USER),
                    }))
                }),
        ]
    }
}

fn compose(topic: &str, language: &str) -> String {
    let topic = topic.trim();
    match language.trim().to_ascii_lowercase().as_str() {
        "italian" | "it" => format!("Sai perché {topic} non litiga mai? Perché è sempre di buon umore!"),
        "french" | "fr" => format!("Pourquoi {topic} ne se dispute jamais ? Parce qu'il garde son calme !"),
        _ => format!("Why does {topic} never argue? It always keeps its cool!"),
    }
}
