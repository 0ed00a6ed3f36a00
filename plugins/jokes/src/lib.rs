//! Jokes plugin for Trellis.
//!
//! Serves `GET /custom/joke`, gated on `CONVERSATION:WRITE`. Jokes rotate
//! through a fixed list.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trellis_sdk::prelude::*;

pub const PLUGIN_ID: &str = "jokes";

const JOKES: &[&str] = &[
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "There are 10 kinds of people: those who understand binary and those who don't.",
    "A SQL query walks into a bar, goes up to two tables and asks: may I join you?",
    "I would tell you a UDP joke, but you might not get it.",
];

#[derive(Default)]
pub struct JokesPlugin {
    next: Arc<AtomicUsize>,
}

impl JokesPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for JokesPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Tells a programming joke"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        let next = Arc::clone(&self.next);
        vec![
            Endpoint::get("/joke")
                .tag("Jokes")
                .summary("Tell a joke")
                .requires(AuthResource::Conversation, AuthPermission::Write)
                .output(
                    Schema::object()
                        .field("joke", Schema::String)
                        .field("user_id", Schema::String)
                        .build(),
                )
                .handle(move |req| {
                    let index = next.fetch_add(1, Ordering::Relaxed) % JOKES.len();
                    let user_id = req.user_id().unwrap_or(ANONYMOUS_USER).to_string();
                    async move { Ok(json!({"joke": JOKES[index], "user_id": user_id})) }
                }),
        ]
    }
}
