//! One conversation turn against the scripted backend, persisted under the
//! default data directory.
//!
//! `RUST_LOG=info cargo run -p tether-infra --example scripted_chat`
//! Set `TETHER_OTEL=1` to also export spans to stdout, and
//! `TETHER_DATA_DIR` to redirect the chat files.

use std::sync::Arc;

use tether_core::controller::ConversationController;
use tether_core::gateway::scripted::{ScriptedGateway, ScriptedReply};
use tether_infra::filesystem::{
    FileLongTermMemoryStore, JsonManifestStore, JsonlConversationLog,
};
use tether_infra::paths::resolve_data_dir;
use tether_observe::tracing_setup::init_tracing;
use tether_types::curation::CurationThresholds;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_tracing(std::env::var_os("TETHER_OTEL").is_some())?;

    let dir = resolve_data_dir();
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_reply(ScriptedReply::complete(
        "Hello! Scripted backend here.",
        12,
        8,
    ));

    let mut controller = ConversationController::new(
        Arc::clone(&gateway),
        JsonlConversationLog::new(&dir),
        FileLongTermMemoryStore::new(&dir),
        JsonManifestStore::new(&dir),
        CurationThresholds::default(),
    );
    controller.load_conversation("demo").await?;
    controller.send_and_settle("Hello there").await?;

    for message in controller.messages() {
        println!("{}: {}", message.role, message.text);
    }
    println!("live tokens: {}", controller.live_tokens());
    println!("chat files under {}", dir.display());
    Ok(())
}
