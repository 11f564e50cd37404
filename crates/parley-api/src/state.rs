//! Application state wiring configuration, flows and services together.
//!
//! `ChatService` is generic over memory/file-store traits; AppState pins it
//! to the concrete infra implementations. Providers are only built when a
//! command actually talks to a model, so listing commands work without API
//! keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use parley_core::conversation::engine::RoutingEngine;
use parley_core::conversation::flow::{ConversationFlow, build_flows};
use parley_core::event::bus::EventBus;
use parley_core::service::chat::{ChatService, ChatSettings};
use parley_core::tool::executor::ToolExecutor;
use parley_core::tool::registry::ToolRegistry;
use parley_infra::config::{default_config_path, load_config};
use parley_infra::llm::build_provider_registry;
use parley_infra::memory::file_memory::FileMemoryStore;
use parley_infra::storage::local::LocalFileStore;
use parley_infra::storage::resolve_data_dir;
use parley_types::chat::AgentChat;
use parley_types::config::ParleyConfig;

pub type ConcreteMemoryStore = FileMemoryStore<LocalFileStore>;

pub type ConcreteChatService = ChatService<ConcreteMemoryStore, LocalFileStore>;

/// Shared application state for CLI commands.
pub struct AppState {
    pub config: ParleyConfig,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub flows: BTreeMap<String, ConversationFlow>,
    pub memory: ConcreteMemoryStore,
    pub events: EventBus,
}

impl AppState {
    /// Load configuration and build every flow.
    ///
    /// Flow construction errors (unknown agents, models, bad edges) surface
    /// here, before any conversation starts.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_path(&data_dir));
        let config = load_config(&config_path).await?;
        let flows = build_flows(&config)
            .with_context(|| format!("invalid flow configuration in {}", config_path.display()))?;

        let memory = FileMemoryStore::new(
            LocalFileStore::new(&data_dir),
            config.memory.directory.clone(),
        );

        Ok(Self {
            config,
            config_path,
            data_dir,
            flows,
            memory,
            events: EventBus::default(),
        })
    }

    /// Build the chat service, including one provider per catalog model.
    pub fn chat_service(
        &self,
        live_feed: Option<mpsc::UnboundedSender<AgentChat>>,
    ) -> anyhow::Result<ConcreteChatService> {
        let providers = build_provider_registry(&self.config.models)?;
        let engine = RoutingEngine::new(
            Arc::new(providers),
            ToolExecutor::new(Arc::new(ToolRegistry::new())),
            self.events.clone(),
        )
        .with_max_tool_iterations(self.config.max_tool_iterations);

        let service = ChatService::new(
            engine,
            self.flows.clone(),
            self.memory.clone(),
            LocalFileStore::new(&self.data_dir),
            ChatSettings::from_config(&self.config),
        );
        Ok(match live_feed {
            Some(sender) => service.with_live_feed(sender),
            None => service,
        })
    }
}
