//! ChatService: the library entry point.
//!
//! Wraps the routing engine with thread memory, ledger delivery and audit
//! artifact persistence. Generic over `MemoryStore` and `FileStore` so
//! parley-core never depends on parley-infra.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parley_types::chat::{AgentChat, ChatRequest, ChatResponse, TokenUsage};
use parley_types::config::{LedgerConfig, ParleyConfig};
use parley_types::error::{ConfigError, ConversationError};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::context::ConversationContext;
use crate::conversation::engine::RoutingEngine;
use crate::conversation::flow::ConversationFlow;
use crate::ledger::chat_ledger::{ArtifactTarget, ChatLedger};
use crate::ledger::sink::ChatSink;
use crate::memory::DEFAULT_CONTEXT;
use crate::memory::store::MemoryStore;
use crate::storage::file_store::FileStore;

/// Event type used for artifacts when the request names none.
pub const DEFAULT_EVENT_TYPE: &str = "default";

/// Service-wide settings taken from [`ParleyConfig`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Record memory for `respond` calls (requests carry their own flag).
    pub memory_record: bool,
    pub max_token_count: u32,
    pub ledger: LedgerConfig,
}

impl ChatSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            memory_record: config.memory.record,
            max_token_count: config.max_token_count,
            ledger: config.ledger.clone(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

/// Everything one exchange produced.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub answer: String,
    pub memory: String,
    pub usage: TokenUsage,
    /// Turns delivered to sinks, in arrival order.
    pub delivered: Vec<AgentChat>,
}

struct ExchangeOptions<'a> {
    memory_record: bool,
    event_type: &'a str,
}

pub struct ChatService<M: MemoryStore, F: FileStore> {
    engine: RoutingEngine,
    flows: Arc<BTreeMap<String, ConversationFlow>>,
    memory: M,
    artifacts: F,
    settings: ChatSettings,
    live_feed: Option<mpsc::UnboundedSender<AgentChat>>,
    thread_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<M: MemoryStore, F: FileStore> ChatService<M, F> {
    pub fn new(
        engine: RoutingEngine,
        flows: BTreeMap<String, ConversationFlow>,
        memory: M,
        artifacts: F,
        settings: ChatSettings,
    ) -> Self {
        Self {
            engine,
            flows: Arc::new(flows),
            memory,
            artifacts,
            settings,
            live_feed: None,
            thread_locks: Arc::new(DashMap::new()),
        }
    }

    /// Also stream delivered turns to `sender` as each exchange finishes.
    pub fn with_live_feed(mut self, sender: mpsc::UnboundedSender<AgentChat>) -> Self {
        self.live_feed = Some(sender);
        self
    }

    pub fn flows(&self) -> &BTreeMap<String, ConversationFlow> {
        &self.flows
    }

    pub fn flow(&self, name: &str) -> Result<&ConversationFlow, ConfigError> {
        self.flows
            .get(name)
            .ok_or_else(|| ConfigError::UnknownFlow(name.to_string()))
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Answer `user_prompt` on `thread_id` using `flow_name`.
    ///
    /// Returns `(answer_text, new_memory_text)`.
    pub async fn respond(
        &self,
        thread_id: &str,
        user_prompt: &str,
        prior_memory: Option<&str>,
        flow_name: &str,
        cancel: CancellationToken,
    ) -> Result<(String, String), ConversationError> {
        let options = ExchangeOptions {
            memory_record: self.settings.memory_record,
            event_type: DEFAULT_EVENT_TYPE,
        };
        let exchange = self
            .exchange(thread_id, user_prompt, prior_memory, flow_name, options, cancel)
            .await?;
        Ok((exchange.answer, exchange.memory))
    }

    /// Request/response wrapper around one exchange.
    pub async fn get_chat_response(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, ConversationError> {
        let thread_id = request
            .thread_id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let event_type = request.event_type.as_deref().unwrap_or(DEFAULT_EVENT_TYPE);
        let options = ExchangeOptions {
            memory_record: request.memory_record,
            event_type,
        };

        let exchange = self
            .exchange(
                &thread_id,
                &request.user_prompt,
                request.thread_memory.as_deref(),
                &request.conversation_flow,
                options,
                cancel,
            )
            .await?;

        let flow = self.flow(&request.conversation_flow)?;
        let agent_chats = exchange
            .delivered
            .into_iter()
            .filter(|chat| {
                flow.registry()
                    .resolve(chat.target())
                    .map(|agent| agent.include_in_response)
                    .unwrap_or(false)
            })
            .collect();

        Ok(ChatResponse {
            thread_id,
            message_id: Uuid::now_v7().to_string(),
            agent_response: exchange.answer,
            token_count: exchange.usage.total(),
            max_token_count: self.settings.max_token_count,
            topic: request.topic,
            memory_summary: Some(exchange.memory),
            event_type: request.event_type,
            agent_chats,
        })
    }

    async fn exchange(
        &self,
        thread_id: &str,
        user_prompt: &str,
        prior_memory: Option<&str>,
        flow_name: &str,
        options: ExchangeOptions<'_>,
        cancel: CancellationToken,
    ) -> Result<Exchange, ConversationError> {
        let lock = self.thread_lock(thread_id);
        let result = {
            let _guard = lock.lock().await;
            self.exchange_locked(thread_id, user_prompt, prior_memory, flow_name, options, cancel)
                .await
        };
        drop(lock);
        self.thread_locks
            .remove_if(thread_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn exchange_locked(
        &self,
        thread_id: &str,
        user_prompt: &str,
        prior_memory: Option<&str>,
        flow_name: &str,
        options: ExchangeOptions<'_>,
        cancel: CancellationToken,
    ) -> Result<Exchange, ConversationError> {
        let flow = self.flow(flow_name)?;

        let context = match prior_memory.filter(|m| !m.trim().is_empty()) {
            Some(prior) => {
                if options.memory_record {
                    self.memory.write(thread_id, prior).await?;
                }
                prior.to_string()
            }
            None => self
                .memory
                .read(thread_id)
                .await?
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
        };

        let seed = if options.memory_record {
            framed_seed(&context, user_prompt)
        } else {
            user_prompt.to_string()
        };

        info!(
            thread = %thread_id,
            flow = %flow_name,
            memory_record = options.memory_record,
            "exchange started"
        );

        let ctx = ConversationContext::new(thread_id).with_cancellation(cancel);
        let mut ledger = ChatLedger::new();
        let outcome = self.engine.run(flow, &ctx, &seed, &mut ledger).await?;

        let mut delivered: Vec<AgentChat> = Vec::new();
        ledger.drain_to(&mut delivered, flow.registry());
        let mut bus = self.engine.events().clone();
        for chat in &delivered {
            bus.deliver(chat.clone());
            if let Some(feed) = &self.live_feed {
                let mut feed = feed.clone();
                feed.deliver(chat.clone());
            }
        }

        if ctx.is_cancelled() {
            info!(thread = %thread_id, "exchange cancelled before persistence");
            return Err(ConversationError::Cancelled);
        }

        if self.settings.ledger.persist_artifacts {
            let target = ArtifactTarget {
                output_dir: self.settings.ledger.output_dir.clone(),
                revision_id: self.settings.ledger.revision_id.clone(),
                event_type: options.event_type.to_string(),
                identifier: thread_id.to_string(),
            };
            let written = ledger
                .persist_all(&self.artifacts, flow.registry(), &target)
                .await?;
            debug!(written, "turn artifacts persisted");
        }

        self.memory.write(thread_id, &outcome.summary).await?;

        let usage = ledger.aggregate_tokens();
        info!(
            thread = %thread_id,
            rounds = outcome.rounds,
            terminated_by = %outcome.terminated_by,
            tokens = usage.total(),
            "exchange finished"
        );

        Ok(Exchange {
            answer: outcome.summary.clone(),
            memory: outcome.summary,
            usage,
            delivered,
        })
    }

    /// The thread's lock. The `Arc` is cloned out so no map guard is held
    /// across an await.
    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.thread_locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Seed message framing the user question with the thread's context.
pub fn framed_seed(context: &str, user_prompt: &str) -> String {
    format!(
        "Use the group chat to solve the user question. Keep the final answer concise. \
         When there is no context, just focus on the user question.\n\
         Context: {context}\n\
         User question: {user_prompt}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::AgentRegistry;
    use crate::event::bus::EventBus;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::provider::LlmProvider;
    use crate::llm::registry::ProviderRegistry;
    use crate::tool::executor::ToolExecutor;
    use crate::tool::registry::ToolRegistry;
    use parley_types::agent::{Agent, AgentRole};
    use parley_types::config::ModelConfig;
    use parley_types::error::StorageError;
    use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex as StdMutex;

    /// Answers every call with the same text and records the requests.
    struct FixedProvider {
        reply: String,
        requests: Arc<StdMutex<Vec<CompletionRequest>>>,
    }

    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn complete(
            &self,
            request: &CompletionRequest,
        ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let content = self.reply.clone();
            async move {
                Ok(CompletionResponse {
                    id: "r".to_string(),
                    content,
                    tool_calls: vec![],
                    model: "m".to_string(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage {
                        input_tokens: 7,
                        output_tokens: 3,
                    },
                })
            }
        }
    }

    #[derive(Default, Clone)]
    struct InMemory {
        blobs: Arc<StdMutex<HashMap<String, String>>>,
    }

    impl MemoryStore for InMemory {
        fn read(
            &self,
            thread_id: &str,
        ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
            let value = self.blobs.lock().unwrap().get(thread_id).cloned();
            async move { Ok(value) }
        }

        fn write(
            &self,
            thread_id: &str,
            text: &str,
        ) -> impl Future<Output = Result<(), StorageError>> + Send {
            self.blobs
                .lock()
                .unwrap()
                .insert(thread_id.to_string(), text.to_string());
            async { Ok(()) }
        }
    }

    impl FileStore for InMemory {
        fn read(&self, path: &str) -> impl Future<Output = Result<String, StorageError>> + Send {
            let value = self.blobs.lock().unwrap().get(path).cloned();
            let path = path.to_string();
            async move { value.ok_or(StorageError::NotFound(path)) }
        }

        fn write(
            &self,
            path: &str,
            content: &str,
        ) -> impl Future<Output = Result<(), StorageError>> + Send {
            self.blobs
                .lock()
                .unwrap()
                .insert(path.to_string(), content.to_string());
            async { Ok(()) }
        }

        fn exists(&self, path: &str) -> impl Future<Output = Result<bool, StorageError>> + Send {
            let found = self.blobs.lock().unwrap().contains_key(path);
            async move { Ok(found) }
        }

        fn list(&self, path: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            let mut names: Vec<String> = self
                .blobs
                .lock()
                .unwrap()
                .keys()
                .filter_map(|k| k.strip_prefix(&prefix).map(|rest| rest.to_string()))
                .collect();
            names.sort();
            async move { Ok(names) }
        }
    }

    struct Harness {
        service: ChatService<InMemory, InMemory>,
        memory: InMemory,
        artifacts: InMemory,
        requests: Arc<StdMutex<Vec<CompletionRequest>>>,
    }

    fn harness(settings: ChatSettings) -> Harness {
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let mut providers = ProviderRegistry::new();
        providers.register(
            "m",
            BoxLlmProvider::new(FixedProvider {
                reply: "the answer".to_string(),
                requests: requests.clone(),
            }),
        );
        let engine = RoutingEngine::new(
            Arc::new(providers),
            ToolExecutor::new(Arc::new(ToolRegistry::new())),
            EventBus::new(64),
        );

        let proxy = Agent::new("user_proxy", AgentRole::UserProxy, "m", "");
        let mut expert = Agent::new("expert", AgentRole::Specialist, "m", "You are the expert.");
        expert.include_in_response = true;
        let mut registry = AgentRegistry::from_agents(vec![proxy, expert]).unwrap();
        registry.bind_models(&[ModelConfig::named("m")]).unwrap();
        let mut transitions = BTreeMap::new();
        transitions.insert("user_proxy".to_string(), vec!["expert".to_string()]);
        let flow = ConversationFlow::new("ask", "user_proxy", registry, &transitions, 5).unwrap();

        let mut flows = BTreeMap::new();
        flows.insert("ask".to_string(), flow);
        let memory = InMemory::default();
        let artifacts = InMemory::default();
        let service = ChatService::new(engine, flows, memory.clone(), artifacts.clone(), settings);
        Harness {
            service,
            memory,
            artifacts,
            requests,
        }
    }

    fn first_user_message(requests: &Arc<StdMutex<Vec<CompletionRequest>>>) -> String {
        requests.lock().unwrap()[0].messages[0].content.clone()
    }

    #[tokio::test]
    async fn respond_frames_default_context_and_writes_memory() {
        let h = harness(ChatSettings::default());
        let (answer, memory) = h
            .service
            .respond("t1", "What is PPE?", None, "ask", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer, "the answer");
        assert_eq!(memory, "the answer");
        let seed = first_user_message(&h.requests);
        assert!(seed.contains("Context: New conversation. Continue based on user question."));
        assert!(seed.ends_with("User question: What is PPE?"));
        let stored = MemoryStore::read(&h.memory, "t1").await.unwrap();
        assert_eq!(stored.as_deref(), Some("the answer"));
    }

    #[tokio::test]
    async fn stored_memory_feeds_next_exchange() {
        let h = harness(ChatSettings::default());
        MemoryStore::write(&h.memory, "t1", "we talked about gloves")
            .await
            .unwrap();
        h.service
            .respond("t1", "and boots?", None, "ask", CancellationToken::new())
            .await
            .unwrap();
        assert!(first_user_message(&h.requests).contains("Context: we talked about gloves"));
    }

    #[tokio::test]
    async fn explicit_prior_memory_wins() {
        let h = harness(ChatSettings::default());
        MemoryStore::write(&h.memory, "t1", "stale").await.unwrap();
        h.service
            .respond("t1", "q", Some("fresh context"), "ask", CancellationToken::new())
            .await
            .unwrap();
        let seed = first_user_message(&h.requests);
        assert!(seed.contains("Context: fresh context"));
        assert!(!seed.contains("stale"));
    }

    #[tokio::test]
    async fn unrecorded_request_sends_raw_prompt() {
        let h = harness(ChatSettings::default());
        let mut request = ChatRequest::new("ask", "just this");
        request.memory_record = false;
        request.thread_id = Some("t9".to_string());
        let response = h
            .service
            .get_chat_response(request, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(first_user_message(&h.requests), "just this");
        assert_eq!(response.thread_id, "t9");
        assert_eq!(response.token_count, 10);
        assert_eq!(response.max_token_count, 4096);
        assert_eq!(response.memory_summary.as_deref(), Some("the answer"));
        assert_eq!(response.agent_chats.len(), 1);
        assert_eq!(response.agent_chats[0].target(), "expert");
        // the summary is still stored as the thread's memory
        let stored = MemoryStore::read(&h.memory, "t9").await.unwrap();
        assert_eq!(stored.as_deref(), Some("the answer"));
    }

    #[tokio::test]
    async fn unknown_flow_is_config_error() {
        let h = harness(ChatSettings::default());
        let err = h
            .service
            .respond("t1", "q", None, "missing", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Config(ConfigError::UnknownFlow(ref name)) if name == "missing"
        ));
        assert!(h.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_exchange_writes_no_memory() {
        let h = harness(ChatSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = h
            .service
            .respond("t1", "q", None, "ask", cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::Cancelled));
        assert_eq!(MemoryStore::read(&h.memory, "t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn artifacts_persisted_when_enabled() {
        let mut settings = ChatSettings::default();
        settings.ledger.persist_artifacts = true;
        settings.ledger.revision_id = "rev1".to_string();
        let h = harness(settings);

        let mut request = ChatRequest::new("ask", "q");
        request.thread_id = Some("thread-7".to_string());
        request.event_type = Some("safety".to_string());
        h.service
            .get_chat_response(request, CancellationToken::new())
            .await
            .unwrap();

        let names = FileStore::list(&h.artifacts, "functional_test_outputs/rev1")
            .await
            .unwrap();
        assert_eq!(
            names,
            vec!["agent_response_safety_user_proxy_expert_thread-7.md".to_string()]
        );
    }

    #[tokio::test]
    async fn thread_locks_are_released() {
        let h = harness(ChatSettings::default());
        h.service
            .respond("t1", "q", None, "ask", CancellationToken::new())
            .await
            .unwrap();
        assert!(h.service.thread_locks.is_empty());
    }
}
