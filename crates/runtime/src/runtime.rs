//! The agent runtime — registries, identity plumbing, and the state
//! composition pipeline.
//!
//! One `AgentRuntime` serves one agent identity. Capabilities are registered
//! during startup and read-only afterward; every handled message gets a
//! freshly composed [`State`].

use crate::capability::{Action, ContextProvider, Evaluator, HandlerCallback, Plugin, Service};
use crate::format::{
    format_actors, format_attachments, format_goals, format_messages, format_posts,
    redact_stale_attachments,
};
use crate::generation::{self, RetryPolicy, ShouldRespond};
use crate::persona;
use crate::registry::{
    find_action, find_evaluator, format_action_examples, format_action_names, format_actions,
    format_evaluator_examples, format_evaluator_names, format_evaluators, names_match,
    normalize_name,
};
use futures::future::join_all;
use loreweave_config::RuntimeSettings;
use loreweave_core::actor::{Account, Actor};
use loreweave_core::adapter::DatabaseAdapter;
use loreweave_core::character::Character;
use loreweave_core::goal::{GetGoalsParams, Goal};
use loreweave_core::memory::{Content, GetMemoriesParams, Media, Memory, SearchParams};
use loreweave_core::model::ModelClient;
use loreweave_core::state::State;
use loreweave_core::template::render;
use loreweave_core::{CapabilityError, Result};
use loreweave_memory::{ExpiringCache, MemoryManager};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Standard memory categories every runtime carries.
pub const MESSAGES_TABLE: &str = "messages";
pub const DESCRIPTIONS_TABLE: &str = "descriptions";
pub const KNOWLEDGE_TABLE: &str = "knowledge";

/// How many goals are pulled into context per composition.
const GOALS_COUNT: usize = 10;

const EVALUATION_TEMPLATE_KEY: &str = "evaluation";

const DEFAULT_EVALUATION_TEMPLATE: &str = "\
{{agentName}} has just {{didRespond}} in the conversation below.

Recent messages:
{{recentMessages}}

Available evaluators:
{{evaluators}}

{{evaluatorExamples}}

Decide which evaluators should run on this conversation. Respond with a \
JSON array of evaluator names chosen from: {{evaluatorNames}}";

/// The agent runtime: registries plus the composition and dispatch
/// entry points.
pub struct AgentRuntime {
    agent_id: Uuid,
    character: Character,
    settings: RuntimeSettings,
    db: Arc<dyn DatabaseAdapter>,
    model: Arc<dyn ModelClient>,
    cache: Option<ExpiringCache>,

    actions: Vec<Arc<dyn Action>>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    providers: Vec<Arc<dyn ContextProvider>>,
    services: Vec<Arc<dyn Service>>,

    message_manager: Arc<MemoryManager>,
    description_manager: Arc<MemoryManager>,
    knowledge_manager: Arc<MemoryManager>,
    extra_managers: HashMap<String, Arc<MemoryManager>>,
}

impl AgentRuntime {
    /// Build a runtime with a fresh agent id and default settings.
    pub fn new(
        character: Character,
        db: Arc<dyn DatabaseAdapter>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self::with_agent_id(Uuid::new_v4(), character, db, model)
    }

    /// Build a runtime under a stable agent id (persistent deployments).
    pub fn with_agent_id(
        agent_id: Uuid,
        character: Character,
        db: Arc<dyn DatabaseAdapter>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        let manager = |table: &str| {
            Arc::new(MemoryManager::new(table, agent_id, db.clone(), model.clone()))
        };
        info!(%agent_id, character = %character.name, "agent runtime created");
        Self {
            agent_id,
            message_manager: manager(MESSAGES_TABLE),
            description_manager: manager(DESCRIPTIONS_TABLE),
            knowledge_manager: manager(KNOWLEDGE_TABLE),
            extra_managers: HashMap::new(),
            character,
            settings: RuntimeSettings::default(),
            db,
            model,
            cache: None,
            actions: Vec::new(),
            evaluators: Vec::new(),
            providers: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cache(mut self, cache: ExpiringCache) -> Self {
        self.cache = Some(cache);
        self
    }

    // ── Accessors ──

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Character-level setting lookup, for capability modules.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.character.setting(key)
    }

    pub fn db(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.db
    }

    pub fn model(&self) -> &Arc<dyn ModelClient> {
        &self.model
    }

    pub fn cache(&self) -> Option<&ExpiringCache> {
        self.cache.as_ref()
    }

    pub fn message_manager(&self) -> &Arc<MemoryManager> {
        &self.message_manager
    }

    pub fn description_manager(&self) -> &Arc<MemoryManager> {
        &self.description_manager
    }

    pub fn knowledge_manager(&self) -> &Arc<MemoryManager> {
        &self.knowledge_manager
    }

    /// Look up a memory manager by table name, standard categories included.
    pub fn memory_manager(&self, table: &str) -> Option<&Arc<MemoryManager>> {
        match table {
            MESSAGES_TABLE => Some(&self.message_manager),
            DESCRIPTIONS_TABLE => Some(&self.description_manager),
            KNOWLEDGE_TABLE => Some(&self.knowledge_manager),
            other => self.extra_managers.get(other),
        }
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    pub fn service(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.services.iter().find(|s| s.name() == name)
    }

    pub fn generation_policy(&self) -> RetryPolicy {
        RetryPolicy::generation(&self.settings.retry)
    }

    pub fn classification_policy(&self) -> RetryPolicy {
        RetryPolicy::classification(&self.settings.retry)
    }

    // ── Registration ──

    /// Register an action. Re-registering a name is a warning no-op: the
    /// first registration wins, matching resolution order.
    ///
    /// Duplicates are detected by normalized equality, not the fuzzy match
    /// used at dispatch time — `reply_with_image` is a distinct action even
    /// though `reply` resolves into it as a substring.
    pub fn register_action(&mut self, action: Arc<dyn Action>) {
        let incoming = normalize_name(action.name());
        if self
            .actions
            .iter()
            .any(|a| normalize_name(a.name()) == incoming)
        {
            warn!(name = action.name(), "action already registered, ignoring");
            return;
        }
        debug!(name = action.name(), "action registered");
        self.actions.push(action);
    }

    pub fn register_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        let incoming = normalize_name(evaluator.name());
        if self
            .evaluators
            .iter()
            .any(|e| normalize_name(e.name()) == incoming)
        {
            warn!(name = evaluator.name(), "evaluator already registered, ignoring");
            return;
        }
        debug!(name = evaluator.name(), "evaluator registered");
        self.evaluators.push(evaluator);
    }

    pub fn register_context_provider(&mut self, provider: Arc<dyn ContextProvider>) {
        self.providers.push(provider);
    }

    pub fn register_service(&mut self, service: Arc<dyn Service>) {
        if self.services.iter().any(|s| s.name() == service.name()) {
            warn!(name = service.name(), "service already registered, ignoring");
            return;
        }
        self.services.push(service);
    }

    /// Register a memory manager for an additional category. The standard
    /// categories cannot be replaced.
    pub fn register_memory_manager(&mut self, manager: Arc<MemoryManager>) {
        let table = manager.table_name().to_string();
        if self.memory_manager(&table).is_some() {
            warn!(%table, "memory manager already registered, ignoring");
            return;
        }
        self.extra_managers.insert(table, manager);
    }

    /// Merge a plugin's capability bundle into the registries.
    pub fn register_plugin(&mut self, plugin: Plugin) {
        info!(name = %plugin.name, "registering plugin");
        for action in plugin.actions {
            self.register_action(action);
        }
        for evaluator in plugin.evaluators {
            self.register_evaluator(evaluator);
        }
        for provider in plugin.providers {
            self.register_context_provider(provider);
        }
        for service in plugin.services {
            self.register_service(service);
        }
    }

    // ── Identity plumbing ──

    /// Create the room if it does not exist.
    pub async fn ensure_room(&self, room_id: Uuid) -> Result<()> {
        if self.db.get_room(room_id).await?.is_none() {
            self.db.create_room(room_id).await?;
            debug!(%room_id, "room created");
        }
        Ok(())
    }

    /// Create the account if it does not exist.
    pub async fn ensure_account(&self, account: &Account) -> Result<()> {
        if self.db.get_account_by_id(account.id).await?.is_none() {
            self.db.create_account(account).await?;
            debug!(id = %account.id, "account created");
        }
        Ok(())
    }

    /// Add the user to the room if not already a participant.
    pub async fn ensure_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<()> {
        let participants = self.db.get_participants_for_room(room_id).await?;
        if !participants.contains(&user_id) {
            self.db.add_participant(user_id, room_id).await?;
            debug!(%user_id, %room_id, "participant added");
        }
        Ok(())
    }

    /// Make sure the room exists with both the user and the agent in it.
    pub async fn ensure_connection(&self, user_id: Uuid, room_id: Uuid) -> Result<()> {
        self.ensure_room(room_id).await?;
        self.ensure_participant(user_id, room_id).await?;
        self.ensure_participant(self.agent_id, room_id).await?;
        Ok(())
    }

    // ── State composition ──

    /// Compose the full context state for one incoming message.
    ///
    /// Room-scoped reads degrade to empty blocks on failure; knowledge
    /// retrieval and context providers propagate failure, since a broken
    /// retrieval path or provider is a configuration problem rather than a
    /// thin-context condition.
    pub async fn compose_state(
        &self,
        message: &Memory,
        extra: HashMap<String, String>,
    ) -> Result<State> {
        let room_id = message.room_id;

        let recent_params =
            GetMemoriesParams::room(room_id).with_count(self.settings.conversation_length);
        let (actors, mut recent_messages, goals) = tokio::join!(
            self.room_actors(room_id),
            self.message_manager.get_memories(&recent_params),
            self.room_goals(room_id),
        );

        redact_stale_attachments(&mut recent_messages);

        let mut attachments: Vec<Media> = Vec::new();
        if !recent_messages.iter().any(|m| m.id == message.id) {
            attachments.extend(message.content.attachments.iter().cloned());
        }
        attachments.extend(
            recent_messages
                .iter()
                .flat_map(|m| m.content.attachments.iter().cloned()),
        );

        let sample = persona::sample(&self.character);
        let knowledge = self.retrieve_knowledge(message).await?;
        let (recent_interactions, recent_posts) =
            self.cross_room_interactions(message, &actors).await;

        // Base state first; capability validation and providers run against
        // this partially built value.
        let base = State {
            agent_id: self.agent_id,
            agent_name: self.character.name.clone(),
            room_id,
            bio: sample.bio,
            lore: sample.lore,
            topics: sample.topics,
            adjective: sample.adjective,
            message_directions: persona::message_directions(&self.character),
            post_directions: persona::post_directions(&self.character),
            message_examples: sample.message_examples,
            post_examples: sample.post_examples,
            actors: format_actors(&actors),
            goals: format_goals(&goals),
            recent_messages: format_messages(&recent_messages, &actors),
            attachments: format_attachments(&attachments),
            knowledge,
            recent_interactions,
            recent_posts,
            actors_data: actors,
            goals_data: goals,
            recent_messages_data: recent_messages,
            extra,
            ..Default::default()
        };

        let (action_checks, evaluator_checks) = tokio::join!(
            join_all(self.actions.iter().map(|action| {
                let base = &base;
                async move {
                    match action.validate(self, message, Some(base)).await {
                        Ok(valid) => valid,
                        Err(e) => {
                            warn!(name = action.name(), error = %e, "action validation failed");
                            false
                        }
                    }
                }
            })),
            join_all(self.evaluators.iter().map(|evaluator| {
                let base = &base;
                async move {
                    match evaluator.validate(self, message, Some(base)).await {
                        Ok(valid) => valid,
                        Err(e) => {
                            warn!(name = evaluator.name(), error = %e, "evaluator validation failed");
                            false
                        }
                    }
                }
            })),
        );

        let valid_actions: Vec<Arc<dyn Action>> = self
            .actions
            .iter()
            .zip(action_checks)
            .filter_map(|(action, valid)| valid.then(|| action.clone()))
            .collect();
        let valid_evaluators: Vec<Arc<dyn Evaluator>> = self
            .evaluators
            .iter()
            .zip(evaluator_checks)
            .filter_map(|(evaluator, valid)| valid.then(|| evaluator.clone()))
            .collect();

        let providers = self.providers_text(message, Some(&base)).await?;

        let mut state = base;
        state.action_names = format_action_names(&valid_actions);
        state.actions = format_actions(&valid_actions);
        state.action_examples = format_action_examples(&valid_actions);
        state.evaluator_names = format_evaluator_names(&valid_evaluators);
        state.evaluators = format_evaluators(&valid_evaluators);
        state.evaluator_examples = format_evaluator_examples(&valid_evaluators);
        state.providers = providers;
        Ok(state)
    }

    /// Refresh only the conversational tail of an existing state.
    ///
    /// Persona material, knowledge, and capability summaries are kept; the
    /// recent-message transcript and attachment block are re-fetched. Used
    /// between an action handler's side effects and the follow-up
    /// generation.
    pub async fn update_recent_message_state(&self, state: &State) -> State {
        let params = GetMemoriesParams::room(state.room_id)
            .with_count(self.settings.conversation_length);
        let mut recent = self.message_manager.get_memories(&params).await;
        redact_stale_attachments(&mut recent);

        let attachments: Vec<Media> = recent
            .iter()
            .flat_map(|m| m.content.attachments.iter().cloned())
            .collect();

        let mut refreshed = state.clone();
        refreshed.recent_messages = format_messages(&recent, &state.actors_data);
        refreshed.attachments = format_attachments(&attachments);
        refreshed.recent_messages_data = recent;
        refreshed
    }

    /// Invoke every registered context provider concurrently and join the
    /// non-empty outputs with newlines. Any provider failure propagates.
    pub async fn providers_text(
        &self,
        message: &Memory,
        state: Option<&State>,
    ) -> Result<String> {
        let outputs = join_all(
            self.providers
                .iter()
                .map(|provider| provider.get(self, message, state)),
        )
        .await;

        let mut parts = Vec::new();
        for output in outputs {
            let text = output.map_err(|e| CapabilityError::Provider(e.to_string()))?;
            if !text.is_empty() {
                parts.push(text);
            }
        }
        Ok(parts.join("\n"))
    }

    async fn room_actors(&self, room_id: Uuid) -> Vec<Actor> {
        let participant_ids = match self.db.get_participants_for_room(room_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%room_id, error = %e, "participant read failed, degrading to empty");
                return Vec::new();
            }
        };

        let mut actors = Vec::new();
        for id in participant_ids {
            match self.db.get_account_by_id(id).await {
                Ok(Some(account)) => actors.push(account.as_actor()),
                Ok(None) => debug!(%id, "participant has no account"),
                Err(e) => warn!(%id, error = %e, "account lookup failed"),
            }
        }
        actors
    }

    async fn room_goals(&self, room_id: Uuid) -> Vec<Goal> {
        // completed goals stay visible in context
        let params = GetGoalsParams {
            room_id,
            user_id: None,
            only_in_progress: false,
            count: Some(GOALS_COUNT),
        };
        match self.db.get_goals(&params).await {
            Ok(goals) => goals,
            Err(e) => {
                warn!(%room_id, error = %e, "goal read failed, degrading to empty");
                Vec::new()
            }
        }
    }

    /// Similarity-matched knowledge for the incoming message, as a bulleted
    /// block. Failures propagate: an agent configured with a knowledge base
    /// should not silently answer without it.
    async fn retrieve_knowledge(&self, message: &Memory) -> Result<String> {
        let text = message.content.text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }

        let embedding = match self.db.get_cached_embeddings(text).await {
            Ok(Some(cached)) => cached,
            Ok(None) => self.model.embed(text).await?,
            Err(e) => {
                debug!(error = %e, "embedding cache lookup failed");
                self.model.embed(text).await?
            }
        };

        let params = SearchParams {
            count: self.settings.knowledge_count,
            ..Default::default()
        };
        let hits = self
            .knowledge_manager
            .search_by_embedding(&embedding, &params)
            .await?;

        Ok(hits
            .iter()
            .map(|m| format!("- {}", m.content.text))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Conversation history the agent shares with the sender outside the
    /// current room. Empty for the agent's own messages; reads degrade.
    async fn cross_room_interactions(
        &self,
        message: &Memory,
        actors: &[Actor],
    ) -> (String, String) {
        if message.user_id == self.agent_id {
            return (String::new(), String::new());
        }

        let rooms = match self
            .db
            .get_rooms_for_participants(&[message.user_id, self.agent_id])
            .await
        {
            Ok(rooms) => rooms,
            Err(e) => {
                warn!(error = %e, "shared-room lookup failed, degrading to empty");
                return (String::new(), String::new());
            }
        };

        let shared: Vec<Uuid> = rooms.into_iter().filter(|r| *r != message.room_id).collect();
        if shared.is_empty() {
            return (String::new(), String::new());
        }

        let mut interactions = match self
            .db
            .get_memories_by_rooms(MESSAGES_TABLE, &shared, Some(self.agent_id))
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!(error = %e, "interaction read failed, degrading to empty");
                return (String::new(), String::new());
            }
        };

        interactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        interactions.truncate(self.settings.recent_interactions);

        (
            format_messages(&interactions, actors),
            format_posts(&interactions, actors),
        )
    }

    // ── Dispatch ──

    /// Dispatch the action declared by each response memory.
    ///
    /// A response carries at most one action. No declared action is a
    /// silent skip; a declared action that resolves to nothing is a
    /// warning no-op; a resolved action without a handler is a
    /// configuration error logged at error level, still a no-op.
    pub async fn process_actions(
        &self,
        message: &Memory,
        responses: &[Memory],
        state: Option<&State>,
        callback: Option<&HandlerCallback>,
    ) -> Result<()> {
        for response in responses {
            let Some(name) = response
                .content
                .action
                .as_deref()
                .filter(|a| !a.trim().is_empty())
            else {
                debug!(response_id = %response.id, "response declares no action");
                continue;
            };

            if names_match(name, "NONE") {
                debug!(response_id = %response.id, "response explicitly declares no action");
                continue;
            }

            let Some(action) = find_action(&self.actions, name) else {
                warn!(declared = name, "no registered action matches, skipping");
                continue;
            };

            if !action.has_handler() {
                error!(
                    name = action.name(),
                    "matched action has no handler, skipping"
                );
                continue;
            }

            debug!(declared = name, resolved = action.name(), "dispatching action");
            action
                .handle(self, message, state, &serde_json::Value::Null, callback)
                .await?;
        }
        Ok(())
    }

    /// Run the two-phase evaluator gate and return the names that fired.
    ///
    /// Phase one validates every registered evaluator concurrently and
    /// filters by the response requirement (`always_run` evaluators skip
    /// it). Phase two asks the model to select from the surviving
    /// candidates by name; only selected candidates run.
    pub async fn evaluate(
        &self,
        message: &Memory,
        state: Option<&State>,
        did_respond: bool,
    ) -> Result<Vec<String>> {
        let checks = join_all(self.evaluators.iter().map(|evaluator| async move {
            match evaluator.validate(self, message, state).await {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(name = evaluator.name(), error = %e, "evaluator validation failed");
                    false
                }
            }
        }))
        .await;

        let candidates: Vec<Arc<dyn Evaluator>> = self
            .evaluators
            .iter()
            .zip(checks)
            .filter_map(|(evaluator, valid)| {
                (valid && (evaluator.always_run() || did_respond)).then(|| evaluator.clone())
            })
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut values = state.map(State::template_values).unwrap_or_default();
        values.insert("agentName".into(), self.character.name.clone());
        values.insert(
            "didRespond".into(),
            if did_respond { "responded" } else { "not responded" }.into(),
        );
        values.insert("evaluatorNames".into(), format_evaluator_names(&candidates));
        values.insert("evaluators".into(), format_evaluators(&candidates));
        values.insert(
            "evaluatorExamples".into(),
            format_evaluator_examples(&candidates),
        );

        let template = self
            .character
            .templates
            .get(EVALUATION_TEMPLATE_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_EVALUATION_TEMPLATE);
        let context = render(template, &values);

        let selected = generation::generate_text_array(
            self.model.as_ref(),
            &context,
            &self.settings.tokens,
            &self.classification_policy(),
        )
        .await?;

        let mut fired = Vec::new();
        for name in selected {
            let Some(evaluator) = find_evaluator(&candidates, &name) else {
                debug!(%name, "model selected an unknown evaluator, skipping");
                continue;
            };
            if fired.iter().any(|f| f == evaluator.name()) {
                continue;
            }
            evaluator.handle(self, message, state).await?;
            fired.push(evaluator.name().to_string());
        }
        Ok(fired)
    }

    // ── Generation shortcuts ──

    /// Render a character-overridable template against a state.
    pub fn compose_context(
        &self,
        state: &State,
        template_key: &str,
        default_template: &str,
    ) -> String {
        let template = self
            .character
            .templates
            .get(template_key)
            .map(String::as_str)
            .unwrap_or(default_template);
        render(template, &state.template_values())
    }

    /// Generate a user-facing response under the bounded retry contract.
    pub async fn generate_message_response(&self, context: &str) -> Result<Content> {
        let content = generation::generate_message_response(
            self.model.as_ref(),
            context,
            &self.settings.tokens,
            &self.generation_policy(),
        )
        .await?;
        Ok(content)
    }

    /// Classify whether the agent should reply at all.
    pub async fn should_respond(&self, context: &str) -> Result<ShouldRespond> {
        let decision = generation::generate_should_respond(
            self.model.as_ref(),
            context,
            &self.settings.tokens,
            &self.classification_policy(),
        )
        .await?;
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loreweave_core::actor::ActorDetails;
    use loreweave_core::error::ModelError;
    use loreweave_core::model::CompletionRequest;
    use loreweave_core::Error;
    use loreweave_memory::InMemoryAdapter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Pops scripted completions; embeds everything as a fixed vector.
    struct StubClient {
        responses: Mutex<Vec<String>>,
        completions: AtomicUsize,
        embed_fails: bool,
    }

    impl StubClient {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
                completions: AtomicUsize::new(0),
                embed_fails: false,
            }
        }

        fn failing_embedder() -> Self {
            Self {
                embed_fails: true,
                ..Self::new(vec![])
            }
        }

        fn completions(&self) -> usize {
            self.completions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for StubClient {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<String, ModelError> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("[]".into())
            } else {
                Ok(responses.remove(0))
            }
        }

        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ModelError> {
            if self.embed_fails {
                Err(ModelError::EmbeddingFailed("stub embedder down".into()))
            } else {
                Ok(vec![0.6, 0.8, 0.0])
            }
        }
    }

    struct FlagAction {
        name: String,
        similes: Vec<String>,
        valid: bool,
        has_handler: bool,
        handled: AtomicUsize,
    }

    impl FlagAction {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                similes: Vec::new(),
                valid: true,
                has_handler: true,
                handled: AtomicUsize::new(0),
            })
        }

        fn handled(&self) -> usize {
            self.handled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Action for FlagAction {
        fn name(&self) -> &str {
            &self.name
        }

        fn similes(&self) -> &[String] {
            &self.similes
        }

        fn description(&self) -> &str {
            "records that it ran"
        }

        fn has_handler(&self) -> bool {
            self.has_handler
        }

        async fn validate(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
        ) -> Result<bool> {
            Ok(self.valid)
        }

        async fn handle(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
            _options: &serde_json::Value,
            _callback: Option<&HandlerCallback>,
        ) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlagEvaluator {
        name: String,
        valid: bool,
        always_run: bool,
        handled: AtomicUsize,
    }

    impl FlagEvaluator {
        fn named(name: &str, valid: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                valid,
                always_run: false,
                handled: AtomicUsize::new(0),
            })
        }

        fn handled(&self) -> usize {
            self.handled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Evaluator for FlagEvaluator {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "records that it ran"
        }

        fn always_run(&self) -> bool {
            self.always_run
        }

        async fn validate(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
        ) -> Result<bool> {
            Ok(self.valid)
        }

        async fn handle(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
        ) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TextProvider(&'static str);

    #[async_trait]
    impl ContextProvider for TextProvider {
        async fn get(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
        ) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ContextProvider for FailingProvider {
        async fn get(
            &self,
            _runtime: &AgentRuntime,
            _message: &Memory,
            _state: Option<&State>,
        ) -> Result<String> {
            Err(Error::Internal("provider exploded".into()))
        }
    }

    fn runtime_with(model: Arc<dyn ModelClient>) -> AgentRuntime {
        let mut character = Character::named("Echo");
        character.bio = vec!["terse automaton".into()];
        character.adjectives = vec!["wry".into()];
        AgentRuntime::new(character, Arc::new(InMemoryAdapter::new()), model)
    }

    fn account(name: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: name.into(),
            username: name.to_lowercase(),
            email: None,
            details: ActorDetails::default(),
        }
    }

    async fn seed_room(runtime: &AgentRuntime, user: &Account) -> Uuid {
        let room_id = Uuid::new_v4();
        runtime.ensure_account(user).await.unwrap();
        runtime.ensure_connection(user.id, room_id).await.unwrap();
        room_id
    }

    fn incoming(user: &Account, runtime: &AgentRuntime, room_id: Uuid, text: &str) -> Memory {
        Memory::new(user.id, runtime.agent_id(), room_id, Content::from_text(text))
    }

    #[tokio::test]
    async fn compose_state_collects_transcript_actors_and_persona() {
        let runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let ada = account("Ada");
        let room_id = seed_room(&runtime, &ada).await;

        for text in ["first message", "second message"] {
            let m = incoming(&ada, &runtime, room_id, text);
            runtime.message_manager().create_memory(&m, false).await.unwrap();
        }

        let message = incoming(&ada, &runtime, room_id, "hello there");
        let mut extra = HashMap::new();
        extra.insert("customField".to_string(), "kept".to_string());
        let state = runtime.compose_state(&message, extra).await.unwrap();

        assert_eq!(state.agent_name, "Echo");
        assert_eq!(state.room_id, room_id);
        assert!(state.recent_messages.contains("first message"));
        assert!(state.recent_messages.contains("second message"));
        assert!(state.actors.contains("Ada"));
        assert_eq!(state.bio, "terse automaton");
        assert_eq!(state.adjective, "wry");
        assert_eq!(state.template_values()["customField"], "kept");
    }

    #[tokio::test]
    async fn compose_state_surfaces_matching_knowledge() {
        let runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let ada = account("Ada");
        let room_id = seed_room(&runtime, &ada).await;

        let mut fact = incoming(&ada, &runtime, room_id, "the vault code is 4412");
        fact = runtime.knowledge_manager().add_embedding(fact).await.unwrap();
        runtime.knowledge_manager().create_memory(&fact, true).await.unwrap();

        let message = incoming(&ada, &runtime, room_id, "what is the vault code?");
        let state = runtime.compose_state(&message, HashMap::new()).await.unwrap();
        assert!(state.knowledge.contains("- the vault code is 4412"));
    }

    #[tokio::test]
    async fn knowledge_stays_private_to_its_agent_on_a_shared_store() {
        let db = Arc::new(InMemoryAdapter::new());
        let model: Arc<dyn ModelClient> = Arc::new(StubClient::new(vec![]));
        let echo = AgentRuntime::new(Character::named("Echo"), db.clone(), model.clone());
        let argus = AgentRuntime::new(Character::named("Argus"), db, model);

        let ada = account("Ada");
        let room_id = seed_room(&echo, &ada).await;

        let mut secret = Memory::new(
            ada.id,
            argus.agent_id(),
            room_id,
            Content::from_text("argus holds the vault code"),
        );
        secret = argus.knowledge_manager().add_embedding(secret).await.unwrap();
        argus.knowledge_manager().create_memory(&secret, true).await.unwrap();

        let mut mine = incoming(&ada, &echo, room_id, "echo answers in rhyme");
        mine = echo.knowledge_manager().add_embedding(mine).await.unwrap();
        echo.knowledge_manager().create_memory(&mine, true).await.unwrap();

        let message = incoming(&ada, &echo, room_id, "what do you know?");
        let state = echo.compose_state(&message, HashMap::new()).await.unwrap();
        assert!(state.knowledge.contains("- echo answers in rhyme"));
        assert!(!state.knowledge.contains("argus holds the vault code"));
    }

    #[tokio::test]
    async fn broken_embedder_fails_composition() {
        let runtime = runtime_with(Arc::new(StubClient::failing_embedder()));
        let ada = account("Ada");
        let room_id = seed_room(&runtime, &ada).await;

        let message = incoming(&ada, &runtime, room_id, "non-empty text");
        let err = runtime.compose_state(&message, HashMap::new()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Model(ModelError::EmbeddingFailed(_))
        ));
    }

    #[tokio::test]
    async fn provider_outputs_skip_empties_and_join_with_newline() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        runtime.register_context_provider(Arc::new(TextProvider("A")));
        runtime.register_context_provider(Arc::new(TextProvider("")));
        runtime.register_context_provider(Arc::new(TextProvider("C")));

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        let text = runtime.providers_text(&message, None).await.unwrap();
        assert_eq!(text, "A\nC");
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        runtime.register_context_provider(Arc::new(TextProvider("fine")));
        runtime.register_context_provider(Arc::new(FailingProvider));

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        let err = runtime.providers_text(&message, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Capability(CapabilityError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn process_actions_resolves_fuzzy_names() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let action = FlagAction::named("tweet_with_media");
        runtime.register_action(action.clone());

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("post it"),
        );
        let mut response = message.clone();
        response.content.action = Some("Tweet With Media".into());

        runtime
            .process_actions(&message, &[response], None, None)
            .await
            .unwrap();
        assert_eq!(action.handled(), 1);
    }

    #[tokio::test]
    async fn unmatched_and_none_actions_are_noops() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let action = FlagAction::named("tweet_with_media");
        runtime.register_action(action.clone());

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        let mut dance = message.clone();
        dance.content.action = Some("dance".into());
        let mut none = message.clone();
        none.content.action = Some("NONE".into());

        runtime
            .process_actions(&message, &[dance, none], None, None)
            .await
            .unwrap();
        assert_eq!(action.handled(), 0);
    }

    #[tokio::test]
    async fn matched_action_without_handler_is_a_noop() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let action = Arc::new(FlagAction {
            name: "broken_action".into(),
            similes: Vec::new(),
            valid: true,
            has_handler: false,
            handled: AtomicUsize::new(0),
        });
        runtime.register_action(action.clone());

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        let mut response = message.clone();
        response.content.action = Some("broken_action".into());

        runtime
            .process_actions(&message, &[response], None, None)
            .await
            .unwrap();
        assert_eq!(action.handled(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_the_first() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        runtime.register_action(FlagAction::named("reply"));
        runtime.register_action(FlagAction::named("reply"));
        assert_eq!(runtime.actions().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_action_names_register_separately() {
        // "reply" resolves into "reply_with_image" under fuzzy dispatch
        // matching, but they are distinct registrations.
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        runtime.register_action(FlagAction::named("reply"));
        runtime.register_action(FlagAction::named("reply_with_image"));
        runtime.register_evaluator(FlagEvaluator::named("fact", true));
        runtime.register_evaluator(FlagEvaluator::named("fact_extractor", true));
        assert_eq!(runtime.actions().len(), 2);
        assert_eq!(runtime.evaluators().len(), 2);
    }

    #[tokio::test]
    async fn evaluate_runs_only_model_selected_candidates() {
        let model = Arc::new(StubClient::new(vec![r#"["note_taker", "off_topic"]"#]));
        let mut runtime = runtime_with(model);
        let note_taker = FlagEvaluator::named("note_taker", true);
        let off_topic = FlagEvaluator::named("off_topic", false);
        runtime.register_evaluator(note_taker.clone());
        runtime.register_evaluator(off_topic.clone());

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("take notes on this"),
        );
        let fired = runtime.evaluate(&message, None, true).await.unwrap();

        // off_topic failed validation, so the model's mention of it is moot
        assert_eq!(fired, vec!["note_taker"]);
        assert_eq!(note_taker.handled(), 1);
        assert_eq!(off_topic.handled(), 0);
    }

    #[tokio::test]
    async fn evaluate_skips_the_model_when_nothing_is_eligible() {
        let model = Arc::new(StubClient::new(vec![]));
        let mut runtime = runtime_with(model.clone());
        runtime.register_evaluator(FlagEvaluator::named("note_taker", true));

        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        // no response this cycle and no always-run evaluators
        let fired = runtime.evaluate(&message, None, false).await.unwrap();
        assert!(fired.is_empty());
        assert_eq!(model.completions(), 0);
    }

    #[tokio::test]
    async fn update_recent_message_state_refreshes_only_the_tail() {
        let runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let ada = account("Ada");
        let room_id = seed_room(&runtime, &ada).await;

        let first = incoming(&ada, &runtime, room_id, "opening line");
        runtime.message_manager().create_memory(&first, false).await.unwrap();

        let message = incoming(&ada, &runtime, room_id, "hello");
        let state = runtime.compose_state(&message, HashMap::new()).await.unwrap();

        let later = incoming(&ada, &runtime, room_id, "a later message");
        runtime.message_manager().create_memory(&later, false).await.unwrap();

        let refreshed = runtime.update_recent_message_state(&state).await;
        assert!(refreshed.recent_messages.contains("a later message"));
        assert_eq!(refreshed.bio, state.bio);
        assert_eq!(refreshed.knowledge, state.knowledge);
    }

    #[tokio::test]
    async fn ensure_connection_is_idempotent() {
        let runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let ada = account("Ada");
        let room_id = Uuid::new_v4();
        runtime.ensure_account(&ada).await.unwrap();
        runtime.ensure_account(&ada).await.unwrap();
        runtime.ensure_connection(ada.id, room_id).await.unwrap();
        runtime.ensure_connection(ada.id, room_id).await.unwrap();

        let participants = runtime
            .db()
            .get_participants_for_room(room_id)
            .await
            .unwrap();
        assert_eq!(participants.len(), 2);
    }

    #[tokio::test]
    async fn register_plugin_merges_bundles() {
        let mut runtime = runtime_with(Arc::new(StubClient::new(vec![])));
        let mut plugin = Plugin::new("social", "posting capabilities");
        plugin.actions.push(FlagAction::named("post_update"));
        plugin.evaluators.push(FlagEvaluator::named("note_taker", true));
        plugin.providers.push(Arc::new(TextProvider("extra context")));
        runtime.register_plugin(plugin);

        assert_eq!(runtime.actions().len(), 1);
        assert_eq!(runtime.evaluators().len(), 1);
        let message = Memory::new(
            Uuid::new_v4(),
            runtime.agent_id(),
            Uuid::new_v4(),
            Content::from_text("hi"),
        );
        let text = runtime.providers_text(&message, None).await.unwrap();
        assert_eq!(text, "extra context");
    }
}
