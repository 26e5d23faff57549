//! Orchestrator
//!
//! Listens to every event on the bus and runs one reasoning cycle per
//! trigger:
//!
//! ```text
//! Idle -> Evaluating -> (Idle | Reasoning) -> (Idle | Suggesting) -> Idle
//! ```
//!
//! Suggestions are advisory. Actions only run through
//! [`Orchestrator::approve_suggestion`] (or a direct
//! [`Orchestrator::execute_actions`] call), never automatically.
//!
//! Failures inside a cycle are contained: they are logged to tracing and to
//! the context store, and the cycle ends. Nothing is surfaced through the bus.

pub mod context;
pub mod gating;
pub mod response;

pub use context::{time_of_day, ReasoningContext, TimeInfo, Trigger};
pub use gating::{evaluate_event, IMPORTANT_TOPICS};
pub use response::{parse_response, ParseError, Priority, ProposedSuggestion, ReasoningDecision};

use crate::config::OrchestratorConfig;
use crate::context_store::{ContextStore, LogKind};
use crate::event_bus::{Event, EventBus, Subscription};
use crate::reasoning::ReasoningService;
use crate::registry::Registry;
use anyhow::Result;
use sdk::{ActionOutcome, ActionRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Topic carrying new suggestions to the presentation layer
pub const SUGGESTION_TOPIC: &str = "orchestrator_suggestion";

/// Topic carrying the outcomes of an approved suggestion
pub const ACTION_COMPLETE_TOPIC: &str = "orchestrator_action_complete";

fn is_own_topic(topic: &str) -> bool {
    topic == SUGGESTION_TOPIC || topic == ACTION_COMPLETE_TOPIC
}

/// Finished cycles kept for `wait_idle` before they are discarded
const UNCOLLECTED_CYCLE_LIMIT: usize = 256;

/// Suggestion emitted on [`SUGGESTION_TOPIC`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub message: String,
    pub actions: Vec<ActionRequest>,
    pub priority: Priority,
    /// The trigger that produced this suggestion
    pub context: Trigger,
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Gating decided the trigger was not worth reasoning about
    Ignored,
    /// No credential; the trigger would have been reasoned about
    ObserveOnly,
    /// The service decided no action was needed
    NoAction,
    Suggested(Suggestion),
    ReasoningFailed,
    ParseFailed,
    /// Another cycle for the same topic was already reasoning
    Coalesced,
}

impl CycleOutcome {
    /// Short machine-readable name
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Ignored => "ignored",
            CycleOutcome::ObserveOnly => "observe_only",
            CycleOutcome::NoAction => "no_action",
            CycleOutcome::Suggested(_) => "suggested",
            CycleOutcome::ReasoningFailed => "reasoning_failed",
            CycleOutcome::ParseFailed => "parse_failed",
            CycleOutcome::Coalesced => "coalesced",
        }
    }
}

/// Removes a topic from the in-flight set when the cycle ends
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    topic: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.topic);
    }
}

pub struct Orchestrator {
    bus: Arc<EventBus>,
    registry: Arc<Registry>,
    store: Arc<ContextStore>,
    reasoner: Option<Arc<dyn ReasoningService>>,
    config: OrchestratorConfig,
    in_flight: Mutex<HashSet<String>>,
    subscription: Mutex<Option<Subscription>>,
    cycles: Mutex<JoinSet<CycleOutcome>>,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// Passing `None` for `reasoner` puts it in observe-only mode: events
    /// are still logged and evaluated, but the reasoning service is never
    /// called.
    pub fn new(
        bus: Arc<EventBus>,
        registry: Arc<Registry>,
        store: Arc<ContextStore>,
        reasoner: Option<Arc<dyn ReasoningService>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            bus,
            registry,
            store,
            reasoner,
            config,
            in_flight: Mutex::new(HashSet::new()),
            subscription: Mutex::new(None),
            cycles: Mutex::new(JoinSet::new()),
        }
    }

    pub fn is_observe_only(&self) -> bool {
        self.reasoner.is_none()
    }

    /// Initialize the context store and start listening to every topic
    ///
    /// Each event received spawns its cycle on the current tokio runtime.
    /// Calling `init` twice is a no-op.
    pub async fn init(self: &Arc<Self>) {
        self.store.init().await;

        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            return;
        }

        let this = Arc::downgrade(self);
        *subscription = Some(self.bus.on_any(move |topic, payload| {
            if let Some(this) = this.upgrade() {
                this.spawn_cycle(topic, payload.clone());
            }
        }));

        info!(
            observe_only = self.is_observe_only(),
            "Orchestrator initialized and listening"
        );
    }

    /// Stop listening to the bus
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            debug!("Orchestrator detached from event bus");
        }
    }

    fn spawn_cycle(self: Arc<Self>, topic: &str, payload: Value) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(topic, "No tokio runtime; dropping event");
            return;
        };

        let topic = topic.to_string();
        let this = Arc::clone(&self);
        let mut cycles = self.cycles.lock().unwrap_or_else(PoisonError::into_inner);

        // Nobody is waiting on these; drop finished outcomes.
        if cycles.len() >= UNCOLLECTED_CYCLE_LIMIT {
            while cycles.try_join_next().is_some() {}
        }
        cycles.spawn_on(async move { this.handle_event(&topic, payload).await }, &handle);
    }

    /// Wait for every spawned cycle to finish, including cycles started by
    /// events those cycles emitted
    pub async fn wait_idle(&self) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let mut cycles = std::mem::take(
                &mut *self.cycles.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if cycles.is_empty() {
                break;
            }
            while let Some(joined) = cycles.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => error!(error = %e, "Reasoning cycle task failed"),
                }
            }
        }
        outcomes
    }

    /// Log the event, then reason about it if gating lets it through
    ///
    /// The orchestrator's own suggestion and completion events are logged
    /// but never gated, so they cannot trigger another cycle.
    pub async fn handle_event(&self, topic: &str, payload: Value) -> CycleOutcome {
        let event = Event::new(topic, payload);
        debug!(topic, source = ?event.source_app, "Received event");

        self.log(
            LogKind::EventReceived,
            json!({
                "event": event.topic,
                "data": event.payload,
                "source": event.source_app.as_deref().unwrap_or("unknown"),
            }),
        )
        .await;

        if is_own_topic(&event.topic) || !evaluate_event(&event.topic, &event.payload) {
            return CycleOutcome::Ignored;
        }

        self.reason(&event.topic, &event.payload).await
    }

    /// Run the reasoning step for one trigger
    pub async fn reason(&self, topic: &str, payload: &Value) -> CycleOutcome {
        let Some(reasoner) = &self.reasoner else {
            info!(topic, "No credential configured; would reason about trigger");
            return CycleOutcome::ObserveOnly;
        };

        let _guard = if self.config.single_flight_per_topic {
            match self.claim(topic) {
                Some(guard) => Some(guard),
                None => {
                    debug!(topic, "Reasoning already in flight for topic; coalescing");
                    return CycleOutcome::Coalesced;
                }
            }
        } else {
            None
        };

        let context = self.build_context(topic, payload).await;
        let prompt = context.render_prompt();

        let raw = match reasoner.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(topic, service = reasoner.name(), error = %e, "Reasoning failed");
                self.log(
                    LogKind::ReasoningError,
                    json!({ "trigger": topic, "error": e.to_string() }),
                )
                .await;
                return CycleOutcome::ReasoningFailed;
            }
        };

        let decision = match parse_response(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(topic, error = %e, response = %raw, "Failed to parse reasoning response");
                return CycleOutcome::ParseFailed;
            }
        };

        self.log(
            LogKind::ReasoningComplete,
            json!({
                "trigger": topic,
                "shouldAct": decision.should_act(),
                "reasoning": decision.reasoning(),
                "suggestion": decision.suggestion(),
            }),
        )
        .await;

        match decision {
            ReasoningDecision::NoAction { reasoning } => {
                debug!(topic, reasoning = reasoning.as_deref().unwrap_or(""), "No action needed");
                CycleOutcome::NoAction
            }
            ReasoningDecision::Act { suggestion, .. } => {
                let suggestion = Suggestion {
                    id: uuid::Uuid::new_v4().to_string(),
                    message: suggestion.message,
                    actions: suggestion.actions,
                    priority: suggestion.priority,
                    context: context.trigger,
                };
                info!(id = %suggestion.id, priority = %suggestion.priority, "Emitting suggestion");

                match serde_json::to_value(&suggestion) {
                    Ok(payload) => self.bus.emit(SUGGESTION_TOPIC, payload),
                    Err(e) => error!(error = %e, "Failed to serialize suggestion"),
                }
                CycleOutcome::Suggested(suggestion)
            }
        }
    }

    fn claim(&self, topic: &str) -> Option<InFlight<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
        inserted.then(|| InFlight {
            set: &self.in_flight,
            topic: topic.to_string(),
        })
    }

    /// Gather everything the reasoning service sees for one trigger
    pub async fn build_context(&self, topic: &str, payload: &Value) -> ReasoningContext {
        let now = chrono::Local::now();
        ReasoningContext {
            trigger: Trigger {
                topic: topic.to_string(),
                payload: payload.clone(),
                timestamp: now.to_rfc3339(),
            },
            app_state: self.registry.all_state(),
            capabilities: self.registry.all_manifests(),
            user_context: self.store.get_full_context().await,
            time: TimeInfo::at(now),
        }
    }

    /// Dispatch actions one at a time
    ///
    /// A failing action is recorded and the remaining actions still run.
    /// Returns one outcome per action, in order.
    pub async fn execute_actions(&self, actions: &[ActionRequest]) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());

        for request in actions {
            match self
                .registry
                .dispatch(&request.app, &request.action, request.params.clone())
                .await
            {
                Ok(result) => {
                    self.log(
                        LogKind::ActionExecuted,
                        json!({
                            "app": request.app,
                            "action": request.action,
                            "params": request.params,
                            "result": result,
                        }),
                    )
                    .await;
                    outcomes.push(ActionOutcome::success(request.clone(), result));
                }
                Err(e) => {
                    warn!(app = %request.app, action = %request.action, error = %e, "Action failed");
                    self.log(
                        LogKind::ActionFailed,
                        json!({
                            "app": request.app,
                            "action": request.action,
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                    outcomes.push(ActionOutcome::failure(request.clone(), e.to_string()));
                }
            }
        }

        outcomes
    }

    /// Apply an approved suggestion's actions and announce the outcomes
    pub async fn approve_suggestion(
        &self,
        suggestion_id: &str,
        actions: &[ActionRequest],
    ) -> Vec<ActionOutcome> {
        info!(suggestion_id, actions = actions.len(), "Suggestion approved");
        let results = self.execute_actions(actions).await;

        self.bus.emit(
            ACTION_COMPLETE_TOPIC,
            json!({ "suggestionId": suggestion_id, "results": results }),
        );
        results
    }

    /// Record a dismissal
    ///
    /// With both `reason` and `suppress_future`, also writes the preference
    /// `suppress_<reason>`. Gating does not read it.
    pub async fn dismiss_suggestion(
        &self,
        suggestion_id: &str,
        reason: Option<&str>,
        suppress_future: bool,
    ) -> Result<()> {
        info!(suggestion_id, reason, "Suggestion dismissed");

        self.store
            .log_action(
                LogKind::SuggestionDismissed,
                json!({
                    "suggestionId": suggestion_id,
                    "reason": reason,
                    "dontAskAgain": suppress_future,
                }),
            )
            .await?;

        if let (true, Some(reason)) = (suppress_future, reason) {
            self.store
                .set_preference(
                    &format!("suppress_{}", reason),
                    json!({
                        "enabled": true,
                        "createdAt": chrono::Utc::now().to_rfc3339(),
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn log(&self, kind: LogKind, payload: Value) {
        if let Err(e) = self.store.log_action(kind, payload).await {
            warn!(kind = %kind, error = %e, "Failed to write log entry");
        }
    }
}
