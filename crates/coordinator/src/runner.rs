//! The driving loop of one execution.

use crate::action::{BreakReason, CheckPoint, Decision, PolicyAction};
use crate::context::CoordinatorContext;
use crate::engine::PolicyEngine;
use crate::failure::MutationFailureKind;
use crate::outcome::{ExecutionOutcome, ExecutionStatus};
use crate::policies::{lookup_gate, progress_summary, IterationSnapshot};
use crate::state::LoopState;
use std::sync::Arc;
use theme_protocol::{
    ChatMessage, CompletionOptions, ExecutionLogSink, LogEntry, LogEntryKind, MessageTag,
    ModelProvider, ProviderError, StreamEvent, ToolCall, ToolCatalog, ToolCategory,
    ToolCompletion, ToolDefinition, ToolExecutor, ToolResult,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FORCED_READ_TOOL: &str = "read_file";
const NOT_EXECUTED: &str = "Not executed: the execution stopped before this call ran.";
const CLARIFY_FALLBACK: &str = "I need your input before continuing.";

enum Flow {
    Proceed,
    Nudge(String),
    Stop(Box<ExecutionOutcome>),
}

enum RequestError {
    Cancelled,
    Provider(ProviderError),
}

/// Drives model requests, tool dispatch and policy checks until the
/// execution completes, asks the user, breaks or is cancelled.
pub struct CoordinationLoop {
    provider: Arc<dyn ModelProvider>,
    executor: Arc<dyn ToolExecutor>,
    catalog: ToolCatalog,
    engine: PolicyEngine,
    tools: Vec<ToolDefinition>,
    options: CompletionOptions,
    log_sink: Option<Arc<dyn ExecutionLogSink>>,
    events: Option<mpsc::Sender<StreamEvent>>,
    cancel: CancellationToken,
}

impl CoordinationLoop {
    pub fn new(provider: Arc<dyn ModelProvider>, executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            provider,
            executor,
            catalog: ToolCatalog::default(),
            engine: PolicyEngine::default(),
            tools: Vec::new(),
            options: CompletionOptions::default(),
            log_sink: None,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn ExecutionLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Stream model output to `events` instead of waiting for whole responses.
    #[must_use]
    pub fn with_stream(mut self, events: mpsc::Sender<StreamEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for stopping the execution from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        execution_id: &str,
        ctx: &CoordinatorContext,
        history: Vec<ChatMessage>,
    ) -> ExecutionOutcome {
        let mut state = LoopState::new(history);
        state.pin_request(&ctx.request);
        log::info!(
            "execution {execution_id}: {} mode, {} tier, {} files",
            ctx.intent.as_str(),
            ctx.tier,
            ctx.files.len()
        );

        loop {
            if self.cancel.is_cancelled() {
                return cancelled(state);
            }
            if state.iteration >= ctx.thresholds.max_iterations {
                let message = format!(
                    "Stopped after {} iterations. {}",
                    state.iteration,
                    progress_summary(&state)
                );
                return self
                    .stop(execution_id, state, BreakReason::IterationLimit, message)
                    .await;
            }
            state.iteration += 1;
            log::debug!("execution {execution_id}: iteration {}", state.iteration);

            let decision = self
                .engine
                .evaluate(CheckPoint::PreIteration, &state, ctx, None);
            match self.apply(execution_id, ctx, &mut state, decision).await {
                Flow::Stop(outcome) => return *outcome,
                Flow::Nudge(message) => self.push_nudge(execution_id, &mut state, message).await,
                Flow::Proceed => {}
            }

            let completion = match self.request(&state).await {
                Ok(completion) => completion,
                Err(RequestError::Cancelled) => return cancelled(state),
                Err(RequestError::Provider(err)) => {
                    let message = format!(
                        "The model request failed ({err}). {}",
                        progress_summary(&state)
                    );
                    let reason = BreakReason::ProviderFailure(err.to_string());
                    return self.stop(execution_id, state, reason, message).await;
                }
            };
            state.history.push(ChatMessage::assistant(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));

            let snapshot = IterationSnapshot::from_completion(&completion, &self.catalog);
            let decision =
                self.engine
                    .evaluate(CheckPoint::PostResponse, &state, ctx, Some(&snapshot));
            let pending_nudge = match self.apply(execution_id, ctx, &mut state, decision).await {
                Flow::Stop(outcome) => {
                    let mut outcome = *outcome;
                    // Pending calls get a result so the history can be resumed
                    for call in &completion.tool_calls {
                        outcome
                            .history
                            .push(ChatMessage::tool_result(call.id.clone(), NOT_EXECUTED));
                    }
                    return outcome;
                }
                Flow::Nudge(message) => Some(message),
                Flow::Proceed => None,
            };

            if !snapshot.has_tool_calls() {
                if let Some(message) = pending_nudge {
                    self.push_nudge(execution_id, &mut state, message).await;
                    continue;
                }
                let summary = progress_summary(&state);
                return ExecutionOutcome::from_state(
                    ExecutionStatus::Completed,
                    completion.content,
                    summary,
                    state,
                );
            }

            let new_edits = self
                .dispatch(execution_id, ctx, &mut state, &completion.tool_calls)
                .await;
            if let Some(message) = pending_nudge {
                self.push_nudge(execution_id, &mut state, message).await;
            }

            let snapshot = snapshot.with_new_edits(new_edits);
            let decision =
                self.engine
                    .evaluate(CheckPoint::PostToolDispatch, &state, ctx, Some(&snapshot));
            match self.apply(execution_id, ctx, &mut state, decision).await {
                Flow::Stop(outcome) => return *outcome,
                Flow::Nudge(message) => self.push_nudge(execution_id, &mut state, message).await,
                Flow::Proceed => {}
            }
            refresh_memory_anchor(&mut state);
        }
    }

    async fn request(&self, state: &LoopState) -> Result<ToolCompletion, RequestError> {
        let call = async {
            match &self.events {
                Some(events) => {
                    self.provider
                        .stream_with_tools(&state.history, &self.tools, &self.options, events.clone())
                        .await
                }
                None => {
                    self.provider
                        .complete_with_tools(&state.history, &self.tools, &self.options)
                        .await
                }
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(RequestError::Cancelled),
            result = call => result.map_err(RequestError::Provider),
        }
    }

    /// Run the calls in order and record their effects. Returns the number of
    /// successful edits.
    async fn dispatch(
        &self,
        execution_id: &str,
        ctx: &CoordinatorContext,
        state: &mut LoopState,
        calls: &[ToolCall],
    ) -> usize {
        let mut new_edits = 0;
        for call in calls {
            let category = self.catalog.category(&call.name);
            let result = if self.cancel.is_cancelled() {
                ToolResult::error(NOT_EXECUTED)
            } else {
                match lookup_gate(state, &self.catalog, call).action {
                    PolicyAction::BlockLookup { reason } => {
                        log::debug!("execution {execution_id}: blocked `{}`", call.name);
                        ToolResult::error(reason)
                    }
                    _ => {
                        let raw = self.executor.execute(call).await;
                        state.tool_calls += 1;
                        ToolResult::normalize(&call.name, category, raw)
                    }
                }
            };

            let path = call.target_path().unwrap_or(call.name.as_str());
            match category {
                ToolCategory::Read if !result.is_error => state.record_read(path),
                ToolCategory::Mutate | ToolCategory::Delete if result.is_error => {
                    state.record_failure(path, MutationFailureKind::classify(&result.content));
                }
                ToolCategory::Mutate | ToolCategory::Delete => {
                    state.record_edit(path, &call.name);
                    new_edits += 1;
                }
                _ => {}
            }
            ctx.detector.record(call, &result);

            self.log(
                execution_id,
                LogEntry::new(
                    LogEntryKind::ToolResult,
                    state.iteration,
                    format!("{}: {}", call.name, result.content),
                ),
            )
            .await;
            let content = if result.is_error {
                format!("Error: {}", result.content)
            } else {
                result.content
            };
            state
                .history
                .push(ChatMessage::tool_result(call.id.clone(), content));
        }
        new_edits
    }

    /// Apply the decision's delta and turn its action into control flow.
    async fn apply(
        &self,
        execution_id: &str,
        ctx: &CoordinatorContext,
        state: &mut LoopState,
        decision: Decision,
    ) -> Flow {
        decision.delta.apply(state);
        if decision.delta.reset_detector {
            ctx.detector.reset();
        }

        match decision.action {
            PolicyAction::Continue | PolicyAction::BlockLookup { .. } => Flow::Proceed,
            PolicyAction::Nudge { message } => match decision.delta.forced_read {
                Some(path) => Flow::Nudge(self.forced_read(state, &path, message).await),
                None => Flow::Nudge(message),
            },
            PolicyAction::Clarify { message, options } => {
                self.log(
                    execution_id,
                    LogEntry::new(LogEntryKind::Question, state.iteration, message.clone()),
                )
                .await;
                let outcome = ExecutionOutcome::from_state(
                    ExecutionStatus::Clarifying,
                    message,
                    CLARIFY_FALLBACK.to_string(),
                    state.clone(),
                )
                .with_options(options);
                Flow::Stop(Box::new(outcome))
            }
            PolicyAction::Break { reason, message } => Flow::Stop(Box::new(
                self.stop(execution_id, state.clone(), reason, message).await,
            )),
        }
    }

    async fn stop(
        &self,
        execution_id: &str,
        state: LoopState,
        reason: BreakReason,
        message: String,
    ) -> ExecutionOutcome {
        log::warn!("execution {execution_id}: stopped ({reason})");
        self.log(
            execution_id,
            LogEntry::new(
                LogEntryKind::Decision,
                state.iteration,
                format!("break: {reason}"),
            ),
        )
        .await;
        let summary = progress_summary(&state);
        ExecutionOutcome::from_state(ExecutionStatus::Stopped, message, summary, state)
            .with_reason(reason)
    }

    /// Read `path` on the model's behalf and attach it to the nudge.
    async fn forced_read(&self, state: &mut LoopState, path: &str, message: String) -> String {
        let call = ToolCall::new(
            format!("forced-read-{}", state.iteration),
            FORCED_READ_TOOL,
            serde_json::json!({ "path": path }),
        );
        let raw = self.executor.execute(&call).await;
        let result = ToolResult::normalize(FORCED_READ_TOOL, ToolCategory::Read, raw);
        if result.is_error {
            log::warn!("forced read of {path} failed: {}", result.content);
            return message;
        }
        state.record_read(path);
        format!("{message}\n\n{path}:\n```\n{}\n```", result.content)
    }

    async fn push_nudge(&self, execution_id: &str, state: &mut LoopState, message: String) {
        state.nudges.total += 1;
        self.log(
            execution_id,
            LogEntry::new(LogEntryKind::Instruction, state.iteration, message.clone()),
        )
        .await;
        state
            .history
            .push(ChatMessage::user(message).tagged(MessageTag::Nudge));
    }

    async fn log(&self, execution_id: &str, entry: LogEntry) {
        if let Some(sink) = &self.log_sink {
            sink.append_message(execution_id, entry).await;
        }
    }
}

fn cancelled(state: LoopState) -> ExecutionOutcome {
    let summary = progress_summary(&state);
    ExecutionOutcome::from_state(
        ExecutionStatus::Cancelled,
        format!("Cancelled. {summary}"),
        summary,
        state,
    )
    .with_reason(BreakReason::Cancelled)
}

/// Replace the memory anchor with current progress once a mutation was tried.
fn refresh_memory_anchor(state: &mut LoopState) {
    if !state.edit_attempted {
        return;
    }
    state
        .history
        .retain(|message| !message.has_tag(MessageTag::MemoryAnchor));
    let anchor = format!("Progress so far: {}", progress_summary(state));
    state
        .history
        .push(ChatMessage::user(anchor).tagged(MessageTag::MemoryAnchor));
}
