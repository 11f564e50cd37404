//! Speaker selection constrained to the conversation graph.
//!
//! The selector only ever returns a name from the allowed candidate set.
//! With `auto`, the manager model is asked for the next role; replies that
//! do not name exactly one allowed candidate are retried with a corrective
//! prompt, then resolved to the lexicographically first candidate.

use std::collections::HashMap;

use parley_types::chat::TranscriptMessage;
use parley_types::config::{ModelConfig, SelectionMethod};
use parley_types::error::ConversationError;
use parley_types::event::SelectionReason;
use parley_types::llm::{CompletionRequest, Message};
use tracing::{Instrument, debug, info_span, warn};

use crate::agent::registry::AgentRegistry;
use crate::llm::registry::ProviderRegistry;

/// Max tokens requested from the manager model; a role name is short.
const SELECTION_MAX_TOKENS: u32 = 64;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub speaker: String,
    pub reason: SelectionReason,
    /// Last manager reply when the pick fell back.
    pub proposed: Option<String>,
}

/// Inputs for one selection.
pub struct SelectionRequest<'a> {
    pub current: &'a str,
    /// Allowed successors of `current`; never empty.
    pub candidates: &'a [String],
    pub registry: &'a AgentRegistry,
    pub transcript: &'a [TranscriptMessage],
}

/// Selection policy for one conversation run.
///
/// Round-robin progress is kept per speaker, so a fresh selector is created
/// for every run.
#[derive(Debug, Clone)]
pub struct SpeakerSelector {
    method: SelectionMethod,
    max_retries: u32,
    manager: Option<ModelConfig>,
    last_pick: HashMap<String, String>,
}

impl SpeakerSelector {
    pub fn new(method: SelectionMethod, max_retries: u32, manager: Option<ModelConfig>) -> Self {
        Self {
            method,
            max_retries,
            manager,
            last_pick: HashMap::new(),
        }
    }

    /// Pick the next speaker among `request.candidates`.
    ///
    /// Only provider failures are errors; bad replies degrade to the
    /// deterministic fallback.
    pub async fn select(
        &mut self,
        request: SelectionRequest<'_>,
        providers: &ProviderRegistry,
    ) -> Result<Selection, ConversationError> {
        let selection = if request.candidates.len() == 1 {
            Selection {
                speaker: request.candidates[0].clone(),
                reason: SelectionReason::SingleCandidate,
                proposed: None,
            }
        } else {
            match self.method {
                SelectionMethod::RoundRobin => self.round_robin(&request),
                SelectionMethod::Auto => self.auto(&request, providers).await?,
            }
        };
        self.last_pick
            .insert(request.current.to_string(), selection.speaker.clone());
        Ok(selection)
    }

    fn round_robin(&self, request: &SelectionRequest<'_>) -> Selection {
        let mut ordered: Vec<&String> = request.candidates.iter().collect();
        ordered.sort_by_key(|name| request.registry.position(name).unwrap_or(usize::MAX));

        let next = match self.last_pick.get(request.current) {
            Some(previous) => ordered
                .iter()
                .position(|name| *name == previous)
                .map(|i| ordered[(i + 1) % ordered.len()])
                .unwrap_or(ordered[0]),
            None => ordered[0],
        };

        Selection {
            speaker: next.clone(),
            reason: SelectionReason::RoundRobin,
            proposed: None,
        }
    }

    async fn auto(
        &self,
        request: &SelectionRequest<'_>,
        providers: &ProviderRegistry,
    ) -> Result<Selection, ConversationError> {
        let Some(manager) = &self.manager else {
            warn!(current = %request.current, "no manager model for auto selection; using fallback");
            return Ok(fallback(request.candidates, None));
        };
        let provider = providers.resolve(&manager.model)?;

        let choices = request.candidates.join(", ");
        let mut messages: Vec<Message> = request
            .transcript
            .iter()
            .map(|m| Message::user(m.content.clone()).with_name(m.speaker.clone()))
            .collect();
        messages.push(Message::user(format!(
            "Read the above conversation. Then select the next role from [{choices}] to play. Only return the role."
        )));

        let mut last_reply = None;
        for attempt in 0..=self.max_retries {
            let completion = CompletionRequest {
                model: manager.model.clone(),
                messages: messages.clone(),
                system: Some(selection_system_prompt(request.registry, &choices)),
                tools: vec![],
                max_tokens: SELECTION_MAX_TOKENS,
                temperature: manager.temperature,
            };
            let span = info_span!(
                "gen_ai.select_speaker",
                gen_ai.system = provider.name(),
                gen_ai.request.model = %completion.model,
                attempt,
            );
            let response = provider.complete(&completion).instrument(span).await?;
            debug!(
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                reply = %response.content,
                "manager model replied"
            );

            if let Some(pick) = match_candidate(&response.content, request.candidates) {
                return Ok(Selection {
                    speaker: pick.to_string(),
                    reason: SelectionReason::Model,
                    proposed: None,
                });
            }

            let outsiders = mentioned_outsiders(&response.content, request.registry, request.candidates);
            if !outsiders.is_empty() {
                warn!(
                    current = %request.current,
                    proposed = ?outsiders,
                    allowed = %choices,
                    "routing violation: manager picked a speaker outside the allowed set"
                );
            }

            messages.push(Message::assistant(response.content.clone()));
            messages.push(Message::user(format!(
                "Your reply did not name exactly one of [{choices}]. Respond with a single name from that list and nothing else."
            )));
            last_reply = Some(response.content);
        }

        let selection = fallback(request.candidates, last_reply);
        warn!(
            current = %request.current,
            fallback = %selection.speaker,
            "manager model gave no valid pick; using fallback"
        );
        Ok(selection)
    }
}

fn fallback(candidates: &[String], proposed: Option<String>) -> Selection {
    let speaker = candidates.iter().min().cloned().unwrap_or_default();
    Selection {
        speaker,
        reason: SelectionReason::Fallback,
        proposed,
    }
}

fn selection_system_prompt(registry: &AgentRegistry, choices: &str) -> String {
    let roles: Vec<String> = registry
        .agents()
        .iter()
        .map(|a| format!("{}: {}", a.name, a.description))
        .collect();
    format!(
        "You are in a role play game. The following roles are available:\n{}.\n\n\
         Read the following conversation. Then select the next role from [{choices}] to play. Only return the role.",
        roles.join("\n")
    )
}

/// The single allowed candidate named in `reply`, if exactly one is named.
pub(crate) fn match_candidate<'a>(reply: &str, candidates: &'a [String]) -> Option<&'a str> {
    let reply = reply.to_lowercase();
    let mut named = candidates.iter().filter(|c| mentions(&reply, c));
    match (named.next(), named.next()) {
        (Some(only), None) => Some(only.as_str()),
        _ => None,
    }
}

/// Registered agents named in `reply` that are not allowed candidates.
pub(crate) fn mentioned_outsiders<'a>(
    reply: &str,
    registry: &'a AgentRegistry,
    candidates: &[String],
) -> Vec<&'a str> {
    let reply = reply.to_lowercase();
    registry
        .names()
        .filter(|name| !candidates.iter().any(|c| c == name))
        .filter(|name| mentions(&reply, name))
        .collect()
}

/// Whole-word, case-insensitive match of `name` in an already lowercased text.
fn mentions(lowered: &str, name: &str) -> bool {
    let needle = name.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    lowered.match_indices(&needle).any(|(start, _)| {
        let before = lowered[..start].chars().next_back();
        let after = lowered[start + needle.len()..].chars().next();
        !before.is_some_and(is_name_char) && !after.is_some_and(is_name_char)
    })
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
