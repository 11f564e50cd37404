//! Round state of a running conversation.

use parley_types::chat::TranscriptMessage;
use parley_types::event::TerminatedBy;

use super::termination;

/// Where the engine is within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    WaitingForSpeaker,
    SpeakerActing,
    EvaluatingTermination,
    Done,
}

/// Current speaker, round counter, transcript, and termination status.
#[derive(Debug, Clone)]
pub struct RoundState {
    speaker: String,
    round: u32,
    transcript: Vec<TranscriptMessage>,
    terminated_by: Option<TerminatedBy>,
    phase: EnginePhase,
}

impl RoundState {
    /// State after the entry agent delivered the seed message (round 1).
    pub fn seeded(entry_agent: &str, seed: impl Into<String>) -> Self {
        Self {
            speaker: entry_agent.to_string(),
            round: 1,
            transcript: vec![TranscriptMessage {
                speaker: entry_agent.to_string(),
                content: seed.into(),
                round: 1,
            }],
            terminated_by: None,
            phase: EnginePhase::EvaluatingTermination,
        }
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<TranscriptMessage> {
        self.transcript
    }

    pub fn terminated_by(&self) -> Option<TerminatedBy> {
        self.terminated_by
    }

    pub fn latest(&self) -> Option<&TranscriptMessage> {
        self.transcript.last()
    }

    /// Hand the floor to `speaker` and open the next round.
    pub fn begin_turn(&mut self, speaker: &str) {
        debug_assert_eq!(self.phase, EnginePhase::WaitingForSpeaker);
        self.speaker = speaker.to_string();
        self.round += 1;
        self.phase = EnginePhase::SpeakerActing;
    }

    /// Record what the current speaker said this round.
    pub fn record_message(&mut self, content: impl Into<String>) {
        self.transcript.push(TranscriptMessage {
            speaker: self.speaker.clone(),
            content: content.into(),
            round: self.round,
        });
        self.phase = EnginePhase::EvaluatingTermination;
    }

    /// Apply the termination predicate to the latest message.
    ///
    /// Moves to `Done` when the conversation stops, otherwise back to
    /// `WaitingForSpeaker`.
    pub fn evaluate(&mut self, max_round: u32) -> Option<TerminatedBy> {
        let latest = self.latest().map(|m| m.content.as_str()).unwrap_or("");
        match termination::evaluate(latest, self.round, max_round) {
            Some(cause) => {
                self.finish(cause);
                Some(cause)
            }
            None => {
                self.phase = EnginePhase::WaitingForSpeaker;
                None
            }
        }
    }

    pub fn finish(&mut self, cause: TerminatedBy) {
        self.terminated_by = Some(cause);
        self.phase = EnginePhase::Done;
    }

    pub fn is_done(&self) -> bool {
        self.phase == EnginePhase::Done
    }

    /// Content of the last non-empty message, verbatim.
    pub fn summary(&self) -> String {
        self.transcript
            .iter()
            .rev()
            .find(|m| !m.content.trim().is_empty())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_round_one() {
        let state = RoundState::seeded("user_proxy", "question");
        assert_eq!(state.round(), 1);
        assert_eq!(state.speaker(), "user_proxy");
        assert_eq!(state.phase(), EnginePhase::EvaluatingTermination);
        assert_eq!(state.transcript()[0].round, 1);
    }

    #[test]
    fn phases_cycle_through_a_round() {
        let mut state = RoundState::seeded("user_proxy", "question");
        assert_eq!(state.evaluate(5), None);
        assert_eq!(state.phase(), EnginePhase::WaitingForSpeaker);

        state.begin_turn("planner");
        assert_eq!(state.phase(), EnginePhase::SpeakerActing);
        assert_eq!(state.round(), 2);

        state.record_message("ask researcher");
        assert_eq!(state.phase(), EnginePhase::EvaluatingTermination);
        assert_eq!(state.latest().unwrap().speaker, "planner");
    }

    #[test]
    fn budget_exhaustion_finishes() {
        let mut state = RoundState::seeded("user_proxy", "question");
        assert_eq!(state.evaluate(1), Some(TerminatedBy::RoundBudget));
        assert!(state.is_done());
    }

    #[test]
    fn summary_skips_empty_messages() {
        let mut state = RoundState::seeded("user_proxy", "question");
        state.evaluate(10);
        state.begin_turn("researcher");
        state.record_message("The answer is 42.");
        state.evaluate(10);
        state.begin_turn("user_proxy");
        state.record_message("  ");
        assert_eq!(state.summary(), "The answer is 42.");
    }
}
