//! Transcript and markdown export.
//!
//! Compilation is a pure function of a debate snapshot: only finished turns
//! are rendered, nothing time-dependent is added, and the same snapshot
//! always yields byte-identical markdown.

use chrono::{DateTime, Utc};
use roundtable_core::{Debate, DebateState, Metrics};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TranscriptTurn {
    pub participant_index: usize,
    pub participant_name: String,
    pub model: String,
    pub content: String,
    pub tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TranscriptRound {
    pub number: u32,
    pub completed: bool,
    pub turns: Vec<TranscriptTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DebateTranscript {
    pub debate_id: Uuid,
    pub topic: String,
    pub state: DebateState,
    pub manually_stopped: bool,
    pub last_error: Option<String>,
    pub max_rounds: u32,
    pub rounds: Vec<TranscriptRound>,
    pub metrics: Metrics,
}

impl DebateTranscript {
    pub fn turn_count(&self) -> usize {
        self.rounds.iter().map(|r| r.turns.len()).sum()
    }
}

/// Structured transcript plus its markdown rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DebateExport {
    pub transcript: DebateTranscript,
    pub markdown: String,
}

pub struct TranscriptCompiler;

impl TranscriptCompiler {
    /// Summary of a debate with at least one finished turn.
    pub fn summarize(debate: &Debate) -> Result<DebateExport> {
        let transcript = Self::compile(debate);
        if transcript.turn_count() == 0 {
            return Err(OrchestratorError::NoCompletedTurns(debate.id));
        }
        let markdown = Self::render_markdown(&transcript);
        Ok(DebateExport {
            transcript,
            markdown,
        })
    }

    pub fn compile(debate: &Debate) -> DebateTranscript {
        let rounds = debate
            .rounds
            .iter()
            .filter(|round| !round.turns.is_empty())
            .map(|round| TranscriptRound {
                number: round.number,
                completed: round.completed,
                turns: round
                    .turns
                    .iter()
                    .map(|turn| TranscriptTurn {
                        participant_index: turn.participant_index,
                        participant_name: turn.participant_name.clone(),
                        model: debate
                            .participant(turn.participant_index)
                            .map(|p| p.model.clone())
                            .unwrap_or_default(),
                        content: turn.content.clone(),
                        tokens: turn.tokens,
                        cost: turn.cost,
                        latency_ms: turn.latency_ms,
                        completed_at: turn.completed_at,
                    })
                    .collect(),
            })
            .collect();

        DebateTranscript {
            debate_id: debate.id,
            topic: debate.topic.clone(),
            state: debate.state,
            manually_stopped: debate.manually_stopped,
            last_error: debate.last_error.clone(),
            max_rounds: debate.max_rounds,
            rounds,
            metrics: debate.metrics.clone(),
        }
    }

    pub fn render_markdown(transcript: &DebateTranscript) -> String {
        let mut out = String::new();

        out.push_str(&format!("# Debate: {}\n\n", transcript.topic));
        out.push_str(&format!("**Status:** {}\n", Self::status_line(transcript)));
        out.push_str(&format!(
            "**Rounds:** {} of {}\n",
            transcript.rounds.len(),
            transcript.max_rounds
        ));
        if let Some(error) = &transcript.last_error {
            out.push_str(&format!(
                "\n> Stopped by provider error: {}\n",
                single_line(error)
            ));
        }

        for round in &transcript.rounds {
            out.push_str(&format!("\n## Round {}\n", round.number));
            if !round.completed {
                out.push_str("\n_Round incomplete_\n");
            }

            for turn in &round.turns {
                out.push_str(&format!("\n### {}\n\n", turn.participant_name));
                out.push_str(turn.content.trim_end());
                out.push_str(&format!(
                    "\n\n_Model: {} | Tokens: {} | Cost: ${:.4} | Latency: {} ms_\n",
                    turn.model, turn.tokens, turn.cost, turn.latency_ms
                ));
            }
        }

        out.push_str("\n---\n\n## Metrics\n\n");
        out.push_str("| Participant | Tokens | Cost |\n");
        out.push_str("|---|---:|---:|\n");
        for entry in &transcript.metrics.by_participant {
            out.push_str(&format!(
                "| {} | {} | ${:.4} |\n",
                table_cell(&entry.name),
                entry.tokens,
                entry.cost
            ));
        }
        out.push_str(&format!(
            "| **Total** | {} | ${:.4} |\n",
            transcript.metrics.total_tokens, transcript.metrics.total_cost
        ));

        out
    }

    fn status_line(transcript: &DebateTranscript) -> String {
        match transcript.state {
            DebateState::Completed if transcript.manually_stopped => {
                "completed (stopped manually)".to_string()
            }
            state => state.as_str().to_string(),
        }
    }
}

/// Provider error text may span lines; a blockquote may not.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn table_cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}
