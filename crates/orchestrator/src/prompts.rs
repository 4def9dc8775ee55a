use roundtable_core::{Debate, Participant, TurnSlot};

use crate::provider::{ChatMessage, CompletionRequest, SamplingParams};

pub struct DebatePrompts;

impl DebatePrompts {
    /// Builds the provider request for the participant at `slot`.
    ///
    /// History holds the last `context_window` finished turns across all
    /// participants, oldest first. The speaker's own turns are replayed as
    /// assistant messages and everyone else's as attributed user messages.
    pub fn completion_request(
        debate: &Debate,
        participant: &Participant,
        slot: TurnSlot,
    ) -> CompletionRequest {
        let history = debate
            .history(debate.context_window)
            .into_iter()
            .map(|turn| {
                if turn.participant_index == slot.participant_index {
                    ChatMessage::assistant(turn.content.clone())
                } else {
                    ChatMessage::user(format!("{}: {}", turn.participant_name, turn.content))
                }
            })
            .collect::<Vec<_>>();

        let prompt = if history.is_empty() {
            Self::opening(debate, participant)
        } else {
            Self::rebuttal(debate, participant, slot)
        };

        CompletionRequest {
            model: participant.model.clone(),
            system_prompt: Self::system(debate, participant),
            history,
            prompt,
            sampling: SamplingParams {
                temperature: participant.temperature,
                max_tokens: None,
            },
        }
    }

    pub fn system(debate: &Debate, participant: &Participant) -> String {
        let others = debate
            .participants
            .iter()
            .filter(|p| p.name != participant.name)
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let persona = if participant.system_prompt.trim().is_empty() {
            format!(
                "You are {}, a participant in a structured debate.",
                participant.name
            )
        } else {
            participant.system_prompt.trim().to_string()
        };

        format!(
            r#"{persona}

## Debate
**Topic:** {topic}
**Your name:** {name}
**Other participants:** {others}
**Rounds:** {rounds}

Speak only for yourself. Engage directly with the arguments of the other participants and keep each answer focused."#,
            persona = persona,
            topic = debate.topic,
            name = participant.name,
            others = others,
            rounds = debate.max_rounds,
        )
    }

    fn opening(debate: &Debate, participant: &Participant) -> String {
        format!(
            "The debate begins. {name}, present your opening position on: {topic}",
            name = participant.name,
            topic = debate.topic
        )
    }

    fn rebuttal(debate: &Debate, participant: &Participant, slot: TurnSlot) -> String {
        let closing = if slot.round == debate.max_rounds {
            " This is the final round, so make your closing argument."
        } else {
            ""
        };
        format!(
            "It is your turn, {name} (round {round} of {rounds}). Respond to the arguments above.{closing}",
            name = participant.name,
            round = slot.round,
            rounds = debate.max_rounds,
            closing = closing
        )
    }
}
