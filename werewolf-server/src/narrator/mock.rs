//! Rule-based narrator. Answers common questions straight from the public
//! context without any external call.

use async_trait::async_trait;

use crate::game::context::NarratorContext;
use crate::game::events::EventKind;
use super::{NarratorError, NarratorPort, MOCK_PROVIDER};

const DEFAULT_ANSWER: &str = "I am your host. Ask me about the rules, phase, or who was eliminated.";
const RULES_ANSWER: &str =
    "Basic rules: Werewolves eliminate at night. Seer peeks, Medic protects. Daytime: discuss and vote.";

/// Keyword-matching narrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockNarrator;

impl MockNarrator {
    /// Answer synchronously.
    pub fn answer(&self, question: &str, context: Option<&NarratorContext>) -> String {
        let q = question.to_lowercase();

        if q.contains("rule") {
            RULES_ANSWER.to_string()
        } else if q.contains("who died") || q.contains("who was eliminated") || q.contains("who is dead") {
            who_died(context)
        } else if q.contains("how many") && (q.contains("alive") || q.contains("left") || q.contains("remain")) {
            match context {
                Some(ctx) => {
                    let names: Vec<&str> = ctx.alive_players.iter().map(|p| p.name.as_str()).collect();
                    format!("{} players remain alive: {}", names.len(), names.join(", "))
                }
                None => "I cannot determine how many players are alive right now.".to_string(),
            }
        } else if q.contains("how many wolf") || q.contains("how many werewol") {
            "There are 1 to 3 werewolves depending on player count and settings. Their identities are hidden."
                .to_string()
        } else if q.contains("phase") {
            match context.filter(|c| !c.phase.is_empty()) {
                Some(ctx) => format!("We are currently in the {} phase. This is round {}.", ctx.phase, ctx.round),
                None => "The game has not started yet. We are in the lobby.".to_string(),
            }
        } else if q.contains("round") || q.contains("day") {
            match context.filter(|c| c.round > 0) {
                Some(ctx) => format!("This is round {} of the game.", ctx.round),
                None => "The game has not started yet.".to_string(),
            }
        } else {
            DEFAULT_ANSWER.to_string()
        }
    }
}

fn who_died(context: Option<&NarratorContext>) -> String {
    let Some(ctx) = context.filter(|c| !c.recent_events.is_empty()) else {
        return "No eliminations have occurred yet in this game.".to_string();
    };
    let Some(death) = ctx.latest_death() else {
        return "No one has been eliminated recently. All players are still alive.".to_string();
    };

    let victim = death.data.player_id.as_ref()
        .and_then(|id| ctx.name_of(id))
        .unwrap_or("a player");
    let how = if death.kind == EventKind::Lynch {
        "voted out"
    } else {
        "eliminated during the night"
    };
    format!("{} was {}. {} players remain alive.", victim, how, ctx.alive_players.len())
}

#[async_trait]
impl NarratorPort for MockNarrator {
    fn name(&self) -> &str {
        MOCK_PROVIDER
    }

    async fn ask(&self, question: &str, context: Option<&NarratorContext>) -> Result<String, NarratorError> {
        Ok(self.answer(question, context))
    }
}
