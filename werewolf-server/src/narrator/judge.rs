//! Judge mode: the narrator names one alive player to eliminate, or
//! abstains.

use crate::game::context::{NarratorContext, PlayerRef};
use crate::game::state::PlayerId;
use super::NarratorRequest;

/// Keyword the judge uses to decline.
pub const ABSTAIN: &str = "ABSTAIN";

/// Prompt asking the judge for a verdict.
pub fn judge_prompt(alive: &[PlayerRef]) -> String {
    let names: Vec<&str> = alive.iter().map(|p| p.name.as_str()).collect();
    format!(
        "You are the AI Judge. Based on the discussion, decide who to eliminate. Players: {}. \
         Respond with just the player name to eliminate, or \"{}\" if no one should be eliminated. \
         Be fair but decisive.",
        names.join(", "),
        ABSTAIN
    )
}

/// Full narrator request for a verdict.
pub fn judge_request(context: NarratorContext, provider_preference: Option<String>) -> NarratorRequest {
    NarratorRequest {
        question: judge_prompt(&context.alive_players),
        game_context: Some(context),
        provider_preference,
    }
}

/// Read a verdict. `None` means abstain: an explicit `ABSTAIN`, or no
/// alive player's name in the answer. The longest matching name wins so
/// "Anna" is not read as "Ann".
pub fn parse_verdict(answer: &str, alive: &[PlayerRef]) -> Option<PlayerId> {
    if answer.to_uppercase().contains(ABSTAIN) {
        return None;
    }
    let lower = answer.to_lowercase();
    alive.iter()
        .filter(|p| !p.name.trim().is_empty() && lower.contains(&p.name.to_lowercase()))
        .max_by_key(|p| p.name.len())
        .map(|p| p.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alive() -> Vec<PlayerRef> {
        vec![
            PlayerRef { id: PlayerId::from("p1"), name: "Ann".into() },
            PlayerRef { id: PlayerId::from("p2"), name: "Anna".into() },
            PlayerRef { id: PlayerId::from("p3"), name: "Bob".into() },
        ]
    }

    #[test]
    fn test_prompt_lists_players() {
        let prompt = judge_prompt(&alive());
        assert!(prompt.contains("Players: Ann, Anna, Bob."));
        assert!(prompt.contains("ABSTAIN"));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_verdict("bob", &alive()), Some(PlayerId::from("p3")));
        assert_eq!(parse_verdict("I choose Anna. She lied.", &alive()), Some(PlayerId::from("p2")));
        assert_eq!(parse_verdict("Ann, clearly", &alive()), Some(PlayerId::from("p1")));
    }

    #[test]
    fn test_parse_abstain() {
        assert_eq!(parse_verdict("abstain", &alive()), None);
        assert_eq!(parse_verdict("Bob... no, ABSTAIN", &alive()), None);
        assert_eq!(parse_verdict("Nobody in particular", &alive()), None);
    }
}
