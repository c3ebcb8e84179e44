//! Vote Tallying
//!
//! Pure counting over a finished `Voting` phase. The engine decides what to
//! do with the outcome.

use std::collections::BTreeMap;

use crate::game::state::PlayerId;

/// Vote counts, highest first. Equal counts keep first-vote order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(PlayerId, usize)>,
}

/// What a tally says.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Nobody voted for anyone.
    NoVotes,
    /// One player has strictly the most votes.
    Leader(PlayerId),
    /// Several players share the top count.
    Tie(Vec<PlayerId>),
}

impl Tally {
    /// Count non-null votes in voter-queue order.
    ///
    /// With `candidates` set, votes for anyone else count as abstentions.
    pub fn count(
        voter_queue: &[PlayerId],
        votes: &BTreeMap<PlayerId, Option<PlayerId>>,
        candidates: Option<&[PlayerId]>,
    ) -> Self {
        let mut entries: Vec<(PlayerId, usize)> = Vec::new();

        for voter in voter_queue {
            let Some(Some(target)) = votes.get(voter) else { continue };
            if let Some(allowed) = candidates {
                if !allowed.contains(target) {
                    continue;
                }
            }
            match entries.iter_mut().find(|(id, _)| id == target) {
                Some((_, n)) => *n += 1,
                None => entries.push((target.clone(), 1)),
            }
        }

        // Stable sort keeps first-vote order among equal counts
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Self { entries }
    }

    /// Sorted (target, count) pairs.
    pub fn entries(&self) -> &[(PlayerId, usize)] {
        &self.entries
    }

    /// Votes for one target.
    pub fn votes_for(&self, id: &PlayerId) -> usize {
        self.entries.iter().find(|(t, _)| t == id).map(|(_, n)| *n).unwrap_or(0)
    }

    /// Classify the tally.
    pub fn outcome(&self) -> VoteOutcome {
        let Some((_, top)) = self.entries.first() else {
            return VoteOutcome::NoVotes;
        };
        let tied: Vec<PlayerId> = self.entries.iter()
            .take_while(|(_, n)| n == top)
            .map(|(id, _)| id.clone())
            .collect();

        if tied.len() == 1 {
            VoteOutcome::Leader(tied[0].clone())
        } else {
            VoteOutcome::Tie(tied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| PlayerId::from(*n)).collect()
    }

    fn ballots(pairs: &[(&str, Option<&str>)]) -> BTreeMap<PlayerId, Option<PlayerId>> {
        pairs.iter()
            .map(|(v, t)| (PlayerId::from(*v), t.map(PlayerId::from)))
            .collect()
    }

    #[test]
    fn test_no_votes() {
        let queue = ids(&["a", "b"]);
        let tally = Tally::count(&queue, &ballots(&[("a", None), ("b", None)]), None);
        assert_eq!(tally.outcome(), VoteOutcome::NoVotes);
    }

    #[test]
    fn test_leader() {
        let queue = ids(&["a", "b", "c"]);
        let votes = ballots(&[("a", Some("p5")), ("b", Some("p5")), ("c", None)]);
        let tally = Tally::count(&queue, &votes, None);
        assert_eq!(tally.outcome(), VoteOutcome::Leader(PlayerId::from("p5")));
        assert_eq!(tally.votes_for(&PlayerId::from("p5")), 2);
    }

    #[test]
    fn test_tie_keeps_first_vote_order() {
        let queue = ids(&["a", "b", "c", "d"]);
        let votes = ballots(&[("a", Some("z")), ("b", Some("y")), ("c", Some("y")), ("d", Some("z"))]);
        let tally = Tally::count(&queue, &votes, None);
        assert_eq!(tally.outcome(), VoteOutcome::Tie(ids(&["z", "y"])));
    }

    #[test]
    fn test_candidates_filter() {
        let queue = ids(&["a", "b", "c"]);
        let votes = ballots(&[("a", Some("x")), ("b", Some("x")), ("c", Some("y"))]);
        let allowed = ids(&["y", "z"]);
        let tally = Tally::count(&queue, &votes, Some(&allowed));
        assert_eq!(tally.outcome(), VoteOutcome::Leader(PlayerId::from("y")));
    }
}
