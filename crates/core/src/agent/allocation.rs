//! Choosing an agent for a new release.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How an agent is picked among the eligible ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Most free space first.
    #[default]
    MostFree,
    /// Least free space first, packing agents before spreading.
    Fill,
    /// Uniformly random.
    Random,
}

impl AllocationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPolicy::MostFree => "most_free",
            AllocationPolicy::Fill => "fill",
            AllocationPolicy::Random => "random",
        }
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationPolicy {
    type Err = String;

    /// Accepts `most_free`, `MOST_FREE`, `most-free` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "most_free" => Ok(AllocationPolicy::MostFree),
            "fill" => Ok(AllocationPolicy::Fill),
            "random" => Ok(AllocationPolicy::Random),
            other => Err(format!("unknown allocation policy: {}", other)),
        }
    }
}

/// What allocation needs to know about an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationCandidate {
    pub agent_id: String,
    pub enabled: bool,
    /// `None` until the first successful statistics poll.
    pub free_space: Option<i64>,
    pub min_free_disk_space: i64,
}

/// Agents that may take a release of `release_size` bytes: enabled, with
/// statistics, and with free space covering both their minimum and the
/// release.
pub fn eligible(
    candidates: &[AllocationCandidate],
    release_size: i64,
) -> Vec<&AllocationCandidate> {
    candidates
        .iter()
        .filter(|c| c.enabled)
        .filter(|c| match c.free_space {
            Some(free) => free >= c.min_free_disk_space && free >= release_size,
            None => false,
        })
        .collect()
}

/// Pick one agent. Ties are broken by agent id.
pub fn select<'a>(
    policy: AllocationPolicy,
    candidates: &[&'a AllocationCandidate],
) -> Option<&'a AllocationCandidate> {
    let free = |c: &AllocationCandidate| c.free_space.unwrap_or(0);

    match policy {
        AllocationPolicy::MostFree => candidates.iter().copied().min_by(|a, b| {
            free(b)
                .cmp(&free(a))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        }),
        AllocationPolicy::Fill => candidates.iter().copied().min_by(|a, b| {
            free(a)
                .cmp(&free(b))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        }),
        AllocationPolicy::Random => {
            if candidates.is_empty() {
                return None;
            }
            let index = rand::rng().random_range(0..candidates.len());
            Some(candidates[index])
        }
    }
}

/// [`eligible`] followed by [`select`].
pub fn allocate(
    policy: AllocationPolicy,
    candidates: &[AllocationCandidate],
    release_size: i64,
) -> Option<String> {
    let eligible = eligible(candidates, release_size);
    select(policy, &eligible).map(|c| c.agent_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: i64 = 1024 * 1024 * 1024;

    fn candidate(id: &str, enabled: bool, free: Option<i64>, min: i64) -> AllocationCandidate {
        AllocationCandidate {
            agent_id: id.to_string(),
            enabled,
            free_space: free,
            min_free_disk_space: min,
        }
    }

    fn two_agents() -> Vec<AllocationCandidate> {
        vec![
            candidate("A", true, Some(10 * GIB), GIB),
            candidate("B", true, Some(50 * GIB), GIB),
        ]
    }

    #[test]
    fn test_most_free_selects_largest() {
        let agents = two_agents();
        assert_eq!(allocate(AllocationPolicy::MostFree, &agents, 5 * GIB).as_deref(), Some("B"));
    }

    #[test]
    fn test_fill_selects_smallest() {
        let agents = two_agents();
        assert_eq!(allocate(AllocationPolicy::Fill, &agents, 5 * GIB).as_deref(), Some("A"));
    }

    #[test]
    fn test_agent_without_room_for_release_is_excluded() {
        let mut agents = two_agents();
        agents.push(candidate("C", true, Some(4 * GIB), GIB));

        let ids: Vec<_> = eligible(&agents, 5 * GIB).iter().map(|c| c.agent_id.clone()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(allocate(AllocationPolicy::Fill, &agents, 5 * GIB).as_deref(), Some("A"));
    }

    #[test]
    fn test_disabled_agent_is_always_excluded() {
        let agents = vec![
            candidate("A", true, Some(10 * GIB), GIB),
            candidate("B", false, Some(50 * GIB), GIB),
        ];
        assert_eq!(allocate(AllocationPolicy::MostFree, &agents, 5 * GIB).as_deref(), Some("A"));

        let only_disabled = vec![candidate("B", false, Some(50 * GIB), GIB)];
        for policy in [AllocationPolicy::MostFree, AllocationPolicy::Fill, AllocationPolicy::Random] {
            assert_eq!(allocate(policy, &only_disabled, GIB), None);
        }
    }

    #[test]
    fn test_minimum_free_space_is_respected() {
        let agents = vec![candidate("A", true, Some(30 * GIB), 26 * GIB)];
        assert_eq!(eligible(&agents, GIB).len(), 1);
        let agents = vec![candidate("A", true, Some(20 * GIB), 25 * GIB)];
        assert!(eligible(&agents, GIB).is_empty());
    }

    #[test]
    fn test_agent_without_statistics_is_excluded() {
        let agents = vec![candidate("A", true, None, 0)];
        assert_eq!(allocate(AllocationPolicy::MostFree, &agents, 0), None);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let agents = vec![
            candidate("b", true, Some(10 * GIB), 0),
            candidate("a", true, Some(10 * GIB), 0),
        ];
        assert_eq!(allocate(AllocationPolicy::MostFree, &agents, 0).as_deref(), Some("a"));
        assert_eq!(allocate(AllocationPolicy::Fill, &agents, 0).as_deref(), Some("a"));
    }

    #[test]
    fn test_random_picks_an_eligible_agent() {
        let mut agents = two_agents();
        agents.push(candidate("C", false, Some(100 * GIB), 0));
        for _ in 0..50 {
            let picked = allocate(AllocationPolicy::Random, &agents, 5 * GIB).unwrap();
            assert!(picked == "A" || picked == "B");
        }
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("MOST_FREE".parse::<AllocationPolicy>().unwrap(), AllocationPolicy::MostFree);
        assert_eq!("most-free".parse::<AllocationPolicy>().unwrap(), AllocationPolicy::MostFree);
        assert_eq!("Fill".parse::<AllocationPolicy>().unwrap(), AllocationPolicy::Fill);
        assert_eq!("random".parse::<AllocationPolicy>().unwrap(), AllocationPolicy::Random);
        assert!("round_robin".parse::<AllocationPolicy>().is_err());
    }
}
