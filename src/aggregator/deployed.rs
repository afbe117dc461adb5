//! Deployed-model resolution.
//!
//! Messages record either a raw provider model name (`gpt-4`) or an agent id
//! (`agent_…`). Agent ids are translated to the agent's display name; ids
//! whose agent no longer exists are dropped from both the usage series and
//! the distinct count.

use std::collections::{HashMap, HashSet};

/// Prefix that marks a message model id as an agent reference.
pub const AGENT_PREFIX: &str = "agent_";

/// Message count for one model id.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUsage {
    pub model_id: String,
    pub count: f64,
}

/// Resolved output: usage per display name plus the distinct id count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployedModels {
    pub usage: Vec<(String, f64)>,
    pub distinct: usize,
    /// Agent ids dropped because no agent matched them.
    pub stale: Vec<String>,
}

pub fn is_agent_ref(model_id: &str) -> bool {
    model_id.starts_with(AGENT_PREFIX)
}

/// Distinct agent ids referenced by `usage`, in first-seen order.
pub fn agent_ids(usage: &[ModelUsage]) -> Vec<String> {
    let mut seen = HashSet::new();
    usage
        .iter()
        .filter(|u| is_agent_ref(&u.model_id))
        .filter(|u| seen.insert(u.model_id.as_str()))
        .map(|u| u.model_id.clone())
        .collect()
}

/// Name shown for an agent: its `name` when set, else its id.
pub fn display_name(agent_id: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => agent_id.to_string(),
    }
}

/// Join message usage against `names` (`agent id -> display name`).
///
/// Ids that resolve to the same display name have their counts summed.
pub fn resolve(usage: &[ModelUsage], names: &HashMap<String, String>) -> DeployedModels {
    let mut resolved = DeployedModels::default();
    let mut distinct = HashSet::new();

    for entry in usage {
        let id = entry.model_id.as_str();
        let display = match names.get(id) {
            Some(name) => name.as_str(),
            None if is_agent_ref(id) => {
                if !resolved.stale.iter().any(|s| s == id) {
                    resolved.stale.push(id.to_string());
                }
                continue;
            }
            None => id,
        };

        distinct.insert(id);
        match resolved.usage.iter_mut().find(|(name, _)| name == display) {
            Some((_, count)) => *count += entry.count,
            None => resolved.usage.push((display.to_string(), entry.count)),
        }
    }

    resolved.distinct = distinct.len();
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(pairs: &[(&str, f64)]) -> Vec<ModelUsage> {
        pairs
            .iter()
            .map(|(id, count)| ModelUsage {
                model_id: id.to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn stale_agent_ids_are_dropped() {
        let usage = usage(&[("gpt-4", 3.0), ("agent_123", 2.0), ("agent_999", 5.0)]);
        let names = HashMap::from([("agent_123".to_string(), "Helper".to_string())]);

        let resolved = resolve(&usage, &names);

        assert_eq!(
            resolved.usage,
            vec![("gpt-4".to_string(), 3.0), ("Helper".to_string(), 2.0)]
        );
        assert_eq!(resolved.distinct, 2);
        assert_eq!(resolved.stale, vec!["agent_999".to_string()]);
    }

    #[test]
    fn agent_ids_only_collects_prefixed() {
        let usage = usage(&[("gpt-4", 1.0), ("agent_a", 1.0), ("claude", 1.0), ("agent_b", 1.0)]);
        assert_eq!(agent_ids(&usage), vec!["agent_a", "agent_b"]);
    }

    #[test]
    fn display_name_falls_back_to_id() {
        assert_eq!(display_name("agent_1", Some("Helper")), "Helper");
        assert_eq!(display_name("agent_1", Some("")), "agent_1");
        assert_eq!(display_name("agent_1", None), "agent_1");
    }

    #[test]
    fn shared_display_names_are_summed() {
        let usage = usage(&[("agent_a", 2.0), ("agent_b", 3.0)]);
        let names = HashMap::from([
            ("agent_a".to_string(), "Helper".to_string()),
            ("agent_b".to_string(), "Helper".to_string()),
        ]);

        let resolved = resolve(&usage, &names);

        assert_eq!(resolved.usage, vec![("Helper".to_string(), 5.0)]);
        assert_eq!(resolved.distinct, 2);
    }

    #[test]
    fn empty_usage_resolves_to_nothing() {
        let resolved = resolve(&[], &HashMap::new());
        assert!(resolved.usage.is_empty());
        assert_eq!(resolved.distinct, 0);
    }
}
