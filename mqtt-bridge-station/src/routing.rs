//! Declarative routing from (module, metric) pairs to bus channels.
//!
//! The table is plain configuration data: adding, removing, or repointing a
//! route is a config edit, never a code change. Ambiguous route sets are
//! rejected when the table is built, before any network activity.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::RouteConfig;

/// One (module, metric) pair bound to two different channels.
///
/// Raised at load time; first-match-wins resolution is deliberately not
/// offered.
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "duplicate route for module '{module}' metric '{metric}': channels '{first}' and '{second}'"
)]
pub struct DuplicateRuleError {
    pub module: String,
    pub metric: String,
    pub first: String,
    pub second: String,
}

/// Immutable lookup table mapping (module id, metric name) to a channel.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, HashMap<String, String>>,
    len: usize,
}

impl RoutingTable {
    /// Build a table from configured rules.
    ///
    /// A rule repeated verbatim is tolerated; the same pair bound to a
    /// different channel is a [`DuplicateRuleError`], whatever the order of
    /// the rules.
    pub fn from_rules(rules: &[RouteConfig]) -> Result<Self, DuplicateRuleError> {
        let mut table = RoutingTable::default();

        for rule in rules {
            let metrics = table.routes.entry(rule.module.clone()).or_default();
            match metrics.get(&rule.metric) {
                Some(existing) if *existing != rule.channel => {
                    return Err(DuplicateRuleError {
                        module: rule.module.clone(),
                        metric: rule.metric.clone(),
                        first: existing.clone(),
                        second: rule.channel.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    metrics.insert(rule.metric.clone(), rule.channel.clone());
                    table.len += 1;
                }
            }
        }

        Ok(table)
    }

    /// Resolve a (module, metric) pair to its destination channel.
    ///
    /// Exact, case-sensitive match on both fields. `None` is the normal
    /// "no route" result, not an error.
    pub fn resolve(&self, module_id: &str, metric: &str) -> Option<&str> {
        self.routes.get(module_id)?.get(metric).map(String::as_str)
    }

    /// Number of distinct routes in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(module: &str, metric: &str, channel: &str) -> RouteConfig {
        RouteConfig {
            module: module.to_string(),
            metric: metric.to_string(),
            channel: channel.to_string(),
        }
    }

    #[test]
    fn test_resolve_exact_match() {
        let table = RoutingTable::from_rules(&[
            route("70:ee:50:00:e3:96", "Temperature", "home/living/temperature"),
            route("70:ee:50:00:e3:96", "Humidity", "home/living/humidity"),
            route("02:00:00:00:d1:ac", "Temperature", "garden/outdoor/temperature"),
        ])
        .unwrap();

        assert_eq!(
            table.resolve("70:ee:50:00:e3:96", "Temperature"),
            Some("home/living/temperature")
        );
        assert_eq!(
            table.resolve("02:00:00:00:d1:ac", "Temperature"),
            Some("garden/outdoor/temperature")
        );
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_resolve_no_route() {
        let table =
            RoutingTable::from_rules(&[route("AA:BB", "Temperature", "home/room/temp")]).unwrap();

        assert_eq!(table.resolve("AA:BB", "Noise"), None);
        assert_eq!(table.resolve("EE:FF", "Temperature"), None);
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let table =
            RoutingTable::from_rules(&[route("AA:BB", "Temperature", "home/room/temp")]).unwrap();

        assert_eq!(table.resolve("AA:BB", "temperature"), None);
        assert_eq!(table.resolve("aa:bb", "Temperature"), None);
    }

    #[test]
    fn test_resolve_is_pure() {
        let table =
            RoutingTable::from_rules(&[route("AA:BB", "CO2", "home/room/co2")]).unwrap();

        let first = table.resolve("AA:BB", "CO2");
        let second = table.resolve("AA:BB", "CO2");
        assert_eq!(first, second);
        assert_eq!(first, Some("home/room/co2"));
    }

    #[test]
    fn test_conflicting_duplicate_rejected_in_both_orders() {
        let a = route("AA:BB", "Temperature", "home/room/temp");
        let b = route("AA:BB", "Temperature", "attic/temp");

        let err = RoutingTable::from_rules(&[a.clone(), b.clone()]).unwrap_err();
        assert_eq!(err.module, "AA:BB");
        assert_eq!(err.metric, "Temperature");

        assert!(RoutingTable::from_rules(&[b, a]).is_err());
    }

    #[test]
    fn test_verbatim_duplicate_tolerated() {
        let rule = route("AA:BB", "Temperature", "home/room/temp");
        let table = RoutingTable::from_rules(&[rule.clone(), rule]).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("AA:BB", "Temperature"), Some("home/room/temp"));
    }

    #[test]
    fn test_empty_rule_set() {
        let table = RoutingTable::from_rules(&[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.resolve("AA:BB", "Temperature"), None);
    }
}
