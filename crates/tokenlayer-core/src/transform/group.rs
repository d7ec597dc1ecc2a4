/// Legacy group identifiers that collapse onto a canonical name (§4.4 grouping).
const GROUP_ALIASES: &[(&str, &str)] = &[("core", "web/base")];

/// Fixed priority order used when listing known groups; anything unlisted sorts after, by
/// name. This ordering is advisory for display purposes only — transform *execution* always
/// preserves registration order regardless of grouping (§9 open questions).
const GROUP_PRIORITY: &[&str] = &["web/base", "web", "ios", "android", "compose"];

/// Normalizes a group identifier, collapsing known aliases onto their canonical form.
pub fn normalize_group(name: &str) -> String {
    GROUP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Orders a set of (already normalized) group names by the fixed priority list, falling back
/// to lexicographic order for anything not in the list.
pub fn sort_groups_by_priority(mut groups: Vec<String>) -> Vec<String> {
    groups.sort_by_key(|group| {
        let priority = GROUP_PRIORITY
            .iter()
            .position(|known| *known == group)
            .unwrap_or(GROUP_PRIORITY.len());
        (priority, group.clone())
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_core_collapses_to_web_base() {
        assert_eq!(normalize_group("core"), "web/base");
    }

    #[test]
    fn unknown_group_passes_through() {
        assert_eq!(normalize_group("custom"), "custom");
    }

    #[test]
    fn priority_list_orders_known_groups_first() {
        let sorted = sort_groups_by_priority(vec!["compose".into(), "web/base".into(), "zzz".into()]);
        assert_eq!(sorted, vec!["web/base".to_string(), "compose".to_string(), "zzz".to_string()]);
    }
}
