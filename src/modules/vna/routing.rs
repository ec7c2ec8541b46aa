use super::models::{RoutingContext, VnaConfiguration, VnaRoutingRule};

/// First active rule (ascending priority) that matches and points at an
/// active archive.
pub fn find_matching_vna<'a>(
    configurations: &'a [VnaConfiguration],
    rules: &[VnaRoutingRule],
    context: &RoutingContext,
) -> Option<&'a VnaConfiguration> {
    let mut ordered: Vec<&VnaRoutingRule> = rules.iter().filter(|r| r.is_active).collect();
    ordered.sort_by_key(|r| r.priority);

    ordered
        .into_iter()
        .filter(|rule| rule.conditions.matches(context))
        .find_map(|rule| {
            configurations
                .iter()
                .find(|c| c.id == rule.vna_id && c.is_active)
        })
}

/// Matching archive, else the default active one
pub fn select_vna<'a>(
    configurations: &'a [VnaConfiguration],
    rules: &[VnaRoutingRule],
    context: &RoutingContext,
) -> Option<&'a VnaConfiguration> {
    find_matching_vna(configurations, rules, context)
        .or_else(|| configurations.iter().find(|c| c.is_default && c.is_active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::vna::models::{RoutingConditions, VnaType};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn vna(name: &str, active: bool, default: bool) -> VnaConfiguration {
        VnaConfiguration {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            name: name.to_string(),
            vna_type: VnaType::Orthanc,
            endpoint: Some(format!("http://{}:8042", name)),
            host: None,
            port: None,
            credentials: None,
            bucket: None,
            region: None,
            path_prefix: None,
            is_active: active,
            is_default: default,
            priority: 0,
        }
    }

    fn rule(priority: i32, vna_id: Uuid, conditions: RoutingConditions) -> VnaRoutingRule {
        VnaRoutingRule {
            id: Uuid::new_v4(),
            name: format!("rule-{}", priority),
            priority,
            conditions: Json(conditions),
            vna_id,
            compress: false,
            is_active: true,
        }
    }

    fn context(image_type: &str, location: &str) -> RoutingContext {
        RoutingContext {
            location: Some(location.to_string()),
            image_type: Some(image_type.to_string()),
            patient_id: None,
            lead_id: None,
        }
    }

    #[test]
    fn test_lowest_priority_number_wins() {
        let archives = vec![vna("a", true, false), vna("b", true, false)];
        let rules = vec![
            rule(20, archives[0].id, RoutingConditions::default()),
            rule(10, archives[1].id, RoutingConditions::default()),
        ];

        let chosen = find_matching_vna(&archives, &rules, &RoutingContext::default()).unwrap();
        assert_eq!(chosen.name, "b");
    }

    #[test]
    fn test_conditions_must_all_hold() {
        let archives = vec![vna("cbct-archive", true, false), vna("general", true, true)];
        let rules = vec![rule(
            1,
            archives[0].id,
            RoutingConditions {
                location: Some("Laval".to_string()),
                image_types: vec!["CBCT".to_string()],
                ..Default::default()
            },
        )];

        let hit = select_vna(&archives, &rules, &context("cbct", "Laval")).unwrap();
        assert_eq!(hit.name, "cbct-archive");

        let wrong_location = select_vna(&archives, &rules, &context("cbct", "Montreal")).unwrap();
        assert_eq!(wrong_location.name, "general");

        let wrong_type = select_vna(&archives, &rules, &context("panoramic", "Laval")).unwrap();
        assert_eq!(wrong_type.name, "general");
    }

    #[test]
    fn test_inactive_targets_are_skipped() {
        let archives = vec![vna("down", false, false), vna("up", true, false)];
        let rules = vec![
            rule(1, archives[0].id, RoutingConditions::default()),
            rule(2, archives[1].id, RoutingConditions::default()),
        ];

        let chosen = find_matching_vna(&archives, &rules, &RoutingContext::default()).unwrap();
        assert_eq!(chosen.name, "up");
    }

    #[test]
    fn test_no_match_and_no_default() {
        let archives = vec![vna("a", true, false), vna("inactive-default", false, true)];
        let rules = vec![rule(
            1,
            archives[0].id,
            RoutingConditions {
                lead_id: Some("lead-42".to_string()),
                ..Default::default()
            },
        )];

        assert!(select_vna(&archives, &rules, &RoutingContext::default()).is_none());
    }

    #[test]
    fn test_conditions_accept_legacy_image_type_key() {
        let conditions: RoutingConditions =
            serde_json::from_value(serde_json::json!({ "imageType": ["PANORAMIC"] })).unwrap();
        assert_eq!(conditions.image_types, vec!["PANORAMIC".to_string()]);
    }
}
