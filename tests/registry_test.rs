//! Integration tests for the gauge registry.

use librechat_metrics::catalog::{self, CATALOG};
use librechat_metrics::error::Error;
use librechat_metrics::registry::{GaugeRegistry, GaugeUpdate};

#[test]
fn catalog_defines_every_gauge_once() {
    let registry = GaugeRegistry::with_catalog().unwrap();
    let mut expected: Vec<String> = CATALOG.iter().map(|s| s.name.to_string()).collect();
    expected.sort();
    assert_eq!(registry.names(), expected);
}

#[test]
fn duplicate_definition_is_rejected() {
    let registry = GaugeRegistry::new();
    registry.define("librechat_test", "test gauge", &[]).unwrap();

    let err = registry
        .define("librechat_test", "again", &["label"])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateMetric(name) if name == "librechat_test"));
}

#[test]
fn unknown_gauge_is_an_error() {
    let registry = GaugeRegistry::new();
    assert!(matches!(
        registry.set("librechat_missing", &[], 1.0),
        Err(Error::UnknownMetric(_))
    ));
    assert!(matches!(
        registry.reset("librechat_missing"),
        Err(Error::UnknownMetric(_))
    ));
}

#[test]
fn wrong_label_arity_is_an_error() {
    let registry = GaugeRegistry::new();
    registry.define("librechat_by_type", "by type", &["type"]).unwrap();

    let err = registry.set("librechat_by_type", &[], 1.0).unwrap_err();
    assert!(matches!(err, Error::LabelMismatch { expected: 1, got: 0, .. }));
}

#[test]
fn set_overwrites_and_reset_removes_all_series() {
    let registry = GaugeRegistry::new();
    registry.define("librechat_by_type", "by type", &["type"]).unwrap();

    registry.set("librechat_by_type", &["a"], 1.0).unwrap();
    registry.set("librechat_by_type", &["a"], 4.0).unwrap();
    registry.set("librechat_by_type", &["b"], 2.0).unwrap();
    assert_eq!(registry.value("librechat_by_type", &["a"]).unwrap(), Some(4.0));
    assert_eq!(registry.series("librechat_by_type").unwrap().len(), 2);

    registry.reset("librechat_by_type").unwrap();
    assert!(registry.series("librechat_by_type").unwrap().is_empty());
    assert_eq!(registry.value("librechat_by_type", &["a"]).unwrap(), None);
}

#[test]
fn apply_replaces_labeled_series_wholesale() {
    let registry = GaugeRegistry::with_catalog().unwrap();
    let name = catalog::PROMPT_COUNT_BY_TYPE.name;
    registry.set(name, &["old"], 3.0).unwrap();

    registry
        .apply(&[GaugeUpdate::Replace {
            name,
            series: vec![(vec!["text".to_string()], 2.0)],
        }])
        .unwrap();

    assert_eq!(
        registry.series(name).unwrap(),
        vec![(vec!["text".to_string()], 2.0)]
    );
}

#[test]
fn apply_writes_nothing_when_any_update_is_invalid() {
    let registry = GaugeRegistry::with_catalog().unwrap();
    let sum = catalog::MESSAGE_TOKEN_SUM.name;
    registry.set(sum, &[], 1.0).unwrap();

    let result = registry.apply(&[
        GaugeUpdate::Set {
            name: sum,
            value: 99.0,
        },
        GaugeUpdate::Replace {
            name: catalog::AGENT_MODEL_COUNT.name,
            series: vec![(vec!["a".to_string(), "extra".to_string()], 1.0)],
        },
    ]);

    assert!(matches!(result, Err(Error::LabelMismatch { .. })));
    assert_eq!(registry.value(sum, &[]).unwrap(), Some(1.0));
}

#[test]
fn encode_renders_help_type_and_labels() {
    let registry = GaugeRegistry::with_catalog().unwrap();
    registry
        .apply(&[
            GaugeUpdate::Set {
                name: catalog::ACTIVE_USER_COUNT.name,
                value: 3.0,
            },
            GaugeUpdate::Replace {
                name: catalog::TOOL_CALL_COUNT_BY_TOOL.name,
                series: vec![(vec!["web_search".to_string()], 5.0)],
            },
        ])
        .unwrap();

    let text = registry.encode().unwrap();
    assert!(text.contains("# HELP librechat_active_users Number of active users within the last 5 minutes"));
    assert!(text.contains("# TYPE librechat_active_users gauge"));
    assert!(text.contains("librechat_active_users 3"));
    assert!(text.contains("librechat_tool_call_count_by_tool{toolId=\"web_search\"} 5"));
}
