use epever_exporter::metrics::{MetricRegistry, GENERAL_SUBSYSTEM, ROOT_LABEL};
use std::sync::Arc;
use std::thread;

fn create_test_registry() -> MetricRegistry {
    MetricRegistry::new("epever").expect("Failed to create metric registry")
}

#[test]
fn test_registry_renders_self_metrics() {
    let metrics = create_test_registry();

    let output = metrics.render().expect("Failed to render metrics");
    assert!(output.contains("epever_exporter_up"), "Missing epever_exporter_up metric");
    assert!(metrics.is_empty());
}

#[test]
fn test_register_from_config_derives_names() {
    let metrics = create_test_registry();

    let registered = metrics.register_from_config(&["Wifi_RSSI", "battery.voltage"]);
    assert_eq!(registered, 2);

    let rssi = metrics.definition("Wifi_RSSI").expect("Wifi_RSSI not registered");
    assert_eq!(rssi.subsystem, GENERAL_SUBSYSTEM);
    assert_eq!(rssi.fq_name(), "epever_general_wifi_rssi");

    let voltage = metrics
        .definition("battery.voltage")
        .expect("battery.voltage not registered");
    assert_eq!(voltage.subsystem, "battery");
    assert_eq!(voltage.name, "voltage");
    assert!(voltage.help.contains("battery.voltage"));
}

#[test]
fn test_register_from_config_is_idempotent() {
    let metrics = create_test_registry();
    let paths = ["battery.voltage", "pv.power", "battery.voltage"];

    assert_eq!(metrics.register_from_config(&paths), 2);
    assert_eq!(metrics.register_from_config(&paths), 0);
    assert_eq!(metrics.register_from_config(&["pv.power", "load.power"]), 1);
    assert_eq!(metrics.len(), 3);
}

#[test]
fn test_update_sets_labeled_value() {
    let metrics = create_test_registry();
    metrics.register_from_config(&["battery.voltage"]);

    metrics.update("battery.voltage", 12.8, "01");
    metrics.update("battery.voltage", 13.1, "02");

    assert_eq!(metrics.value("battery.voltage", "01"), Some(12.8));
    assert_eq!(metrics.value("battery.voltage", "02"), Some(13.1));
    assert_eq!(metrics.label_values("battery.voltage"), vec!["01", "02"]);

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("epever_battery_voltage{id=\"01\"} 12.8"));
    assert!(rendered.contains("epever_battery_voltage{id=\"02\"} 13.1"));
}

#[test]
fn test_update_overwrites_previous_value() {
    let metrics = create_test_registry();
    metrics.register_from_config(&["Wifi_RSSI"]);

    metrics.update("Wifi_RSSI", -55.0, ROOT_LABEL);
    metrics.update("Wifi_RSSI", -61.0, ROOT_LABEL);

    assert_eq!(metrics.value("Wifi_RSSI", ROOT_LABEL), Some(-61.0));
}

#[test]
fn test_update_unknown_path_is_dropped() {
    let metrics = create_test_registry();
    metrics.register_from_config(&["battery.voltage"]);
    let before = metrics.render().unwrap();

    metrics.update("battery.current", 4.2, "01");

    assert!(metrics.definition("battery.current").is_none());
    assert_eq!(metrics.value("battery.current", "01"), None);
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics.render().unwrap(), before);
}

#[test]
fn test_unobserved_label_has_no_value() {
    let metrics = create_test_registry();
    metrics.register_from_config(&["battery.voltage"]);
    metrics.update("battery.voltage", 12.8, "01");

    assert_eq!(metrics.value("battery.voltage", "02"), None);
    assert!(!metrics.render().unwrap().contains("id=\"02\""));
}

#[test]
fn test_colliding_paths_keep_first_definition() {
    let metrics = create_test_registry();

    // Both sanitize to epever_battery_voltage
    let registered = metrics.register_from_config(&["battery.voltage", "Battery.Voltage"]);

    assert_eq!(registered, 1);
    assert!(metrics.definition("battery.voltage").is_some());
    assert!(metrics.definition("Battery.Voltage").is_none());

    metrics.update("Battery.Voltage", 99.0, "01");
    assert_eq!(metrics.value("battery.voltage", "01"), None);
}

#[test]
fn test_paths_resembling_self_metrics_register() {
    let metrics = create_test_registry();

    // These sit next to, not on top of, the exporter's own metrics
    let registered = metrics.register_from_config(&[".up", "poll.failures_total", "up"]);

    assert_eq!(registered, 3);
    assert_eq!(metrics.definition(".up").unwrap().fq_name(), "epever_up");
    assert_eq!(
        metrics.definition("poll.failures_total").unwrap().fq_name(),
        "epever_poll_failures_total"
    );

    metrics.update(".up", 4.0, "01");
    assert_eq!(metrics.value(".up", "01"), Some(4.0));
    assert_eq!(metrics.up.get(), 0.0);
}

#[test]
fn test_reserved_exporter_paths_are_refused() {
    let metrics = create_test_registry();

    let registered =
        metrics.register_from_config(&["exporter.up", "exporter.poll_failures_total"]);

    assert_eq!(registered, 0);
    assert!(metrics.render().unwrap().contains("epever_exporter_up 0"));
}

#[test]
fn test_invalid_prometheus_name_is_skipped() {
    let metrics = create_test_registry();

    let registered = metrics.register_from_config(&["battery voltage", "pv.power"]);

    assert_eq!(registered, 1);
    assert!(metrics.definition("battery voltage").is_none());
    assert!(metrics.render().is_ok());
}

#[test]
fn test_concurrent_updates_on_distinct_paths() {
    let metrics = Arc::new(create_test_registry());
    let paths: Vec<String> = (0..8).map(|i| format!("device.field_{}", i)).collect();
    metrics.register_from_config(&paths);

    let handles: Vec<_> = paths
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, path)| {
            let metrics = Arc::clone(&metrics);
            thread::spawn(move || {
                for n in 0..500 {
                    metrics.update(&path, n as f64, "01");
                    metrics.update(&path, (i * 1000 + n) as f64, "02");
                }
            })
        })
        .collect();

    let reader = {
        let metrics = Arc::clone(&metrics);
        thread::spawn(move || {
            for _ in 0..50 {
                assert!(metrics.render().is_ok());
            }
        })
    };

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }
    reader.join().expect("reader thread panicked");

    for (i, path) in paths.iter().enumerate() {
        assert_eq!(metrics.value(path, "01"), Some(499.0));
        assert_eq!(metrics.value(path, "02"), Some((i * 1000 + 499) as f64));
    }
    assert_eq!(metrics.len(), paths.len());
}

#[test]
fn test_concurrent_registration_creates_one_definition_per_path() {
    let metrics = Arc::new(create_test_registry());
    let paths = vec![
        "battery.voltage".to_string(),
        "pv.power".to_string(),
        "Wifi_RSSI".to_string(),
    ];

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let metrics = Arc::clone(&metrics);
            let paths = paths.clone();
            thread::spawn(move || metrics.register_from_config(&paths))
        })
        .collect();

    let total: usize = handles
        .into_iter()
        .map(|h| h.join().expect("registration thread panicked"))
        .sum();

    assert_eq!(total, 3);
    assert_eq!(metrics.len(), 3);
}
