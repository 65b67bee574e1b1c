//! Detection scenarios across detectors and the orchestrator

#[cfg(test)]
mod scenario_tests {
    use crate::anomaly::*;
    use crate::error::{DetectionError, ErrorKind};
    use crate::models::{DetectionConfig, Sample, TelemetryTable};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Table with a single `score` channel
    fn score_table(values: &[f64]) -> TelemetryTable {
        TelemetryTable::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Sample::new(i as f64).with_reading("score", *v))
                .collect(),
        )
        .unwrap()
    }

    /// Engine telemetry with a handful of hot, high-score spikes
    fn engine_table(n: usize) -> TelemetryTable {
        let samples = (0..n)
            .map(|i| {
                let t = i as f64;
                let mut temp = 500.0 + (t / 30.0).sin() * 20.0 + ((i * 7919) % 13) as f64 * 0.4;
                let mut score = 1.0 + ((i * 104_729) % 17) as f64 * 0.03;
                if i % 20 == 7 {
                    temp += 200.0;
                    score += 8.0;
                }
                Sample::new(t)
                    .with_reading("engine_temp", temp)
                    .with_reading("anomaly_score", score)
                    .with_reading("vibration", 0.1 + ((i * 31) % 5) as f64 * 0.01)
            })
            .collect();
        TelemetryTable::new(samples).unwrap()
    }

    fn flags(outcome: &StatisticalOutcome) -> Vec<bool> {
        outcome.scores.iter().map(|s| s.flag).collect()
    }

    #[test]
    fn test_worked_example_thresholds() {
        let table = score_table(&[10.0, 11.0, 9.0, 10.0, 50.0]);

        let at_two = detect_statistical(&table, "score", 2.0).unwrap();
        assert!((at_two.baseline.mean - 18.0).abs() < 1e-9);
        assert!((at_two.baseline.std_dev - 17.9).abs() < 0.01);
        assert!((at_two.baseline.threshold - 53.8).abs() < 0.01);
        assert_eq!(at_two.flagged(), 0);

        let at_one = detect_statistical(&table, "score", 1.0).unwrap();
        assert!((at_one.baseline.threshold - 35.9).abs() < 0.01);
        assert_eq!(flags(&at_one), vec![false, false, false, false, true]);
    }

    #[test]
    fn test_scores_are_raw_values() {
        let table = score_table(&[10.0, 11.0, 9.0]);
        let outcome = detect_statistical(&table, "score", 3.0).unwrap();
        let scores: Vec<f64> = outcome.scores.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![10.0, 11.0, 9.0]);
    }

    #[test]
    fn test_constant_signal_flags_nothing() {
        for value in [0.0, 0.1, 523.7, -42.25] {
            let table = score_table(&[value; 25]);
            for k in [0.01, 1.0, 3.0] {
                let outcome = detect_statistical(&table, "score", k).unwrap();
                assert_eq!(outcome.flagged(), 0, "value {} k {}", value, k);
            }
        }
    }

    #[test]
    fn test_threshold_monotone_in_k() {
        let table = engine_table(200);
        let ks = [0.5, 1.0, 1.5, 2.0, 3.0, 4.0];
        for pair in ks.windows(2) {
            let loose = detect_statistical(&table, "anomaly_score", pair[0]).unwrap();
            let strict = detect_statistical(&table, "anomaly_score", pair[1]).unwrap();
            for (l, s) in loose.scores.iter().zip(&strict.scores) {
                assert!(!s.flag || l.flag, "k={} flagged a sample k={} did not", pair[1], pair[0]);
            }
        }
    }

    #[test]
    fn test_statistical_is_order_invariant() {
        let values = [3.0, 9.5, 1.25, 4.0, 22.0, 2.5, 3.75, 5.0];
        let forward = detect_statistical(&score_table(&values), "score", 1.0).unwrap();

        let reversed: Vec<f64> = values.iter().rev().copied().collect();
        let backward = detect_statistical(&score_table(&reversed), "score", 1.0).unwrap();

        let mut expected = flags(&forward);
        expected.reverse();
        assert_eq!(flags(&backward), expected);
        assert!((forward.baseline.mean - backward.baseline.mean).abs() < 1e-9);
    }

    #[test]
    fn test_statistical_insufficient_and_invalid() {
        let one = score_table(&[1.0]);
        assert!(matches!(
            detect_statistical(&one, "score", 2.0),
            Err(DetectionError::InsufficientData { required: 2, actual: 1 })
        ));

        let table = score_table(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            detect_statistical(&table, "score", -1.0),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(matches!(
            detect_statistical(&table, "missing", 2.0),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_multivariate_flags_contamination_fraction() {
        let table = engine_table(200);
        let features = vec!["engine_temp".to_string(), "anomaly_score".to_string()];

        for contamination in [0.05, 0.1, 0.25] {
            let outcome = MultivariateDetector::new(contamination)
                .detect_with_rng(&table, &features, &mut StdRng::seed_from_u64(11))
                .unwrap();
            let expected = (contamination * table.len() as f64).round() as usize;
            let flagged = outcome.flagged();
            assert!(
                flagged.abs_diff(expected) <= 2,
                "contamination {} flagged {} expected ~{}",
                contamination,
                flagged,
                expected
            );
        }
    }

    #[test]
    fn test_multivariate_flags_spikes() {
        let table = engine_table(200);
        let features = vec!["engine_temp".to_string(), "anomaly_score".to_string()];
        let outcome = MultivariateDetector::new(0.1)
            .detect_with_rng(&table, &features, &mut StdRng::seed_from_u64(5))
            .unwrap();

        for (i, score) in outcome.scores.iter().enumerate() {
            if i % 20 == 7 {
                assert!(score.flag, "spike at sample {} not flagged", i);
            }
        }
    }

    #[test]
    fn test_multivariate_seed_reproducible() {
        let table = engine_table(120);
        let features = vec!["engine_temp".to_string(), "vibration".to_string()];
        let detector = MultivariateDetector {
            seed: Some(99),
            ..MultivariateDetector::new(0.1)
        };
        let a = detector.detect(&table, &features).unwrap();
        let b = detector.detect(&table, &features).unwrap();
        assert_eq!(a, b);

        let mut rng = StdRng::seed_from_u64(99);
        let c = MultivariateDetector::new(0.1)
            .detect_with_rng(&table, &features, &mut rng)
            .unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn test_multivariate_errors() {
        let table = engine_table(50);
        let features = vec!["engine_temp".to_string()];

        assert!(matches!(
            detect_multivariate(&table, &features, 0.6),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(matches!(
            detect_multivariate(&table, &features, 0.0),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(matches!(
            detect_multivariate(&table, &[], 0.1),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(matches!(
            detect_multivariate(&engine_table(9), &features, 0.1),
            Err(DetectionError::InsufficientData { required: 10, actual: 9 })
        ));

        let flat = score_table(&[4.0; 30]);
        assert!(matches!(
            detect_multivariate(&flat, &["score".to_string()], 0.1),
            Err(DetectionError::ModelFit(_))
        ));
    }

    #[test]
    fn test_run_without_ml_matches_statistical() {
        let table = engine_table(150);
        let config = DetectionConfig::new("anomaly_score", 2.0);
        let report = run(&table, &config).unwrap();
        let statistical = detect_statistical(&table, "anomaly_score", 2.0).unwrap();

        assert_eq!(report.verdicts.len(), table.len());
        assert_eq!(report.ml_status, MlStatus::Disabled);
        for (verdict, stat) in report.verdicts.iter().zip(&statistical.scores) {
            assert_eq!(verdict.combined_flag, stat.flag);
            assert_eq!(verdict.statistical_flag, stat.flag);
            assert_eq!(verdict.ml_score, None);
            assert_eq!(verdict.ml_flag, None);
        }
    }

    #[test]
    fn test_run_combines_with_or() {
        let table = engine_table(200);
        let config = DetectionConfig::new("anomaly_score", 3.0)
            .with_ml(["engine_temp", "vibration"], 0.1)
            .with_seed(21);
        let report = run(&table, &config).unwrap();

        assert!(matches!(report.ml_status, MlStatus::Ran { .. }));
        for verdict in &report.verdicts {
            let ml_flag = verdict.ml_flag.expect("ml ran");
            assert!(verdict.ml_score.is_some());
            assert_eq!(verdict.combined_flag, verdict.statistical_flag || ml_flag);
        }
        assert_eq!(
            report.summary.total_anomalies,
            report.verdicts.iter().filter(|v| v.combined_flag).count()
        );
        assert_eq!(report.anomaly_indices().len(), report.summary.total_anomalies);
    }

    #[test]
    fn test_run_is_seed_deterministic() {
        let table = engine_table(100);
        let config = DetectionConfig::new("anomaly_score", 2.0)
            .with_ml(["engine_temp", "anomaly_score"], 0.05)
            .with_seed(3);
        assert_eq!(run(&table, &config).unwrap(), run(&table, &config).unwrap());
    }

    #[test]
    fn test_run_degrades_on_unfittable_features() {
        let samples = (0..40)
            .map(|i| {
                let score = if i == 17 { 9.0 } else { 1.0 + (i % 4) as f64 * 0.1 };
                Sample::new(i as f64)
                    .with_reading("anomaly_score", score)
                    .with_reading("altitude", 30_000.0)
                    .with_reading("airspeed", 450.0)
            })
            .collect();
        let table = TelemetryTable::new(samples).unwrap();
        let config = DetectionConfig::new("anomaly_score", 2.0)
            .with_ml(["altitude", "airspeed"], 0.1)
            .with_seed(1);

        let report = run(&table, &config).unwrap();
        let statistical = detect_statistical(&table, "anomaly_score", 2.0).unwrap();

        assert!(report.ml_unavailable());
        assert_eq!(report.ml_unavailable_reason(), Some(ErrorKind::ModelFit));
        assert_eq!(report.summary.ml_anomalies, 0);
        for (verdict, stat) in report.verdicts.iter().zip(&statistical.scores) {
            assert_eq!(verdict.combined_flag, stat.flag);
            assert_eq!(verdict.ml_flag, None);
        }
        assert!(report.verdicts[17].combined_flag);
    }

    #[test]
    fn test_run_degrades_on_small_table() {
        let table = score_table(&[1.0, 2.0, 3.0, 30.0]);
        let config = DetectionConfig::new("score", 1.0).with_ml(["score"], 0.2);
        let report = run(&table, &config).unwrap();

        assert_eq!(report.ml_unavailable_reason(), Some(ErrorKind::InsufficientData));
        assert_eq!(report.anomaly_indices(), vec![3]);
    }

    #[test]
    fn test_run_rejects_bad_config_before_detection() {
        let table = engine_table(50);

        let bad_k = DetectionConfig::new("anomaly_score", -1.0);
        assert!(matches!(run(&table, &bad_k), Err(DetectionError::InvalidConfig(_))));

        // Rejected even though the table is too small for the statistical pass
        let bad_contamination = DetectionConfig::new("score", 2.0).with_ml(["score"], 0.6);
        assert!(matches!(
            run(&score_table(&[1.0]), &bad_contamination),
            Err(DetectionError::InvalidConfig(_))
        ));

        let missing_feature =
            DetectionConfig::new("anomaly_score", 2.0).with_ml(["engine_temp", "fuel_flow"], 0.1);
        match run(&table, &missing_feature) {
            Err(DetectionError::InvalidConfig(msg)) => assert!(msg.contains("fuel_flow")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_run_statistical_insufficient_data_is_fatal() {
        let table = score_table(&[5.0]);
        let config = DetectionConfig::new("score", 2.0);
        assert!(matches!(
            run(&table, &config),
            Err(DetectionError::InsufficientData { .. })
        ));
        assert!(matches!(
            run(&TelemetryTable::default(), &config),
            Err(DetectionError::InsufficientData { actual: 0, .. })
        ));
    }

    #[test]
    fn test_summary_status() {
        let quiet = score_table(&[1.0, 1.1, 0.9, 1.0, 1.05, 0.95, 1.0, 1.02, 0.98, 1.0, 9.0]);
        let report = run(&quiet, &DetectionConfig::new("score", 2.0)).unwrap();
        assert_eq!(report.summary.total_anomalies, 1);
        // 1 of 11 is under 10%
        assert_eq!(report.summary.status, SystemStatus::Stable);

        let noisy = score_table(&[1.0, 1.0, 1.0, 9.0]);
        let report = run(&noisy, &DetectionConfig::new("score", 1.0)).unwrap();
        assert_eq!(report.summary.total_anomalies, 1);
        assert_eq!(report.summary.status, SystemStatus::Warning);
    }

    #[test]
    fn test_combine_is_or() {
        assert!(!combine(false, None));
        assert!(combine(true, None));
        assert!(!combine(false, Some(false)));
        assert!(combine(false, Some(true)));
        assert!(combine(true, Some(false)));
    }

    #[test]
    fn test_report_serializes_ml_status() {
        let table = score_table(&[1.0, 2.0, 3.0]);
        let report = run(&table, &DetectionConfig::new("score", 1.0).with_ml(["score"], 0.1)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ml_status"]["state"], "unavailable");
        assert_eq!(json["ml_status"]["reason"], "insufficient_data");
        assert_eq!(json["summary"]["status"], "STABLE");
    }
}
