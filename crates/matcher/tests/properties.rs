use proptest::prelude::*;
use sop_catalog::{Applicability, Exclusion, Procedure};
use sop_gather::SignalBundle;
use sop_match::{find_matches, score_procedure, Factor, MatchWeights};

const WORDS: &[&str] = &[
    "lag", "kafka", "slow", "timeout", "payment", "consumer", "queue", "heap", "p99", "latency",
    "error", "disk",
];

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(WORDS).prop_map(str::to_string)
}

fn words(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(word(), 0..max)
}

fn procedure() -> impl Strategy<Value = Procedure> {
    (
        prop::collection::vec(word(), 1..4),
        words(3),
        words(3),
        words(3),
        prop::collection::vec((word(), 0.0f64..=1.0), 0..4),
    )
        .prop_map(|(keywords, services, metrics, logs, boosters)| {
            let mut procedure = Procedure::new("p", "P", keywords).with_applicability(Applicability {
                service_filters: services,
                metric_patterns: metrics,
                log_patterns: logs,
                symptom_keywords: Vec::new(),
            });
            for (condition, amount) in boosters {
                procedure = procedure.with_booster(condition, amount);
            }
            procedure
        })
}

fn catalog() -> impl Strategy<Value = Vec<Procedure>> {
    prop::collection::vec(procedure(), 1..6).prop_map(|procedures| {
        procedures
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.id = format!("p{i:02}");
                p
            })
            .collect()
    })
}

fn bundle() -> impl Strategy<Value = SignalBundle> {
    (
        words(6),
        words(3),
        prop::collection::vec((word(), 0.0f64..10_000.0), 0..4),
        words(4),
    )
        .prop_map(|(query, services, metrics, logs)| {
            let mut bundle = SignalBundle {
                normalized_query: query.join(" "),
                affected_services: services,
                metrics: metrics
                    .into_iter()
                    .map(|(name, value)| (format!("svc.{name}"), value))
                    .collect(),
                log_patterns: logs.into_iter().map(|l| format!("svc: {l}")).collect(),
                ..SignalBundle::default()
            };
            bundle.finalize();
            bundle
        })
}

fn weights() -> impl Strategy<Value = MatchWeights> {
    (
        0.0f64..=3.0,
        0.0f64..=3.0,
        0.0f64..=3.0,
        0.0f64..=3.0,
        0.0f64..=3.0,
    )
        .prop_map(|(keyword, service, metric, log, booster)| MatchWeights {
            keyword,
            service,
            metric,
            log,
            booster,
        })
        .prop_filter("some weight must be positive", |w| w.total() > 0.0)
}

proptest! {
    #[test]
    fn score_stays_in_unit_interval(
        procedure in procedure(),
        bundle in bundle(),
        weights in weights(),
    ) {
        let result = score_procedure(&procedure, &bundle, &weights);
        prop_assert!((0.0..=1.0).contains(&result.score), "score {}", result.score);

        let contributions: f64 = Factor::ALL
            .iter()
            .map(|f| result.breakdown.get(*f).contribution)
            .sum();
        prop_assert!((contributions - result.score).abs() < 1e-9);
        for factor in Factor::ALL {
            let slot = result.breakdown.get(factor);
            prop_assert!((0.0..=1.0).contains(&slot.value));
        }
    }

    #[test]
    fn exclusion_forces_zero_whatever_the_boosters(
        procedure in procedure(),
        bundle in bundle(),
        veto in word(),
    ) {
        let mut bundle = bundle;
        bundle.normalized_query = format!("{} {veto}", bundle.normalized_query);
        let procedure = procedure
            .with_booster(veto.clone(), 1.0)
            .with_exclusion(Exclusion {
                conflicting_symptoms: vec![veto],
                ..Exclusion::default()
            });

        let result = score_procedure(&procedure, &bundle, &MatchWeights::default());
        prop_assert_eq!(result.score, 0.0);
        prop_assert!(result.is_excluded());
    }

    #[test]
    fn ranking_ignores_catalog_order(
        procedures in catalog(),
        bundle in bundle(),
        weights in weights(),
    ) {
        let forward = find_matches(&bundle, &procedures, &weights);
        let mut reversed_catalog = procedures.clone();
        reversed_catalog.reverse();
        let reversed = find_matches(&bundle, &reversed_catalog, &weights);
        prop_assert_eq!(&forward, &reversed);

        let again = find_matches(&bundle, &procedures, &weights);
        prop_assert_eq!(forward, again);
    }

    #[test]
    fn corroborating_log_never_lowers_the_score(
        procedure in procedure(),
        bundle in bundle(),
        line in word(),
    ) {
        let weights = MatchWeights::default();
        let before = score_procedure(&procedure, &bundle, &weights).score;
        let after = score_procedure(&procedure, &bundle.clone().with_log(format!("svc: {line}")), &weights).score;
        prop_assert!(after + 1e-12 >= before, "{after} < {before}");
    }
}
