use super::{at, id};
use crate::{
    break_tie,
    policy::{ApiPolicy, Cors, Limit, RateLimit},
    select_effective, PolicyAttachment, Scope,
};
use pretty_assertions::assert_eq;

/// Layer names, highest precedence first.
const LAYERS: [&str; 4] = ["up-override", "down-override", "down-default", "up-default"];

fn limit(requests_per_unit: u32, unit: &str) -> Limit {
    Limit {
        requests_per_unit,
        unit: unit.to_string(),
    }
}

#[test]
fn precedence_over_every_layer_combination() {
    for mask in 0u8..16 {
        let present = (0..4).filter(|i| mask & (1 << i) != 0).collect::<Vec<_>>();

        // Each present layer sets a distinct rate; only the lowest-precedence present layer sets
        // the unit, so it must be filled in from below.
        let lowest = present.last().copied();
        let layers = (0..4)
            .map(|i| {
                present.contains(&i).then(|| {
                    let unit = if Some(i) == lowest { "Minute" } else { "" };
                    limit(10 * (i as u32 + 1), unit)
                })
            })
            .collect::<Vec<_>>();

        let effective = select_effective(
            layers[0].as_ref(),
            layers[3].as_ref(),
            layers[1].as_ref(),
            layers[2].as_ref(),
        );

        let expected = present
            .first()
            .map(|&highest| limit(10 * (highest as u32 + 1), "Minute"));
        let names = present.iter().map(|&i| LAYERS[i]).collect::<Vec<_>>();
        assert_eq!(effective, expected, "layers: {names:?}");
    }
}

#[test]
fn single_layer_is_returned_unchanged() {
    let only = limit(0, "Second");
    assert_eq!(
        select_effective(None, None, Some(&only), None),
        Some(only.clone())
    );
    assert_eq!(select_effective::<Limit>(None, None, None, None), None);
}

#[test]
fn zero_values_are_absent() {
    let unset = Limit::default();
    let set = limit(5, "Hour");
    assert_eq!(
        select_effective(Some(&unset), Some(&set), Some(&unset), None),
        Some(set)
    );
    assert_eq!(select_effective(Some(&unset), None, None, Some(&unset)), None);
}

#[test]
fn up_override_beats_down_override() {
    let up = limit(1, "");
    let down = limit(2, "Day");
    assert_eq!(
        select_effective(Some(&up), None, Some(&down), None),
        Some(limit(1, "Day"))
    );
}

#[test]
fn nested_structures_merge_recursively() {
    let lower = RateLimit {
        api: Some(limit(0, "Minute")),
        custom: None,
    };
    let higher = RateLimit {
        api: Some(limit(50, "")),
        custom: None,
    };
    assert_eq!(
        select_effective(None, None, Some(&higher), Some(&lower)),
        Some(RateLimit {
            api: Some(limit(50, "Minute")),
            custom: None,
        })
    );
}

#[test]
fn lists_are_replaced_atomically() {
    let lower = ApiPolicy {
        request_interceptors: vec!["a".to_string(), "b".to_string()],
        cors: Some(Cors {
            enabled: true,
            allow_origins: vec!["*".to_string()],
            ..Default::default()
        }),
        ..Default::default()
    };
    let higher = ApiPolicy {
        request_interceptors: vec!["c".to_string()],
        cors: Some(Cors {
            max_age: 60,
            ..Default::default()
        }),
        ..Default::default()
    };
    assert_eq!(
        select_effective(Some(&higher), None, None, Some(&lower)),
        Some(ApiPolicy {
            request_interceptors: vec!["c".to_string()],
            cors: Some(Cors {
                enabled: true,
                allow_origins: vec!["*".to_string()],
                max_age: 60,
                ..Default::default()
            }),
            ..Default::default()
        })
    );
}

fn candidate(name: &str, created: i64) -> PolicyAttachment<Limit> {
    PolicyAttachment {
        id: id(name),
        target: id("api1"),
        scope: Scope::Api,
        creation_timestamp: at(created),
        default: Some(limit(1, "Minute")),
        overrides: None,
    }
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            all.push(tail);
        }
    }
    all
}

#[test]
fn tie_break_boundaries() {
    assert!(break_tie(std::iter::empty::<&PolicyAttachment<Limit>>()).is_none());

    let only = candidate("a", 10);
    assert_eq!(break_tie([&only]), Some(&only));
}

#[test]
fn oldest_attachment_wins_in_any_order() {
    let candidates = vec![candidate("a", 30), candidate("z", 20), candidate("m", 10)];
    for order in permutations(&candidates) {
        let winner = break_tie(order.iter()).expect("candidates must not be empty");
        assert_eq!(winner.id, id("m"));
    }
}

#[test]
fn greatest_identity_wins_exact_ties_in_any_order() {
    let candidates = vec![candidate("b", 10), candidate("c", 10), candidate("a", 10)];
    for order in permutations(&candidates) {
        let winner = break_tie(order.iter()).expect("candidates must not be empty");
        assert_eq!(winner.id, id("c"));
    }

    // An older attachment still beats a later one with a greater name.
    let candidates = vec![candidate("b", 10), candidate("c", 11), candidate("a", 10)];
    for order in permutations(&candidates) {
        let winner = break_tie(order.iter()).expect("candidates must not be empty");
        assert_eq!(winner.id, id("b"));
    }
}

#[test]
fn layered_attachments() {
    let up = PolicyAttachment {
        default: Some(limit(100, "Minute")),
        ..candidate("up", 0)
    };
    let down = PolicyAttachment {
        default: None,
        overrides: Some(limit(50, "")),
        ..candidate("down", 0)
    };
    assert_eq!(
        PolicyAttachment::layered(Some(&up), Some(&down)),
        Some(limit(50, "Minute"))
    );
    assert_eq!(
        PolicyAttachment::layered(Some(&up), None),
        Some(limit(100, "Minute"))
    );
}
