//! Classification determinism

use handoff::classify::{FieldClassifier, FieldRule, RuleOrigin};
use handoff::document::ContextDocument;
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

proptest! {
    #[test]
    fn classify_is_idempotent(
        needs in prop::option::of(prop::collection::vec(name(), 0..5)),
        rule in prop::option::of((
            prop::collection::vec(name(), 0..4),
            prop::collection::vec(name(), 0..4),
        )),
    ) {
        let mut builder = ContextDocument::builder("P1", 1).summary("ok");
        if let Some(needs) = &needs {
            builder = builder.needs("C1", needs.clone());
        }
        let doc = builder.build();

        let mut classifier = FieldClassifier::new();
        let mut registered = false;
        if let Some((critical, optional)) = rule {
            let optional: Vec<String> =
                optional.into_iter().filter(|n| !critical.contains(n)).collect();
            classifier.register("P1", "C1", FieldRule::new(critical, optional).unwrap());
            registered = true;
        }

        let first = classifier.classify("P1", "C1", Some(&doc));
        let second = classifier.classify("P1", "C1", Some(&doc));
        prop_assert_eq!(&first, &second);

        let expected_origin = if registered {
            RuleOrigin::Explicit
        } else if needs.is_some() {
            RuleOrigin::ProducerNeeds
        } else {
            RuleOrigin::Default
        };
        prop_assert_eq!(first.origin, expected_origin);
        for field in &first.critical {
            prop_assert!(!first.optional.contains(field));
        }
    }
}
