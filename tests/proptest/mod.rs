// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for admission-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::collections::BTreeMap;

use admission_webhook::webhooks::patch::build_add_annotation_patch;
use admission_webhook::webhooks::{
    AdmissionHandler, KindRegistry, PolicyConfig, PolicyValidator, WebhookRoute, review,
};
use admission_webhook::{WebhookConfig, build_dispatcher};
use json_patch::{Patch, PatchOperation};
use proptest::prelude::*;
use serde_json::{Value, json};

use fixtures::ReviewBuilder;

/// Strategy for request identifiers, including characters that need JSON escaping.
fn any_uid() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9\\-\"\\\\/ ]{1,64}"
}

/// Strategy for annotation keys, including the characters JSON Pointer escapes.
fn any_key() -> impl Strategy<Value = String> {
    "[a-z0-9./~_-]{1,24}"
}

/// Strategy for annotation maps.
fn any_annotations() -> impl Strategy<Value = Option<BTreeMap<String, String>>> {
    proptest::option::of(proptest::collection::btree_map(any_key(), "[a-z]{0,8}", 0..6))
}

/// Strategy for whether the object carries a `metadata` object at all.
fn any_metadata() -> impl Strategy<Value = bool> {
    prop_oneof![4 => Just(true), 1 => Just(false)]
}

fn bare_object() -> Value {
    json!({"apiVersion": "v1", "kind": "Pod", "spec": {"containers": []}})
}

fn object_with(annotations: &Option<BTreeMap<String, String>>) -> Value {
    let mut object = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web"}});
    if let Some(annotations) = annotations {
        object["metadata"]["annotations"] = json!(annotations);
    }
    object
}

proptest! {
    /// The response uid always equals the request uid, whatever the outcome.
    #[test]
    fn uid_echoed_on_every_route(
        uid in any_uid(),
        team in proptest::option::of("[a-z]{0,6}"),
        deployment in any::<bool>(),
    ) {
        let mut builder = if deployment {
            ReviewBuilder::deployment("api")
        } else {
            ReviewBuilder::pod("web")
        }
        .uid(uid.clone());
        if let Some(team) = team {
            builder = builder.annotation("team", team);
        }

        let dispatcher = build_dispatcher(&WebhookConfig::default());
        for route in [WebhookRoute::Mutate, WebhookRoute::Validate] {
            let admitted = dispatcher
                .handle(route, Some("application/json"), &builder.to_bytes())
                .unwrap();
            let doc: Value = serde_json::from_slice(&admitted.body).unwrap();
            prop_assert_eq!(admitted.verdict.uid(), uid.as_str());
            prop_assert_eq!(doc["response"]["uid"].as_str().unwrap(), uid.as_str());
        }
    }

    /// Every container is created before anything is added into it.
    #[test]
    fn patch_parent_before_child(
        annotations in any_annotations(),
        key in any_key(),
        metadata in any_metadata(),
    ) {
        let object = if metadata { object_with(&annotations) } else { bare_object() };
        let ops = build_add_annotation_patch(&object, &key, "true");
        let position = |path: &str| {
            ops.iter().position(|op| matches!(op, PatchOperation::Add(add) if add.path.as_str() == path))
        };

        if let Some(index) = position("/metadata") {
            prop_assert_eq!(index, 0);
            prop_assert_eq!(position("/metadata/annotations"), Some(1));
            prop_assert_eq!(ops.len(), 3);
        } else if let Some(index) = position("/metadata/annotations") {
            prop_assert_eq!(index, 0);
            prop_assert_eq!(ops.len(), 2);
        } else {
            prop_assert!(ops.len() <= 1);
        }
    }

    /// The patch always applies, and recomputing on the result yields an empty patch.
    #[test]
    fn patch_is_idempotent(
        annotations in any_annotations(),
        key in any_key(),
        metadata in any_metadata(),
    ) {
        let mut doc = if metadata { object_with(&annotations) } else { bare_object() };
        let patch = Patch(build_add_annotation_patch(&doc, &key, "true"));
        json_patch::patch(&mut doc, &patch.0).unwrap();

        prop_assert_eq!(doc["metadata"]["annotations"][key.as_str()].as_str(), Some("true"));
        prop_assert!(build_add_annotation_patch(&doc, &key, "true").is_empty());
    }

    /// A validation pass reports one failure per missing required key.
    #[test]
    fn validation_reports_every_missing_key(
        required in proptest::collection::btree_set("[a-z]{1,8}", 1..6),
        present in proptest::collection::btree_set("[a-z]{1,8}", 0..6),
    ) {
        let validator = PolicyValidator::new(
            KindRegistry::all(),
            PolicyConfig { required_annotations: required.iter().cloned().collect() },
        );
        let annotations: BTreeMap<String, String> =
            present.iter().map(|k| (k.clone(), "v".to_string())).collect();
        let body = ReviewBuilder::pod("web")
            .raw_object(object_with(&Some(annotations)))
            .to_bytes();
        let call = review::decode(&body).unwrap();
        let verdict = validator.decide(&call).unwrap();

        let missing = required.difference(&present).count();
        prop_assert_eq!(verdict.failures().len(), missing);
        prop_assert_eq!(verdict.is_allowed(), missing == 0);
    }

    /// A truncated body never yields a verdict, let alone an allowed one.
    #[test]
    fn truncated_body_fails_closed(cut in 0.0f64..1.0) {
        let body = ReviewBuilder::pod("web").annotation("team", "a").to_bytes();
        let len = ((body.len() as f64) * cut) as usize;
        let dispatcher = build_dispatcher(&WebhookConfig::default());
        for route in [WebhookRoute::Mutate, WebhookRoute::Validate] {
            prop_assert!(dispatcher
                .handle(route, Some("application/json"), &body[..len])
                .is_err());
        }
    }
}
