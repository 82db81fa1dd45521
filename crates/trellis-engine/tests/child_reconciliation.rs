//! Integration test: keyed list diffing, as seen through the effect list
//! and the host mutations that commit it.

mod common;

use common::Harness;
use trellis_core::{EffectTag, Element, Node};
use trellis_test_utils::fixtures::{item, list};
use trellis_test_utils::HostOp;

fn li_instance(h: &Harness, key: &str) -> trellis_core::InstanceId {
    h.tree().find_key(key).expect("keyed child").instance
}

#[test]
fn mount_builds_the_host_tree() {
    let mut h = Harness::legacy();
    h.render(list(&["a", "b", "c"]));
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");

    // Only the subtree root is inserted into the live container.
    let mutations = h.rec.host().mutations().len();
    assert_eq!(mutations, 1);
    let metrics = h.rec.last_metrics().unwrap();
    assert_eq!(metrics.placements, 1);
    assert_eq!(metrics.fibers_created, 7);
}

#[test]
fn identical_list_produces_no_structural_effects() {
    let mut h = Harness::concurrent();
    h.mount(list(&["a", "b", "c"]));
    let before = h.tree().instances();

    let effects = h.prepare(list(&["a", "b", "c"]));
    assert_eq!(effects.placements(), 0);
    assert_eq!(effects.deletions(), 0);

    h.rec.host_mut().clear_ops();
    h.commit();
    assert!(h.rec.host().mutations().is_empty());
    assert_eq!(h.tree().instances(), before);
}

#[test]
fn key_reused_with_new_type_replaces_the_fiber() {
    let mut h = Harness::concurrent();
    h.mount(list(&["a", "b"]));
    let old_b = li_instance(&h, "b");

    let next = Element::host("ul")
        .child(item("a"))
        .child(Element::host("p").key("b").text("b"));
    let effects = h.prepare(next);

    assert_eq!(effects.deletions(), 1);
    let deleted: Vec<_> = effects.with_tag(EffectTag::DELETION).collect();
    assert_eq!(deleted[0].instance, old_b);
    assert_eq!(deleted[0].type_name, "li");

    let placed: Vec<_> = effects.with_tag(EffectTag::PLACEMENT).collect();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].type_name, "p");
    assert_ne!(placed[0].instance, old_b);

    h.commit();
    assert_eq!(h.markup(), "<ul><li>a</li><p>b</p></ul>");
    assert_eq!(h.tree().find_key("b").unwrap().type_name, "p");
}

#[test]
fn moving_one_item_to_the_end_places_only_that_item() {
    let mut h = Harness::concurrent();
    h.mount(list(&["a", "b", "c", "d"]));

    let effects = h.prepare(list(&["b", "c", "d", "a"]));
    assert_eq!(effects.placements(), 1);
    assert_eq!(effects.deletions(), 0);
    let placed: Vec<_> = effects.with_tag(EffectTag::PLACEMENT).collect();
    assert_eq!(placed[0].key.as_ref().map(|k| k.as_str()), Some("a"));

    h.rec.host_mut().clear_ops();
    h.commit();
    assert_eq!(h.markup(), "<ul><li>b</li><li>c</li><li>d</li><li>a</li></ul>");
    let ops = h.rec.host().mutations();
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0], HostOp::AppendChild { .. }));
}

#[test]
fn rotating_right_reuses_every_fiber() {
    let mut h = Harness::concurrent();
    h.mount(list(&["1", "2", "3"]));
    let before: Vec<_> = ["1", "2", "3"].iter().map(|k| li_instance(&h, k)).collect();

    // The last-placed-index walk keeps the highest old index in place
    // and moves everything that now sits after it.
    let effects = h.prepare(list(&["3", "1", "2"]));
    assert_eq!(effects.deletions(), 0);
    let placed: Vec<_> = effects
        .with_tag(EffectTag::PLACEMENT)
        .filter_map(|r| r.key.as_ref().map(|k| k.as_str().to_string()))
        .collect();
    assert_eq!(placed, ["1", "2"]);

    h.commit();
    assert_eq!(h.markup(), "<ul><li>3</li><li>1</li><li>2</li></ul>");
    let after: Vec<_> = ["1", "2", "3"].iter().map(|k| li_instance(&h, k)).collect();
    assert_eq!(before, after);
    assert_eq!(h.rec.last_metrics().unwrap().fibers_created, 0);
}

#[test]
fn shrinking_a_list_deletes_the_tail() {
    let mut h = Harness::concurrent();
    h.mount(list(&["1", "2"]));
    let kept = li_instance(&h, "1");
    let removed = li_instance(&h, "2");

    let effects = h.prepare(list(&["1"]));
    assert_eq!(effects.deletions(), 1);
    assert_eq!(effects.placements(), 0);
    assert_eq!(effects.records[0].instance, removed);

    h.commit();
    assert_eq!(h.markup(), "<ul><li>1</li></ul>");
    assert_eq!(li_instance(&h, "1"), kept);
    assert_eq!(h.rec.live_instances(), h.tree().len());
}

#[test]
fn inserting_in_the_middle_uses_the_next_stable_sibling() {
    let mut h = Harness::legacy();
    h.render(list(&["a", "c"]));
    h.rec.host_mut().clear_ops();

    h.render(list(&["a", "b", "c"]));
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    let inserts = h
        .rec
        .host()
        .mutations()
        .into_iter()
        .filter(|op| matches!(op, HostOp::InsertBefore { .. }))
        .count();
    assert_eq!(inserts, 1);
}

#[test]
fn text_change_is_an_update_not_a_replacement() {
    let mut h = Harness::legacy();
    h.render(Element::host("p").text("before"));
    let text = h.tree().find_type("#text").unwrap().instance;
    h.rec.host_mut().clear_ops();

    h.render(Element::host("p").text("after"));
    assert_eq!(h.markup(), "<p>after</p>");
    assert_eq!(h.tree().find_type("#text").unwrap().instance, text);
    match h.rec.host().mutations().as_slice() {
        [HostOp::CommitText { text, .. }] => assert_eq!(text, "after"),
        other => panic!("expected one text update, got {other:?}"),
    }
}

#[test]
fn attribute_changes_are_committed_as_a_payload() {
    let mut h = Harness::legacy();
    h.render(Element::host("div").attr("id", "x").attr("hidden", true));
    h.rec.host_mut().clear_ops();

    h.render(Element::host("div").attr("id", "y"));
    let div = h.rec.host().children_of(h.container)[0];
    assert_eq!(h.rec.host().attribute(div, "id").and_then(|v| v.as_str()), Some("y"));
    assert!(h.rec.host().attribute(div, "hidden").is_none());
    assert_eq!(h.rec.last_metrics().unwrap().updates, 1);
}

#[test]
fn duplicate_keys_fail_the_render() {
    let mut h = Harness::legacy();
    h.render(list(&["a"]));
    let err = h
        .rec
        .schedule_update(h.root, list(&["x", "x"]), None)
        .unwrap_err();
    match err {
        trellis_engine::ReconcileError::Render(trellis_engine::RenderError::DuplicateKey {
            key, ..
        }) => assert_eq!(key.as_str(), "x"),
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
    assert_eq!(h.markup(), "<ul><li>a</li></ul>");
}

#[test]
fn top_level_fragment_is_flattened() {
    let mut h = Harness::legacy();
    h.render(Element::fragment().child(item("a")).child(item("b")));
    assert_eq!(h.markup(), "<li>a</li><li>b</li>");
    assert!(h.tree().find_type("Fragment").is_none());
}

#[test]
fn nested_list_becomes_a_fragment_fiber() {
    let mut h = Harness::legacy();
    let nested = |tail: &[&str]| -> Node {
        Element::host("ul")
            .child(item("a"))
            .child(Node::list(tail.iter().map(|k| item(k))))
            .child(item("z"))
            .into()
    };
    h.render(nested(&["b", "c"]));
    assert_eq!(h.markup(), "<ul><li>a</li><li>b</li><li>c</li><li>z</li></ul>");
    let fragment = h.tree().find_type("Fragment").unwrap().instance;

    h.render(nested(&["c"]));
    assert_eq!(h.markup(), "<ul><li>a</li><li>c</li><li>z</li></ul>");
    assert_eq!(h.tree().find_type("Fragment").unwrap().instance, fragment);

    h.render(nested(&["c", "d"]));
    assert_eq!(h.markup(), "<ul><li>a</li><li>c</li><li>d</li><li>z</li></ul>");
}
