use pad_crdt::{CharId, Document, Identity};
use std::collections::HashSet;

fn typed(doc: &mut Document, identity: &mut Identity, text: &str) {
    for (i, ch) in text.chars().enumerate() {
        doc.generate_insert(identity, i, &ch.to_string()).unwrap();
    }
}

#[test]
fn inv_unique_character_ids() {
    let mut doc = Document::new();
    let mut identity = Identity::new(1);
    typed(&mut doc, &mut identity, "hello");
    doc.generate_delete(2).unwrap();
    doc.generate_insert(&mut identity, 0, "x").unwrap();

    let ids: HashSet<CharId> = doc.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), doc.len());
}

#[test]
fn inv_sentinels_bound_the_sequence() {
    let mut doc = Document::new();
    let mut identity = Identity::new(1);
    typed(&mut doc, &mut identity, "abc");
    doc.generate_delete(0).unwrap();

    assert_eq!(doc.element_at(0).unwrap().id, CharId::Start);
    assert_eq!(doc.element_at(doc.len() - 1).unwrap().id, CharId::End);
    assert!(!doc.element_at(0).unwrap().visible);
    assert!(!doc.element_at(doc.len() - 1).unwrap().visible);
}

#[test]
fn inv_anchors_reference_known_characters() {
    let mut doc = Document::new();
    let mut identity = Identity::new(1);
    typed(&mut doc, &mut identity, "abc");
    doc.generate_delete(1).unwrap();
    doc.generate_insert(&mut identity, 1, "z").unwrap();

    for ch in doc.iter() {
        assert!(doc.contains(&ch.prev));
        assert!(doc.contains(&ch.next));
    }
}

#[test]
fn inv_relative_order_never_changes() {
    let mut doc = Document::new();
    let mut identity = Identity::new(1);
    typed(&mut doc, &mut identity, "abcd");
    let order_before: Vec<CharId> = doc.iter().map(|c| c.id).collect();

    // Interleave further edits, including a concurrent remote insert.
    let mut remote = Document::from_snapshot(doc.snapshot()).unwrap();
    let mut remote_identity = Identity::new(2);
    let ch = remote
        .generate_insert(&mut remote_identity, 2, "x")
        .unwrap();
    doc.integrate_insert(ch.clone(), ch.prev, ch.next).unwrap();
    doc.generate_delete(0).unwrap();
    doc.generate_insert(&mut identity, 0, "y").unwrap();

    let order_after: Vec<CharId> = doc.iter().map(|c| c.id).collect();
    let mut remaining = order_after.iter();
    for id in &order_before {
        assert!(
            remaining.any(|other| other == id),
            "previously integrated characters were reordered"
        );
    }
}

#[test]
fn inv_tombstones_are_permanent() {
    let mut doc = Document::new();
    let mut identity = Identity::new(1);
    typed(&mut doc, &mut identity, "ab");
    let removed = doc.generate_delete(0).unwrap();

    doc.generate_insert(&mut identity, 0, "c").unwrap();
    doc.generate_insert(&mut identity, 2, "d").unwrap();

    let i = doc.position(&removed.id).unwrap();
    assert!(!doc.element_at(i).unwrap().visible);
    assert_eq!(doc.element_at(i).unwrap().value, "a");
}
