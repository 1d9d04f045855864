extern crate quilt;
extern crate rand;

mod common;

use common::{attrs, sync};
use quilt::{Delta, Document, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_edit(doc: &mut Document, rng: &mut StdRng) {
    let text = doc.get_text("text");
    let len = text.len(&*doc);
    match rng.gen_range(0..10) {
        0..=4 => {
            let index = rng.gen_range(0..=len);
            let chunk: String = (0..rng.gen_range(1..5)).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            let formatting = if rng.gen_bool(0.3) { Some(attrs(&[("bold", Value::Bool(true))])) } else { None };
            text.insert(&mut *doc, index, &chunk, formatting).unwrap();
        }
        5..=7 if len > 0 => {
            let index = rng.gen_range(0..len);
            let count = rng.gen_range(1..=(len - index).min(3));
            text.delete(&mut *doc, index, count).unwrap();
        }
        8..=9 if len > 0 => {
            let index = rng.gen_range(0..len);
            let count = rng.gen_range(1..=len - index);
            let value = if rng.gen_bool(0.5) { Value::Bool(true) } else { Value::Null };
            let key = if rng.gen_bool(0.5) { "bold" } else { "italic" };
            text.format(&mut *doc, index, count, attrs(&[(key, value)])).unwrap();
        }
        _ => text.push(&mut *doc, "z", None).unwrap(),
    }
}

fn assert_converged(docs: &mut [Document]) {
    let expected_string = {
        let text = docs[0].get_text("text");
        text.get_string(&docs[0])
    };
    let expected_delta = {
        let text = docs[0].get_text("text");
        text.to_delta(&docs[0], None, None).unwrap()
    };
    for doc in docs.iter_mut() {
        let text = doc.get_text("text");
        assert_eq!(text.get_string(&*doc), expected_string);
        assert_eq!(text.to_delta(&*doc, None, None).unwrap(), expected_delta);
    }
}

fn sync_all(docs: &mut Vec<Document>) {
    for i in 0..docs.len() {
        for j in 0..docs.len() {
            if i == j { continue }
            let update = docs[i].encode_state_as_update_v1(&docs[j].state_vector());
            docs[j].apply_update_v1(&update).unwrap();
        }
    }
}

#[test]
fn test_concurrent_inserts_at_same_position() {
    common::init_logging();
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let text1 = doc1.get_text("text");
    let text2 = doc2.get_text("text");
    text1.insert(&mut doc1, 0, "aaa", None).unwrap();
    text2.insert(&mut doc2, 0, "bbb", None).unwrap();

    sync(&doc1, &mut doc2);
    sync(&doc2, &mut doc1);
    assert!(text1.get_string(&doc1) == text2.get_string(&doc2));
    assert!(text1.get_string(&doc1) == "aaabbb");
}

#[test]
fn test_concurrent_inserts_inside_shared_text() {
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let text1 = doc1.get_text("text");
    let text2 = doc2.get_text("text");
    text1.push(&mut doc1, "hello world", None).unwrap();
    sync(&doc1, &mut doc2);

    text1.insert(&mut doc1, 5, ",", None).unwrap();
    text2.insert(&mut doc2, 5, "!", None).unwrap();
    text2.delete(&mut doc2, 0, 1).unwrap();
    text1.push(&mut doc1, ".", None).unwrap();

    sync(&doc2, &mut doc1);
    sync(&doc1, &mut doc2);
    assert!(text1.get_string(&doc1) == "ello,! world.");
    assert!(text2.get_string(&doc2) == "ello,! world.");
}

#[test]
fn test_concurrent_formatting() {
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let text1 = doc1.get_text("text");
    let text2 = doc2.get_text("text");
    text1.push(&mut doc1, "abcdef", None).unwrap();
    sync(&doc1, &mut doc2);

    text1.format(&mut doc1, 0, 4, attrs(&[("bold", Value::Bool(true))])).unwrap();
    text2.format(&mut doc2, 2, 4, attrs(&[("italic", Value::Bool(true))])).unwrap();
    sync(&doc1, &mut doc2);
    sync(&doc2, &mut doc1);

    let delta = text1.to_delta(&doc1, None, None).unwrap();
    assert!(delta == text2.to_delta(&doc2, None, None).unwrap());
    assert!(delta == vec![
        Delta::insert_with("ab", attrs(&[("bold", Value::Bool(true))])),
        Delta::insert_with("cd", attrs(&[("bold", Value::Bool(true)), ("italic", Value::Bool(true))])),
        Delta::insert_with("ef", attrs(&[("italic", Value::Bool(true))])),
    ]);
}

#[test]
fn test_delivery_order_does_not_matter() {
    let mut source = Document::with_client_id(1);
    let text = source.get_text("text");
    let mut updates = Vec::new();
    for chunk in &["one ", "two ", "three"] {
        let before = source.state_vector();
        text.push(&mut source, chunk, None).unwrap();
        updates.push(source.encode_state_as_update_v2(&before));
    }
    let before = source.state_vector();
    text.delete(&mut source, 0, 4).unwrap();
    updates.push(source.encode_state_as_update_v2(&before));

    for order in &[[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]] {
        let mut replica = Document::with_client_id(2);
        for &i in order {
            replica.apply_update_v2(&updates[i]).unwrap();
        }
        let replica_text = replica.get_text("text");
        assert!(replica_text.get_string(&replica) == "two three");
        assert!(replica.state_vector() == source.state_vector());
    }
}

#[test]
fn test_random_edits_converge() {
    common::init_logging();
    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut docs: Vec<Document> = (1..=3).map(Document::with_client_id).collect();
        for _ in 0..12 {
            for doc in docs.iter_mut() {
                for _ in 0..rng.gen_range(0..4) {
                    random_edit(doc, &mut rng);
                }
            }
            let from = rng.gen_range(0..docs.len());
            let to = (from + rng.gen_range(1..docs.len())) % docs.len();
            let update = docs[from].encode_state_as_update_v1(&docs[to].state_vector());
            docs[to].apply_update_v1(&update).unwrap();
        }
        sync_all(&mut docs);
        assert_converged(&mut docs);
    }
}

#[test]
fn test_random_edits_converge_without_gc() {
    for seed in 100..104 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut docs: Vec<Document> = (1..=3).map(common::doc_without_gc).collect();
        for _ in 0..10 {
            for doc in docs.iter_mut() {
                random_edit(doc, &mut rng);
            }
            let (from, to) = (rng.gen_range(0..3), rng.gen_range(0..3));
            if from != to {
                let update = docs[from].encode_state_as_update_v2(&docs[to].state_vector());
                docs[to].apply_update_v2(&update).unwrap();
            }
        }
        sync_all(&mut docs);
        assert_converged(&mut docs);
    }
}
