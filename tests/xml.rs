extern crate quilt;
#[macro_use]
extern crate assert_matches;

mod common;

use common::{attrs, sync};
use quilt::{Delta, Document, Error, Value, XmlElement, XmlNode, XmlText};

#[test]
fn test_tree_to_string() {
    let mut doc = Document::with_client_id(1);
    let mut root = doc.get_xml_fragment("xml");
    let mut p = XmlElement::new("p");
    p.push(None, XmlText::new("hello")).unwrap();

    let mut txn = doc.transact();
    root.push(Some(&mut txn), p).unwrap();
    root.push(Some(&mut txn), XmlText::new("world")).unwrap();
    txn.commit().unwrap();
    drop(txn);

    assert!(root.get_string(&doc) == "<p>hello</p>world");
}

#[test]
fn test_tree_round_trip() {
    let mut doc = Document::with_client_id(1);
    let mut root = doc.get_xml_fragment("xml");
    let mut list = XmlElement::new("ul");
    list.set_attribute(None, "class", "plain").unwrap();
    for word in &["one", "two"] {
        let mut item = XmlElement::new("li");
        item.push(None, XmlText::new(word)).unwrap();
        list.push(None, item).unwrap();
    }
    {
        let mut txn = doc.transact();
        root.push(Some(&mut txn), list).unwrap();
    }
    let expected = r#"<ul class="plain"><li>one</li><li>two</li></ul>"#;
    assert!(root.get_string(&doc) == expected);

    let mut v1 = Document::with_client_id(2);
    v1.apply_update_v1(&doc.encode_state_as_update_v1(&Default::default())).unwrap();
    let mut v2 = Document::with_client_id(3);
    v2.apply_update_v2(&doc.encode_state_as_update_v2(&Default::default())).unwrap();
    for replica in vec![&mut v1, &mut v2] {
        let root = replica.get_xml_fragment("xml");
        assert!(root.get_string(&*replica) == expected);
        let list = root.first_child(&*replica).unwrap().into_element().unwrap();
        assert!(list.tag(&*replica) == "ul");
        assert!(list.get_attribute(&*replica, "class") == Some(Value::from("plain")));
        assert!(list.len(&*replica) == 2);
    }
}

#[test]
fn test_concurrent_attribute_writes_converge() {
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let mut root = doc1.get_xml_fragment("xml");
    {
        let mut txn = doc1.transact();
        root.push(Some(&mut txn), XmlElement::new("div")).unwrap();
    }
    sync(&doc1, &mut doc2);

    let mut div1 = doc1.get_xml_fragment("xml").first_child(&doc1).unwrap().into_element().unwrap();
    let mut div2 = doc2.get_xml_fragment("xml").first_child(&doc2).unwrap().into_element().unwrap();
    {
        let mut txn = doc1.transact();
        div1.set_attribute(Some(&mut txn), "color", "red").unwrap();
        div1.set_attribute(Some(&mut txn), "size", 1).unwrap();
    }
    {
        let mut txn = doc2.transact();
        div2.set_attribute(Some(&mut txn), "color", "blue").unwrap();
        div2.remove_attribute(Some(&mut txn), "size").unwrap();
    }
    sync(&doc1, &mut doc2);
    sync(&doc2, &mut doc1);

    assert!(div1.attributes(&doc1) == div2.attributes(&doc2));
    assert!(div1.get_attribute(&doc1, "color") == Some(Value::from("blue")));
    assert!(div1.get_attribute(&doc1, "size") == Some(Value::Integer(1)));
}

#[test]
fn test_concurrent_children_and_navigation() {
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let mut root1 = doc1.get_xml_fragment("xml");
    let mut root2 = doc2.get_xml_fragment("xml");
    {
        let mut txn = doc1.transact();
        root1.push(Some(&mut txn), XmlElement::new("a")).unwrap();
        root1.push(Some(&mut txn), XmlElement::new("d")).unwrap();
    }
    sync(&doc1, &mut doc2);
    {
        let mut txn = doc1.transact();
        root1.insert(Some(&mut txn), 1, XmlElement::new("b")).unwrap();
    }
    {
        let mut txn = doc2.transact();
        root2.insert(Some(&mut txn), 1, XmlElement::new("c")).unwrap();
        root2.delete(Some(&mut txn), 0, 1).unwrap();
    }
    sync(&doc1, &mut doc2);
    sync(&doc2, &mut doc1);

    let expected = "<b></b><c></c><d></d>";
    assert!(root1.get_string(&doc1) == expected);
    assert!(root2.get_string(&doc2) == expected);

    let b = root2.first_child(&doc2).unwrap();
    let c = b.next_sibling(&doc2).unwrap();
    let d = c.next_sibling(&doc2).unwrap();
    assert!(d.next_sibling(&doc2).is_none());
    assert!(d.prev_sibling(&doc2) == Some(c.clone()));
    assert!(c.prev_sibling(&doc2) == Some(b.clone()));
    assert!(b.prev_sibling(&doc2).is_none());
    assert!(c.parent(&doc2) == Some(XmlNode::from(root2.clone())));
    assert!(root2.children(&doc2) == vec![b, c, d]);
}

#[test]
fn test_child_of_concurrently_deleted_element_is_dropped() {
    let mut doc1 = Document::with_client_id(1);
    let mut doc2 = Document::with_client_id(2);
    let mut root1 = doc1.get_xml_fragment("xml");
    {
        let mut txn = doc1.transact();
        root1.push(Some(&mut txn), XmlElement::new("section")).unwrap();
    }
    sync(&doc1, &mut doc2);

    {
        let mut txn = doc1.transact();
        root1.delete(Some(&mut txn), 0, 1).unwrap();
    }
    {
        let mut section = doc2.get_xml_fragment("xml").first_child(&doc2).unwrap().into_element().unwrap();
        let mut txn = doc2.transact();
        section.push(Some(&mut txn), XmlText::new("late")).unwrap();
    }
    sync(&doc1, &mut doc2);
    sync(&doc2, &mut doc1);

    let root2 = doc2.get_xml_fragment("xml");
    assert!(root1.get_string(&doc1) == "");
    assert!(root2.get_string(&doc2) == "");
    assert!(root1.len(&doc1) == 0);
}

#[test]
fn test_xml_text_editing() {
    let mut doc = Document::with_client_id(1);
    let mut root = doc.get_xml_fragment("xml");
    let mut txn = doc.transact();
    let mut text = root.push(Some(&mut txn), XmlText::new("hello")).unwrap().into_text().unwrap();
    text.push(Some(&mut txn), " world", None).unwrap();
    text.apply_delta(Some(&mut txn), vec![Delta::retain(6), Delta::retain_with(5, attrs(&[("em", Value::Bool(true))]))]).unwrap();
    text.set_attribute(Some(&mut txn), "lang", "en").unwrap();

    assert!(text.get_string(&txn) == "hello world");
    assert!(text.to_delta(&txn, None, None).unwrap() == vec![
        Delta::insert("hello "),
        Delta::insert_with("world", attrs(&[("em", Value::Bool(true))])),
    ]);
    assert!(text.attributes(&txn) == attrs(&[("lang", Value::from("en"))]));
    assert!(root.get_string(&txn) == "hello world");

    assert_matches!(text.delete(Some(&mut txn), 6, 6), Err(Error::OutOfBounds));
    text.delete(Some(&mut txn), 0, 6).unwrap();
    assert!(text.get_string(&txn) == "world");
}

#[test]
fn test_prelim_handles() {
    let doc = Document::with_client_id(1);
    let mut element = XmlElement::new("p");
    assert!(element.prelim());
    element.push(None, XmlText::new("a")).unwrap();
    element.insert(None, 0, XmlElement::new("br")).unwrap();
    element.set_attribute(None, "id", "x").unwrap();
    assert!(element.len(&doc) == 2);
    assert!(element.get_string(&doc) == r#"<p id="x"><br></br>a</p>"#);
    assert!(element.first_child(&doc).unwrap().prelim());
    assert!(element.first_child(&doc).unwrap().next_sibling(&doc).is_none());

    element.delete(None, 0, 1).unwrap();
    assert_matches!(element.delete(None, 1, 1), Err(Error::OutOfBounds));
    assert!(element.get_string(&doc) == r#"<p id="x">a</p>"#);
}
