use bson::oid::ObjectId;
use bson::{Bson, DateTime, doc};
use odmlite::collection::{FindOptions, UpdateOptions, UpdateResult, WriteConcern};
use odmlite::{Key, OdmError, PushOptions};
use serde::Serialize;

use crate::integration_tests::_support::*;

fn assert_updated(result: &UpdateResult, count: u64) {
    assert_eq!(result.inserted_count(), 0);
    assert_eq!(result.updated_count(), count);
    assert!(result.updated_existing());
}

fn assert_inserted(result: &UpdateResult) {
    assert_eq!(result.inserted_count(), 1);
    assert_eq!(result.updated_count(), 0);
    assert!(!result.updated_existing());
}

fn upsert() -> UpdateOptions {
    UpdateOptions::default().upsert(true)
}

#[test]
fn add_respects_duplicate_flag() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();

    let ops = ds.create_update_operations::<ContainsIntArray>().add("values", &4, false).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4]);

    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4]);

    let ops = ds.create_update_operations::<ContainsIntArray>().add("values", &4, true).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 4]);
}

#[test]
fn add_all_respects_duplicate_flag() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();

    let ops = ds.create_update_operations::<ContainsIntArray>().add_all("values", [4, 5], false).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 5]);

    let ops = ds.create_update_operations::<ContainsIntArray>().add_all("values", [4, 5], true).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 5, 4, 5]);
}

#[test]
fn add_to_set_keeps_values_unique_in_arrival_order() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();

    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set("values", &5).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set("values", &4).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 5, 4]);

    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set_all("values", [8, 9]).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 5, 4, 8, 9]);

    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set_all("values", [4, 5]).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 5, 4, 8, 9]);
}

#[test]
fn add_all_does_not_tag_embedded_entities() {
    let ds = datastore();
    let uuid = "4ec6ada9-081a-424f-bee0-934c0bc4fab7";
    let now = DateTime::now();
    let finder = ds.find::<EntityLogs>().field("uuid").equal(uuid);
    assert!(finder.get().unwrap().is_none());

    let logs = vec![EntityLog::new("log1", now), EntityLog::new("log2", now)];
    let ops = ds.create_update_operations::<EntityLogs>().add_all("logs", logs, false).unwrap();
    assert_inserted(&ds.update_with(&finder, &ops, &upsert()).unwrap());

    let ops = ds.create_update_operations::<EntityLogs>().add("logs", &EntityLog::new("log3", now), false).unwrap();
    assert_updated(&ds.update_with(&finder, &ops, &upsert()).unwrap(), 1);

    let raw = ds
        .collection_for::<EntityLogs>()
        .find(&doc! {"uuid": uuid}, &FindOptions::default())
        .unwrap()
        .to_vec();
    assert_eq!(raw.len(), 1);
    let stored = raw[0].get_array("logs").unwrap();
    assert_eq!(stored.len(), 3);
    for log in stored {
        let Bson::Document(d) = log else { panic!("expected an embedded document") };
        assert!(!d.contains_key("className"), "{d}");
    }
}

#[test]
fn update_first_touches_one_document() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    let mut control = ContainsIntArray::default();
    ds.save(&mut c).unwrap();
    ds.save(&mut control).unwrap();
    let query = ds.find::<ContainsIntArray>();

    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set("values", &4).unwrap();
    assert_updated(&ds.update_first(&query, &ops, false).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4]);
    assert_eq!(stored_values(&ds, &control), vec![1, 2, 3]);

    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set_all("values", [4, 5]).unwrap();
    assert_updated(&ds.update_with(&query, &ops, &UpdateOptions::default()).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 5]);
    assert_eq!(stored_values(&ds, &control), vec![1, 2, 3]);

    let missing = ds.find::<ContainsIntArray>().filter("values", vec![4, 5, 7]);
    let ops = ds.create_update_operations::<ContainsIntArray>().add_to_set("values", &6).unwrap();
    assert_inserted(&ds.update_first(&missing, &ops, true).unwrap());
    assert_eq!(ds.find::<ContainsIntArray>().filter("values", vec![4, 5, 7, 6]).count().unwrap(), 1);
}

#[test]
fn update_first_without_create_leaves_the_rest() {
    let ds = datastore();
    for i in 0..5 {
        let mut logs = EntityLogs { raw: Some(doc! {"name": format!("logs{i}")}), ..EntityLogs::default() };
        ds.save(&mut logs).unwrap();
    }
    let ops = ds.create_update_operations::<EntityLogs>().set("raw", &doc! {"new": "value"}).unwrap();
    ds.update_first(&ds.find(), &ops, false).unwrap();

    let all = ds.find::<EntityLogs>().as_list().unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].raw, Some(doc! {"new": "value"}));
    for (i, logs) in all.iter().enumerate().skip(1) {
        assert_eq!(logs.raw, Some(doc! {"name": format!("logs{i}")}));
    }
}

#[test]
fn existing_updates_honor_multi() {
    let ds = datastore();
    ds.save(&mut Circle::new(100.0)).unwrap();
    ds.save(&mut Circle::new(12.0)).unwrap();

    let ops = ds.create_update_operations::<Circle>().inc_by("radius", &1.0).unwrap();
    assert_updated(&ds.update_with(&ds.find(), &ops, &UpdateOptions::default()).unwrap(), 1);
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 2);

    let circle = ds.find::<Circle>().filter("radius", 13.0).get().unwrap().unwrap();
    assert!((circle.radius - 13.0).abs() < f64::EPSILON);
}

#[derive(Serialize)]
struct Counter {
    value: i32,
}

#[test]
fn inc_and_dec() {
    let ds = datastore();
    let mut rects: Vec<Rectangle> = (0..5).map(|i| if i % 2 == 0 { Rectangle::new(1.0, 10.0) } else { Rectangle::new(10.0, 1.0) }).collect();
    ds.save_all(&mut rects).unwrap();

    let height_of_1 = ds.find::<Rectangle>().filter("height", 1.0);
    let height_of_2 = ds.find::<Rectangle>().filter("height", 2.0);
    let height_of_35 = ds.find::<Rectangle>().filter("height", 3.5);
    assert_eq!(ds.get_count_query(&height_of_1).unwrap(), 3);
    assert_eq!(ds.get_count_query(&height_of_2).unwrap(), 0);

    let ops = ds.create_update_operations::<Rectangle>().inc("height");
    assert_updated(&ds.update(&height_of_1, &ops).unwrap(), 3);
    assert_eq!(ds.get_count_query(&height_of_1).unwrap(), 0);
    assert_eq!(ds.get_count_query(&height_of_2).unwrap(), 3);

    let ops = ds.create_update_operations::<Rectangle>().dec("height");
    assert_updated(&ds.update(&height_of_2, &ops).unwrap(), 3);
    assert_eq!(ds.get_count_query(&height_of_1).unwrap(), 3);

    let ops = ds.create_update_operations::<Rectangle>().inc_by("height", &2.5).unwrap();
    assert_updated(&ds.update(&height_of_1, &ops).unwrap(), 3);
    assert_eq!(ds.get_count_query(&height_of_35).unwrap(), 3);

    let ops = ds.create_update_operations::<Rectangle>().dec_by("height", &2.5).unwrap();
    assert_updated(&ds.update(&height_of_35, &ops).unwrap(), 3);
    assert_eq!(ds.get_count_query(&height_of_1).unwrap(), 3);

    let ops = ds
        .create_update_operations::<Rectangle>()
        .set("height", &1.0)
        .unwrap()
        .inc_by("width", &20.0)
        .unwrap();
    ds.update(&ds.find(), &ops).unwrap();
    assert_eq!(ds.get_count::<Rectangle>().unwrap(), 5);
    assert!(ds.find::<Rectangle>().filter("width", 1.0).get().unwrap().is_none());
    assert!(ds.find::<Rectangle>().filter("width", 30.0).get().unwrap().is_some());

    let ops = ds.create_update_operations::<Rectangle>().set("height", &2.0).unwrap().set("width", &2.0).unwrap();
    ds.update(&ds.find().filter("width", 30.0), &ops).unwrap();
    assert!(ds.find::<Rectangle>().filter("width", 30.0).get().unwrap().is_none());
    assert!(ds.find::<Rectangle>().filter("width", 2.0).get().unwrap().is_some());

    let ops = ds.create_update_operations::<Rectangle>();
    assert!(ops.clone().dec_by("height", &1).is_ok());
    assert!(ops.clone().dec_by("height", &i64::MAX).is_ok());
    assert!(ops.clone().dec_by("height", &1.5f32).is_ok());
    assert!(ops.clone().dec_by("height", &f64::MAX).is_ok());
    assert!(matches!(ops.clone().dec_by("height", &Counter { value: 1 }), Err(OdmError::IllegalArgument(_))));
    assert!(matches!(ops.dec_by("height", "1"), Err(OdmError::IllegalArgument(_))));
}

#[test]
fn upsert_inserts_when_nothing_matches() {
    let ds = datastore();
    let ops = ds.create_update_operations::<Circle>().inc_by("radius", &1.0).unwrap();
    let query = ds.find::<Circle>().field("radius").equal(0);
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());
    assert_eq!(ds.get_count::<Circle>().unwrap(), 2);
}

#[test]
fn upsert_keeps_reference_from_filter() {
    let ds = datastore();
    let mut pic = Pic { name: "fist".into(), ..Pic::default() };
    let key = ds.save(&mut pic).unwrap();

    let query = ds.find::<ContainsPic>().filter("name", "first").filter("pic", &key);
    let ops = ds.create_update_operations::<ContainsPic>().set("name", "A").unwrap();
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());
    assert_eq!(ds.find::<ContainsPic>().count().unwrap(), 1);
    ds.delete(&ds.find::<ContainsPic>()).unwrap();

    let query = ds.find::<ContainsPic>().filter("name", "first").filter("pic", &key);
    let ops = ds.create_update_operations::<ContainsPic>().set("name", "second").unwrap();
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());
    assert_eq!(ds.find::<ContainsPic>().count().unwrap(), 1);

    let stored = ds.find::<ContainsPic>().get().unwrap().unwrap();
    assert_eq!(stored.name, "second");
    let pic_key = stored.pic.unwrap();
    assert_eq!(pic_key, key);
    assert_eq!(ds.get_by_key(&pic_key).unwrap().unwrap().name, "fist");
}

#[test]
fn set_on_insert_applies_only_when_inserting() {
    let ds = datastore();
    let id = ObjectId::new();
    let query = ds.find::<Circle>().field("id").equal(id);

    let ops = ds.create_update_operations::<Circle>().set_on_insert("radius", &2.0).unwrap();
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());
    assert_updated(&ds.update_with(&query, &ops, &upsert()).unwrap(), 1);

    let circle: Circle = ds.get(id).unwrap().unwrap();
    assert!((circle.radius - 2.0).abs() < f64::EPSILON);
}

#[test]
fn max_keeps_the_larger_value() {
    let ds = datastore();
    let id = ObjectId::new();
    let query = ds.find::<Circle>().field("id").equal(id);

    let ops = ds.create_update_operations::<Circle>().set_on_insert("radius", &2.0).unwrap();
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());

    let ops = ds.create_update_operations::<Circle>().max("radius", &1.0).unwrap();
    assert_updated(&ds.update_with(&query, &ops, &upsert()).unwrap(), 1);
    let circle: Circle = ds.get(id).unwrap().unwrap();
    assert!((circle.radius - 2.0).abs() < f64::EPSILON);

    let ops = ds.create_update_operations::<Circle>().max("radius", &5.0).unwrap();
    assert_updated(&ds.update_with(&query, &ops, &upsert()).unwrap(), 1);
    let circle: Circle = ds.get(id).unwrap().unwrap();
    assert!((circle.radius - 5.0).abs() < f64::EPSILON);
}

#[test]
fn min_keeps_the_smaller_value() {
    let ds = datastore();
    let id = ObjectId::new();
    let query = ds.find::<Circle>().field("id").equal(id);

    let ops = ds.create_update_operations::<Circle>().set_on_insert("radius", &3.0).unwrap();
    assert_inserted(&ds.update_with(&query, &ops, &upsert()).unwrap());

    let ops = ds.create_update_operations::<Circle>().min("radius", &5.0).unwrap();
    assert_updated(&ds.update_with(&query, &ops, &upsert()).unwrap(), 1);
    let circle: Circle = ds.get(id).unwrap().unwrap();
    assert!((circle.radius - 3.0).abs() < f64::EPSILON);

    let ops = ds.create_update_operations::<Circle>().min("radius", &2.0).unwrap();
    assert_updated(&ds.update_with(&query, &ops, &upsert()).unwrap(), 1);
    let circle: Circle = ds.get(id).unwrap().unwrap();
    assert!((circle.radius - 2.0).abs() < f64::EPSILON);
}

#[test]
fn push_appends_or_inserts_at_position() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();
    let query = ds.find::<ContainsIntArray>();

    let ops = ds.create_update_operations::<ContainsIntArray>().push("values", &4).unwrap();
    ds.update(&query, &ops).unwrap();
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4]);

    ds.update(&query, &ops).unwrap();
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 4]);

    let ops = ds.create_update_operations::<ContainsIntArray>().push_all("values", [5, 6]).unwrap();
    ds.update(&query, &ops).unwrap();
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 3, 4, 4, 5, 6]);

    let ops = ds
        .create_update_operations::<ContainsIntArray>()
        .push_with("values", &12, PushOptions::new().position(2))
        .unwrap();
    ds.update(&query, &ops).unwrap();
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 12, 3, 4, 4, 5, 6]);

    let ops = ds
        .create_update_operations::<ContainsIntArray>()
        .push_all_with("values", [99, 98, 97], PushOptions::new().position(4))
        .unwrap();
    ds.update(&query, &ops).unwrap();
    assert_eq!(stored_values(&ds, &c), vec![1, 2, 12, 3, 99, 98, 97, 4, 4, 5, 6]);
}

fn saved_logs(ds: &odmlite::Datastore, now: DateTime) -> EntityLogs {
    let mut logs = EntityLogs::default();
    for i in 1..=6 {
        logs.logs.push(EntityLog::new(&format!("log{}", (i - 1) % 3 + 1), now));
    }
    ds.save(&mut logs).unwrap();
    logs
}

#[test]
fn remove_all_pulls_matching_embedded_entities() {
    let ds = datastore();
    let now = DateTime::now();
    let logs = saved_logs(&ds, now);

    let ops = ds.create_update_operations::<EntityLogs>().remove_all("logs", &EntityLog::new("log3", now)).unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);

    let updated = ds.get_entity(&logs).unwrap().unwrap();
    let values: Vec<_> = updated.logs.iter().map(|l| l.value.as_str()).collect();
    assert_eq!(values, vec!["log1", "log2", "log1", "log2"]);
}

#[test]
fn remove_all_values_pulls_every_listed_entity() {
    let ds = datastore();
    let now = DateTime::now();
    let logs = saved_logs(&ds, now);

    let ops = ds
        .create_update_operations::<EntityLogs>()
        .remove_all_values("logs", [EntityLog::new("log3", now), EntityLog::new("log1", now)])
        .unwrap();
    assert_updated(&ds.update(&ds.find(), &ops).unwrap(), 1);

    let updated = ds.get_entity(&logs).unwrap().unwrap();
    let values: Vec<_> = updated.logs.iter().map(|l| l.value.as_str()).collect();
    assert_eq!(values, vec!["log2", "log2"]);
}

#[test]
fn positional_update_after_array_match() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();

    let query = ds.find::<ContainsIntArray>().filter("id", c.id.unwrap()).filter("values", 2);
    let ops = ds.create_update_operations::<ContainsIntArray>().set("values.$", &5).unwrap();
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![1, 5, 3]);
}

#[test]
fn positional_update_of_embedded_field() {
    let ds = datastore();
    let mut parent = Parent {
        children: vec![Child::new("Anthony", "Child"), Child::new("Bob", "originalLastName")],
        ..Parent::default()
    };
    ds.save(&mut parent).unwrap();

    let query = ds
        .find::<Parent>()
        .field("id")
        .equal(parent.id.unwrap())
        .field("children.first")
        .equal("Bob");
    let ops = ds.create_update_operations::<Parent>().set("children.$.last", "updated").unwrap();
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);

    let stored = ds.get_entity(&parent).unwrap().unwrap();
    assert!(stored.children.contains(&Child::new("Bob", "updated")));
    assert!(stored.children.contains(&Child::new("Anthony", "Child")));
}

#[test]
fn remove_first_and_last() {
    let ds = datastore();
    let mut c = ContainsIntArray::default();
    ds.save(&mut c).unwrap();
    let query = ds.find::<ContainsIntArray>();

    let ops = ds.create_update_operations::<ContainsIntArray>().remove_first("values");
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![2, 3]);

    let ops = ds.create_update_operations::<ContainsIntArray>().remove_last("values");
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);
    assert_eq!(stored_values(&ds, &c), vec![2]);
}

#[test]
fn set_then_unset() {
    let ds = datastore();
    let key = ds.save(&mut Circle::new(1.0)).unwrap();

    let ops = ds.create_update_operations::<Circle>().set("radius", &2.0).unwrap();
    let result = ds.update_with(&ds.find().filter("radius", 1.0), &ops, &UpdateOptions::default()).unwrap();
    assert_updated(&result, 1);
    assert!((ds.get_by_key(&key).unwrap().unwrap().radius - 2.0).abs() < f64::EPSILON);

    let ops = ds.create_update_operations::<Circle>().unset("radius");
    let result = ds.update_with(&ds.find().filter("radius", 2.0), &ops, &UpdateOptions::default()).unwrap();
    assert_updated(&result, 1);
    assert!(ds.get_by_key(&key).unwrap().unwrap().radius.abs() < f64::EPSILON);
}

#[test]
fn set_references_and_reference_lists() {
    let ds = datastore();
    let mut cp = ContainsPic { name: "cp one".into(), ..ContainsPic::default() };
    ds.save(&mut cp).unwrap();
    let mut pic = Pic { name: "some pic".into(), ..Pic::default() };
    let key = ds.save(&mut pic).unwrap();

    let query = ds.find::<ContainsPic>().filter("name", "cp one");
    let ops = ds.create_update_operations::<ContainsPic>().set("pic", &key).unwrap();
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);
    assert_eq!(ds.get_entity(&cp).unwrap().unwrap().pic, Some(key.clone()));

    let ops = ds.create_update_operations::<ContainsPic>().set("keys", &vec![key.clone()]).unwrap();
    assert_updated(&ds.update(&query, &ops).unwrap(), 1);
    assert_eq!(ds.get_entity(&cp).unwrap().unwrap().keys, vec![key]);
}

#[test]
fn class_names_follow_validation() {
    let ds = datastore();
    let child = Child::new("Anthony", "Child");

    let doc = ds.create_update_operations::<Parent>().remove_all("children", &child).unwrap().to_document().unwrap();
    assert!(!doc.get_document("$pull").unwrap().get_document("children").unwrap().contains_key("className"));

    let doc = ds
        .create_update_operations::<Parent>()
        .disable_validation()
        .remove_all("children", &child)
        .unwrap()
        .to_document()
        .unwrap();
    assert!(!doc.get_document("$pull").unwrap().get_document("children").unwrap().contains_key("className"));

    let doc = ds
        .create_update_operations::<Parent>()
        .disable_validation()
        .remove_all("c", &child)
        .unwrap()
        .to_document()
        .unwrap();
    assert!(doc.get_document("$pull").unwrap().get_document("c").unwrap().contains_key("className"));
}

#[test]
fn bad_field_names_fail_before_storage() {
    let ds = datastore();
    let ops = ds.create_update_operations::<Circle>().inc_by("r", &1.0).unwrap();
    let err = ds.update(&ds.find::<Circle>().field("radius").equal(0), &ops).unwrap_err();
    assert!(matches!(err, OdmError::InvalidFieldPath { .. }), "{err}");
    assert_eq!(ds.get_count::<Circle>().unwrap(), 0);
}

#[test]
fn paths_through_references_fail_at_the_call() {
    let ds = datastore();
    let err = ds.create_update_operations::<ContainsPic>().set("pic.name", "x").unwrap_err();
    assert!(matches!(err, OdmError::InvalidFieldPath { ref path, .. } if path == "pic.name"), "{err}");
    let err = ds.create_update_operations::<ContainsPic>().disable_validation().push("keys.name", "x").unwrap_err();
    assert!(matches!(err, OdmError::InvalidFieldPath { .. }), "{err}");

    let ops = ds.create_update_operations::<ContainsPic>().unset("pic.name").set("name", "kept").unwrap();
    assert!(matches!(ops.to_document(), Err(OdmError::InvalidFieldPath { .. })));

    let ops = ds.create_update_operations::<ContainsPic>().set("pic", &Key::<Pic>::new("pics", 1)).unwrap();
    assert!(ops.to_document().is_ok());
}

#[test]
fn isolated_updates_still_apply() {
    let ds = datastore();
    let ops = ds.create_update_operations::<Circle>().inc_by("radius", &1.0).unwrap();
    assert!(!ops.is_isolated());
    let ops = ops.isolated();
    assert!(ops.is_isolated());
    assert!(ops.to_document().unwrap().get_bool("$isolated").unwrap());

    let options = upsert().write_concern(WriteConcern::acknowledged());
    assert_inserted(&ds.update_with(&ds.find().field("radius").equal(0), &ops, &options).unwrap());
}

#[test]
fn empty_operations_are_rejected() {
    let ds = datastore();
    let ops = ds.create_update_operations::<Circle>();
    assert!(ops.is_empty());
    assert!(matches!(ds.update(&ds.find(), &ops), Err(OdmError::IllegalArgument(_))));
}
