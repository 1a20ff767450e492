use bson::oid::ObjectId;
use bson::{Bson, doc};
use odmlite::collection::Collation;
use odmlite::query::criteria;
use odmlite::{Criteria, OdmError, Sort};

use crate::integration_tests::_support::*;

#[test]
fn fluent_fields_render_flat() {
    let ds = datastore();
    let q = ds.find::<Person>().field("name").equal("ann").field("age").greater_than_or_eq(18);
    assert_eq!(q.to_filter().unwrap(), doc! {"name": "ann", "age": {"$gte": 18}});
}

#[test]
fn range_on_one_field_merges() {
    let ds = datastore();
    let q = ds.find::<Person>().field("age").greater_than(20).field("age").less_than(30);
    assert_eq!(q.to_filter().unwrap(), doc! {"age": {"$gt": 20, "$lt": 30}});
}

#[test]
fn repeated_equality_falls_back_to_and() {
    let ds = datastore();
    let q = ds.find::<Person>().field("name").equal("ann").field("name").equal("bob");
    assert_eq!(q.to_filter().unwrap(), doc! {"$and": [{"name": "ann"}, {"name": "bob"}]});
}

#[test]
fn id_field_renders_as_underscore_id() {
    let ds = datastore();
    let id = ObjectId::new();
    let q = ds.find::<Person>().field("id").equal(id);
    assert_eq!(q.to_filter().unwrap(), doc! {"_id": id});
}

#[test]
fn legacy_conditions_parse_operators() {
    let ds = datastore();
    assert_eq!(ds.find::<Person>().filter("age >=", 18).to_filter().unwrap(), doc! {"age": {"$gte": 18}});
    assert_eq!(ds.find::<Person>().filter("age<", 65).to_filter().unwrap(), doc! {"age": {"$lt": 65}});
    assert_eq!(ds.find::<Person>().filter("name !=", "x").to_filter().unwrap(), doc! {"name": {"$ne": "x"}});
    assert_eq!(
        ds.find::<Person>().filter("tags in", vec!["dev", "ops"]).to_filter().unwrap(),
        doc! {"tags": {"$in": ["dev", "ops"]}}
    );
    assert_eq!(ds.find::<Person>().filter("name", "ann").to_filter().unwrap(), doc! {"name": "ann"});
}

#[test]
fn legacy_condition_errors_surface_at_render() {
    let ds = datastore();
    let q = ds.find::<Person>().filter("age ~=", 1).field("name").equal("ann");
    assert!(matches!(q.to_filter(), Err(OdmError::UnrecognizedOperator(_))));
    let q = ds.find::<Person>().filter("age > 1", 1);
    assert!(matches!(q.to_filter(), Err(OdmError::UnrecognizedOperator(_))));
    let q = ds.find::<Person>().filter("tags in", 1);
    assert!(matches!(q.to_filter(), Err(OdmError::OperatorValueMismatch { .. })));
}

#[test]
fn negation_wraps_operators() {
    let ds = datastore();
    let q = ds.find::<Person>().field("age").not().greater_than(5);
    assert_eq!(q.to_filter().unwrap(), doc! {"age": {"$not": {"$gt": 5}}});
    let q = ds.find::<Person>().field("name").not().equal("ann");
    assert_eq!(q.to_filter().unwrap(), doc! {"name": {"$ne": "ann"}});
}

#[test]
fn array_operators() {
    let ds = datastore();
    let q = ds.find::<Person>().field("tags").has_any_of(["dev", "sec"]);
    assert_eq!(q.to_filter().unwrap(), doc! {"tags": {"$in": ["dev", "sec"]}});
    let q = ds.find::<Person>().field("tags").has_all_of(["dev", "ops"]);
    assert_eq!(q.to_filter().unwrap(), doc! {"tags": {"$all": ["dev", "ops"]}});
    let q = ds.find::<Person>().field("tags").has_none_of(["sec"]);
    assert_eq!(q.to_filter().unwrap(), doc! {"tags": {"$nin": ["sec"]}});
    let q = ds.find::<Person>().field("tags").size_eq(2);
    assert_eq!(q.to_filter().unwrap(), doc! {"tags": {"$size": 2}});
    let q = ds.find::<Person>().field("age").mod_op(2, 1);
    assert_eq!(q.to_filter().unwrap(), doc! {"age": {"$mod": [2_i64, 1_i64]}});
}

#[test]
fn element_match_on_embedded_list() {
    let ds = datastore();
    let q = ds.find::<Parent>().field("children").has_this_element(doc! {"first": "Bob"});
    assert_eq!(q.to_filter().unwrap(), doc! {"children": {"$elemMatch": {"first": "Bob"}}});
    let q = ds.find::<Parent>().field("children").has_this_element(3);
    assert!(matches!(q.to_filter(), Err(OdmError::OperatorValueMismatch { .. })));
}

#[test]
fn text_helpers_escape_input() {
    let ds = datastore();
    let q = ds.find::<Person>().field("name").starts_with("a.b");
    assert_eq!(q.to_filter().unwrap(), doc! {"name": {"$regex": "^a\\.b"}});
    let q = ds.find::<Person>().field("name").contains_ignore_case("nn");
    assert_eq!(q.to_filter().unwrap(), doc! {"name": {"$regex": "nn", "$options": "i"}});
}

#[test]
fn or_and_nor_groups() {
    let ds = datastore();
    let q = ds.find::<Person>();
    let a = q.criteria("name").equal("ann").unwrap();
    let b = q.criteria("age").greater_than(40).unwrap();
    let q = q.or([a, b]);
    assert_eq!(q.to_filter().unwrap(), doc! {"$or": [{"name": "ann"}, {"age": {"$gt": 40}}]});

    let q = ds.find::<Person>().field("age").less_than(30);
    let c = q.criteria("tags").size_eq(0).unwrap();
    let q = q.nor([c]);
    assert_eq!(q.to_filter().unwrap(), doc! {"age": {"$lt": 30}, "$nor": [{"tags": {"$size": 0}}]});
}

#[test]
fn empty_or_and_nor_are_rejected() {
    let ds = datastore();
    let q = ds.find::<Person>().or(Vec::<Criteria>::new());
    assert_eq!(q.to_filter().unwrap_err(), OdmError::EmptyCriteriaGroup("$or"));
    let q = ds.find::<Person>().nor(Vec::<Criteria>::new());
    assert_eq!(q.to_filter().unwrap_err(), OdmError::EmptyCriteriaGroup("$nor"));
    assert_eq!(ds.find::<Person>().and(Vec::<Criteria>::new()).to_filter().unwrap(), doc! {});
}

#[test]
fn unknown_paths_depend_on_validation() {
    let ds = datastore();
    let q = ds.find::<Person>().field("nickname").equal("x");
    assert!(q.is_validating());
    assert!(matches!(q.to_filter(), Err(OdmError::InvalidFieldPath { .. })));
    let q = q.disable_validation();
    assert_eq!(q.to_filter().unwrap(), doc! {"nickname": "x"});
    let q = q.enable_validation();
    assert!(q.to_filter().is_err());
}

#[test]
fn paths_through_references_fail_regardless_of_validation() {
    let ds = datastore();
    let q = ds.find::<ContainsPic>().field("pic.name").equal("x").disable_validation();
    let err = q.to_filter().unwrap_err();
    assert!(matches!(err, OdmError::InvalidFieldPath { ref path, .. } if path == "pic.name"), "{err}");

    let q = ds.find::<ContainsPic>().disable_validation().filter("keys.name", "x");
    assert!(matches!(q.to_filter(), Err(OdmError::InvalidFieldPath { .. })));

    let detached = criteria("pic.name").equal("x").unwrap();
    let q = ds.find::<ContainsPic>().disable_validation().and([detached]);
    assert!(matches!(q.to_filter(), Err(OdmError::InvalidFieldPath { .. })));

    let q = ds.find::<ContainsPic>().field("pic.$id").equal(1);
    assert_eq!(q.to_filter().unwrap(), doc! {"pic.$id": 1});
}

#[test]
fn rendering_is_repeatable() {
    let ds = datastore();
    let q = ds.find::<Person>().field("age").greater_than(3).filter("tags in", vec!["dev"]).order("-age");
    let first = q.to_filter().unwrap();
    assert_eq!(q.to_filter().unwrap(), first);
    assert_eq!(q.to_sort().unwrap(), q.to_sort().unwrap());
    assert_eq!(q.to_string(), q.to_string());
}

#[test]
fn search_and_where_render_at_top_level() {
    let ds = datastore();
    let q = ds.find::<Person>().search_with_language("hello", "en");
    assert_eq!(q.to_filter().unwrap(), doc! {"$text": {"$search": "hello", "$language": "en"}});
    let q = ds.find::<Person>().where_js("this.age > 3");
    assert_eq!(q.to_filter().unwrap().get("$where"), Some(&Bson::JavaScriptCode("this.age > 3".into())));
}

#[test]
fn sort_projection_and_options() {
    let ds = datastore();
    let q = ds
        .find::<Person>()
        .order("-age, name")
        .project("name", true)
        .project("id", false)
        .limit(10)
        .offset(5)
        .batch_size(2)
        .max_time_ms(250)
        .collation(Collation::locale("en").strength(2));
    let options = q.find_options().unwrap();
    assert_eq!(options.sort, Some(doc! {"age": -1, "name": 1}));
    assert_eq!(options.projection, Some(doc! {"name": 1, "_id": 0}));
    assert_eq!(options.limit, Some(10));
    assert_eq!(options.skip, Some(5));
    assert_eq!(options.batch_size, Some(2));
    assert_eq!(options.max_time_ms, Some(250));
    assert_eq!(options.collation.unwrap().locale, "en");

    let q = ds.find::<Person>().order_by(Sort::natural_descending());
    assert_eq!(q.to_sort().unwrap(), Some(doc! {"$natural": -1}));
}

#[test]
fn bad_sort_and_projection_are_errors() {
    let ds = datastore();
    assert!(ds.find::<Person>().order("-").to_filter().is_err());
    assert!(matches!(ds.find::<Person>().order("shoe").to_sort(), Err(OdmError::InvalidFieldPath { .. })));
    let q = ds.find::<Person>().project("name", true).project("age", false);
    assert!(matches!(q.to_projection(), Err(OdmError::IllegalArgument(_))));
}

#[test]
fn display_shows_extended_json() {
    let ds = datastore();
    let q = ds.find::<Person>().field("age").greater_than(3);
    assert_eq!(q.to_string(), r#"{"age":{"$gt":3}}"#);
    let q = ds.find::<Person>().field("nope").equal(1);
    assert!(q.to_string().starts_with("<invalid query"));
}
