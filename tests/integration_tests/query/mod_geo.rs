use bson::doc;
use odmlite::OdmError;
use odmlite::geo::{Crs, Geometry, LegacyPoint, Shape};

use crate::integration_tests::_support::*;

fn square() -> Geometry {
    Geometry::polygon(vec![vec![[0.0, 0.0], [0.0, 5.0], [5.0, 5.0], [5.0, 0.0], [0.0, 0.0]]]).unwrap()
}

#[test]
fn near_without_distance_has_no_max_distance() {
    let ds = datastore();
    let q = ds.find::<Area>().field("area").near(Geometry::point(1.0, 2.0));
    assert_eq!(
        q.to_filter().unwrap(),
        doc! {"area": {"$near": {"$geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}}}
    );
}

#[test]
fn near_with_distance() {
    let ds = datastore();
    let q = ds.find::<Area>().field("area").near_within(Geometry::point(1.0, 2.0), 20.0);
    assert_eq!(
        q.to_filter().unwrap(),
        doc! {"area": {"$near": {"$geometry": {"type": "Point", "coordinates": [1.0, 2.0]}, "$maxDistance": 20.0}}}
    );
}

#[test]
fn negative_distance_is_rejected() {
    let ds = datastore();
    let q = ds.find::<Area>().field("area").near_within(Geometry::point(1.0, 2.0), -1.0);
    assert!(matches!(q.to_filter(), Err(OdmError::IllegalArgument(_))));
}

#[test]
fn within_and_intersects_wrap_geometry() {
    let ds = datastore();
    let polygon = doc! {
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [0.0, 5.0], [5.0, 5.0], [5.0, 0.0], [0.0, 0.0]]],
    };
    let q = ds.find::<Area>().field("area").within(square());
    assert_eq!(q.to_filter().unwrap(), doc! {"area": {"$geoWithin": {"$geometry": polygon.clone()}}});
    let q = ds.find::<Area>().field("area").intersects(square());
    assert_eq!(q.to_filter().unwrap(), doc! {"area": {"$geoIntersects": {"$geometry": polygon}}});
}

#[test]
fn custom_crs_is_carried_in_the_geometry() {
    let ds = datastore();
    let q = ds.find::<Area>().field("area").within_crs(square(), Crs::big_polygon());
    let filter = q.to_filter().unwrap();
    let geometry = filter
        .get_document("area")
        .and_then(|d| d.get_document("$geoWithin"))
        .and_then(|d| d.get_document("$geometry"))
        .unwrap();
    assert_eq!(geometry.get_str("type").unwrap(), "Polygon");
    assert_eq!(
        geometry.get_document("crs").unwrap(),
        &doc! {"type": "name", "properties": {"name": Crs::big_polygon().name()}}
    );
}

#[test]
fn legacy_near_and_shapes() {
    let ds = datastore();
    let q = ds.find::<Area>().disable_validation().field("loc").near_legacy(1.0, 2.0, None);
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$near": [1.0, 2.0]}});

    let q = ds.find::<Area>().disable_validation().field("loc").near_sphere(1.0, 2.0, Some(0.5));
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$nearSphere": [1.0, 2.0], "$maxDistance": 0.5}});

    let shape = Shape::Box { bottom_left: LegacyPoint::new(0.0, 0.0), upper_right: LegacyPoint::new(3.0, 3.0) };
    let q = ds.find::<Area>().disable_validation().field("loc").within_shape(shape);
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$geoWithin": {"$box": [[0.0, 0.0], [3.0, 3.0]]}}});

    let shape = Shape::Center { center: LegacyPoint::new(1.0, 1.0), radius: 2.0 };
    let q = ds.find::<Area>().disable_validation().field("loc").within_shape(shape);
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$geoWithin": {"$center": [[1.0, 1.0], 2.0]}}});
}

#[test]
fn geo_words_in_filter_strings() {
    let ds = datastore();
    let q = ds.find::<Area>().disable_validation().filter("loc near", vec![1.0, 2.0]);
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$near": [1.0, 2.0]}});

    let q = ds.find::<Area>().disable_validation().filter("loc nearSphere", vec![1, 2]);
    assert_eq!(q.to_filter().unwrap(), doc! {"loc": {"$nearSphere": [1.0, 2.0]}});

    let polygon = square().to_document().unwrap();
    let q = ds.find::<Area>().filter("area geoWithin", polygon.clone());
    assert_eq!(q.to_filter().unwrap(), doc! {"area": {"$geoWithin": {"$geometry": polygon.clone()}}});
    let q = ds.find::<Area>().filter("area geoIntersects", polygon.clone());
    assert_eq!(q.to_filter().unwrap(), doc! {"area": {"$geoIntersects": {"$geometry": polygon}}});

    let q = ds.find::<Area>().filter("area geoWithin", vec![1.0, 2.0]);
    assert!(matches!(q.to_filter(), Err(OdmError::OperatorValueMismatch { .. })));
}

#[test]
fn geo_criteria_cannot_be_negated() {
    let ds = datastore();
    let q = ds.find::<Area>().field("area").not().near(Geometry::point(0.0, 0.0));
    assert!(matches!(q.to_filter(), Err(OdmError::IllegalArgument(_))));
}

#[test]
fn geo_queries_need_a_geo_capable_store() {
    let ds = datastore();
    ds.save(&mut Area { name: "home".into(), area: Geometry::point(1.0, 1.0) }).unwrap();
    let q = ds.find::<Area>().field("area").near(Geometry::point(1.0, 2.0));
    let err = q.as_list().unwrap_err();
    assert!(err.is_storage(), "{err}");
}
