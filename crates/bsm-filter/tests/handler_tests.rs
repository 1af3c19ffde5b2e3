//! End-to-end tests for the streaming BSM handler against a small
//! university-campus geofence.

use std::sync::Arc;

use bsm_filter::handler::{GEOFENCE_FILTER, ID_REDACT, VELOCITY_FILTER};
use bsm_filter::{BsmHandler, ConfigMap, Geofence, ResultStatus};
use cv_geo::entity::Shape;
use cv_geo::{Edge, Point, Quad, RoadClass, RoadNetwork};

/// Six secondary-road edges around the UT campus, inserted into a quad
/// covering the neighborhood.
fn campus_geofence() -> Arc<Geofence> {
    let mut net = RoadNetwork::new();
    let (a, _) = net.intern(1, 35.952500, -83.932434);
    let (b, _) = net.intern(2, 35.948878, -83.928081);
    let (c, _) = net.intern(3, 35.950715, -83.934971);
    let (d, _) = net.intern(4, 35.953302, -83.931344);
    let (e, _) = net.intern(5, 35.952175, -83.936688);
    let (f, _) = net.intern(6, 35.949813, -83.936214);
    let (g, _) = net.intern(7, 35.948272, -83.934421);

    let edges = [
        Edge::new(1, a, b, RoadClass::Secondary).unwrap(),
        Edge::new(2, c, a, RoadClass::Secondary).unwrap(),
        Edge::new(3, d, a, RoadClass::Secondary).unwrap(),
        Edge::new(4, e, c, RoadClass::Secondary).unwrap(),
        Edge::new(5, f, g, RoadClass::Secondary).unwrap(),
        Edge::new(6, f, c, RoadClass::Secondary).unwrap(),
    ];

    let mut quad = Quad::new(
        Point::new(35.946920, -83.938486),
        Point::new(35.955526, -83.926738),
    );
    for edge in edges {
        assert!(quad.insert(&net, Arc::new(Shape::Edge(edge))));
    }
    Arc::new(Geofence::new(quad, net))
}

fn campus_config() -> ConfigMap {
    ConfigMap::from([
        ("privacy.filter.velocity".to_string(), "ON".to_string()),
        ("privacy.redaction.id".to_string(), "ON".to_string()),
        ("privacy.redaction.id.inclusions".to_string(), "ON".to_string()),
        ("privacy.filter.geofence".to_string(), "ON".to_string()),
        ("privacy.filter.velocity.min".to_string(), "2.235".to_string()),
        ("privacy.filter.velocity.max".to_string(), "35.763".to_string()),
        ("privacy.redaction.id.value".to_string(), "FFFFFFFF".to_string()),
        ("privacy.redaction.id.included".to_string(), "B1,B2".to_string()),
        ("privacy.filter.geofence.extension".to_string(), "5.2".to_string()),
    ])
}

fn campus_handler() -> BsmHandler {
    BsmHandler::new(Some(campus_geofence()), &campus_config())
}

/// A compact BSM with the position object ahead of the speed member.
fn bsm_json(id: &str, lat: f64, lon: f64, speed: f64) -> String {
    format!(
        "{{\"coreData\":{{\"msgCnt\":1,\"id\":\"{id}\",\"secMark\":36799,\
         \"position\":{{\"latitude\":{lat},\"longitude\":{lon},\"elevation\":1896.9}},\
         \"accelSet\":{{\"accelYaw\":0.00}},\"accuracy\":{{}},\"speed\":{speed},\
         \"heading\":321.0125,\"size\":{{}}}}}}"
    )
}

// A full-fat message with nested arrays, pass-through members, and numbers
// carrying trailing zeros.
const RICH_BSM: &str = "{\"coreData\":{\"msgCnt\":8,\"id\":\"G0\",\"secMark\":36799,\"position\":{\"latitude\":35.94911,\"longitude\":-83.928343,\"elevation\":1896.9},\"accelSet\":{\"accelYaw\":0.00},\"accuracy\":{},\"speed\":22.00,\"heading\":321.0125,\"brakes\":{\"wheelBrakes\":{\"leftFront\":false,\"rightFront\":false,\"unavailable\":false,\"leftRear\":false,\"rightRear\":true},\"traction\":\"unavailable\",\"abs\":\"unavailable\",\"scs\":\"unavailable\",\"brakeBoost\":\"unavailable\",\"auxBrakes\":\"unavailable\"},\"size\":{}},\"partII\":[{\"id\":\"vehicleSafetyExt\",\"value\":{\"pathHistory\":{\"crumbData\":[{\"elevationOffset\":9.5,\"latOffset\":0.0000035,\"lonOffset\":0.0131071,\"timeOffset\":33.20},{\"elevationOffset\":4.6,\"latOffset\":0.0000740,\"lonOffset\":0.0131071,\"timeOffset\":44.60}]},\"pathPrediction\":{\"confidence\":0.0,\"radiusOfCurve\":0.0}}}]}";

#[test]
fn test_handler_instantiation() {
    let handler = campus_handler();
    assert_eq!(handler.result(), ResultStatus::Success);
    assert!(handler.is_active(VELOCITY_FILTER));
    assert!(handler.is_active(GEOFENCE_FILTER));
    assert!(handler.is_active(ID_REDACT));
    assert!(handler.current_key().is_empty());
    assert!(handler.object_stack().is_empty());
    assert!(handler.tokens().is_empty());
    assert!(handler.json().is_empty());
    assert_eq!(handler.box_extension(), 5.2);
}

#[test]
fn test_flag_switches() {
    let mut handler = campus_handler();
    handler.deactivate(VELOCITY_FILTER);
    assert!(!handler.is_active(VELOCITY_FILTER));
    handler.deactivate(GEOFENCE_FILTER);
    handler.deactivate(ID_REDACT);
    assert_eq!(handler.activation_flags(), 0);
    handler.activate(GEOFENCE_FILTER);
    assert!(handler.is_active(GEOFENCE_FILTER));
}

#[test]
fn test_reset_clears_message_state() {
    let mut handler = campus_handler();
    assert!(handler.process(RICH_BSM));
    assert!(!handler.json().is_empty());

    handler.reset();
    assert_eq!(handler.result(), ResultStatus::Success);
    assert!(handler.current_key().is_empty());
    assert!(handler.object_stack().is_empty());
    assert!(handler.tokens().is_empty());
    assert!(handler.json().is_empty());
    assert_eq!(handler.box_extension(), 5.2);
}

#[test]
fn test_retained_inside_fence() {
    let mut handler = campus_handler();
    let msg = bsm_json("G0", 35.94911, -83.928343, 22.0);
    assert!(handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Success);
    // Untouched id, byte-identical reconstruction.
    assert_eq!(handler.json(), msg);
    assert_eq!(handler.bsm().id(), "G0");
}

#[test]
fn test_included_id_redacted() {
    let mut handler = campus_handler();
    let msg = bsm_json("B1", 35.951084, -83.930725, 10.0);
    assert!(handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Success);
    assert_eq!(handler.bsm().id(), "FFFFFFFF");
    assert_eq!(handler.json(), msg.replace("\"B1\"", "\"FFFFFFFF\""));
}

#[test]
fn test_speed_latches_after_position_passes() {
    let mut handler = campus_handler();
    // Inside the fence, speed out of band; position comes first in the JSON
    // so the geofence passes and the velocity filter latches.
    let msg = bsm_json("B1", 35.951084, -83.930725, 99.0);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Speed);

    let msg = bsm_json("G0", 35.949811, -83.92909, 0.5);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Speed);
}

#[test]
fn test_geoposition_latches_outside_fence() {
    let mut handler = campus_handler();
    let msg = bsm_json("G0", 35.9493, -83.927489, 22.0);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
}

#[test]
fn test_geoposition_wins_over_speed_when_position_first() {
    let mut handler = campus_handler();
    // Outside the fence with an out-of-band speed: position appears first,
    // so the geofence reason is latched and never overwritten.
    let msg = bsm_json("B1", 35.948337, -83.928826, 99.0);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
}

#[test]
fn test_malformed_json_is_parse_failure() {
    let mut handler = campus_handler();
    for bad in ["", "kasjdflajsl\":dfjsl", "{:{},{:},{{},:}}", "{\u{0}\u{1}\u{3}}"] {
        assert!(!handler.process(bad), "{bad:?}");
        assert_eq!(handler.result(), ResultStatus::Parse);
    }
}

#[test]
fn test_suppressed_output_is_prefix_before_failing_token() {
    let mut handler = campus_handler();

    // Velocity latch: the output ends right before the speed scalar.
    let msg = bsm_json("G0", 35.94911, -83.928343, 99.0);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Speed);
    let cut = msg.find("\"speed\":").unwrap() + "\"speed\":".len();
    assert_eq!(handler.json(), &msg[..cut]);

    // Geofence latch: the output ends right before the longitude scalar.
    let msg = bsm_json("G0", 35.9493, -83.927489, 22.0);
    assert!(!handler.process(&msg));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
    let cut = msg.find("\"longitude\":").unwrap() + "\"longitude\":".len();
    assert_eq!(handler.json(), &msg[..cut]);
}

#[test]
fn test_rich_message_round_trips_exactly() {
    let mut handler = campus_handler();
    assert!(handler.process(RICH_BSM));
    assert_eq!(handler.json(), RICH_BSM);
}

#[test]
fn test_no_flags_passes_everything() {
    let mut handler = campus_handler();
    handler.deactivate(VELOCITY_FILTER);
    handler.deactivate(GEOFENCE_FILTER);
    handler.deactivate(ID_REDACT);

    for (id, lat, lon, speed) in [
        ("G0", 35.94911, -83.928343, 22.0),
        ("B1", 35.951084, -83.930725, 10.0),
        ("G0", 35.9493, -83.927489, 99.0),
        ("G2", 35.962259, -83.914569, 0.5),
    ] {
        let msg = bsm_json(id, lat, lon, speed);
        assert!(handler.process(&msg));
        assert_eq!(handler.result(), ResultStatus::Success);
        // With redaction off the id value is untouched.
        assert_eq!(handler.bsm().id(), id);
        assert_eq!(handler.json(), msg);
    }
}

#[test]
fn test_velocity_filter_alone() {
    let mut handler = campus_handler();
    handler.deactivate(GEOFENCE_FILTER);
    handler.deactivate(ID_REDACT);

    // Out-of-fence positions are ignored; only the band matters.
    let ok = bsm_json("G2", 35.962259, -83.914569, 22.0);
    assert!(handler.process(&ok));

    for speed in [0.5, 99.0, 2.0] {
        let msg = bsm_json("G0", 35.94911, -83.928343, speed);
        assert!(!handler.process(&msg));
        assert_eq!(handler.result(), ResultStatus::Speed);
    }

    // Band endpoints retain.
    for speed in [2.235, 35.763] {
        let msg = bsm_json("G0", 35.94911, -83.928343, speed);
        assert!(handler.process(&msg), "{speed}");
    }
}

#[test]
fn test_geofence_filter_alone() {
    let mut handler = campus_handler();
    handler.deactivate(VELOCITY_FILTER);
    handler.deactivate(ID_REDACT);

    for (lat, lon) in [
        (35.94911, -83.928343),
        (35.952555, -83.932468),
        (35.949821, -83.936279),
        (35.951501, -83.935851),
    ] {
        let msg = bsm_json("G2", lat, lon, 22.0);
        assert!(handler.process(&msg), "{lat},{lon}");
    }

    for (lat, lon) in [
        (35.9493, -83.927489),
        (35.950668, -83.931295),
        (35.962259, -83.914569),
    ] {
        let msg = bsm_json("G2", lat, lon, 22.0);
        assert!(!handler.process(&msg), "{lat},{lon}");
        assert_eq!(handler.result(), ResultStatus::Geoposition);
    }

    // Bad speeds pass when only the geofence is on.
    let msg = bsm_json("G0", 35.949811, -83.92909, 0.5);
    assert!(handler.process(&msg));
}

#[test]
fn test_id_redaction_alone() {
    let mut handler = campus_handler();
    handler.deactivate(VELOCITY_FILTER);
    handler.deactivate(GEOFENCE_FILTER);

    for id in ["B1", "B2"] {
        let msg = bsm_json(id, 35.962259, -83.914569, 99.0);
        assert!(handler.process(&msg));
        assert_eq!(handler.bsm().id(), "FFFFFFFF");
    }
    for id in ["G0", "G2"] {
        let msg = bsm_json(id, 35.962259, -83.914569, 99.0);
        assert!(handler.process(&msg));
        assert_eq!(handler.bsm().id(), id);
    }
}

#[test]
fn test_individual_shape_containment() {
    let handler = campus_handler();
    // On the Summit St edge.
    assert!(handler.is_within_entity(&Point::new(35.951090, -83.930716)));
    // On the 20th St / Andy Holt edge.
    assert!(handler.is_within_entity(&Point::new(35.951181, -83.935486)));
    // Near the boundary of that edge's area; the 5.2 m extension keeps it in.
    assert!(handler.is_within_entity(&Point::new(35.951181, -83.935456)));
    // Outside the quad bounds entirely.
    assert!(!handler.is_within_entity(&Point::new(35.964, -83.926)));
}

#[test]
fn test_manual_event_stream_latching() {
    let mut handler = campus_handler();
    handler.reset();
    use bsm_filter::events::EventSink;

    assert!(handler.start_object());
    assert_eq!(handler.object_stack(), [""]);

    assert!(handler.key("coreData"));
    assert_eq!(handler.current_key(), "coreData");
    assert!(!handler.next_value_is_filter_field());

    assert!(handler.start_object());
    assert_eq!(handler.object_stack(), ["", "coreData"]);

    assert!(handler.key("id"));
    assert!(handler.next_value_is_filter_field());
    assert!(handler.string_value("string"));
    assert_eq!(handler.tokens().last().unwrap(), "\"string\"");
    assert_eq!(handler.bsm().id(), "string");
    assert!(!handler.next_value_is_filter_field());

    assert!(handler.key("position"));
    assert!(!handler.next_value_is_filter_field());
    assert!(handler.start_object());
    assert_eq!(handler.object_stack(), ["", "coreData", "position"]);

    assert!(handler.key("latitude"));
    assert!(handler.next_value_is_filter_field());
    assert!(handler.number_value("1.1"));
    assert_eq!(handler.bsm().lat, 1.1);

    assert!(handler.key("longitude"));
    assert!(handler.next_value_is_filter_field());
    // Both coordinates are now known and (1.1, 2.2) is far outside the
    // fence: the geofence latches on this very token.
    assert!(!handler.number_value("2.2"));
    assert_eq!(handler.bsm().lon, 2.2);
    assert_eq!(handler.result(), ResultStatus::Geoposition);
    assert!(handler.json().ends_with("\"longitude\":"));

    // Latched: callbacks keep the stack consistent but return false.
    assert!(!handler.end_object(2));
    assert_eq!(handler.object_stack(), ["", "coreData"]);

    assert!(!handler.key("speed"));
    assert!(handler.next_value_is_filter_field());
    assert!(!handler.number_value("99.9"));
    // The value is still captured, but the first reason is preserved.
    assert_eq!(handler.bsm().velocity(), 99.9);
    assert_eq!(handler.result(), ResultStatus::Geoposition);

    assert!(!handler.end_object(6));
    assert_eq!(handler.object_stack(), [""]);
    assert!(!handler.end_object(1));
    assert!(handler.object_stack().is_empty());
}

#[test]
fn test_process_prefix_for_interleaved_orders() {
    let mut handler = campus_handler();

    let json_geo = "{\"coreData\":{\"id\":\"string\",\"position\":{\"latitude\":1.1,\"longitude\":2.2},\"speed\":99.9,\"F6\":{}}}";
    assert!(!handler.process(json_geo));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
    assert_eq!(handler.json(), &json_geo[..json_geo.find("2.2").unwrap()]);

    let json_spd = "{\"coreData\":{\"id\":\"string\",\"speed\":99.9,\"position\":{\"latitude\":1.1,\"longitude\":2.2},\"F6\":{}}}";
    assert!(!handler.process(json_spd));
    assert_eq!(handler.result(), ResultStatus::Speed);
    assert_eq!(handler.json(), &json_spd[..json_spd.find("99.9").unwrap()]);
}

#[test]
fn test_messages_without_filter_fields_pass() {
    let mut handler = campus_handler();
    // No coreData at all: nothing to filter, the document passes through.
    let msg = "{\"other\":{\"id\":\"B1\",\"speed\":999.0},\"list\":[1,2,3]}";
    assert!(handler.process(msg));
    assert_eq!(handler.json(), msg);
    // Fields outside coreData/position are never captured.
    assert_eq!(handler.bsm().id(), "UNASSIGNED");
    assert_eq!(handler.bsm().velocity(), -1.0);
}
