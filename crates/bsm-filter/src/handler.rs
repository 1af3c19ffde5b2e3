//! The streaming BSM handler.
//!
//! [`BsmHandler`] sits between the event reader and the filters. As tokens
//! arrive it mirrors them into an output buffer (so a surviving message is
//! republished byte for byte, modulo id redaction), captures the fields the
//! filters need, and evaluates each filter the instant its inputs are
//! complete. The first failing filter latches a [`ResultStatus`]; later
//! evaluations never overwrite it. Once latched, callbacks return `false` so
//! the reader aborts, leaving the output buffer holding the valid prefix
//! that ends immediately before the offending token.

use std::sync::Arc;

use tracing::trace;

use cv_geo::entity::Shape;
use cv_geo::{Point, Quad, RoadNetwork};

use crate::bsm::Bsm;
use crate::events::{EventSink, JsonReader, ReadOutcome};
use crate::filters::{IdRedactor, VelocityFilter};
use crate::ConfigMap;

/// Activation bits for the three filter stages.
pub const VELOCITY_FILTER: u32 = 1 << 0;
pub const GEOFENCE_FILTER: u32 = 1 << 1;
pub const ID_REDACT: u32 = 1 << 2;
pub const ALL_FILTERS: u32 = VELOCITY_FILTER | GEOFENCE_FILTER | ID_REDACT;

/// Outcome of processing one message; the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    /// The JSON itself would not parse.
    Parse,
    /// Suppressed by the velocity filter.
    Speed,
    /// Suppressed by the geofence filter.
    Geoposition,
    Other,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Parse => "parse",
            ResultStatus::Speed => "speed",
            ResultStatus::Geoposition => "geoposition",
            ResultStatus::Other => "other",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The read-only spatial side of the geofence: the quadtree plus the vertex
/// arena its edges resolve against. Built once at startup and shared.
#[derive(Debug)]
pub struct Geofence {
    quad: Quad,
    network: RoadNetwork,
}

impl Geofence {
    pub fn new(quad: Quad, network: RoadNetwork) -> Self {
        Self { quad, network }
    }

    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    /// True when some candidate shape at `p` actually contains it. Edges are
    /// widened to their road-class width and stretched by `extension` meters
    /// at both ends.
    pub fn contains(&self, p: &Point, extension: f64) -> bool {
        self.quad.retrieve_elements(p).iter().any(|shape| {
            match shape.as_ref() {
                Shape::Edge(e) => e
                    .to_area(&self.network, extension)
                    .map(|a| a.contains(p))
                    .unwrap_or(false),
                other => other.contains(&self.network, p),
            }
        })
    }
}

/// Streaming filter state for one message at a time.
pub struct BsmHandler {
    flags: u32,
    velocity_filter: VelocityFilter,
    id_redactor: IdRedactor,
    geofence: Option<Arc<Geofence>>,
    box_extension: f64,

    bsm: Bsm,
    result: ResultStatus,
    object_stack: Vec<String>,
    current_key: String,
    tokens: Vec<String>,
    output: String,
    next_value_is_filter_field: bool,
    /// True right after an opening brace/bracket or a key, meaning the next
    /// emitted token needs no leading comma.
    start_flag: bool,

    lat_seen: bool,
    lon_seen: bool,
    geofence_checked: bool,
}

impl BsmHandler {
    /// Build a handler from the flat configuration. The activation switches
    /// (`privacy.filter.velocity`, `privacy.filter.geofence`,
    /// `privacy.redaction.id`) default to active when absent; any value
    /// other than `"ON"` deactivates.
    pub fn new(geofence: Option<Arc<Geofence>>, config: &ConfigMap) -> Self {
        let mut flags = 0;
        let active = |key: &str| config.get(key).map(|v| v == "ON").unwrap_or(true);
        if active("privacy.filter.velocity") {
            flags |= VELOCITY_FILTER;
        }
        if active("privacy.filter.geofence") {
            flags |= GEOFENCE_FILTER;
        }
        if active("privacy.redaction.id") {
            flags |= ID_REDACT;
        }

        let box_extension = config
            .get("privacy.filter.geofence.extension")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        Self {
            flags,
            velocity_filter: VelocityFilter::from_config(config),
            id_redactor: IdRedactor::from_config(config),
            geofence,
            box_extension,
            bsm: Bsm::new(),
            result: ResultStatus::Success,
            object_stack: Vec::new(),
            current_key: String::new(),
            tokens: Vec::new(),
            output: String::new(),
            next_value_is_filter_field: false,
            start_flag: true,
            lat_seen: false,
            lon_seen: false,
            geofence_checked: false,
        }
    }

    /// Return to the pristine per-message state; configuration and
    /// activation flags are untouched.
    pub fn reset(&mut self) {
        self.bsm.reset();
        self.result = ResultStatus::Success;
        self.object_stack.clear();
        self.current_key.clear();
        self.tokens.clear();
        self.output.clear();
        self.next_value_is_filter_field = false;
        self.start_flag = true;
        self.lat_seen = false;
        self.lon_seen = false;
        self.geofence_checked = false;
    }

    /// Run one message through the pipeline. True iff the parse completed
    /// and every active filter passed; the republishable JSON is then in
    /// [`BsmHandler::json`].
    pub fn process(&mut self, payload: &str) -> bool {
        self.reset();
        let mut reader = JsonReader::new(payload);
        match reader.read_document(self) {
            Ok(ReadOutcome::Complete) => self.result == ResultStatus::Success,
            Ok(ReadOutcome::Aborted) => false,
            Err(err) => {
                trace!(%err, "message failed to parse");
                if self.result == ResultStatus::Success {
                    self.result = ResultStatus::Parse;
                }
                false
            }
        }
    }

    pub fn activate(&mut self, flag: u32) {
        self.flags |= flag;
    }

    pub fn deactivate(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    pub fn is_active(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn activation_flags(&self) -> u32 {
        self.flags
    }

    pub fn result(&self) -> ResultStatus {
        self.result
    }

    pub fn bsm(&self) -> &Bsm {
        &self.bsm
    }

    /// The reconstructed JSON: the whole document on success, the prefix up
    /// to the failing token on suppression.
    pub fn json(&self) -> &str {
        &self.output
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn object_stack(&self) -> &[String] {
        &self.object_stack
    }

    pub fn current_key(&self) -> &str {
        &self.current_key
    }

    pub fn next_value_is_filter_field(&self) -> bool {
        self.next_value_is_filter_field
    }

    pub fn box_extension(&self) -> f64 {
        self.box_extension
    }

    /// Geofence containment for an explicit position; false when no
    /// geofence was supplied.
    pub fn is_within_entity(&self, p: &Point) -> bool {
        self.geofence
            .as_ref()
            .map(|g| g.contains(p, self.box_extension))
            .unwrap_or(false)
    }

    fn latched(&self) -> bool {
        self.result != ResultStatus::Success
    }

    fn push_token(&mut self, token: String) {
        self.output.push_str(&token);
        self.tokens.push(token);
    }

    /// Emit a value-position token, inserting the separating comma unless a
    /// container or key was just opened.
    fn emit_value(&mut self, token: String) {
        if !self.start_flag {
            self.push_token(",".to_string());
        }
        self.push_token(token);
        self.start_flag = false;
    }

    fn open_container(&mut self, token: &str) {
        if !self.start_flag {
            self.push_token(",".to_string());
        }
        self.push_token(token.to_string());
        self.start_flag = true;
    }

    /// Capture and maybe redact `coreData.id`; returns the token to emit.
    fn capture_id(&mut self, raw: &str) -> String {
        self.bsm.set_id(raw);
        if self.is_active(ID_REDACT) {
            let mut id = raw.to_string();
            if self.id_redactor.redact(&mut id) {
                self.bsm.set_id(&id);
                return format!("\"{id}\"");
            }
        }
        format!("\"{raw}\"")
    }

    /// Evaluate whichever filters just became decidable. Returns false when
    /// a filter latched on this token.
    fn evaluate_filters(&mut self, value: f64) -> bool {
        match self.current_key.as_str() {
            "speed" => {
                self.bsm.set_velocity(value);
                if self.is_active(VELOCITY_FILTER) && self.velocity_filter.suppress(value) {
                    self.result = ResultStatus::Speed;
                    return false;
                }
            }
            "latitude" | "longitude" => {
                if self.current_key == "latitude" {
                    self.bsm.set_latitude(value);
                    self.lat_seen = true;
                } else {
                    self.bsm.set_longitude(value);
                    self.lon_seen = true;
                }
                if self.lat_seen
                    && self.lon_seen
                    && !self.geofence_checked
                    && self.is_active(GEOFENCE_FILTER)
                {
                    self.geofence_checked = true;
                    if !self.is_within_entity(&self.bsm.position()) {
                        self.result = ResultStatus::Geoposition;
                        return false;
                    }
                }
            }
            _ => {}
        }
        true
    }
}

impl EventSink for BsmHandler {
    fn start_object(&mut self) -> bool {
        let latched = self.latched();
        // The top-level push is the empty string.
        self.object_stack.push(std::mem::take(&mut self.current_key));
        if !latched {
            self.open_container("{");
        }
        !latched
    }

    fn end_object(&mut self, _members: usize) -> bool {
        self.object_stack.pop();
        // Closing punctuation is kept even after a latch so the buffer stays
        // consistent with the stack when callbacks are driven manually.
        self.push_token("}".to_string());
        self.start_flag = false;
        !self.latched()
    }

    fn start_array(&mut self) -> bool {
        let latched = self.latched();
        if !latched {
            self.open_container("[");
        }
        !latched
    }

    fn end_array(&mut self, _items: usize) -> bool {
        self.push_token("]".to_string());
        self.start_flag = false;
        !self.latched()
    }

    fn key(&mut self, key: &str) -> bool {
        let latched = self.latched();
        self.current_key.clear();
        self.current_key.push_str(key);
        if !latched {
            if !self.start_flag {
                self.push_token(",".to_string());
            }
            self.push_token(format!("\"{key}\":"));
            self.start_flag = true;
        }
        // Fields the filters read: coreData.id, coreData.speed, and the
        // position coordinates.
        self.next_value_is_filter_field = match self.object_stack.last().map(String::as_str) {
            Some("coreData") => key == "id" || key == "speed",
            Some("position") => key == "latitude" || key == "longitude",
            _ => false,
        };
        !latched
    }

    fn string_value(&mut self, raw: &str) -> bool {
        let latched = self.latched();
        let token = if self.next_value_is_filter_field && self.current_key == "id" {
            self.capture_id(raw)
        } else {
            format!("\"{raw}\"")
        };
        self.next_value_is_filter_field = false;
        if !latched {
            self.emit_value(token);
        }
        !latched
    }

    fn number_value(&mut self, raw: &str) -> bool {
        let latched = self.latched();
        if self.next_value_is_filter_field {
            self.next_value_is_filter_field = false;
            if let Ok(value) = raw.parse::<f64>() {
                if latched {
                    // Latched already: keep capturing, skip re-evaluation so
                    // the first reason is preserved.
                    match self.current_key.as_str() {
                        "speed" => self.bsm.set_velocity(value),
                        "latitude" => self.bsm.set_latitude(value),
                        "longitude" => self.bsm.set_longitude(value),
                        _ => {}
                    }
                } else if !self.evaluate_filters(value) {
                    // The failing scalar is not emitted: the output ends at
                    // the token just before it.
                    return false;
                }
            }
        }
        if !latched {
            self.emit_value(raw.to_string());
        }
        !latched
    }

    fn bool_value(&mut self, value: bool) -> bool {
        let latched = self.latched();
        self.next_value_is_filter_field = false;
        if !latched {
            self.emit_value(if value { "true" } else { "false" }.to_string());
        }
        !latched
    }

    fn null_value(&mut self) -> bool {
        let latched = self.latched();
        self.next_value_is_filter_field = false;
        if !latched {
            self.emit_value("null".to_string());
        }
        !latched
    }
}
