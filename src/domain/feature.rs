//! Feature records: a geometry plus an attribute map, addressed by object id

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute field holding a record's object id unless the endpoint
/// configures a different one.
pub const DEFAULT_OBJECT_ID_FIELD: &str = "objectid";

/// One record of a feature endpoint.
///
/// The record id lives inside `attributes` under the endpoint's object-id
/// field, mirroring how feature services address records. Records created
/// offline carry a negative placeholder id until the server assigns a real
/// one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
	/// Geometry in the service's JSON representation
	pub geometry: Value,

	/// Attribute map, including the object-id field once assigned
	pub attributes: Map<String, Value>,
}

impl FeatureRecord {
	/// Create a record with the given geometry and no attributes
	pub fn new(geometry: Value) -> Self {
		Self {
			geometry,
			attributes: Map::new(),
		}
	}

	/// Create a record with geometry and attributes
	pub fn with_attributes(geometry: Value, attributes: Map<String, Value>) -> Self {
		Self {
			geometry,
			attributes,
		}
	}

	/// Read the record id from the given object-id field
	pub fn id(&self, id_field: &str) -> Option<i64> {
		self.attributes.get(id_field).and_then(Value::as_i64)
	}

	/// Set (or replace) the record id
	pub fn set_id(&mut self, id_field: &str, id: i64) {
		self.attributes.insert(id_field.to_string(), Value::from(id));
	}

	/// Remove the id field, returning the previous id if one was set.
	///
	/// Outgoing create payloads are stripped of their placeholder id so the
	/// server assigns a real one.
	pub fn clear_id(&mut self, id_field: &str) -> Option<i64> {
		self.attributes.remove(id_field).as_ref().and_then(Value::as_i64)
	}

	/// Set an attribute value
	pub fn set_attribute(&mut self, name: &str, value: Value) {
		self.attributes.insert(name.to_string(), value);
	}
}
