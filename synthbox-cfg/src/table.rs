use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;


/// Flat key-value parameter storage.
/// Values are numbers, strings or booleans - nested tables are rejected when parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
	data: BTreeMap<String, Value>,
}


impl Table {
	pub fn new() -> Table {
		Table::default()
	}

	pub fn from_toml_str(source: &str) -> anyhow::Result<Table> {
		let raw: toml::Table = toml::from_str(source)
			.context("Failed to parse parameter table")?;

		Table::from_toml(&raw)
	}

	pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Table> {
		let path = path.as_ref();
		let data = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read parameters from '{}'", path.display()))?;

		Table::from_toml_str(&data)
	}

	pub(crate) fn from_toml(raw: &toml::Table) -> anyhow::Result<Table> {
		let mut table = Table::new();

		for (key, value) in raw.iter() {
			let value = Value::from_toml(value)
				.with_context(|| format!("Invalid value for parameter '{key}'"))?;

			table.data.insert(key.clone(), value);
		}

		Ok(table)
	}

	pub fn to_toml(&self) -> toml::Table {
		let mut tbl = toml::Table::new();

		for (key, value) in self.data.iter() {
			let value = match value {
				Value::Number(n) => toml::Value::Float(*n),
				Value::String(string) => toml::Value::String(string.clone()),
				Value::Bool(b) => toml::Value::Boolean(*b),
			};

			tbl.insert(key.clone(), value);
		}

		tbl
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Table {
		self.set_value(key, value);
		self
	}

	/// Copy or replace values present in `other`. Keys not present in `other` keep their current value.
	pub fn merge_from(&mut self, other: &Table) {
		for (key, value) in other.data.iter() {
			self.data.insert(key.clone(), value.clone());
		}
	}

	pub fn merged(&self, other: &Table) -> Table {
		let mut merged = self.clone();
		merged.merge_from(other);
		merged
	}

	/// Fails if `self` contains a key missing from `schema`, or a value whose kind differs from the
	/// value `schema` holds for the same key.
	pub fn check_against(&self, schema: &Table) -> anyhow::Result<()> {
		for (key, value) in self.data.iter() {
			let Some(expected) = schema.get_value(key) else {
				let known = schema.keys().collect::<Vec<_>>().join(", ");
				anyhow::bail!("Unknown parameter '{key}' (expected one of: {known})");
			};

			if expected.kind() != value.kind() {
				anyhow::bail!("Parameter '{key}' expects a {}, got {} '{value}'", expected.kind(), value.kind());
			}
		}

		Ok(())
	}

	pub fn get_value(&self, key: &str) -> Option<&Value> {
		self.data.get(key)
	}

	pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.data.insert(key.into(), value.into());
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.data.remove(key)
	}

	pub fn number(&self, key: &str) -> Option<f64> {
		self.get_value(key)?.as_number()
	}

	pub fn string(&self, key: &str) -> Option<&str> {
		self.get_value(key)?.as_str()
	}

	pub fn bool(&self, key: &str) -> Option<bool> {
		self.get_value(key)?.as_bool()
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.data.contains_key(key)
	}

	pub fn keys(&self) -> impl Iterator<Item=&str> {
		self.data.keys().map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item=(&str, &Value)> {
		self.data.iter().map(|(key, value)| (key.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}




#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Number(f64),
	String(String),
	Bool(bool),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
	Number,
	String,
	Bool,
}

impl Value {
	fn from_toml(value: &toml::Value) -> anyhow::Result<Value> {
		match value {
			toml::Value::Integer(i) => Ok(Value::Number(*i as f64)),
			toml::Value::Float(f) => Ok(Value::Number(*f)),
			toml::Value::String(s) => Ok(Value::String(s.clone())),
			toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
			other => anyhow::bail!("Expected a number, string or boolean, found {}", other.type_str()),
		}
	}

	pub fn kind(&self) -> ValueKind {
		match self {
			Value::Number(_) => ValueKind::Number,
			Value::String(_) => ValueKind::String,
			Value::Bool(_) => ValueKind::Bool,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None
		}
	}
}


impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Number(n) => n.fmt(f),
			Value::String(s) => s.fmt(f),
			Value::Bool(b) => b.fmt(f),
		}
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValueKind::Number => "number".fmt(f),
			ValueKind::String => "string".fmt(f),
			ValueKind::Bool => "boolean".fmt(f),
		}
	}
}


impl From<f64> for Value {
	fn from(o: f64) -> Value { Value::Number(o) }
}

impl From<f32> for Value {
	fn from(o: f32) -> Value { Value::Number(o as f64) }
}

impl From<i32> for Value {
	fn from(o: i32) -> Value { Value::Number(o as f64) }
}

impl From<u32> for Value {
	fn from(o: u32) -> Value { Value::Number(o as f64) }
}

impl From<bool> for Value {
	fn from(o: bool) -> Value { Value::Bool(o) }
}

impl From<&str> for Value {
	fn from(o: &str) -> Value { Value::String(o.into()) }
}

impl From<String> for Value {
	fn from(o: String) -> Value { Value::String(o) }
}




#[cfg(test)]
mod test {
	use super::*;

	fn defaults() -> Table {
		Table::new()
			.with("intensity", 0.0)
			.with("gustiness", 2.0)
			.with("surface", "stone")
			.with("looping", true)
	}

	#[test]
	fn merge_overrides_and_retains() {
		let mut params = defaults();
		params.merge_from(&Table::new().with("intensity", 3.0).with("surface", "roof"));

		assert_eq!(params.number("intensity"), Some(3.0));
		assert_eq!(params.string("surface"), Some("roof"));

		// Unspecified keys keep prior values
		assert_eq!(params.number("gustiness"), Some(2.0));
		assert_eq!(params.bool("looping"), Some(true));
		assert_eq!(params.len(), 4);
	}

	#[test]
	fn merged_leaves_original_untouched() {
		let params = defaults();
		let merged = params.merged(&Table::new().with("gustiness", 4.0));

		assert_eq!(params.number("gustiness"), Some(2.0));
		assert_eq!(merged.number("gustiness"), Some(4.0));
	}

	#[test]
	fn check_against_schema() {
		let schema = defaults();

		assert!(Table::new().with("intensity", 1.0).check_against(&schema).is_ok());
		assert!(Table::new().check_against(&schema).is_ok());

		let unknown = Table::new().with("volume", 1.0).check_against(&schema).unwrap_err();
		assert!(unknown.to_string().contains("Unknown parameter 'volume'"));

		let wrong_kind = Table::new().with("intensity", "loud").check_against(&schema).unwrap_err();
		assert!(wrong_kind.to_string().contains("expects a number"));
	}

	#[test]
	fn typed_accessors_reject_other_kinds() {
		let params = defaults();
		assert_eq!(params.number("surface"), None);
		assert_eq!(params.string("intensity"), None);
		assert_eq!(params.bool("missing"), None);
	}

	#[test]
	fn from_toml_flat() {
		let table = Table::from_toml_str(r#"
			intensity = 3
			pitch = 1.25
			surface = "water"
			looping = false
		"#).unwrap();

		assert_eq!(table.number("intensity"), Some(3.0));
		assert_eq!(table.number("pitch"), Some(1.25));
		assert_eq!(table.string("surface"), Some("water"));
		assert_eq!(table.bool("looping"), Some(false));
	}

	#[test]
	fn from_toml_rejects_nested() {
		assert!(Table::from_toml_str("[nested]\nvalue = 1").is_err());
		assert!(Table::from_toml_str("values = [1, 2]").is_err());
	}

	#[test]
	fn to_toml_keeps_values() {
		let table = defaults();
		let toml = table.to_toml();

		assert_eq!(toml.get("surface").and_then(|v| v.as_str()), Some("stone"));
		assert_eq!(toml.get("gustiness").and_then(|v| v.as_float()), Some(2.0));
		assert_eq!(toml.get("looping").and_then(|v| v.as_bool()), Some(true));
	}
}
