pub mod prelude {
	pub use super::{Table, Value, Presets};
}

pub mod table;
pub use table::{Table, Value, ValueKind};

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;


/// Build a [`Table`] inline.
///
/// ```
/// let params = synthbox_cfg::params!{ "intensity" => 3.0, "surface" => "roof" };
/// assert_eq!(params.number("intensity"), Some(3.0));
/// ```
#[macro_export]
macro_rules! params {
	() => { $crate::Table::new() };

	($($key:expr => $value:expr),+ $(,)?) => {{
		let mut table = $crate::Table::new();
		$( table.set_value($key, $value); )+
		table
	}};
}


/// Named parameter tables, one per TOML section.
///
/// ```toml
/// [campfire]
/// kind = "fire"
/// intensity = 3
///
/// [drizzle]
/// kind = "rain"
/// intensity = 1
/// surface = "leaf"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Presets {
	tables: BTreeMap<String, Table>,
}

impl Presets {
	pub fn from_toml_str(source: &str) -> anyhow::Result<Presets> {
		let raw: toml::Table = toml::from_str(source)
			.context("Failed to parse presets")?;

		let mut tables = BTreeMap::new();

		for (name, value) in raw.iter() {
			let toml::Value::Table(section) = value else {
				anyhow::bail!("Preset '{name}' must be a table, found {}", value.type_str());
			};

			let table = Table::from_toml(section)
				.with_context(|| format!("In preset '{name}'"))?;

			tables.insert(name.clone(), table);
		}

		log::info!("Loaded {} presets", tables.len());

		Ok(Presets { tables })
	}

	pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Presets> {
		let path = path.as_ref();
		let data = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read presets from '{}'", path.display()))?;

		Presets::from_toml_str(&data)
	}

	pub fn get(&self, name: &str) -> Option<&Table> {
		self.tables.get(name)
	}

	pub fn names(&self) -> impl Iterator<Item=&str> {
		self.tables.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.tables.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tables.is_empty()
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn params_macro() {
		let table = params!{
			"intensity" => 2,
			"surface" => "leaf",
			"looping" => false,
		};

		assert_eq!(table.len(), 3);
		assert_eq!(table.number("intensity"), Some(2.0));
		assert_eq!(table.string("surface"), Some("leaf"));
		assert_eq!(table.bool("looping"), Some(false));

		assert!(params!{}.is_empty());
	}

	#[test]
	fn presets_from_toml() {
		let presets = Presets::from_toml_str(r#"
			[campfire]
			kind = "fire"
			intensity = 3

			[drizzle]
			kind = "rain"
			intensity = 1.5
			surface = "leaf"
		"#).unwrap();

		assert_eq!(presets.len(), 2);
		assert_eq!(presets.names().collect::<Vec<_>>(), ["campfire", "drizzle"]);

		let drizzle = presets.get("drizzle").unwrap();
		assert_eq!(drizzle.number("intensity"), Some(1.5));
		assert_eq!(drizzle.string("surface"), Some("leaf"));
	}

	#[test]
	fn presets_reject_top_level_values() {
		assert!(Presets::from_toml_str("intensity = 3").is_err());
	}
}
