//! free form ticket fields (`fields:` in the receiver config)
//!
//! Values are arbitrarily nested lists and maps. String leaves are templates,
//! map keys may be of any type but only string keys make it into a ticket.

use std::fmt;

use serde::{
	de::{MapAccess, SeqAccess, Visitor},
	ser::SerializeMap,
	Deserialize, Deserializer, Serialize, Serializer,
};

/// a configured field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	/// a template string
	String(String),
	/// a list of values
	Sequence(Vec<FieldValue>),
	/// a map, keys keep their original type
	Mapping(Vec<(FieldValue, FieldValue)>),
	/// numbers, booleans and null are passed through as is
	Other(serde_json::Value),
}

impl From<&str> for FieldValue {
	fn from(s: &str) -> Self {
		FieldValue::String(s.to_owned())
	}
}

impl From<serde_json::Value> for FieldValue {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::String(s) => FieldValue::String(s),
			serde_json::Value::Array(items) => {
				FieldValue::Sequence(items.into_iter().map(FieldValue::from).collect())
			}
			serde_json::Value::Object(map) => FieldValue::Mapping(
				map.into_iter().map(|(k, v)| (FieldValue::String(k), FieldValue::from(v))).collect(),
			),
			other => FieldValue::Other(other),
		}
	}
}

/// builds [FieldValue]s from any self describing format
struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
	type Value = FieldValue;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("a string, number, boolean, list or map")
	}

	fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(v.into()))
	}

	fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(v.into()))
	}

	fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(v.into()))
	}

	fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(v.into()))
	}

	fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
		Ok(FieldValue::String(v.to_owned()))
	}

	fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
		Ok(FieldValue::String(v))
	}

	fn visit_unit<E>(self) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(serde_json::Value::Null))
	}

	fn visit_none<E>(self) -> Result<Self::Value, E> {
		Ok(FieldValue::Other(serde_json::Value::Null))
	}

	fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
	where
		D: Deserializer<'de>,
	{
		FieldValue::deserialize(deserializer)
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
	where
		A: SeqAccess<'de>,
	{
		let mut items = Vec::new();
		while let Some(item) = seq.next_element()? {
			items.push(item);
		}
		Ok(FieldValue::Sequence(items))
	}

	fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
	where
		A: MapAccess<'de>,
	{
		let mut entries = Vec::new();
		while let Some(entry) = map.next_entry()? {
			entries.push(entry);
		}
		Ok(FieldValue::Mapping(entries))
	}
}

impl<'de> Deserialize<'de> for FieldValue {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(FieldValueVisitor)
	}
}

impl Serialize for FieldValue {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match self {
			FieldValue::String(s) => serializer.serialize_str(s),
			FieldValue::Sequence(items) => items.serialize(serializer),
			FieldValue::Mapping(entries) => {
				let string_keyed: Vec<_> = entries
					.iter()
					.filter_map(|(k, v)| match k {
						FieldValue::String(k) => Some((k, v)),
						_ => None,
					})
					.collect();

				let mut map = serializer.serialize_map(Some(string_keyed.len()))?;
				for (k, v) in string_keyed {
					map.serialize_entry(k, v)?;
				}
				map.end()
			}
			FieldValue::Other(value) => value.serialize(serializer),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn deserializes_nested_values() {
		let value: FieldValue = serde_json::from_str(
			r#"{"customfield_10001": "{{ status }}", "list": ["a", 1, true, null], "nested": {"k": "v"}}"#,
		)
		.unwrap();

		let FieldValue::Mapping(entries) = value else { panic!("expected a mapping") };
		assert_eq!(entries.len(), 3);
		assert!(entries.contains(&(
			FieldValue::from("list"),
			FieldValue::Sequence(vec![
				FieldValue::from("a"),
				FieldValue::Other(json!(1)),
				FieldValue::Other(json!(true)),
				FieldValue::Other(serde_json::Value::Null),
			])
		)));
	}

	#[test]
	fn serializes_string_keys_only() {
		let value = FieldValue::Mapping(vec![
			(FieldValue::from("name"), FieldValue::from("x")),
			(FieldValue::Other(json!(42)), FieldValue::from("dropped")),
		]);

		assert_eq!(serde_json::to_value(&value).unwrap(), json!({"name": "x"}));
	}

	#[test]
	fn converts_from_json() {
		let value = FieldValue::from(json!({"a": ["b", 2]}));
		assert_eq!(
			value,
			FieldValue::Mapping(vec![(
				FieldValue::from("a"),
				FieldValue::Sequence(vec![FieldValue::from("b"), FieldValue::Other(json!(2))])
			)])
		);
	}
}
