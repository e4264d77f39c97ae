//! rendering of the free form `fields` of a receiver

use serde_json::{Map, Value};

use super::{NotifyError, Renderer};
use crate::config::FieldValue;

/// Renders every string leaf and every string key of `value`. Entries with
/// non-string keys are dropped, other scalars are copied as they are.
pub(super) fn render_field(renderer: &Renderer<'_>, value: &FieldValue) -> Result<Value, NotifyError> {
	match value {
		FieldValue::String(text) => renderer.render("field", text).map(Value::String),
		FieldValue::Sequence(items) => {
			items.iter().map(|item| render_field(renderer, item)).collect::<Result<_, _>>().map(Value::Array)
		}
		FieldValue::Mapping(entries) => {
			let mut map = Map::new();
			for (key, value) in entries {
				if let FieldValue::String(key) = key {
					map.insert(renderer.render("field key", key)?, render_field(renderer, value)?);
				}
			}
			Ok(Value::Object(map))
		}
		FieldValue::Other(value) => Ok(value.clone()),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::{
		alert::Data,
		template::{FunctionTable, TemplateEngine},
	};

	#[test]
	fn renders_nested_values() {
		let engine = TemplateEngine::new(&FunctionTable::builtin());
		let data = Data { receiver: "jira-ab".into(), ..Default::default() };
		let renderer = Renderer::new(&engine, &data).unwrap();

		let value = FieldValue::Mapping(vec![
			(FieldValue::from("{{ receiver }}"), FieldValue::from("{{ status }}")),
			(FieldValue::Other(json!(1)), FieldValue::from("dropped")),
			(
				FieldValue::from("list"),
				FieldValue::Sequence(vec![
					FieldValue::from("{{ receiver | toUpper }}"),
					FieldValue::Other(json!(42)),
					FieldValue::Other(json!(true)),
				]),
			),
		]);

		assert_eq!(
			render_field(&renderer, &value).unwrap(),
			json!({"jira-ab": "firing", "list": ["JIRA-AB", 42, true]})
		);
	}

	#[test]
	fn fails_on_broken_template() {
		let engine = TemplateEngine::new(&FunctionTable::builtin());
		let renderer = Renderer::new(&engine, &Data::default()).unwrap();

		let result = render_field(&renderer, &FieldValue::Sequence(vec![FieldValue::from("{{ unclosed")]));
		assert!(matches!(result, Err(NotifyError::Template { what: "field", .. })));
	}
}
