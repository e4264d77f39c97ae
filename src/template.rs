//! Renders ticket field values via tera templates.
//!
//! Every field of a receiver config is a template string. Fields may include
//! the named templates of the shared library (loaded from the configured
//! `template` glob) and use the functions of a [FunctionTable].

use std::{collections::HashMap, env};

use regex::Regex;
use serde::Serialize;
use tera::{
	ast::{Expr, ExprVal, FunctionCall, LogicOperator, MacroDefinition, Node},
	Context, Tera, Value,
};
use thiserror::Error;

/// name under which a field template is registered in the working copy of
/// the library
const FIELD_TEMPLATE: &str = "__field__";

/// internal function wrapping lookups inside `~` concatenations
const LOOKUP_FUNCTION: &str = "__lookup";

/// tera filter signature used by the [FunctionTable]
pub type FilterFn = fn(&Value, &HashMap<String, Value>) -> tera::Result<Value>;

/// tera function signature used by the [FunctionTable]
pub type FunctionFn = fn(&HashMap<String, Value>) -> tera::Result<Value>;

/// Error occuring when loading or rendering templates
#[derive(Error, Debug)]
pub enum TemplateError {
	/// the template library couldn't be loaded
	#[error("failed to load template library {glob:?}")]
	Library {
		/// glob the library was loaded from
		glob: String,
		/// tera error
		#[source]
		source: tera::Error,
	},
	/// the field template is malformed
	#[error("parse template {template:?}")]
	Parse {
		/// template text
		template: String,
		/// tera error
		#[source]
		source: tera::Error,
	},
	/// the field template failed to execute against the alert data
	#[error("execute template {template:?}")]
	Render {
		/// template text
		template: String,
		/// tera error
		#[source]
		source: tera::Error,
	},
	/// the alert data couldn't be turned into a template context
	#[error("failed to build template context")]
	Context(#[source] tera::Error),
}

/// Filters and functions available inside templates.
///
/// The table is built once and registered on every tera instance the engine
/// creates, there is no global registry.
#[derive(Debug, Clone)]
pub struct FunctionTable {
	/// filters by name
	filters: Vec<(&'static str, FilterFn)>,
	/// functions by name
	functions: Vec<(&'static str, FunctionFn)>,
}

impl FunctionTable {
	/// table without any filters or functions apart from tera's builtins
	pub fn empty() -> Self {
		Self { filters: Vec::new(), functions: Vec::new() }
	}

	/// the default table
	///
	/// * filters: `toUpper`, `toLower`, `title`, `join(sep)`, `reReplaceAll(pattern, repl)`
	///
	/// * functions: `join(sep, values)`, `reReplaceAll(pattern, repl, text)`,
	///   `match(pattern, text)`, `stringSlice(..)`, `getEnv(name)`
	pub fn builtin() -> Self {
		Self::empty()
			.with_filter("toUpper", to_upper)
			.with_filter("toLower", to_lower)
			.with_filter("title", title)
			.with_filter("join", join_filter)
			.with_filter("reReplaceAll", re_replace_all_filter)
			.with_function("join", join_function)
			.with_function("reReplaceAll", re_replace_all_function)
			.with_function("match", match_function)
			.with_function("stringSlice", string_slice)
			.with_function("getEnv", get_env)
	}

	/// add a filter, replacing an earlier one with the same name
	pub fn with_filter(mut self, name: &'static str, filter: FilterFn) -> Self {
		self.filters.retain(|(n, _)| *n != name);
		self.filters.push((name, filter));
		self
	}

	/// add a function, replacing an earlier one with the same name
	pub fn with_function(mut self, name: &'static str, function: FunctionFn) -> Self {
		self.functions.retain(|(n, _)| *n != name);
		self.functions.push((name, function));
		self
	}

	/// register the table on a tera instance
	fn register(&self, tera: &mut Tera) {
		for (name, filter) in &self.filters {
			tera.register_filter(name, *filter);
		}
		for (name, function) in &self.functions {
			tera.register_function(name, *function);
		}
	}
}

impl Default for FunctionTable {
	fn default() -> Self {
		Self::builtin()
	}
}

/// Template engine holding the library of named templates.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
	/// the library, never rendered directly but cloned for every field
	library: Tera,
}

impl TemplateEngine {
	/// engine without named templates
	pub fn new(functions: &FunctionTable) -> Self {
		Self { library: Self::prepare(Tera::default(), functions) }
	}

	/// Loads every template matching `glob` into the library. Templates are
	/// named by their path relative to the glob's base directory.
	pub fn from_glob(glob: &str, functions: &FunctionTable) -> Result<Self, TemplateError> {
		tracing::debug!(glob, "loading templates");

		let tera = Tera::new(glob)
			.map_err(|source| TemplateError::Library { glob: glob.to_owned(), source })?;

		Ok(Self { library: Self::prepare(tera, functions) })
	}

	/// Builds the library from `(name, content)` pairs.
	pub fn from_templates<I, N, C>(templates: I, functions: &FunctionTable) -> Result<Self, TemplateError>
	where
		I: IntoIterator<Item = (N, C)>,
		N: AsRef<str>,
		C: AsRef<str>,
	{
		let mut tera = Tera::default();
		tera.add_raw_templates(templates).map_err(|source| TemplateError::Library {
			glob: String::from("<inline>"),
			source,
		})?;

		Ok(Self { library: Self::prepare(tera, functions) })
	}

	/// disable html escaping, register functions and make lookups permissive
	fn prepare(mut tera: Tera, functions: &FunctionTable) -> Tera {
		tera.autoescape_on(Vec::new());
		functions.register(&mut tera);
		tera.register_function(LOOKUP_FUNCTION, lookup);
		for template in tera.templates.values_mut() {
			permissive_template(template);
		}
		tera
	}

	/// names of the templates in the library
	pub fn template_names(&self) -> impl Iterator<Item = &str> {
		self.library.get_template_names()
	}

	/// Turns template data into a context for [TemplateEngine::render].
	pub fn context<T: Serialize>(data: &T) -> Result<Context, TemplateError> {
		Context::from_serialize(data).map_err(TemplateError::Context)
	}

	/// Renders `text` against `context`.
	///
	/// Text without template delimiters is returned unchanged. Otherwise the
	/// text is added to a private copy of the library, so it may include named
	/// templates, and rendered. Missing keys evaluate to empty values
	/// wherever they are looked up.
	pub fn render(&self, text: &str, context: &Context) -> Result<String, TemplateError> {
		if !has_delimiters(text) {
			return Ok(text.to_owned());
		}

		let mut tera = self.library.clone();
		tera.add_raw_template(FIELD_TEMPLATE, text)
			.map_err(|source| TemplateError::Parse { template: text.to_owned(), source })?;

		if let Some(template) = tera.templates.get_mut(FIELD_TEMPLATE) {
			permissive_template(template);
		}

		let rendered = tera
			.render(FIELD_TEMPLATE, context)
			.map_err(|source| TemplateError::Render { template: text.to_owned(), source })?;

		tracing::trace!(template = text, output = rendered.as_str(), "template rendered");

		Ok(rendered)
	}
}

/// true if `text` contains a tera expression, statement or comment delimiter
fn has_delimiters(text: &str) -> bool {
	text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Prepends a `default` filter to every lookup, which makes missing keys
/// evaluate to an empty value instead of failing. The empty value depends on
/// where the lookup is used, see [Missing].
fn permissive_template(template: &mut tera::Template) {
	permissive_nodes(&mut template.ast);
	for definition in template.macros.values_mut() {
		permissive_macro(definition);
	}
	// inheritance chains are rebuilt from `blocks` whenever a template is added
	for block in template.blocks.values_mut() {
		permissive_nodes(&mut block.body);
	}
	for definitions in template.blocks_definitions.values_mut() {
		for (_, block) in definitions.iter_mut() {
			permissive_nodes(&mut block.body);
		}
	}
}

/// value a missing key evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
	/// empty string, for outputs, conditions and arguments
	Text,
	/// zero, for math and ordering comparisons
	Number,
	/// empty list, for loop containers
	Sequence,
}

impl Missing {
	fn value(self) -> Expr {
		Expr::new(match self {
			Missing::Text => ExprVal::String(String::new()),
			Missing::Number => ExprVal::Int(0),
			Missing::Sequence => ExprVal::Array(Vec::new()),
		})
	}
}

/// walk the nodes and patch every expression
fn permissive_nodes(nodes: &mut [Node]) {
	for node in nodes {
		match node {
			Node::VariableBlock(_, expr) => permissive_expr(expr, Missing::Text),
			Node::Set(_, set) => permissive_expr(&mut set.value, Missing::Text),
			Node::Forloop(_, forloop, _) => {
				permissive_expr(&mut forloop.container, Missing::Sequence);
				permissive_nodes(&mut forloop.body);
				if let Some(body) = forloop.empty_body.as_mut() {
					permissive_nodes(body);
				}
			}
			Node::If(branches, _) => {
				for (_, condition, body) in branches.conditions.iter_mut() {
					permissive_expr(condition, Missing::Text);
					permissive_nodes(body);
				}
				if let Some((_, body)) = branches.otherwise.as_mut() {
					permissive_nodes(body);
				}
			}
			Node::Block(_, block, _) => permissive_nodes(&mut block.body),
			Node::FilterSection(_, section, _) => {
				permissive_args(&mut section.filter.args);
				permissive_nodes(&mut section.body);
			}
			Node::MacroDefinition(_, definition, _) => permissive_macro(definition),
			_ => {}
		}
	}
}

fn permissive_macro(definition: &mut MacroDefinition) {
	for default in definition.args.values_mut().flatten() {
		permissive_expr(default, Missing::Text);
	}
	permissive_nodes(&mut definition.body);
}

/// patch the named arguments of a function, filter or macro call
fn permissive_args(args: &mut HashMap<String, Expr>) {
	for arg in args.values_mut() {
		permissive_expr(arg, Missing::Text);
	}
}

/// add the default filter to every lookup inside `expr`
fn permissive_expr(expr: &mut Expr, missing: Missing) {
	for filter in expr.filters.iter_mut() {
		permissive_args(&mut filter.args);
	}

	let has_default = expr.has_default_filter();
	match &mut expr.val {
		ExprVal::Ident(_) => {
			if !has_default {
				expr.filters.insert(0, default_filter(missing));
			}
		}
		ExprVal::Math(math) => {
			permissive_expr(&mut math.lhs, Missing::Number);
			permissive_expr(&mut math.rhs, Missing::Number);
		}
		ExprVal::Logic(logic) => {
			let operand = match logic.operator {
				LogicOperator::Gt | LogicOperator::Gte | LogicOperator::Lt | LogicOperator::Lte => {
					Missing::Number
				}
				LogicOperator::Eq | LogicOperator::NotEq | LogicOperator::And | LogicOperator::Or => {
					Missing::Text
				}
			};
			permissive_expr(&mut logic.lhs, operand);
			permissive_expr(&mut logic.rhs, operand);
		}
		ExprVal::In(check) => {
			permissive_expr(&mut check.lhs, Missing::Text);
			permissive_expr(&mut check.rhs, Missing::Text);
		}
		ExprVal::Test(test) => {
			for arg in test.args.iter_mut() {
				permissive_expr(arg, Missing::Text);
			}
		}
		ExprVal::FunctionCall(call) => permissive_args(&mut call.args),
		ExprVal::MacroCall(call) => permissive_args(&mut call.args),
		ExprVal::Array(items) => {
			for item in items.iter_mut() {
				permissive_expr(item, Missing::Text);
			}
		}
		ExprVal::StringConcat(concat) => {
			// concatenated values take no filters, lookups go through [lookup] instead
			for value in concat.values.iter_mut() {
				match value {
					ExprVal::Ident(path) => {
						let mut lookup = Expr::new(ExprVal::Ident(path.clone()));
						lookup.filters.push(default_filter(Missing::Text));

						let mut args = HashMap::new();
						args.insert(String::from("value"), lookup);
						*value = ExprVal::FunctionCall(FunctionCall { name: String::from(LOOKUP_FUNCTION), args });
					}
					ExprVal::FunctionCall(call) => permissive_args(&mut call.args),
					_ => {}
				}
			}
		}
		ExprVal::String(_) | ExprVal::Int(_) | ExprVal::Float(_) | ExprVal::Bool(_) => {}
	}
}

/// `default(value=..)`
fn default_filter(missing: Missing) -> FunctionCall {
	let mut args = HashMap::new();
	args.insert(String::from("value"), missing.value());
	FunctionCall { name: String::from("default"), args }
}

/// returns its `value` argument
fn lookup(args: &HashMap<String, Value>) -> tera::Result<Value> {
	Ok(args.get("value").cloned().unwrap_or_else(|| Value::String(String::new())))
}

/// string representation of a scalar template value
fn to_text(value: &Value, what: &str) -> tera::Result<String> {
	match value {
		Value::String(s) => Ok(s.clone()),
		Value::Null => Ok(String::new()),
		Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
		_ => Err(tera::Error::msg(format!("{what} expects a string, got {value}"))),
	}
}

/// fetch a required argument as string
fn arg(args: &HashMap<String, Value>, name: &str, what: &str) -> tera::Result<String> {
	let value = args
		.get(name)
		.ok_or_else(|| tera::Error::msg(format!("{what} is missing the `{name}` argument")))?;
	to_text(value, what)
}

/// fetch a sequence argument as list of strings
fn strings(value: &Value, what: &str) -> tera::Result<Vec<String>> {
	match value {
		Value::Array(items) => items.iter().map(|item| to_text(item, what)).collect(),
		other => Ok(vec![to_text(other, what)?]),
	}
}

/// compile a pattern supplied by a template
fn regex(pattern: &str, what: &str) -> tera::Result<Regex> {
	Regex::new(pattern)
		.map_err(|err| tera::Error::msg(format!("{what}: invalid pattern {pattern:?}: {err}")))
}

fn to_upper(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	Ok(Value::String(to_text(value, "toUpper")?.to_uppercase()))
}

fn to_lower(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	Ok(Value::String(to_text(value, "toLower")?.to_lowercase()))
}

/// upper case the first letter of every word
fn title(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	let text = to_text(value, "title")?;
	let mut out = String::with_capacity(text.len());
	let mut word_start = true;

	for c in text.chars() {
		if c.is_alphanumeric() {
			if word_start {
				out.extend(c.to_uppercase());
			} else {
				out.extend(c.to_lowercase());
			}
			word_start = false;
		} else {
			out.push(c);
			word_start = true;
		}
	}

	Ok(Value::String(out))
}

fn join_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
	let sep = match args.get("sep") {
		Some(sep) => to_text(sep, "join")?,
		None => String::new(),
	};
	Ok(Value::String(strings(value, "join")?.join(&sep)))
}

/// `join(sep, values)`, the separator comes first
fn join_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let sep = arg(args, "sep", "join")?;
	let values = args.get("values").cloned().unwrap_or(Value::Array(Vec::new()));
	Ok(Value::String(strings(&values, "join")?.join(&sep)))
}

fn re_replace_all_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
	let pattern = arg(args, "pattern", "reReplaceAll")?;
	let repl = arg(args, "repl", "reReplaceAll")?;
	let text = to_text(value, "reReplaceAll")?;

	Ok(Value::String(regex(&pattern, "reReplaceAll")?.replace_all(&text, repl.as_str()).into_owned()))
}

fn re_replace_all_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let text = arg(args, "text", "reReplaceAll")?;
	re_replace_all_filter(&Value::String(text), args)
}

fn match_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let pattern = arg(args, "pattern", "match")?;
	let text = arg(args, "text", "match")?;

	Ok(Value::Bool(regex(&pattern, "match")?.is_match(&text)))
}

/// Collects every argument into a list of strings. Tera arguments are named,
/// they are taken in the order of their names and arrays are flattened.
fn string_slice(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let mut names: Vec<&String> = args.keys().collect();
	names.sort();

	let mut out = Vec::new();
	for name in names {
		out.extend(strings(&args[name], "stringSlice")?.into_iter().map(Value::String));
	}

	Ok(Value::Array(out))
}

fn get_env(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let name = arg(args, "name", "getEnv")?;
	Ok(Value::String(env::var(name).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::alert::{Alert, Data, Status};

	fn engine() -> TemplateEngine {
		TemplateEngine::new(&FunctionTable::builtin())
	}

	fn render(text: &str, data: serde_json::Value) -> Result<String, TemplateError> {
		let context = TemplateEngine::context(&data).unwrap();
		engine().render(text, &context)
	}

	#[test]
	fn plain_text_is_returned_unchanged() {
		let context = Context::new();
		assert_eq!(engine().render("test", &context).unwrap(), "test");
		assert_eq!(engine().render("{ not a template }", &context).unwrap(), "{ not a template }");
	}

	#[test]
	fn renders_data() {
		assert_eq!(render("{{ status | toUpper }}", json!({"status": "firing"})).unwrap(), "FIRING");
	}

	#[test]
	fn missing_keys_render_empty() {
		let data = json!({"commonLabels": {"alertname": "Down"}});

		assert_eq!(render("[{{ commonLabels.severity }}]", data.clone()).unwrap(), "[]");
		assert_eq!(render("{{ nothing | toUpper }}", data.clone()).unwrap(), "");
		assert_eq!(
			render("{% if commonLabels.severity %}yes{% else %}no{% endif %}", data).unwrap(),
			"no"
		);
	}

	#[test]
	fn missing_keys_compare_as_empty() {
		let data = json!({"commonLabels": {"alertname": "Down"}});

		assert_eq!(
			render("{% if commonLabels.severity == 'critical' %}High{% else %}Low{% endif %}", data.clone())
				.unwrap(),
			"Low"
		);
		assert_eq!(
			render("{% if commonLabels.severity != 'critical' and commonLabels.alertname %}ok{% endif %}", data.clone())
				.unwrap(),
			"ok"
		);
		assert_eq!(render("{% if 'x' in commonLabels.team %}x{% endif %}-", data.clone()).unwrap(), "-");
		assert_eq!(render("{% if commonLabels.count > 2 %}many{% else %}few{% endif %}", data).unwrap(), "few");
	}

	#[test]
	fn missing_keys_in_operators_and_arguments() {
		let data = json!({"commonLabels": {"alertname": "Down"}});

		assert_eq!(render("{{ commonLabels.severity ~ '!' }}", data.clone()).unwrap(), "!");
		assert_eq!(render("{{ commonLabels.alertname ~ '/' ~ commonLabels.job }}", data.clone()).unwrap(), "Down/");
		assert_eq!(render("{{ commonLabels.count + 1 }}", data.clone()).unwrap(), "1");
		assert_eq!(render("{{ join(sep=',', values=commonLabels.missing) }}", data.clone()).unwrap(), "");
		assert_eq!(
			render("{{ commonLabels.alertname | reReplaceAll(pattern='D', repl=commonLabels.prefix) }}", data.clone())
				.unwrap(),
			"own"
		);
		assert_eq!(
			render("{% set team = commonLabels.team %}[{{ team }}]", data.clone()).unwrap(),
			"[]"
		);
		assert_eq!(
			render("{% for alert in alerts %}x{% else %}none{% endfor %}", data).unwrap(),
			"none"
		);
	}

	#[test]
	fn library_templates_are_permissive() {
		let engine = TemplateEngine::from_templates(
			[("jira.priority", "{% if commonLabels.severity == 'critical' %}Highest{% else %}Low{% endif %}")],
			&FunctionTable::builtin(),
		)
		.unwrap();
		let context = TemplateEngine::context(&json!({"commonLabels": {}})).unwrap();

		assert_eq!(engine.render(r#"{% include "jira.priority" %}"#, &context).unwrap(), "Low");
	}

	#[test]
	fn parse_errors_are_surfaced() {
		assert!(matches!(render("{{ status ", json!({})), Err(TemplateError::Parse { .. })));
	}

	#[test]
	fn execution_errors_are_surfaced() {
		let err = render("{{ status | reReplaceAll(pattern='(', repl='') }}", json!({"status": "x"}));
		assert!(matches!(err, Err(TemplateError::Render { .. })));
	}

	#[test]
	fn case_functions() {
		let data = json!({"s": "hello wORLD"});

		assert_eq!(render("{{ s | toUpper }}", data.clone()).unwrap(), "HELLO WORLD");
		assert_eq!(render("{{ s | toLower }}", data.clone()).unwrap(), "hello world");
		assert_eq!(render("{{ s | title }}", data).unwrap(), "Hello World");
	}

	#[test]
	fn join_takes_separator_first() {
		let data = json!({"values": ["a", "b", "c"]});

		assert_eq!(render("{{ values | join(sep=', ') }}", data.clone()).unwrap(), "a, b, c");
		assert_eq!(render("{{ join(sep='-', values=values) }}", data).unwrap(), "a-b-c");
	}

	#[test]
	fn regex_functions() {
		let data = json!({"host": "node-01.example.com"});

		assert_eq!(
			render(r"{{ host | reReplaceAll(pattern='\.example\.com$', repl='') }}", data.clone())
				.unwrap(),
			"node-01"
		);
		assert_eq!(
			render(r"{{ reReplaceAll(pattern='node-(\d+)', repl='n$1', text=host) }}", data.clone())
				.unwrap(),
			"n01.example.com"
		);
		assert_eq!(
			render(r"{% if match(pattern='^node', text=host) %}node{% endif %}", data).unwrap(),
			"node"
		);
	}

	#[test]
	fn string_slice_builds_sequence() {
		assert_eq!(
			render("{{ stringSlice(a='x', b='y', c=['z']) | join(sep='/') }}", json!({})).unwrap(),
			"x/y/z"
		);
	}

	#[test]
	fn get_env_reads_environment() {
		env::set_var("ALERTBRIDGE_TEMPLATE_TEST", "from-env");

		assert_eq!(render("{{ getEnv(name='ALERTBRIDGE_TEMPLATE_TEST') }}", json!({})).unwrap(), "from-env");
		assert_eq!(render("{{ getEnv(name='ALERTBRIDGE_TEMPLATE_UNSET') }}", json!({})).unwrap(), "");
	}

	#[test]
	fn includes_named_templates() {
		let engine = TemplateEngine::from_templates(
			[
				(
					"jira.summary",
					"[{{ status | toUpper }}{% if status == 'firing' %}:{{ alerts | filter(attribute='status', value='firing') | length }}{% endif %}] {% for name, value in groupLabels %}{{ value }} {% endfor %}",
				),
				(
					"jira.description",
					"{% for alert in alerts %}{% for name, value in alert.labels %} - {{ name }} = {{ value }}\n{% endfor %}Source: {{ alert.generatorURL }}\n{% endfor %}",
				),
			],
			&FunctionTable::builtin(),
		)
		.unwrap();

		let data = Data {
			status: Status::Firing,
			alerts: vec![
				Alert {
					status: Status::Firing,
					generator_url: "gen url".into(),
					labels: [("b", "2"), ("a", "1"), ("new", "3")]
						.into_iter()
						.map(|(k, v)| (k.to_string(), v.to_string()))
						.collect(),
					..Default::default()
				},
				Alert {
					status: Status::Firing,
					generator_url: "gen url".into(),
					labels: [("a", "1")].into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
					..Default::default()
				},
			],
			group_labels: [("b", "2"), ("a", "1")]
				.into_iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
			..Default::default()
		};
		let context = TemplateEngine::context(&data).unwrap();

		assert_eq!(engine.render(r#"{% include "jira.summary" %}"#, &context).unwrap(), "[FIRING:2] 1 2 ");
		assert_eq!(
			engine.render(r#"{% include "jira.description" %}"#, &context).unwrap(),
			" - a = 1\n - b = 2\n - new = 3\nSource: gen url\n - a = 1\nSource: gen url\n"
		);
		assert_eq!(engine.template_names().count(), 2);
	}

	#[test]
	fn renders_do_not_leak_into_library() {
		let engine = engine();
		let context = Context::new();

		engine.render("{{ 1 + 1 }}", &context).unwrap();
		assert_eq!(engine.template_names().count(), 0);
	}
}
