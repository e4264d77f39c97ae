//! Receiver configuration.
//!
//! Every alertmanager receiver is mapped to a [ReceiverConfig]. The config file
//! contains a `defaults` section and a list of receivers, both deserialized
//! into [ReceiverSettings]. [resolve_receivers] merges the defaults into every
//! receiver and validates the result, so the reconciliation never sees an
//! incomplete config.

mod duration;
mod field;

use std::{collections::BTreeMap, collections::HashSet, fmt};

pub use duration::{DurationError, ReopenDuration};
pub use field::FieldValue;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use url::Url;

/// Error occuring when merging and validating receiver configs
#[derive(Error, Debug)]
pub enum ConfigError {
	/// a mandatory field is neither set by the receiver nor in the defaults
	#[error("missing {field} in receiver {receiver:?}")]
	MissingField {
		/// config key of the field
		field: &'static str,
		/// receiver name
		receiver: String,
	},
	/// a receiver without name
	#[error("missing name for receiver")]
	MissingName,
	/// two receivers share a name
	#[error("receiver {0:?} is defined more than once")]
	DuplicateReceiver(String),
	/// the receiver list is empty
	#[error("no receivers defined")]
	NoReceivers,
	/// `api_url` is not a valid url
	#[error("invalid api_url {url:?} in receiver {receiver:?}")]
	InvalidUrl {
		/// the configured url
		url: String,
		/// receiver name
		receiver: String,
		/// parse error
		#[source]
		source: url::ParseError,
	},
	/// user/password and token configured in the same section
	#[error("bad auth config in {0}: user/password and PAT authentication are mutually exclusive")]
	ConflictingAuth(String),
	/// neither user/password nor token available
	#[error("missing authentication in receiver {0:?}")]
	MissingAuth(String),
	/// `auto_resolve` without target state
	#[error("bad config in {0}: 'auto_resolve' was defined with empty 'state' field")]
	EmptyAutoResolveState(String),
}

/// A string that must not be revealed when the config is dumped
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
	/// construct a secret
	pub fn new(secret: impl Into<String>) -> Self {
		Self(secret.into())
	}

	/// the secret value
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// true if no secret is set
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<secret>")
	}
}

impl Serialize for Secret {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str("<secret>")
	}
}

/// transition applied to open tickets once every alert of the group resolved
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutoResolve {
	/// name of the transition
	pub state: String,
}

/// How to authenticate against the ticket backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Auth {
	/// basic auth
	Basic {
		/// user name
		user: String,
		/// password
		password: Secret,
	},
	/// personal access token, sent as bearer token
	Token(Secret),
}

/// A receiver or the defaults section as written in the config file. Every
/// field is optional here, [ReceiverConfig::merge] fills in the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct ReceiverSettings {
	pub name: String,

	// API access fields
	pub api_url: Option<String>,
	pub user: Option<String>,
	pub password: Option<Secret>,
	pub personal_access_token: Option<Secret>,

	// required issue fields
	pub project: Option<String>,
	pub issue_type: Option<String>,
	pub summary: Option<String>,
	pub reopen_state: Option<String>,
	pub reopen_duration: Option<ReopenDuration>,

	// optional issue fields
	pub other_projects: Vec<String>,
	pub priority: Option<String>,
	pub description: Option<String>,
	pub wont_fix_resolution: Option<String>,
	pub fields: BTreeMap<String, FieldValue>,
	pub components: Vec<String>,
	pub static_labels: Vec<String>,

	pub add_group_labels: Option<bool>,
	pub update_in_comment: Option<bool>,
	pub auto_resolve: Option<AutoResolve>,
}

/// Fully resolved configuration of one receiver
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverConfig {
	/// name of the alertmanager receiver
	pub name: String,

	/// base url of the ticket backend
	pub api_url: Url,
	/// credentials for the ticket backend
	pub auth: Auth,

	/// project template
	pub project: String,
	/// projects searched in addition to `project`, tickets may have been moved
	pub other_projects: Vec<String>,
	/// issue type template
	pub issue_type: String,
	/// summary template
	pub summary: String,
	/// description template, may be empty
	pub description: String,
	/// priority template
	pub priority: Option<String>,
	/// transition used to reopen resolved tickets
	pub reopen_state: String,
	/// resolved tickets older than this aren't reopened, zero means always reopen
	pub reopen_duration: ReopenDuration,
	/// resolution exempting a ticket from being reopened
	pub wont_fix_resolution: Option<String>,
	/// labels attached to every new ticket
	pub static_labels: Vec<String>,
	/// attach every group label as `key="value"` to new tickets
	pub add_group_labels: bool,
	/// component templates
	pub components: Vec<String>,
	/// additional ticket fields, every string is a template
	pub fields: BTreeMap<String, FieldValue>,
	/// transition for tickets whose alerts all resolved
	pub auto_resolve: Option<AutoResolve>,
	/// add description changes as comments
	pub update_in_comment: bool,
}

/// non empty receiver value or else non empty default value
fn pick(receiver: &Option<String>, defaults: &Option<String>) -> Option<String> {
	receiver
		.as_ref()
		.filter(|s| !s.is_empty())
		.or_else(|| defaults.as_ref().filter(|s| !s.is_empty()))
		.cloned()
}

/// like [pick] but reports a missing mandatory field
fn require(
	receiver: &ReceiverSettings,
	defaults: &ReceiverSettings,
	field: &'static str,
	get: impl Fn(&ReceiverSettings) -> &Option<String>,
) -> Result<String, ConfigError> {
	pick(get(receiver), get(defaults))
		.ok_or_else(|| ConfigError::MissingField { field, receiver: receiver.name.clone() })
}

/// true if the optional secret holds a value
fn present(secret: &Option<Secret>) -> bool {
	secret.as_ref().map_or(false, |s| !s.is_empty())
}

/// true if the optional string holds a value
fn set(value: &Option<String>) -> bool {
	value.as_ref().map_or(false, |s| !s.is_empty())
}

impl ReceiverSettings {
	/// user/password and token must not be mixed in one section
	fn check_auth(&self, section: &str) -> Result<(), ConfigError> {
		if (set(&self.user) || present(&self.password)) && present(&self.personal_access_token) {
			return Err(ConfigError::ConflictingAuth(section.to_owned()));
		}
		Ok(())
	}

	/// `auto_resolve` needs a state
	fn check_auto_resolve(&self, section: &str) -> Result<(), ConfigError> {
		match &self.auto_resolve {
			Some(AutoResolve { state }) if state.is_empty() => {
				Err(ConfigError::EmptyAutoResolveState(section.to_owned()))
			}
			_ => Ok(()),
		}
	}
}

impl ReceiverConfig {
	/// Merges `defaults` into `receiver`.
	///
	/// Scalars set by the receiver win, otherwise the default is used. Fields
	/// missing in the receiver are copied from the defaults, static labels of
	/// the defaults are appended to the receiver's.
	pub fn merge(receiver: &ReceiverSettings, defaults: &ReceiverSettings) -> Result<Self, ConfigError> {
		let name = receiver.name.clone();
		if name.is_empty() {
			return Err(ConfigError::MissingName);
		}

		let section = format!("receiver {name:?}");
		receiver.check_auth(&section)?;
		receiver.check_auto_resolve(&section)?;

		let url = require(receiver, defaults, "api_url", |s| &s.api_url)?;
		let api_url = Url::parse(&url).map_err(|source| ConfigError::InvalidUrl {
			url: url.clone(),
			receiver: name.clone(),
			source,
		})?;

		let auth = Self::merge_auth(receiver, defaults)?;

		let reopen_duration = receiver
			.reopen_duration
			.or(defaults.reopen_duration)
			.ok_or_else(|| ConfigError::MissingField { field: "reopen_duration", receiver: name.clone() })?;

		let mut fields = receiver.fields.clone();
		for (key, value) in &defaults.fields {
			fields.entry(key.clone()).or_insert_with(|| value.clone());
		}

		let mut static_labels = receiver.static_labels.clone();
		static_labels.extend(defaults.static_labels.iter().cloned());

		let other_projects = if receiver.other_projects.is_empty() {
			defaults.other_projects.clone()
		} else {
			receiver.other_projects.clone()
		};

		let components = if receiver.components.is_empty() {
			defaults.components.clone()
		} else {
			receiver.components.clone()
		};

		Ok(Self {
			project: require(receiver, defaults, "project", |s| &s.project)?,
			issue_type: require(receiver, defaults, "issue_type", |s| &s.issue_type)?,
			summary: require(receiver, defaults, "summary", |s| &s.summary)?,
			reopen_state: require(receiver, defaults, "reopen_state", |s| &s.reopen_state)?,
			reopen_duration,
			description: pick(&receiver.description, &defaults.description).unwrap_or_default(),
			priority: pick(&receiver.priority, &defaults.priority),
			wont_fix_resolution: pick(&receiver.wont_fix_resolution, &defaults.wont_fix_resolution),
			other_projects,
			components,
			fields,
			static_labels,
			add_group_labels: receiver.add_group_labels.or(defaults.add_group_labels).unwrap_or(false),
			update_in_comment: receiver.update_in_comment.or(defaults.update_in_comment).unwrap_or(false),
			auto_resolve: receiver.auto_resolve.clone().or_else(|| defaults.auto_resolve.clone()),
			api_url,
			auth,
			name,
		})
	}

	/// Complete basic auth from the defaults, fall back to the default token.
	fn merge_auth(receiver: &ReceiverSettings, defaults: &ReceiverSettings) -> Result<Auth, ConfigError> {
		if set(&receiver.user) && present(&receiver.password) {
			return Ok(Auth::Basic {
				user: receiver.user.clone().unwrap_or_default(),
				password: receiver.password.clone().unwrap_or_default(),
			});
		}

		if let Some(token) = receiver.personal_access_token.clone().filter(|t| !t.is_empty()) {
			return Ok(Auth::Token(token));
		}

		let user = pick(&receiver.user, &defaults.user);
		let password = receiver
			.password
			.clone()
			.filter(|p| !p.is_empty())
			.or_else(|| defaults.password.clone().filter(|p| !p.is_empty()));

		match (user, password) {
			(Some(user), Some(password)) => Ok(Auth::Basic { user, password }),
			_ => defaults
				.personal_access_token
				.clone()
				.filter(|t| !t.is_empty())
				.map(Auth::Token)
				.ok_or_else(|| ConfigError::MissingAuth(receiver.name.clone())),
		}
	}
}

/// Validates the defaults section and resolves every receiver.
pub fn resolve_receivers(
	defaults: &ReceiverSettings,
	receivers: &[ReceiverSettings],
) -> Result<Vec<ReceiverConfig>, ConfigError> {
	defaults.check_auth("defaults section")?;
	defaults.check_auto_resolve("defaults section")?;

	if receivers.is_empty() {
		return Err(ConfigError::NoReceivers);
	}

	let mut names = HashSet::new();
	receivers
		.iter()
		.map(|receiver| {
			if !receiver.name.is_empty() && !names.insert(receiver.name.as_str()) {
				return Err(ConfigError::DuplicateReceiver(receiver.name.clone()));
			}
			ReceiverConfig::merge(receiver, defaults)
		})
		.collect()
}
