//! Renders configured strings via tera templates against alert data.
//!
//! Every configurable string (project, summary, custom field values, ...) is a
//! template. Shared snippets can be loaded from template files and pulled in
//! via `{% include "<file name>" %}`.

use std::sync::{Mutex, PoisonError};

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tera::{Context, Tera};
use thiserror::Error;

/// a template failed to parse or to render
#[derive(Error, Debug)]
#[error("failed to render template {template:?}")]
pub struct RenderError {
	/// the template source
	template: String,
	/// the error reported by tera
	#[source]
	source: tera::Error,
}

/// Template renderer
pub struct Template {
	/// rendering one off templates requires mutable access
	tera: Mutex<Tera>,
}

impl Template {
	/// Return new renderer, loading the template files matching `glob` if
	/// given
	pub fn new(glob: Option<&str>) -> Result<Self> {
		let tera = match glob {
			Some(glob) => {
				tracing::info!("load templates from {glob}");
				Tera::new(glob).context("could not parse templates")?
			}
			None => Tera::default(),
		};

		Ok(Self::from_tera(tera))
	}

	/// wrap an already set up [Tera] instance
	pub fn from_tera(tera: Tera) -> Self {
		Self { tera: Mutex::new(tera) }
	}

	/// serialize `data` once so it can be used for rendering several templates
	pub fn context(data: &impl Serialize) -> Result<Context, RenderError> {
		Context::from_serialize(data)
			.map_err(|source| RenderError { template: String::new(), source })
	}

	/// Renders `template` with `context`
	///
	/// # Arguments
	///
	/// * `template` - template source
	///
	/// * `context` - data made available to the template
	pub fn execute(&self, template: &str, context: &Context) -> Result<String, RenderError> {
		let mut tera = self.tera.lock().unwrap_or_else(PoisonError::into_inner);

		tera.render_str(template, context)
			.map_err(|source| RenderError { template: template.to_owned(), source })
	}

	/// Returns a deep copy of `value` where every string, including the keys
	/// of nested objects, got rendered as a template. Numbers, booleans and
	/// null are copied as they are.
	pub fn deep_copy(&self, value: &Value, context: &Context) -> Result<Value, RenderError> {
		Ok(match value {
			Value::String(template) => Value::String(self.execute(template, context)?),
			Value::Array(values) => Value::Array(
				values
					.iter()
					.map(|value| self.deep_copy(value, context))
					.collect::<Result<_, _>>()?,
			),
			Value::Object(object) => {
				let mut copy = Map::with_capacity(object.len());
				for (key, value) in object {
					copy.insert(self.execute(key, context)?, self.deep_copy(value, context)?);
				}
				Value::Object(copy)
			}
			Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
		})
	}
}
