//! Placeholder resolution for task parameters and conditions
//!
//! A placeholder has the form `${source:path}`:
//!
//! | source    | path              | missing value        |
//! |-----------|-------------------|----------------------|
//! | `context` | `<task>.<field>`  | empty string         |
//! | `env`     | `<NAME>`          | empty string         |
//! | `infra`   | `<service>.<key>` | empty string         |
//! | `param`   | `<name>`          | `UnknownParameter`   |
//!
//! Context lookups are lenient because a skipped upstream task records
//! fewer fields than one that ran.

use crate::core::{context::RunContext, run_info::RunInfo, value::ParamValue, InfraOutputs};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while resolving placeholders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid reference '{0}'")]
    InvalidReference(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("expected a list of strings, found {found}")]
    NotAStringList { found: String },
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Resolves placeholders against the sources of truth of one run
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    context: &'a RunContext,
    infra: &'a InfraOutputs,
    run: &'a RunInfo,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a RunContext, infra: &'a InfraOutputs, run: &'a RunInfo) -> Self {
        Self { context, infra, run }
    }

    /// Substitute every placeholder in `input`
    pub fn resolve_str(&self, input: &str) -> Result<String, ResolveError> {
        let mut error = None;
        let resolved = placeholder_re().replace_all(input, |caps: &Captures| {
            match self.lookup(caps[1].trim()) {
                Ok(value) => value,
                Err(e) => {
                    error.get_or_insert(e);
                    String::new()
                }
            }
        });

        match error {
            Some(e) => Err(e),
            None => Ok(resolved.into_owned()),
        }
    }

    /// Resolve every string leaf of a value tree, keeping its shape
    pub fn resolve_value(&self, value: &ParamValue) -> Result<ParamValue, ResolveError> {
        Ok(match value {
            ParamValue::String(s) => ParamValue::String(self.resolve_str(s)?),
            ParamValue::List(items) => ParamValue::List(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<Result<_, ResolveError>>()?,
            ),
            ParamValue::Map(map) => ParamValue::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_, ResolveError>>()?,
            ),
            scalar => scalar.clone(),
        })
    }

    /// Resolve a value and coerce it into a list of strings
    pub fn resolve_string_list(&self, value: &ParamValue) -> Result<Vec<String>, ResolveError> {
        string_list(&self.resolve_value(value)?)
    }

    fn lookup(&self, key: &str) -> Result<String, ResolveError> {
        let invalid = || ResolveError::InvalidReference(format!("${{{}}}", key));
        let (source, path) = key.split_once(':').ok_or_else(invalid)?;
        let path = path.trim();

        match source.trim() {
            "context" => {
                let (task, field) = path.split_once('.').ok_or_else(invalid)?;
                Ok(self.context.event_value(task, field).unwrap_or_default())
            }
            "env" => Ok(std::env::var(path).unwrap_or_default()),
            "infra" => {
                let (service, output) = path.split_once('.').ok_or_else(invalid)?;
                Ok(self
                    .infra
                    .get(service)
                    .and_then(|outputs| outputs.get(output))
                    .cloned()
                    .unwrap_or_default())
            }
            "param" => self
                .run
                .param(path)
                .map(str::to_string)
                .ok_or_else(|| ResolveError::UnknownParameter(path.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// Coerce an already resolved value into a list of strings
///
/// A lone string counts as a one-element list.
pub fn string_list(value: &ParamValue) -> Result<Vec<String>, ResolveError> {
    match value {
        ParamValue::String(s) => Ok(vec![s.clone()]),
        ParamValue::List(items) => items
            .iter()
            .map(|item| match item {
                ParamValue::String(s) => Ok(s.clone()),
                other => Err(ResolveError::NotAStringList {
                    found: format!("list containing {}", other.kind()),
                }),
            })
            .collect(),
        other => Err(ResolveError::NotAStringList {
            found: other.kind().to_string(),
        }),
    }
}
