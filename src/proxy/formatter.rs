//! Entity formatting.
//!
//! # Responsibilities
//! - Define the [`EntityFormatter`] capability applied after decoding
//! - Provide the per-backend [`PropertyFormatter`]
//!
//! # Design Decisions
//! - Formatting is total: it always yields a response, never an error
//! - Property operations run in a fixed order: target, allow/deny,
//!   mapping, group
//! - `allow` takes precedence over `deny` when both are configured

use serde_json::{Map, Value};

use crate::config::BackendConfig;
use crate::encoding::Payload;
use crate::proxy::response::Response;

/// Transforms a decoded response.
pub trait EntityFormatter: Send + Sync {
    fn format(&self, response: Response) -> Response;
}

impl<F> EntityFormatter for F
where
    F: Fn(Response) -> Response + Send + Sync,
{
    fn format(&self, response: Response) -> Response {
        self(response)
    }
}

/// Returns the response unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFormatter;

impl EntityFormatter for IdentityFormatter {
    fn format(&self, response: Response) -> Response {
        response
    }
}

type DotPath = Vec<String>;

#[derive(Debug, Clone, Default)]
enum Filter {
    #[default]
    None,
    Allow(Vec<DotPath>),
    Deny(Vec<DotPath>),
}

/// Field extraction, filtering, renaming and grouping for a backend.
#[derive(Debug, Clone, Default)]
pub struct PropertyFormatter {
    target: Option<DotPath>,
    filter: Filter,
    mapping: Vec<(String, String)>,
    group: Option<String>,
}

impl PropertyFormatter {
    /// Build from a backend's formatting options.
    pub fn from_backend(backend: &BackendConfig) -> Self {
        let filter = if !backend.allow.is_empty() {
            Filter::Allow(backend.allow.iter().map(|p| split_path(p)).collect())
        } else if !backend.deny.is_empty() {
            Filter::Deny(backend.deny.iter().map(|p| split_path(p)).collect())
        } else {
            Filter::None
        };

        Self {
            target: backend.target.as_deref().map(split_path),
            filter,
            mapping: backend
                .mapping
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            group: backend.group.clone(),
        }
    }

    /// True when formatting would leave every response unchanged.
    pub fn is_identity(&self) -> bool {
        self.target.is_none()
            && matches!(self.filter, Filter::None)
            && self.mapping.is_empty()
            && self.group.is_none()
    }

    fn apply(&self, mut data: Payload) -> Payload {
        if let Some(target) = &self.target {
            data = match remove_path(&mut data, target) {
                Some(Value::Object(inner)) => inner,
                _ => Payload::new(),
            };
        }

        match &self.filter {
            Filter::None => {}
            Filter::Allow(paths) => {
                let mut kept = Payload::new();
                for path in paths {
                    if let Some(value) = lookup(&data, path) {
                        insert_path(&mut kept, path, value.clone());
                    }
                }
                data = kept;
            }
            Filter::Deny(paths) => {
                for path in paths {
                    remove_path(&mut data, path);
                }
            }
        }

        for (from, to) in &self.mapping {
            if let Some(value) = data.remove(from) {
                data.insert(to.clone(), value);
            }
        }

        if let Some(group) = &self.group {
            let mut wrapped = Payload::new();
            wrapped.insert(group.clone(), Value::Object(data));
            data = wrapped;
        }

        data
    }
}

impl EntityFormatter for PropertyFormatter {
    fn format(&self, mut response: Response) -> Response {
        if !self.is_identity() {
            let data = std::mem::take(&mut response.data);
            response.data = self.apply(data);
        }
        response
    }
}

fn split_path(path: &str) -> DotPath {
    path.split('.').map(str::to_string).collect()
}

fn lookup<'a>(data: &'a Payload, path: &[String]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut current = data;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

fn remove_path(data: &mut Payload, path: &[String]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = data;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.remove(last)
}

fn insert_path(data: &mut Payload, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = data;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry.as_object_mut() {
            Some(inner) => inner,
            None => return,
        };
    }
    current.insert(last.clone(), value);
}
