//! Route Composer: turns the descriptor set into the live dispatch table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use trellis_sdk::HttpMethod;

use super::descriptor::{CORE_OWNER, EndpointDescriptor, RouteKey};
use super::error::RegistryError;
use super::path::{PathTemplate, decode_segments};

/// A route served by the kernel itself rather than a plugin.
#[derive(Debug, Clone)]
pub struct CoreRoute {
    pub method: HttpMethod,
    pub path: String,
    template: PathTemplate,
}

impl CoreRoute {
    pub fn new(method: HttpMethod, path: &str) -> Result<Self, String> {
        let template = PathTemplate::parse(path)?;
        Ok(Self {
            method,
            path: path.to_string(),
            template,
        })
    }

    fn key(&self) -> RouteKey {
        RouteKey {
            method: self.method,
            shape: self.template.shape(),
        }
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub descriptor: Arc<EndpointDescriptor>,
    pub params: HashMap<String, String>,
}

/// Immutable, queryable routing structure built by [`compose`].
#[derive(Debug, Default)]
pub struct DispatchTable {
    exact: HashMap<(HttpMethod, String), Arc<EndpointDescriptor>>,
    /// Routes with parameter segments, most specific first.
    templated: Vec<Arc<EndpointDescriptor>>,
    by_tag: BTreeMap<String, Vec<Arc<EndpointDescriptor>>>,
    by_prefix: BTreeMap<String, Vec<Arc<EndpointDescriptor>>>,
    generation: u64,
}

impl DispatchTable {
    /// Resolve a raw request path. Exact routes win over templated ones.
    ///
    /// Segments are percent-decoded before matching, so parameters reach
    /// handlers decoded and non-ASCII literals match their encoded form.
    pub fn lookup(&self, method: HttpMethod, path: &str) -> Option<RouteMatch> {
        let segments = decode_segments(path)?;

        // A decoded `/` can only fill a parameter, never a literal.
        if !segments.iter().any(|s| s.contains('/')) {
            let normalized = format!("/{}", segments.join("/"));
            if let Some(descriptor) = self.exact.get(&(method, normalized)) {
                return Some(RouteMatch {
                    descriptor: Arc::clone(descriptor),
                    params: HashMap::new(),
                });
            }
        }

        self.templated
            .iter()
            .filter(|d| d.method == method)
            .find_map(|d| {
                d.template()
                    .match_segments(&segments)
                    .map(|params| RouteMatch {
                        descriptor: Arc::clone(d),
                        params,
                    })
            })
    }

    /// Every live descriptor, grouped by tag, tags in name order.
    pub fn by_tag(&self) -> &BTreeMap<String, Vec<Arc<EndpointDescriptor>>> {
        &self.by_tag
    }

    pub fn by_prefix(&self) -> &BTreeMap<String, Vec<Arc<EndpointDescriptor>>> {
        &self.by_prefix
    }

    /// Every live descriptor, ordered by full path then method.
    pub fn descriptors(&self) -> Vec<Arc<EndpointDescriptor>> {
        let mut all: Vec<_> = self.by_tag.values().flatten().cloned().collect();
        all.sort_by(|a, b| {
            a.full_path
                .cmp(&b.full_path)
                .then_with(|| a.method.cmp(&b.method))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.templated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter, bumped on every successful composition.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Build a dispatch table from the descriptor set.
///
/// Fails without producing a table when two descriptors share a route key or
/// a descriptor collides with a core route.
pub fn compose(
    core: &[CoreRoute],
    descriptors: &[Arc<EndpointDescriptor>],
    generation: u64,
) -> Result<DispatchTable, RegistryError> {
    let core_keys: HashSet<RouteKey> = core.iter().map(CoreRoute::key).collect();
    let mut seen: HashMap<RouteKey, &str> = HashMap::new();
    let mut table = DispatchTable {
        generation,
        ..DispatchTable::default()
    };

    for descriptor in descriptors {
        let key = descriptor.key();

        let shadows_core = core_keys.contains(&key)
            || (descriptor.template().is_static()
                && core.iter().any(|c| {
                    c.method == descriptor.method
                        && c.template.matches(&descriptor.full_path).is_some()
                }));
        if shadows_core {
            return Err(RegistryError::conflict(
                descriptor.method,
                descriptor.full_path.clone(),
                descriptor.owner.clone(),
                CORE_OWNER,
            ));
        }

        if let Some(existing) = seen.insert(key, &descriptor.owner) {
            return Err(RegistryError::conflict(
                descriptor.method,
                descriptor.full_path.clone(),
                descriptor.owner.clone(),
                existing,
            ));
        }

        if descriptor.template().is_static() {
            table.exact.insert(
                (descriptor.method, descriptor.full_path.clone()),
                Arc::clone(descriptor),
            );
        } else {
            table.templated.push(Arc::clone(descriptor));
        }

        table
            .by_tag
            .entry(descriptor.tag.clone())
            .or_default()
            .push(Arc::clone(descriptor));
        table
            .by_prefix
            .entry(descriptor.prefix.clone())
            .or_default()
            .push(Arc::clone(descriptor));
    }

    table.templated.sort_by(|a, b| {
        b.template()
            .literal_count()
            .cmp(&a.template().literal_count())
            .then_with(|| a.full_path.cmp(&b.full_path))
    });
    for group in table.by_tag.values_mut().chain(table.by_prefix.values_mut()) {
        group.sort_by(|a, b| {
            a.full_path
                .cmp(&b.full_path)
                .then_with(|| a.method.cmp(&b.method))
        });
    }

    Ok(table)
}
