//! The routing table: per-method ordered pattern lists, and a lock-free
//! reloadable holder for the table currently in service.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::RouteError;
use crate::fieldpath;
use crate::pattern::{CompiledPattern, Variable};
use crate::route::{BodyRule, MethodKind, Route, RpcSpec};

#[derive(Debug)]
struct Entry {
    compiled: CompiledPattern,
    route: Route,
    body_rule: BodyRule,
}

/// An immutable snapshot of every registered route, grouped by method.
#[derive(Debug, Default)]
pub struct RouteTable {
    by_method: HashMap<MethodKind, Vec<Entry>>,
}

/// The outcome of a successful [`RouteTable::find`].
pub struct Match {
    /// Variables captured from the path, in write order.
    pub captures: Vec<Variable>,
    /// The original template string of the matched route.
    pub template: String,
    /// How to interpret the request body for this route.
    pub body_rule: BodyRule,
    /// The bound RPC.
    pub rpc: RpcSpec,
}

impl RouteTable {
    /// An empty table with no registered routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `route`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when the pattern fails to parse, the route has
    /// no request descriptor, a capture or body field path is incompatible
    /// with the request schema, or another route already claims the same
    /// `(method, pattern)` pair.
    pub fn push(&mut self, route: Route) -> Result<(), RouteError> {
        let compiled = CompiledPattern::parse(&route.pattern)
            .map_err(|e| RouteError::PatternInvalid(route.pattern.clone(), e))?;

        let request = route.rpc.request.clone();

        for op in compiled.operations() {
            if let crate::pattern::Operation::EndCapture(path) = op {
                fieldpath::validate(&request, path)
                    .map_err(|e| RouteError::FieldPathInvalid(path.clone(), e))?;
            }
        }

        let existing = self.by_method.entry(route.method).or_default();
        if existing
            .iter()
            .any(|e| e.compiled.template() == compiled.template())
        {
            return Err(RouteError::Duplicate(
                route.method.to_string(),
                route.pattern.clone(),
            ));
        }

        let body_rule = BodyRule::from_selector(&route.body);
        if let BodyRule::FieldPath(path) = &body_rule {
            fieldpath::validate(&request, path)
                .map_err(|e| RouteError::FieldPathInvalid(path.clone(), e))?;
        }

        existing.push(Entry {
            compiled,
            route,
            body_rule,
        });
        Ok(())
    }

    /// Find the first route registered for `method` whose pattern matches
    /// `path`.
    #[must_use]
    pub fn find(&self, method: MethodKind, path: &str) -> Option<Match> {
        let entries = self.by_method.get(&method)?;
        for entry in entries {
            if let Some(captures) = entry.compiled.matches(path) {
                return Some(Match {
                    captures,
                    template: entry.compiled.template().to_string(),
                    body_rule: entry.body_rule.clone(),
                    rpc: entry.route.rpc.clone(),
                });
            }
        }
        None
    }

    /// Number of registered routes, across all methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_method.values().map(Vec::len).sum()
    }

    /// Whether the table has no registered routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A lock-free, atomically-swappable holder for the live [`RouteTable`].
///
/// Readers call [`ReloadableTable::load`] to get a cheap `Arc` snapshot that
/// remains valid for the lifetime of one request, even across a concurrent
/// reload; the reloader installs a new table with [`ReloadableTable::store`]
/// in one atomic operation. There is no lock on the read path.
pub struct ReloadableTable {
    inner: ArcSwap<RouteTable>,
}

impl ReloadableTable {
    /// Create a holder seeded with `table`.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            inner: ArcSwap::from_pointee(table),
        }
    }

    /// Take a snapshot of the currently installed table.
    #[must_use]
    pub fn load(&self) -> Arc<RouteTable> {
        self.inner.load_full()
    }

    /// Atomically install a new table, replacing whatever was live.
    ///
    /// In-flight readers that already called [`load`](Self::load) keep
    /// using their snapshot; the old table is dropped once its last reader
    /// releases it.
    pub fn store(&self, table: RouteTable) {
        self.inner.store(Arc::new(table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};

    /// Build a tiny self-contained pool with one message carrying a handful
    /// of string fields, enough for capture/body field paths in these tests.
    fn test_message() -> prost_reflect::MessageDescriptor {
        let field = |name: &str, number: i32| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::String as i32),
            json_name: Some(name.to_string()),
            ..Default::default()
        };
        let message = DescriptorProto {
            name: Some("TestMsg".to_string()),
            field: vec![field("id", 1), field("x", 2), field("username", 3)],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("pkg".to_string()),
            message_type: vec![message],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };
        let set = prost_types::FileDescriptorSet { file: vec![file] };
        let pool = DescriptorPool::decode(set.encode_to_vec().as_slice())
            .expect("well-formed test descriptor set");
        pool.get_message_by_name("pkg.TestMsg")
            .expect("TestMsg registered")
    }

    fn route(pattern: &str, method: MethodKind) -> Route {
        Route {
            pattern: pattern.to_string(),
            method,
            body: String::new(),
            rpc: RpcSpec {
                service: "/pkg.Svc".to_string(),
                method: "Method".to_string(),
                request: test_message(),
                response: test_message(),
            },
        }
    }

    #[test]
    fn duplicate_route_rejected() {
        let mut table = RouteTable::new();
        table
            .push(route("/api/v1/users/{id}", MethodKind::Post))
            .unwrap();
        let err = table.push(route("/api/v1/users/{id}", MethodKind::Post));
        assert!(matches!(err, Err(RouteError::Duplicate(_, _))));
        assert!(table.find(MethodKind::Post, "/api/v1/users/5").is_some());
    }

    #[test]
    fn find_returns_first_match_in_insertion_order() {
        let mut table = RouteTable::new();
        table.push(route("/v1/a/{x}", MethodKind::Get)).unwrap();
        table.push(route("/v1/a/fixed", MethodKind::Get)).unwrap();
        let found = table.find(MethodKind::Get, "/v1/a/fixed").unwrap();
        assert_eq!(found.template, "/v1/a/{x}");
    }

    #[test]
    fn reloadable_table_swap_is_visible_to_new_readers() {
        let mut first = RouteTable::new();
        first.push(route("/v1/old", MethodKind::Get)).unwrap();
        let holder = ReloadableTable::new(first);
        assert!(holder.load().find(MethodKind::Get, "/v1/old").is_some());

        let mut second = RouteTable::new();
        second.push(route("/v1/new", MethodKind::Get)).unwrap();
        let old_snapshot = holder.load();
        holder.store(second);

        assert!(old_snapshot.find(MethodKind::Get, "/v1/old").is_some());
        assert!(holder.load().find(MethodKind::Get, "/v1/new").is_some());
        assert!(holder.load().find(MethodKind::Get, "/v1/old").is_none());
    }
}
