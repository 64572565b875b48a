//! Topological ordering of `FileDescriptorProto`s by their `dependency`
//! lists, so that registering files into a live descriptor pool one at a
//! time always sees a file's dependencies already registered.

use std::collections::{HashMap, HashSet};

use prost_types::FileDescriptorProto;

/// Order `files` so that every file appears after all the dependencies it
/// lists that are themselves present in `files`. A dependency name not
/// present in the input union is silently skipped — the live registry is
/// expected to already know about it (e.g. a well-known type).
#[must_use]
pub fn order_by_dependencies(files: Vec<FileDescriptorProto>) -> Vec<FileDescriptorProto> {
    let by_name: HashMap<String, FileDescriptorProto> = files
        .into_iter()
        .filter_map(|f| f.name.clone().map(|name| (name, f)))
        .collect();

    let mut visited: HashSet<String> = HashSet::new();
    let mut ordered: Vec<FileDescriptorProto> = Vec::with_capacity(by_name.len());

    // Iterate names in a stable order so output is deterministic given the
    // same input, independent of HashMap iteration order.
    let mut names: Vec<&String> = by_name.keys().collect();
    names.sort();

    for name in names {
        visit(name, &by_name, &mut visited, &mut ordered);
    }
    ordered
}

fn visit(
    name: &str,
    by_name: &HashMap<String, FileDescriptorProto>,
    visited: &mut HashSet<String>,
    ordered: &mut Vec<FileDescriptorProto>,
) {
    if visited.contains(name) {
        return;
    }
    let Some(file) = by_name.get(name) else {
        return;
    };
    visited.insert(name.to_string());
    for dep in &file.dependency {
        visit(dep, by_name, visited, ordered);
    }
    ordered.push(file.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, deps: &[&str]) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            dependency: deps.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn dependencies_precede_dependents() {
        let files = vec![
            file("c.proto", &["b.proto"]),
            file("a.proto", &[]),
            file("b.proto", &["a.proto"]),
        ];
        let ordered = order_by_dependencies(files);
        let names: Vec<String> = ordered.iter().map(|f| f.name().to_owned()).collect();
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(pos("a.proto") < pos("b.proto"));
        assert!(pos("b.proto") < pos("c.proto"));
    }

    #[test]
    fn missing_dependency_is_skipped_not_errored() {
        let files = vec![file("a.proto", &["missing.proto"])];
        let ordered = order_by_dependencies(files);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].name(), "a.proto");
    }
}
