//! Name resolution over namespaces.
//!
//! A relative name is looked up in the starting namespace and then in each
//! enclosing one until it matches. Absolute paths start at the root and
//! never search outward. After the first segment each further segment
//! descends into the namespace opened by the previous match.

use super::address::{ComponentId, Namespace};
use super::error::EvalResult;
use super::tracker::Tracker;
use super::value::Value;
use crate::expr::{PathSegment, RefPath};

/// Resolves `path` from `from`; `probe` answers whether an id exists and is
/// called for every candidate tried, in order.
pub fn resolve_path(
    path: &RefPath,
    from: &Namespace,
    probe: &mut dyn FnMut(&ComponentId) -> bool,
) -> Option<ComponentId> {
    let mut segments = path.segments.iter().peekable();
    let mut namespace = if path.absolute {
        Namespace::root()
    } else {
        from.clone()
    };
    while let Some(PathSegment::Parent) = segments.peek() {
        namespace = namespace.parent()?;
        segments.next();
    }

    let first = match segments.next()? {
        PathSegment::Name(name) => name,
        PathSegment::Parent => return None,
    };
    let mut found = if path.absolute {
        let candidate = namespace.join(first);
        probe(&candidate).then_some(candidate)?
    } else {
        search_outward(&namespace, first, probe)?
    };

    for segment in segments {
        found = match segment {
            PathSegment::Name(name) => {
                let candidate = found.as_namespace().join(name);
                probe(&candidate).then_some(candidate)?
            }
            PathSegment::Parent => {
                let namespace = found.namespace();
                if namespace.is_root() {
                    return None;
                }
                ComponentId::new(namespace.as_str())
            }
        };
    }
    Some(found)
}

fn search_outward(
    start: &Namespace,
    name: &str,
    probe: &mut dyn FnMut(&ComponentId) -> bool,
) -> Option<ComponentId> {
    let mut namespace = Some(start.clone());
    while let Some(current) = namespace {
        let candidate = current.join(name);
        if probe(&candidate) {
            return Some(candidate);
        }
        namespace = current.parent();
    }
    None
}

/// Active descendants of `target` whose type is one of `types` (all types
/// when empty), in document order. `skip` is the collecting composite, so it
/// never gathers its own output.
pub fn collect_by_type(
    tracker: &mut Tracker<'_>,
    target: &ComponentId,
    types: &[String],
    skip: Option<&ComponentId>,
) -> EvalResult<Vec<ComponentId>> {
    let descendants = tracker.descendants(target, skip)?;
    Ok(descendants
        .into_iter()
        .filter(|id| {
            types.is_empty()
                || tracker
                    .class_of(id)
                    .is_some_and(|class| types.iter().any(|kind| class.is(kind)))
        })
        .collect())
}

/// `prop` of every match, in the same order as `collect_by_type`.
pub fn collect_prop(
    tracker: &mut Tracker<'_>,
    target: &ComponentId,
    types: &[String],
    prop: &str,
    skip: Option<&ComponentId>,
) -> EvalResult<Vec<Value>> {
    let matches = collect_by_type(tracker, target, types, skip)?;
    matches
        .iter()
        .map(|id| tracker.state(id, prop))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn world(ids: &[&str]) -> HashSet<ComponentId> {
        ids.iter().map(|id| ComponentId::from(*id)).collect()
    }

    fn resolve(existing: &HashSet<ComponentId>, path: &str, from: &str) -> Option<String> {
        let from = if from.is_empty() {
            Namespace::root()
        } else {
            ComponentId::from(from).as_namespace()
        };
        let path = RefPath::parse(path)?;
        resolve_path(&path, &from, &mut |id| existing.contains(id)).map(|id| id.to_string())
    }

    #[test]
    fn searches_outward_from_inner_namespace() {
        let existing = world(&["/n", "/a", "/a/count", "/a/v"]);
        assert_eq!(resolve(&existing, "v", "/a").as_deref(), Some("/a/v"));
        assert_eq!(resolve(&existing, "n", "/a").as_deref(), Some("/n"));
        assert_eq!(resolve(&existing, "count", "").as_deref(), None);
    }

    #[test]
    fn relative_descent_and_parent() {
        let existing = world(&["/a", "/a/count", "/b", "/b/count"]);
        assert_eq!(resolve(&existing, "a/count", "/b").as_deref(), Some("/a/count"));
        assert_eq!(resolve(&existing, "../a/count", "/b").as_deref(), Some("/a/count"));
        assert_eq!(resolve(&existing, "../count", "/b").as_deref(), None);
    }

    #[test]
    fn absolute_paths_do_not_search_outward() {
        let existing = world(&["/x", "/a", "/a/x"]);
        assert_eq!(resolve(&existing, "/x", "/a").as_deref(), Some("/x"));
        assert_eq!(resolve(&existing, "x", "/a").as_deref(), Some("/a/x"));
        assert_eq!(resolve(&existing, "/a/x", "").as_deref(), Some("/a/x"));
        assert_eq!(resolve(&existing, "/y", "/a").as_deref(), None);
    }

    #[test]
    fn probes_are_reported_in_order() {
        let existing = world(&["/n"]);
        let mut probed = Vec::new();
        let from = ComponentId::from("/a/b").as_namespace();
        let found = resolve_path(&RefPath::name("n"), &from, &mut |id| {
            probed.push(id.to_string());
            existing.contains(id)
        });
        assert_eq!(found, Some(ComponentId::from("/n")));
        assert_eq!(probed, vec!["/a/b/n", "/a/n", "/n"]);
    }
}
