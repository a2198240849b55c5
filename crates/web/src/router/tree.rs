//! Radix tree keyed by parsed route templates.
//!
//! Static edges out of a node start with distinct bytes and are split on demand when a new
//! template shares only part of an edge. Each node has at most one wildcard child, bound to a
//! fixed name. Matching prefers the static edge and falls back to the wildcard when the static
//! branch does not lead to a payload.

use std::mem;

use rill_http::protocol::Params;

use crate::router::template::Segment;

#[derive(Debug)]
pub(crate) struct Tree<T> {
    root: Node<T>,
}

#[derive(Debug)]
struct Node<T> {
    edges: Vec<Edge<T>>,
    wildcard: Option<Box<Wildcard<T>>>,
    payload: Option<T>,
}

#[derive(Debug)]
struct Edge<T> {
    /// Never empty. Kept as bytes since a split may fall inside a multi-byte character.
    label: Vec<u8>,
    node: Node<T>,
}

#[derive(Debug)]
struct Wildcard<T> {
    name: String,
    node: Node<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InsertError {
    MismatchingWildcards { existing: String, new: String },
    Occupied,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self { root: Node::default() }
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self { edges: Vec::new(), wildcard: None, payload: None }
    }
}

impl<T> Tree<T> {
    /// Attaches `payload` at the node the segments lead to, creating and splitting nodes as needed.
    pub(crate) fn insert(&mut self, segments: &[Segment<'_>], payload: T) -> Result<(), InsertError> {
        let mut node = &mut self.root;
        for segment in segments {
            node = match *segment {
                Segment::Static(text) => node.insert_static(text.as_bytes()),
                Segment::Wildcard(name) => node.insert_wildcard(name)?,
            };
        }

        if node.payload.is_some() {
            return Err(InsertError::Occupied);
        }
        node.payload = Some(payload);
        Ok(())
    }

    /// Finds the payload for `path`, appending wildcard bindings to `params`.
    ///
    /// Bindings of abandoned branches are removed again, on a miss `params` is left as it was.
    pub(crate) fn lookup<'t>(&'t self, path: &str, params: &mut Params) -> Option<&'t T> {
        self.root.find(path, 0, params)
    }
}

impl<T> Node<T> {
    fn insert_static(&mut self, text: &[u8]) -> &mut Node<T> {
        let Some(&first) = text.first() else {
            return self;
        };

        match self.edges.iter().position(|edge| edge.label[0] == first) {
            Some(index) => {
                let edge = &mut self.edges[index];
                let common = common_prefix_len(&edge.label, text);
                if common < edge.label.len() {
                    edge.split(common);
                }
                edge.node.insert_static(&text[common..])
            }
            None => {
                let index = self.edges.len();
                self.edges.push(Edge { label: text.to_vec(), node: Node::default() });
                &mut self.edges[index].node
            }
        }
    }

    fn insert_wildcard(&mut self, name: &str) -> Result<&mut Node<T>, InsertError> {
        let wildcard = self.wildcard.get_or_insert_with(|| Box::new(Wildcard { name: name.to_owned(), node: Node::default() }));
        if wildcard.name != name {
            return Err(InsertError::MismatchingWildcards { existing: wildcard.name.clone(), new: name.to_owned() });
        }
        Ok(&mut wildcard.node)
    }

    fn find<'t>(&'t self, path: &str, pos: usize, params: &mut Params) -> Option<&'t T> {
        let rest = &path.as_bytes()[pos..];
        let Some(&first) = rest.first() else {
            return self.payload.as_ref();
        };

        if let Some(edge) = self.edges.iter().find(|edge| edge.label[0] == first) {
            if rest.starts_with(&edge.label) {
                if let Some(found) = edge.node.find(path, pos + edge.label.len(), params) {
                    return Some(found);
                }
            }
        }

        let wildcard = self.wildcard.as_ref()?;
        let end = pos + rest.iter().position(|&b| b == b'/').unwrap_or(rest.len());
        // wildcards follow a '/', so both ends sit on character boundaries
        let value = path.get(pos..end).filter(|value| !value.is_empty())?;

        let mark = params.len();
        params.add(wildcard.name.as_str(), value);
        let found = wildcard.node.find(path, end, params);
        if found.is_none() {
            params.truncate(mark);
        }
        found
    }
}

impl<T> Edge<T> {
    /// Cuts the label after `at` bytes, moving the remainder and the old child one level down.
    fn split(&mut self, at: usize) {
        let suffix = self.label.split_off(at);
        let child = mem::take(&mut self.node);
        self.node.edges.push(Edge { label: suffix, node: child });
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::template::parse;

    fn tree(templates: &[&'static str]) -> Tree<&'static str> {
        let mut tree = Tree::default();
        for template in templates {
            tree.insert(&parse(template).unwrap(), *template).unwrap();
        }
        tree
    }

    fn lookup(tree: &Tree<&'static str>, path: &str) -> Option<(&'static str, Params)> {
        let mut params = Params::new();
        tree.lookup(path, &mut params).map(|found| (*found, params))
    }

    #[test]
    fn static_route_wins_over_wildcard() {
        let tree = tree(&["/hello/{world}", "/hello/world/length/does/not/matter"]);

        let (found, params) = lookup(&tree, "/hello/some-very-long-world").unwrap();
        assert_eq!(found, "/hello/{world}");
        assert_eq!(params.get("world"), Some("some-very-long-world"));

        let (found, params) = lookup(&tree, "/hello/world/length/does/not/matter").unwrap();
        assert_eq!(found, "/hello/world/length/does/not/matter");
        assert!(params.is_empty());

        // a dead-ended static branch falls back to the wildcard
        let (found, params) = lookup(&tree, "/hello/world").unwrap();
        assert_eq!(found, "/hello/{world}");
        assert_eq!(params.get("world"), Some("world"));
    }

    #[test]
    fn split_edges_keep_their_payloads() {
        let tree = tree(&["/team", "/tea", "/teapot", "/toast", "/"]);

        for path in ["/team", "/tea", "/teapot", "/toast", "/"] {
            assert_eq!(lookup(&tree, path).map(|(found, _)| found), Some(path));
        }
        assert!(lookup(&tree, "/te").is_none());
        assert!(lookup(&tree, "/teams").is_none());
    }

    #[test]
    fn splits_inside_multibyte_characters() {
        let tree = tree(&["/caf\u{e9}", "/caf\u{e8}"]);
        assert_eq!(lookup(&tree, "/caf\u{e9}").map(|(found, _)| found), Some("/caf\u{e9}"));
        assert_eq!(lookup(&tree, "/caf\u{e8}").map(|(found, _)| found), Some("/caf\u{e8}"));
    }

    #[test]
    fn wildcards_bind_whole_non_empty_segments() {
        let tree = tree(&["/users/{id}", "/users/{id}/posts/{post}"]);

        let (found, params) = lookup(&tree, "/users/42/posts/7").unwrap();
        assert_eq!(found, "/users/{id}/posts/{post}");
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("id", "42"), ("post", "7")]);

        assert!(lookup(&tree, "/users/").is_none());
        assert!(lookup(&tree, "/users/42/posts/").is_none());
    }

    #[test]
    fn backtracking_drops_abandoned_bindings() {
        let tree = tree(&["/{a}/x", "/{a}/{b}/y", "/s/{c}/z"]);

        let (found, params) = lookup(&tree, "/s/1/y").unwrap();
        assert_eq!(found, "/{a}/{b}/y");
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("a", "s"), ("b", "1")]);

        let mut params = Params::new();
        params.add("kept", "yes");
        assert!(tree.lookup("/s/1/q", &mut params).is_none());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn mismatching_wildcards_are_rejected() {
        let mut tree = Tree::default();
        tree.insert(&parse("/users/{id}").unwrap(), 1).unwrap();

        let err = tree.insert(&parse("/users/{name}/posts").unwrap(), 2).unwrap_err();
        assert_eq!(err, InsertError::MismatchingWildcards { existing: "id".into(), new: "name".into() });
        assert_eq!(tree.insert(&parse("/users/{id}").unwrap(), 3), Err(InsertError::Occupied));
    }
}
