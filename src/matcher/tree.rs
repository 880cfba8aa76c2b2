//! Segment trie for dynamic routes.
//!
//! Each node has at most one literal child per segment text, one parameter
//! child and one terminal wildcard. Lookup tries them in that order at every
//! node and backtracks when a deeper match fails, so a literal always wins
//! over a parameter and a parameter over a wildcard, independent of the
//! registration order.

use {
    super::pattern::Segment,
    crate::params::{Params, Span},
    std::collections::HashMap,
};

pub(crate) type RouteId = usize;

#[derive(Default)]
pub(crate) struct Node {
    literals: HashMap<Box<str>, Node>,
    param: Option<Box<Node>>,
    wildcard: Option<RouteId>,
    route: Option<RouteId>,
}

impl Node {
    /// Inserts a route. Returns the id already occupying the slot, if any.
    pub(crate) fn insert(&mut self, segments: &[Segment], id: RouteId) -> Option<RouteId> {
        let Some((first, rest)) = segments.split_first() else {
            return match self.route {
                Some(existing) => Some(existing),
                None => {
                    self.route = Some(id);
                    None
                }
            };
        };

        match first {
            Segment::Literal(text) => self
                .literals
                .entry(text.clone())
                .or_default()
                .insert(rest, id),
            Segment::Param(_) => self
                .param
                .get_or_insert_with(Box::default)
                .insert(rest, id),
            Segment::Wildcard(_) => match self.wildcard {
                Some(existing) => Some(existing),
                None => {
                    self.wildcard = Some(id);
                    None
                }
            },
        }
    }

    /// Finds the route for `path`, binding parameters into `params`.
    ///
    /// `pos` is either `path.len()` (everything consumed) or the index of the
    /// `/` that precedes the next segment.
    pub(crate) fn find(&self, path: &str, pos: usize, params: &mut Params) -> Option<RouteId> {
        if pos >= path.len() {
            if let Some(id) = self.route {
                return Some(id);
            }
            // Empty remainder: the wildcard binds "".
            if let Some(id) = self.wildcard {
                params.push(Span::new(path.len(), path.len()));
                return Some(id);
            }
            return None;
        }

        let start = pos + 1;
        let end = path[start..]
            .find('/')
            .map_or(path.len(), |offset| start + offset);
        let segment = &path[start..end];

        if let Some(child) = self.literals.get(segment) {
            if let Some(id) = child.find(path, end, params) {
                return Some(id);
            }
        }

        if let Some(child) = &self.param {
            if !segment.is_empty() {
                let mark = params.len();
                params.push(Span::new(start, end));
                if let Some(id) = child.find(path, end, params) {
                    return Some(id);
                }
                params.truncate(mark);
            }
        }

        if let Some(id) = self.wildcard {
            params.push(Span::new(start, path.len()));
            return Some(id);
        }

        None
    }
}

/// Position at which a lookup of `path` starts.
pub(crate) fn start_position(path: &str) -> usize {
    if path == "/" { path.len() } else { 0 }
}
