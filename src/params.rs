//! Path parameter storage.
//!
//! Bindings are stored as byte spans into the path that was matched, never as
//! owned strings. Up to [`INLINE_PARAMS`] spans live in a fixed array inside
//! [`Params`]; a route with more parameters spills into a single heap buffer
//! sized for the largest route of its table. Callers never see the difference:
//! every read goes through [`ParamsRef`].

use std::fmt;

/// Number of bindings stored without touching the heap.
pub const INLINE_PARAMS: usize = 8;

/// Storage variant used for a route's bindings.
///
/// Fixed at registration time from the route's parameter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStorage {
    /// Fixed-capacity inline array, no allocation.
    Inline,
    /// Heap buffer, allocated once per request.
    Heap,
}

impl ParamStorage {
    /// Storage variant for a route with `count` parameters.
    pub fn for_count(count: usize) -> Self {
        if count > INLINE_PARAMS {
            ParamStorage::Heap
        } else {
            ParamStorage::Inline
        }
    }
}

/// Byte range of one binding inside the matched path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Span {
    start: u32,
    end: u32,
}

impl Span {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    fn slice<'p>(&self, path: &'p str) -> &'p str {
        path.get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
}

enum Slots {
    Inline {
        len: usize,
        spans: [Span; INLINE_PARAMS],
    },
    Heap(Vec<Span>),
}

/// Positional parameter bindings for one request.
///
/// Owned by the request context and reused across requests; [`Params::clear`]
/// returns it to the inline variant.
pub struct Params {
    slots: Slots,
    heap_capacity: usize,
}

impl Params {
    /// Creates an empty, inline parameter store.
    pub fn new() -> Self {
        Self {
            slots: Slots::Inline {
                len: 0,
                spans: [Span::default(); INLINE_PARAMS],
            },
            heap_capacity: INLINE_PARAMS + 1,
        }
    }

    /// Sets the capacity used if the store spills to the heap, so that the
    /// spill is a single allocation.
    pub(crate) fn reserve_heap(&mut self, capacity: usize) {
        self.heap_capacity = capacity.max(INLINE_PARAMS + 1);
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::Inline { len, .. } => *len,
            Slots::Heap(spans) => spans.len(),
        }
    }

    /// Returns true if no parameter is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage variant currently in use.
    pub fn storage(&self) -> ParamStorage {
        match self.slots {
            Slots::Inline { .. } => ParamStorage::Inline,
            Slots::Heap(_) => ParamStorage::Heap,
        }
    }

    pub(crate) fn push(&mut self, span: Span) {
        match &mut self.slots {
            Slots::Inline { len, spans } if *len < INLINE_PARAMS => {
                spans[*len] = span;
                *len += 1;
            }
            Slots::Inline { len, spans } => {
                let mut heap = Vec::with_capacity(self.heap_capacity);
                heap.extend_from_slice(&spans[..*len]);
                heap.push(span);
                self.slots = Slots::Heap(heap);
            }
            Slots::Heap(spans) => spans.push(span),
        }
    }

    /// Drops bindings past `len`. Used when the matcher backtracks.
    pub(crate) fn truncate(&mut self, new_len: usize) {
        match &mut self.slots {
            Slots::Inline { len, .. } => *len = (*len).min(new_len),
            Slots::Heap(spans) => spans.truncate(new_len),
        }
    }

    /// Removes every binding and returns to inline storage.
    pub fn clear(&mut self) {
        self.slots = Slots::Inline {
            len: 0,
            spans: [Span::default(); INLINE_PARAMS],
        };
    }

    pub(crate) fn spans(&self) -> &[Span] {
        match &self.slots {
            Slots::Inline { len, spans } => &spans[..*len],
            Slots::Heap(spans) => spans,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params")
            .field("len", &self.len())
            .field("storage", &self.storage())
            .finish()
    }
}

/// Read-only view pairing bindings with their names and the matched path.
#[derive(Clone, Copy)]
pub struct ParamsRef<'a> {
    names: &'a [Box<str>],
    spans: &'a [Span],
    path: &'a str,
}

impl<'a> ParamsRef<'a> {
    pub(crate) fn new(names: &'a [Box<str>], params: &'a Params, path: &'a str) -> Self {
        let spans = params.spans();
        let count = names.len().min(spans.len());
        Self {
            names: &names[..count],
            spans: &spans[..count],
            path,
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            names: &[],
            spans: &[],
            path: "",
        }
    }

    /// Value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.names
            .iter()
            .position(|n| &**n == name)
            .map(|i| self.spans[i].slice(self.path))
    }

    /// Value bound at position `index` in pattern order.
    pub fn get_index(&self, index: usize) -> Option<&'a str> {
        self.spans.get(index).map(|s| s.slice(self.path))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns true if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterates over `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let path = self.path;
        self.names
            .iter()
            .zip(self.spans.iter())
            .map(move |(name, span)| (&**name, span.slice(path)))
    }
}

impl fmt::Debug for ParamsRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
