//! Public entry points (§4.8 "GET/PUT orchestration"): re-exports of the
//! lens algebra, its container protocol, and its GET/PUT engine, plus
//! `get`/`put` free functions that accept anything coercible into a
//! [`Lens`] — mirroring the Python source's module-level `get()`/`put()`,
//! which likewise coerce a bare string into a `Literal` lens before
//! dispatching.

use std::rc::Rc;

pub use pylens_base::{check_consumption, with_check_consumption, LensError, Result};
pub use pylens_containers::{Alignment, AttributeSpec, Container, ObjectSchema, SubContainerSpec};
pub use pylens_item::{Item, ItemMeta, LensId, Value, ValueKind};
pub use pylens_lenses::{
    auto_group, blank_line, charsets, hash_comment, key_value, keyword, list_of, new_line,
    one_or_more, optional, whitespace, word, zero_or_more, EmptyMode, Lens, LensOptions, LensType,
    DEFAULT_FORWARD_RECURSION_LIMIT,
};

/// GET: parses `text` against `lens`, producing a model [`Item`]. A
/// non-STORE top-level lens is wrapped transparently (`AutoGroup` in the
/// Python source), so e.g. `get(word("abc"), "cab")` works without the
/// caller adding a `Group` of its own.
pub fn get(lens: impl Into<Lens>, text: impl Into<Rc<str>>) -> Result<Item> {
    pylens_lenses::get(&lens.into(), text)
}

/// PUT: renders `item` back to text through `lens`, weaving unchanged
/// fragments of `original` (if given) and creating fresh text for anything
/// the model introduced.
pub fn put(lens: impl Into<Lens>, item: Item, original: Option<&str>) -> Result<String> {
    pylens_lenses::put(&lens.into(), item, original)
}
