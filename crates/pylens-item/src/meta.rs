use pylens_base::ConcreteInputReader;

/// Opaque identity of the lens that produced an item on GET.
///
/// Kept as an identity handle rather than a reference to the actual lens
/// value to avoid a dependency cycle (lenses depend on items, not the other
/// way around); `pylens-lenses` derives this from the address of the `Rc`
/// backing each lens node, so `LensId` equality means "same lens instance",
/// matching the Python source's use of `id(lens)` for sub-container routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LensId(pub usize);

/// Provenance and routing metadata attached to every item a lens emits or
/// consumes (§3 "Item metadata").
#[derive(Debug, Clone, Default)]
pub struct ItemMeta {
    pub origin_lens: Option<LensId>,
    pub concrete_start: Option<usize>,
    pub concrete_end: Option<usize>,
    pub concrete_source: Option<ConcreteInputReader>,
    pub label: Option<String>,
    pub is_label: bool,
    pub attr_label: Option<String>,
    /// Piggybacked metadata for the `auto_list` singleton unwrap: when a
    /// one-element list collapses to its sole item on GET, the list's own
    /// metadata is kept here so a later re-wrap on PUT can restore it.
    pub singleton_meta: Option<Box<ItemMeta>>,
}

impl ItemMeta {
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.concrete_start = Some(start);
        self.concrete_end = Some(end);
        self
    }

    pub fn with_source(mut self, reader: ConcreteInputReader) -> Self {
        self.concrete_source = Some(reader);
        self
    }

    pub fn with_origin(mut self, lens: LensId) -> Self {
        self.origin_lens = Some(lens);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether this item has a concrete origin at all — unsourced items
    /// (freshly created on PUT with no input) sort last under SOURCE
    /// alignment (§4.4).
    pub fn has_concrete_source(&self) -> bool {
        self.concrete_source.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_meta_has_no_concrete_source() {
        let m = ItemMeta::default();
        assert!(!m.has_concrete_source());
    }

    #[test]
    fn builder_methods_compose() {
        let m = ItemMeta::default()
            .with_span(3, 7)
            .with_label("number")
            .with_origin(LensId(42));
        assert_eq!(m.concrete_start, Some(3));
        assert_eq!(m.concrete_end, Some(7));
        assert_eq!(m.label.as_deref(), Some("number"));
        assert_eq!(m.origin_lens, Some(LensId(42)));
    }
}
