/// The candidate-ordering policy a container uses when a PUT-side lens asks
/// for an item to consume (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Abstract-model order: only the first remaining item is offered.
    #[default]
    Model,
    /// Original concrete-position order: all remaining items, sorted
    /// ascending by `concrete_start`; items with no concrete origin (newly
    /// created) sort last.
    Source,
    /// Reserved for future use: by label identity. Falls back to
    /// declaration order today.
    Label,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alignment_is_model() {
        assert_eq!(Alignment::default(), Alignment::Model);
    }
}
