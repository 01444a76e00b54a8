use std::any::Any;

use pylens_base::Rollbackable;
use pylens_item::Item;

use crate::alignment::Alignment;

/// Shared ordered storage used by [`crate::list::ListContainer`] and
/// [`crate::map::MapContainer`] (the Python source builds `DictContainer`
/// directly atop `ListContainer`'s storage; this is the Rust equivalent of
/// that sharing without literal inheritance).
///
/// Consumed slots become `None` rather than being physically removed, so
/// indices returned by [`Slots::candidates`] stay stable across a PUT pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    items: Vec<Option<Item>>,
}

impl Slots {
    pub fn new() -> Self {
        Slots { items: Vec::new() }
    }

    pub fn push(&mut self, item: Item) -> usize {
        self.items.push(Some(item));
        self.items.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index).and_then(|s| s.as_ref())
    }

    pub fn remove(&mut self, index: usize) -> Option<Item> {
        self.items.get_mut(index).and_then(|s| s.take())
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.items.iter().all(|s| s.is_none())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains every remaining (not-yet-consumed) item in storage order,
    /// leaving the slots empty. Used by `unwrap()` on the GET side, where
    /// nothing has been consumed yet.
    pub fn drain_in_order(&mut self) -> Vec<Item> {
        self.items.drain(..).flatten().collect()
    }

    /// Indices of remaining items matching a static label, if any;
    /// otherwise ordered per `alignment`.
    pub fn candidates(&self, label: Option<&str>, alignment: Alignment) -> Vec<usize> {
        let remaining: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect();

        if let Some(label) = label {
            return remaining
                .into_iter()
                .filter(|&i| {
                    let item = self.items[i].as_ref().unwrap();
                    let meta = item.meta.as_ref();
                    meta.and_then(|m| m.label.as_deref()) == Some(label)
                        || meta.and_then(|m| m.attr_label.as_deref()) == Some(label)
                })
                .collect();
        }

        match alignment {
            Alignment::Model => remaining.into_iter().take(1).collect(),
            Alignment::Source => {
                let mut v = remaining;
                v.sort_by_key(|&i| {
                    self.items[i]
                        .as_ref()
                        .unwrap()
                        .meta
                        .as_ref()
                        .and_then(|m| m.concrete_start)
                        .unwrap_or(usize::MAX)
                });
                v
            }
            Alignment::Label => remaining,
        }
    }
}

impl Rollbackable for Slots {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new(self.items.clone())
    }

    fn restore(&mut self, state: Box<dyn Any>) {
        if let Ok(items) = state.downcast::<Vec<Option<Item>>>() {
            self.items = *items;
        }
    }

    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool {
        match (
            a.downcast_ref::<Vec<Option<Item>>>(),
            b.downcast_ref::<Vec<Option<Item>>>(),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
