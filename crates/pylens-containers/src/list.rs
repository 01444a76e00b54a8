use std::any::Any;

use pylens_base::{LensError, Result, Rollbackable};
use pylens_item::{Item, Value};

use crate::alignment::Alignment;
use crate::slots::Slots;

/// Ordered sequence container; any item is accepted, and label is an
/// out-of-band property rather than part of the element sequence (§4.4).
#[derive(Debug, Clone, Default)]
pub struct ListContainer {
    slots: Slots,
    label: Option<String>,
    alignment: Alignment,
}

impl ListContainer {
    pub fn new(alignment: Alignment) -> Self {
        ListContainer {
            slots: Slots::new(),
            label: None,
            alignment,
        }
    }

    /// Rebuilds a container from an existing model value, e.g. at the start
    /// of a PUT against an existing list — the reciprocal of `unwrap`.
    pub fn prepare_for_put(items: Vec<Item>, alignment: Alignment) -> Self {
        let mut c = ListContainer::new(alignment);
        for item in items {
            c.slots.push(item);
        }
        c
    }

    pub fn store(&mut self, item: Item) {
        if item.meta.as_ref().is_some_and(|m| m.is_label) {
            self.label = item.value.as_str().map(str::to_string);
        } else {
            self.slots.push(item);
        }
    }

    pub fn candidates(&self, label: Option<&str>) -> Vec<usize> {
        self.slots.candidates(label, self.alignment)
    }

    pub fn remove(&mut self, index: usize) -> Result<Item> {
        self.slots
            .remove(index)
            .ok_or_else(|| LensError::NoTokenToConsume("list container slot already consumed".into()))
    }

    pub fn peek(&self, index: usize) -> Option<&Item> {
        self.slots.get(index)
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.slots.is_fully_consumed()
    }

    pub fn container_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Sets the container's consumable label directly, e.g. when wrapping an
    /// existing model value for PUT whose own item metadata already carries
    /// the label it held in its enclosing structure.
    pub fn set_initial_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn take_label(&mut self) -> Option<String> {
        self.label.take()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// GET-side: turns the collected items into the final model value, in
    /// storage order.
    pub fn unwrap(&mut self) -> Value {
        Value::List(self.slots.drain_in_order())
    }
}

impl Rollbackable for ListContainer {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new((self.slots.clone(), self.label.clone()))
    }

    fn restore(&mut self, state: Box<dyn Any>) {
        if let Ok(boxed) = state.downcast::<(Slots, Option<String>)>() {
            let (slots, label) = *boxed;
            self.slots = slots;
            self.label = label;
        }
    }

    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool {
        match (
            a.downcast_ref::<(Slots, Option<String>)>(),
            b.downcast_ref::<(Slots, Option<String>)>(),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_unwrap_preserves_order() {
        let mut c = ListContainer::new(Alignment::Model);
        c.store(Item::new(Value::Int(1)));
        c.store(Item::new(Value::Int(2)));
        assert_eq!(
            c.unwrap(),
            Value::List(vec![Item::new(Value::Int(1)), Item::new(Value::Int(2))])
        );
    }

    #[test]
    fn is_label_item_becomes_container_label_not_an_element() {
        use pylens_item::ItemMeta;
        let mut c = ListContainer::new(Alignment::Model);
        let mut label_item = Item::new(Value::Str("key".into()));
        label_item.meta = Some(ItemMeta {
            is_label: true,
            ..ItemMeta::default()
        });
        c.store(label_item);
        c.store(Item::new(Value::Int(1)));
        assert_eq!(c.container_label(), Some("key"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn remove_on_empty_slot_fails() {
        let mut c = ListContainer::new(Alignment::Model);
        c.store(Item::new(Value::Int(1)));
        c.remove(0).unwrap();
        assert!(c.remove(0).is_err());
    }

    #[test]
    fn prepare_for_put_round_trips_with_unwrap() {
        let items = vec![Item::new(Value::Int(1)), Item::new(Value::Int(2))];
        let mut c = ListContainer::prepare_for_put(items.clone(), Alignment::Model);
        assert_eq!(c.unwrap(), Value::List(items));
    }
}
