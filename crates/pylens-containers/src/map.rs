use std::any::Any;

use pylens_base::{LensError, Result, Rollbackable};
use pylens_item::{Item, Value};

use crate::alignment::Alignment;
use crate::slots::Slots;

/// Items carry labels; on unwrap, converted to a map keyed by label.
/// Storing an unlabeled item is a fatal error (§4.4).
#[derive(Debug, Clone, Default)]
pub struct MapContainer {
    slots: Slots,
    label: Option<String>,
    alignment: Alignment,
}

impl MapContainer {
    pub fn new(alignment: Alignment) -> Self {
        MapContainer {
            slots: Slots::new(),
            label: None,
            alignment,
        }
    }

    pub fn prepare_for_put(entries: Vec<(String, Item)>, alignment: Alignment) -> Self {
        let mut c = MapContainer::new(alignment);
        for (key, mut item) in entries {
            item.enable_meta().label = Some(key);
            c.slots.push(item);
        }
        c
    }

    /// Fatal (`LensError::Programmer`) if `item` carries no label: a map
    /// container cannot key an item it has no label for.
    pub fn store(&mut self, item: Item) -> Result<()> {
        if item.meta.as_ref().is_some_and(|m| m.is_label) {
            self.label = item.value.as_str().map(str::to_string);
            return Ok(());
        }
        let has_label = item
            .meta
            .as_ref()
            .is_some_and(|m| m.label.is_some() || m.attr_label.is_some());
        if !has_label {
            tracing::error!(target: "containers.map", ?item, "unlabeled_store");
            return Err(LensError::Programmer(
                "map container received an item with no label".into(),
            ));
        }
        self.slots.push(item);
        Ok(())
    }

    pub fn candidates(&self, label: Option<&str>) -> Vec<usize> {
        self.slots.candidates(label, self.alignment)
    }

    pub fn remove(&mut self, index: usize) -> Result<Item> {
        self.slots
            .remove(index)
            .ok_or_else(|| LensError::NoTokenToConsume("map container slot already consumed".into()))
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

    pub fn take_label(&mut self) -> Option<String> {
        self.label.take()
    }

    pub fn set_initial_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn unwrap(&mut self) -> Value {
        let entries = self
            .slots
            .drain_in_order()
            .into_iter()
            .map(|item| {
                let key = item
                    .meta
                    .as_ref()
                    .and_then(|m| m.label.clone())
                    .unwrap_or_default();
                (key, item)
            })
            .collect();
        Value::Map(entries)
    }
}

impl Rollbackable for MapContainer {
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
    use pylens_item::ItemMeta;

    #[test]
    fn unlabeled_item_is_rejected() {
        let mut c = MapContainer::new(Alignment::Model);
        let err = c.store(Item::new(Value::Int(1))).unwrap_err();
        assert!(!err.is_rollback_safe());
    }

    #[test]
    fn store_then_unwrap_keys_by_label() {
        let mut c = MapContainer::new(Alignment::Source);
        c.store(Item::with_meta(
            Value::Int(1),
            ItemMeta::default().with_label("number"),
        ))
        .unwrap();
        c.store(Item::with_meta(
            Value::Str("a".into()),
            ItemMeta::default().with_label("character"),
        ))
        .unwrap();
        let Value::Map(entries) = c.unwrap() else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, "number");
        assert_eq!(entries[1].0, "character");
    }
}
