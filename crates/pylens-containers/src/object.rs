use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use pylens_base::{LensError, Result, Rollbackable};
use pylens_item::{Item, LensId, Value, ValueKind};

use crate::alignment::Alignment;
use crate::slots::Slots;

/// A typed nested container declared on an object schema (`Container(type=...,
/// store_items_of_type=[...], store_items_from_lenses=[...])` in the Python
/// source): intercepts items whose producing lens or runtime type matches
/// either predicate, routing them into a sub-container instead of the
/// object's flat attribute set (§4.4).
#[derive(Debug, Clone)]
pub struct SubContainerSpec {
    pub name: String,
    pub store_items_of_type: Vec<ValueKind>,
    pub store_items_from_lenses: Vec<LensId>,
    pub alignment: Alignment,
}

impl SubContainerSpec {
    pub fn matches(&self, origin: Option<LensId>, kind: ValueKind) -> bool {
        origin.is_some_and(|id| self.store_items_from_lenses.contains(&id))
            || self.store_items_of_type.contains(&kind)
    }
}

/// A declared attribute slot, carrying the declaration-order index the
/// Python source derives from a monotonic class-level counter (§4.4).
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub declared_index: usize,
}

/// Schema shared by every instance of one object "class": declared
/// attributes in declaration order, declared sub-containers, and the cached
/// label↔identifier mapping so CREATE can recover an originally seen label.
#[derive(Debug, Default)]
pub struct ObjectSchema {
    pub attributes: Vec<AttributeSpec>,
    pub sub_containers: Vec<SubContainerSpec>,
    label_to_identifier: RefCell<HashMap<String, String>>,
    identifier_to_label: RefCell<HashMap<String, String>>,
}

impl ObjectSchema {
    pub fn new(attributes: Vec<&str>, sub_containers: Vec<SubContainerSpec>) -> Self {
        ObjectSchema {
            attributes: attributes
                .into_iter()
                .enumerate()
                .map(|(i, name)| AttributeSpec {
                    name: name.to_string(),
                    declared_index: i,
                })
                .collect(),
            sub_containers,
            label_to_identifier: RefCell::new(HashMap::new()),
            identifier_to_label: RefCell::new(HashMap::new()),
        }
    }

    /// Default mapping: lowercase, spaces to underscores. Cached so a later
    /// CREATE (no original label in hand) can recover the original label
    /// rather than a lossy re-derivation.
    pub fn map_label_to_identifier(&self, label: &str) -> String {
        if let Some(existing) = self.label_to_identifier.borrow().get(label) {
            return existing.clone();
        }
        let identifier = label.to_lowercase().replace(' ', "_");
        self.label_to_identifier
            .borrow_mut()
            .insert(label.to_string(), identifier.clone());
        self.identifier_to_label
            .borrow_mut()
            .insert(identifier.clone(), label.to_string());
        identifier
    }

    pub fn original_label_for(&self, identifier: &str) -> Option<String> {
        self.identifier_to_label.borrow().get(identifier).cloned()
    }
}

/// Items stored as attributes of a user class via a label↔identifier
/// mapping; may route some items into typed sub-containers instead (§3,
/// §4.4: "Object container (LensObject)").
#[derive(Debug, Clone)]
pub struct ObjectContainer {
    schema: Rc<ObjectSchema>,
    attributes: Slots,
    sub_containers: Vec<Slots>,
    label: Option<String>,
    alignment: Alignment,
}

impl ObjectContainer {
    pub fn new(schema: Rc<ObjectSchema>) -> Self {
        ObjectContainer::with_alignment(schema, Alignment::Source)
    }

    /// A general object container defaults to SOURCE alignment (§9 Design
    /// Notes: "a general class, SOURCE alignment will be a more common
    /// default"), but the allocating lens may override it via its own
    /// `alignment` option.
    pub fn with_alignment(schema: Rc<ObjectSchema>, alignment: Alignment) -> Self {
        ObjectContainer {
            schema: schema.clone(),
            attributes: Slots::new(),
            sub_containers: vec![Slots::new(); schema.sub_containers.len()],
            label: None,
            alignment,
        }
    }

    /// Reciprocal of [`ObjectContainer::unwrap`]: rebuilds a container from
    /// an existing label-keyed model value at the start of a PUT, routing
    /// each entry through the same store-time logic used on GET (§4.4
    /// "prepare_for_put... wraps raw sub-collections before PUT").
    pub fn prepare_for_put(
        schema: Rc<ObjectSchema>,
        entries: Vec<(String, Item)>,
        alignment: Alignment,
    ) -> Result<Self> {
        let mut c = ObjectContainer::with_alignment(schema, alignment);
        for (label, mut item) in entries {
            item.enable_meta().label = Some(label);
            c.store(item)?;
        }
        Ok(c)
    }

    fn sub_container_index(&self, origin: Option<LensId>, kind: ValueKind) -> Option<usize> {
        self.schema
            .sub_containers
            .iter()
            .position(|spec| spec.matches(origin, kind))
    }

    /// GET-side routing: sub-container by lens identity or item type first,
    /// else attribute storage keyed by `attr_label`/`label` mapped through
    /// the schema's identifier cache (§4.4 "Routing on GET").
    pub fn store(&mut self, mut item: Item) -> Result<()> {
        if item.meta.as_ref().is_some_and(|m| m.is_label) {
            self.label = item.value.as_str().map(str::to_string);
            return Ok(());
        }

        let origin = item.meta.as_ref().and_then(|m| m.origin_lens);
        let kind = item.value.kind();
        if let Some(idx) = self.sub_container_index(origin, kind) {
            tracing::trace!(target: "containers.object", sub_container = %self.schema.sub_containers[idx].name, "routed_to_sub_container");
            self.sub_containers[idx].push(item);
            return Ok(());
        }

        let identifier = if let Some(attr_label) = item.meta.as_ref().and_then(|m| m.attr_label.clone()) {
            attr_label
        } else if let Some(label) = item.meta.as_ref().and_then(|m| m.label.clone()) {
            self.schema.map_label_to_identifier(&label)
        } else {
            format!("_item_{}", self.attributes.len())
        };
        item.enable_meta().attr_label = Some(identifier);
        self.attributes.push(item);
        Ok(())
    }

    /// PUT-side routing: a sub-lens whose identity/type matches a declared
    /// sub-container delegates candidate discovery to it; otherwise
    /// candidates come from the flat attribute slots (§4.4 "Routing on
    /// PUT").
    pub fn sub_container_candidates(
        &self,
        origin: Option<LensId>,
        kind: ValueKind,
        label: Option<&str>,
    ) -> Option<(usize, Vec<usize>)> {
        self.sub_container_index(origin, kind).map(|idx| {
            let alignment = self.schema.sub_containers[idx].alignment;
            (idx, self.sub_containers[idx].candidates(label, alignment))
        })
    }

    pub fn remove_from_sub_container(&mut self, sub_idx: usize, slot_idx: usize) -> Result<Item> {
        self.sub_containers[sub_idx]
            .remove(slot_idx)
            .ok_or_else(|| LensError::NoTokenToConsume("sub-container slot already consumed".into()))
    }

    pub fn peek_sub_container(&self, sub_idx: usize, slot_idx: usize) -> Option<&Item> {
        self.sub_containers[sub_idx].get(slot_idx)
    }

    pub fn peek_attribute(&self, index: usize) -> Option<&Item> {
        self.attributes.get(index)
    }

    pub fn attribute_candidates(&self, label: Option<&str>) -> Vec<usize> {
        // Declaration order is respected by the caller iterating
        // `schema.attributes` and mapping each declared name to its
        // attr_label before calling this with that specific label; a bare
        // `None` falls back to this container's alignment mode (§4.4).
        self.attributes.candidates(label, self.alignment)
    }

    pub fn remove_attribute(&mut self, index: usize) -> Result<Item> {
        self.attributes
            .remove(index)
            .ok_or_else(|| LensError::NoTokenToConsume("attribute slot already consumed".into()))
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.attributes.is_fully_consumed()
            && self.sub_containers.iter().all(Slots::is_fully_consumed)
    }

    pub fn container_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_initial_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn take_label(&mut self) -> Option<String> {
        self.label.take()
    }

    /// GET-side: produces the final model as a map, attribute identifiers
    /// mapped back to their original labels where known.
    pub fn unwrap(&mut self) -> Value {
        let mut entries: Vec<(String, Item)> = Vec::new();
        for item in self.attributes.drain_in_order() {
            let identifier = item
                .meta
                .as_ref()
                .and_then(|m| m.attr_label.clone())
                .unwrap_or_default();
            let label = self
                .schema
                .original_label_for(&identifier)
                .unwrap_or(identifier);
            entries.push((label, item));
        }
        Value::Map(entries)
    }
}

impl Rollbackable for ObjectContainer {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new((
            self.attributes.clone(),
            self.sub_containers.clone(),
            self.label.clone(),
        ))
    }

    fn restore(&mut self, state: Box<dyn Any>) {
        if let Ok(boxed) = state.downcast::<(Slots, Vec<Slots>, Option<String>)>() {
            let (attributes, sub_containers, label) = *boxed;
            self.attributes = attributes;
            self.sub_containers = sub_containers;
            self.label = label;
        }
    }

    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool {
        match (
            a.downcast_ref::<(Slots, Vec<Slots>, Option<String>)>(),
            b.downcast_ref::<(Slots, Vec<Slots>, Option<String>)>(),
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
    fn label_to_identifier_round_trips() {
        let schema = ObjectSchema::new(vec![], vec![]);
        let id = schema.map_label_to_identifier("Display Name");
        assert_eq!(id, "display_name");
        assert_eq!(
            schema.original_label_for("display_name").as_deref(),
            Some("Display Name")
        );
    }

    #[test]
    fn store_routes_by_label_into_attributes() {
        let schema = Rc::new(ObjectSchema::new(vec![], vec![]));
        let mut c = ObjectContainer::new(schema);
        c.store(Item::with_meta(
            Value::Str("Ada".into()),
            ItemMeta::default().with_label("Name"),
        ))
        .unwrap();
        let Value::Map(entries) = c.unwrap() else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, "Name");
    }

    #[test]
    fn store_routes_matching_type_into_sub_container() {
        let schema = Rc::new(ObjectSchema::new(
            vec![],
            vec![SubContainerSpec {
                name: "numbers".into(),
                store_items_of_type: vec![ValueKind::Int],
                store_items_from_lenses: vec![],
                alignment: Alignment::Model,
            }],
        ));
        let mut c = ObjectContainer::new(schema);
        c.store(Item::new(Value::Int(7))).unwrap();
        assert_eq!(c.sub_containers[0].len(), 1);
        assert_eq!(c.attributes.len(), 0);
    }
}
