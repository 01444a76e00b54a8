use std::any::Any;
use std::rc::Rc;

use pylens_base::{Result, Rollbackable};
use pylens_item::{Item, LensId, Value, ValueKind};

use crate::alignment::Alignment;
use crate::list::ListContainer;
use crate::map::MapContainer;
use crate::object::{ObjectContainer, ObjectSchema};

/// Which native shape a STORE lens with a container-kind `type` allocates
/// (§4.4, §6 "type=T ... for container-kinds allocates a container of that
/// kind").
#[derive(Debug, Clone)]
pub enum ContainerKind {
    List,
    Map,
    Object(Rc<ObjectSchema>),
}

/// A unified handle over the three container variants, so lens dispatch
/// code can hold one value rather than matching on which concrete container
/// type it has. Corresponds to the Design Note's "tagged union over the
/// lens variants" advice, applied here to containers for the same reason:
/// explicit, exhaustive dispatch instead of a `dyn` trait object.
#[derive(Debug, Clone)]
pub enum Container {
    List(ListContainer),
    Map(MapContainer),
    Object(ObjectContainer),
}

impl Container {
    pub fn new(kind: ContainerKind, alignment: Alignment) -> Self {
        match kind {
            ContainerKind::List => Container::List(ListContainer::new(alignment)),
            ContainerKind::Map => Container::Map(MapContainer::new(alignment)),
            ContainerKind::Object(schema) => {
                Container::Object(ObjectContainer::with_alignment(schema, alignment))
            }
        }
    }

    /// Reciprocal of [`Container::unwrap`]: wraps an existing model value
    /// (typically from a freshly-supplied or previously-GOT item) back into
    /// a consumable container at the start of a PUT (§4.4 `prepare_for_put`,
    /// Python's `ContainerFactory.wrap_container`). Returns `None` for a
    /// scalar value, which has no container representation.
    pub fn wrap_for_put(value: Value, kind: ContainerKind, alignment: Alignment) -> Result<Option<Self>> {
        match (value, kind) {
            (Value::List(items), ContainerKind::List) => {
                Ok(Some(Container::List(ListContainer::prepare_for_put(items, alignment))))
            }
            (Value::Map(entries), ContainerKind::Map) => {
                Ok(Some(Container::Map(MapContainer::prepare_for_put(entries, alignment))))
            }
            (Value::Map(entries), ContainerKind::Object(schema)) => Ok(Some(Container::Object(
                ObjectContainer::prepare_for_put(schema, entries, alignment)?,
            ))),
            _ => Ok(None),
        }
    }

    pub fn store(&mut self, item: Item) -> Result<()> {
        match self {
            Container::List(c) => {
                c.store(item);
                Ok(())
            }
            Container::Map(c) => c.store(item),
            Container::Object(c) => c.store(item),
        }
    }

    /// Top-level candidate lookup used by `And`/`Group`/`Repeat` when the
    /// requesting lens is not itself routed to an object sub-container.
    pub fn candidates(&self, label: Option<&str>) -> Vec<usize> {
        match self {
            Container::List(c) => c.candidates(label),
            Container::Map(c) => c.candidates(label),
            Container::Object(c) => c.attribute_candidates(label),
        }
    }

    pub fn remove(&mut self, index: usize) -> Result<Item> {
        match self {
            Container::List(c) => c.remove(index),
            Container::Map(c) => c.remove(index),
            Container::Object(c) => c.remove_attribute(index),
        }
    }

    /// Object-container-only: routes by lens identity/item type to a
    /// sub-container if one matches, bypassing the flat attribute set.
    pub fn sub_container_candidates(
        &self,
        origin: Option<LensId>,
        kind: ValueKind,
        label: Option<&str>,
    ) -> Option<(usize, Vec<usize>)> {
        match self {
            Container::Object(c) => c.sub_container_candidates(origin, kind, label),
            _ => None,
        }
    }

    pub fn remove_from_sub_container(&mut self, sub_idx: usize, slot_idx: usize) -> Result<Item> {
        match self {
            Container::Object(c) => c.remove_from_sub_container(sub_idx, slot_idx),
            _ => Err(pylens_base::LensError::Programmer(
                "sub-container removal requested on a non-object container".into(),
            )),
        }
    }

    /// Non-mutating look at a flat-attribute/list/map candidate slot, used to
    /// clone an item for a tentative PUT attempt before committing to it.
    pub fn peek(&self, index: usize) -> Option<&Item> {
        match self {
            Container::List(c) => c.peek(index),
            Container::Map(c) => c.peek(index),
            Container::Object(c) => c.peek_attribute(index),
        }
    }

    pub fn peek_sub_container(&self, sub_idx: usize, slot_idx: usize) -> Option<&Item> {
        match self {
            Container::Object(c) => c.peek_sub_container(sub_idx, slot_idx),
            _ => None,
        }
    }

    pub fn take_label(&mut self) -> Option<String> {
        match self {
            Container::List(c) => c.take_label(),
            Container::Map(c) => c.take_label(),
            Container::Object(c) => c.take_label(),
        }
    }

    pub fn is_fully_consumed(&self) -> bool {
        match self {
            Container::List(c) => c.is_fully_consumed(),
            Container::Map(c) => c.is_fully_consumed(),
            Container::Object(c) => c.is_fully_consumed(),
        }
    }

    pub fn container_label(&self) -> Option<&str> {
        match self {
            Container::List(c) => c.container_label(),
            Container::Map(c) => c.container_label(),
            Container::Object(c) => c.container_label(),
        }
    }

    pub fn set_initial_label(&mut self, label: Option<String>) {
        match self {
            Container::List(c) => c.set_initial_label(label),
            Container::Map(c) => c.set_initial_label(label),
            Container::Object(c) => c.set_initial_label(label),
        }
    }

    pub fn unwrap(&mut self) -> Value {
        match self {
            Container::List(c) => c.unwrap(),
            Container::Map(c) => c.unwrap(),
            Container::Object(c) => c.unwrap(),
        }
    }
}

impl Rollbackable for Container {
    fn snapshot(&self) -> Box<dyn Any> {
        match self {
            Container::List(c) => c.snapshot(),
            Container::Map(c) => c.snapshot(),
            Container::Object(c) => c.snapshot(),
        }
    }

    fn restore(&mut self, state: Box<dyn Any>) {
        match self {
            Container::List(c) => c.restore(state),
            Container::Map(c) => c.restore(state),
            Container::Object(c) => c.restore(state),
        }
    }

    fn state_eq(&self, a: &dyn Any, b: &dyn Any) -> bool {
        match self {
            Container::List(c) => c.state_eq(a, b),
            Container::Map(c) => c.state_eq(a, b),
            Container::Object(c) => c.state_eq(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_list_container() {
        let mut c = Container::new(ContainerKind::List, Alignment::Model);
        c.store(Item::new(Value::Int(1))).unwrap();
        assert_eq!(c.unwrap(), Value::List(vec![Item::new(Value::Int(1))]));
    }

    #[test]
    fn wrap_for_put_round_trips_a_list_value() {
        let value = Value::List(vec![Item::new(Value::Int(1)), Item::new(Value::Int(2))]);
        let mut c = Container::wrap_for_put(value, ContainerKind::List, Alignment::Model)
            .unwrap()
            .unwrap();
        assert_eq!(
            c.unwrap(),
            Value::List(vec![Item::new(Value::Int(1)), Item::new(Value::Int(2))])
        );
    }

    #[test]
    fn wrap_for_put_returns_none_for_scalar() {
        let result = Container::wrap_for_put(Value::Int(1), ContainerKind::List, Alignment::Model).unwrap();
        assert!(result.is_none());
    }
}
