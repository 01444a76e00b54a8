//! The abstract container protocol: ordered/labeled/object-attribute
//! receptacles that mediate between ordered textual occurrences and
//! unordered model containers via alignment modes (§4.4).

pub mod alignment;
pub mod factory;
pub mod list;
pub mod map;
pub mod object;
pub mod slots;

pub use alignment::Alignment;
pub use factory::{Container, ContainerKind};
pub use list::ListContainer;
pub use map::MapContainer;
pub use object::{AttributeSpec, ObjectContainer, ObjectSchema, SubContainerSpec};
