use std::rc::Rc;

use pylens_containers::{Alignment, ObjectSchema};
use pylens_item::ValueKind;

/// A lens's declared model shape (§3 "type"). Scalar kinds store directly;
/// the three container kinds each allocate a [`pylens_containers::Container`]
/// of matching shape during GET/PUT.
#[derive(Debug, Clone)]
pub enum LensType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Map,
    Object(Rc<ObjectSchema>),
}

impl LensType {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            LensType::Str => ValueKind::Str,
            LensType::Int => ValueKind::Int,
            LensType::Float => ValueKind::Float,
            LensType::Bool => ValueKind::Bool,
            LensType::List => ValueKind::List,
            LensType::Map | LensType::Object(_) => ValueKind::Map,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, LensType::List | LensType::Map | LensType::Object(_))
    }
}

/// The point in the text an [`crate::lens::LensKind::Empty`] must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyMode {
    StartOfText,
    EndOfText,
}

/// The options every lens carries regardless of variant (§3 "Lens options").
/// Accumulated through the builder methods below rather than as constructor
/// keyword arguments, since Rust has no `**options` equivalent.
#[derive(Debug, Clone, Default)]
pub struct LensOptions {
    pub ty: Option<LensType>,
    pub default: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub is_label: bool,
    pub auto_list: bool,
    pub combine_chars: bool,
    pub alignment: Option<Alignment>,
}

impl LensOptions {
    pub fn new() -> Self {
        LensOptions::default()
    }

    pub fn ty(mut self, ty: LensType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_label(mut self) -> Self {
        self.is_label = true;
        // A label is always text, matching Word's "enable type if label or
        // is_label is set" convenience (util_lenses.py).
        if self.ty.is_none() {
            self.ty = Some(LensType::Str);
        }
        self
    }

    pub fn auto_list(mut self) -> Self {
        self.auto_list = true;
        self
    }

    pub fn combine_chars(mut self) -> Self {
        self.combine_chars = true;
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn has_type(&self) -> bool {
        self.ty.is_some()
    }
}
