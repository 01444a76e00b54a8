use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, BitOr};
use std::rc::Rc;

use pylens_item::LensId;

use crate::options::{EmptyMode, LensOptions, LensType};

/// Default recursion depth a [`Forward`](LensKind::Forward) cap trips at if
/// the binder didn't ask for something else (`core_lenses.py`'s
/// `recursion_limit=100`).
pub const DEFAULT_FORWARD_RECURSION_LIMIT: usize = 100;

/// The lens algebra as a closed set of variants (§9 Design Notes: a tagged
/// union, not a class hierarchy — every operation is one exhaustive `match`
/// in `engine.rs` rather than a virtual method per subclass).
pub enum LensKind {
    AnyOf { valid_chars: Rc<str>, negate: bool },
    Literal { text: String },
    Empty { mode: Option<EmptyMode> },
    And(Vec<Lens>),
    Or(Vec<Lens>),
    Repeat { child: Lens, min: usize, max: Option<usize> },
    Group(Lens),
    /// Late-bound recursive reference. `bound` starts empty and is filled in
    /// exactly once via [`Lens::bind`]; `recursion_limit` caps how many
    /// nested `Forward` hops a single GET/PUT call chain may take before
    /// `InfiniteRecursion` is raised.
    Forward {
        bound: RefCell<Option<Lens>>,
        recursion_limit: usize,
    },
    Until { stop: Lens, include: bool },
    /// Always fails; a filler for lens trees still under construction
    /// (`util_lenses.py`'s `NullLens`).
    Null,
}

struct LensNode {
    kind: LensKind,
    options: LensOptions,
}

/// A lens value: cheap to clone (an `Rc` handle), immutable after
/// construction except for a `Forward`'s one-time [`Lens::bind`]. Identity
/// (`LensId`) is derived from the backing `Rc`'s address, mirroring the
/// Python source's use of `id(lens)` for sub-container routing without
/// introducing a dependency from `pylens-item` back onto this crate.
#[derive(Clone)]
pub struct Lens(Rc<LensNode>);

impl Lens {
    /// §3 invariant 1: "a lens may not have both `type` and `default`" — the
    /// Python source treats this as a construction-time assertion failure
    /// (§7 "fatal ... wrong argument kinds"), not a silent preference of one
    /// over the other.
    fn new(kind: LensKind, options: LensOptions) -> Self {
        debug_assert!(
            !(options.ty.is_some() && options.default.is_some()),
            "a lens may not have both `type` and `default`"
        );
        Lens(Rc::new(LensNode { kind, options }))
    }

    pub(crate) fn kind(&self) -> &LensKind {
        &self.0.kind
    }

    pub(crate) fn options(&self) -> &LensOptions {
        &self.0.options
    }

    pub(crate) fn ty(&self) -> Option<&LensType> {
        self.0.options.ty.as_ref()
    }

    pub fn has_type(&self) -> bool {
        self.0.options.has_type()
    }

    pub fn id(&self) -> LensId {
        LensId(Rc::as_ptr(&self.0) as usize)
    }

    pub fn debug_name(&self) -> String {
        self.0
            .options
            .name
            .clone()
            .unwrap_or_else(|| self.kind_name().to_string())
    }

    fn kind_name(&self) -> &'static str {
        match &self.0.kind {
            LensKind::AnyOf { .. } => "AnyOf",
            LensKind::Literal { .. } => "Literal",
            LensKind::Empty { .. } => "Empty",
            LensKind::And(_) => "And",
            LensKind::Or(_) => "Or",
            LensKind::Repeat { .. } => "Repeat",
            LensKind::Group(_) => "Group",
            LensKind::Forward { .. } => "Forward",
            LensKind::Until { .. } => "Until",
            LensKind::Null => "NullLens",
        }
    }

    // -- Primitive constructors (§4 "Primitive lenses") --

    pub fn any_of(valid_chars: impl Into<String>, negate: bool, options: LensOptions) -> Lens {
        Lens::new(
            LensKind::AnyOf {
                valid_chars: Rc::from(valid_chars.into().as_str()),
                negate,
            },
            options,
        )
    }

    pub fn literal(text: impl Into<String>, options: LensOptions) -> Lens {
        Lens::new(LensKind::Literal { text: text.into() }, options)
    }

    pub fn empty(options: LensOptions) -> Lens {
        Lens::new(LensKind::Empty { mode: None }, options)
    }

    pub fn empty_at(mode: EmptyMode, options: LensOptions) -> Lens {
        Lens::new(LensKind::Empty { mode: Some(mode) }, options)
    }

    // -- Combinator constructors (§4 "Combinator lenses") --

    /// Flattens any plain (option-free) nested `And` into this one, so
    /// chaining with `+` builds one wide sequence rather than a chain of
    /// singleton wrappers.
    pub fn and(children: Vec<Lens>, options: LensOptions) -> Lens {
        let flat = flatten(children, |kind| match kind {
            LensKind::And(inner) => Some(inner),
            _ => None,
        });
        Lens::new(LensKind::And(flat), options)
    }

    /// See [`Lens::and`]; the same flattening for `|`-chained `Or`s.
    pub fn or(children: Vec<Lens>, options: LensOptions) -> Lens {
        let flat = flatten(children, |kind| match kind {
            LensKind::Or(inner) => Some(inner),
            _ => None,
        });
        Lens::new(LensKind::Or(flat), options)
    }

    pub fn repeat(child: Lens, min: usize, max: Option<usize>, options: LensOptions) -> Lens {
        Lens::new(LensKind::Repeat { child, min, max }, options)
    }

    /// `Group` must have a container-kind type; its single child is expected
    /// to be untyped (§4 "Group ... delegates GET/PUT, letting the outer
    /// framework materialize/unwrap the container").
    pub fn group(child: Lens, options: LensOptions) -> Lens {
        debug_assert!(options.has_type(), "Group requires a type");
        Lens::new(LensKind::Group(child), options)
    }

    // -- Forward / Until (§4 "Forward and Until") --

    pub fn forward() -> Lens {
        Lens::forward_with_limit(DEFAULT_FORWARD_RECURSION_LIMIT)
    }

    pub fn forward_with_limit(recursion_limit: usize) -> Lens {
        Lens::new(
            LensKind::Forward {
                bound: RefCell::new(None),
                recursion_limit,
            },
            LensOptions::new(),
        )
    }

    /// Binds a `Forward`'s target. May be called exactly once; mirrors
    /// `core_lenses.py`'s `__lshift__`/`bind_lens`.
    pub fn bind(&self, target: Lens) {
        match &self.0.kind {
            LensKind::Forward { bound, .. } => {
                let mut slot = bound.borrow_mut();
                debug_assert!(slot.is_none(), "Forward lens rebound after first bind");
                *slot = Some(target);
            }
            _ => debug_assert!(false, "bind() called on a non-Forward lens"),
        }
    }

    pub fn until(stop: Lens, include: bool, options: LensOptions) -> Lens {
        Lens::new(LensKind::Until { stop, include }, options)
    }

    pub fn null() -> Lens {
        Lens::new(LensKind::Null, LensOptions::new())
    }
}

/// A lens contributes no meaning of its own beyond its `kind` once none of
/// its options are set, so it's safe to splice its children straight into
/// an enclosing `And`/`Or` without losing anything.
fn is_plain(options: &LensOptions) -> bool {
    options.ty.is_none()
        && options.default.is_none()
        && options.name.is_none()
        && options.label.is_none()
        && !options.is_label
        && !options.auto_list
        && !options.combine_chars
        && options.alignment.is_none()
}

fn flatten(children: Vec<Lens>, unwrap: impl Fn(&LensKind) -> Option<&Vec<Lens>>) -> Vec<Lens> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match unwrap(child.kind()) {
            Some(inner) if is_plain(child.options()) => flat.extend(inner.iter().cloned()),
            _ => flat.push(child),
        }
    }
    flat
}

impl fmt::Debug for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lens({})", self.debug_name())
    }
}

impl<T: Into<Lens>> Add<T> for Lens {
    type Output = Lens;
    fn add(self, rhs: T) -> Lens {
        Lens::and(vec![self, rhs.into()], LensOptions::new())
    }
}

impl<T: Into<Lens>> BitOr<T> for Lens {
    type Output = Lens;
    fn bitor(self, rhs: T) -> Lens {
        Lens::or(vec![self, rhs.into()], LensOptions::new())
    }
}

impl Add<Lens> for &str {
    type Output = Lens;
    fn add(self, rhs: Lens) -> Lens {
        Lens::from(self) + rhs
    }
}

impl From<&str> for Lens {
    fn from(text: &str) -> Lens {
        Lens::literal(text, LensOptions::new())
    }
}

impl From<String> for Lens {
    fn from(text: String) -> Lens {
        Lens::literal(text, LensOptions::new())
    }
}
