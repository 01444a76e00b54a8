//! The GET/PUT dispatch engine (§4.5-§4.8): one pair of recursive functions
//! matching exhaustively over [`LensKind`], plus the container-mediated
//! helpers (`container_get`/`container_put`) that let a composite lens defer
//! "which item?" to whatever container it's filling or draining.

use std::cell::Cell;
use std::rc::Rc;

use pylens_base::display::escape_for_display;
use pylens_base::{check_consumption, ConcreteInputReader, LensError, Result, Rollbackable};
use pylens_containers::{Alignment, Container, ContainerKind};
use pylens_item::{Item, Value, ValueKind};

use crate::lens::LensKind;
use crate::options::LensType;
use crate::Lens;

fn container_kind_of(ty: Option<&LensType>) -> Option<ContainerKind> {
    match ty {
        Some(LensType::List) => Some(ContainerKind::List),
        Some(LensType::Map) => Some(ContainerKind::Map),
        Some(LensType::Object(schema)) => Some(ContainerKind::Object(schema.clone())),
        _ => None,
    }
}

/// §9 Design Notes: a general object container defaults to SOURCE alignment;
/// list/map default to MODEL, matching `AbstractContainer`'s default vs.
/// `LensObject`'s override in the Python source.
fn default_alignment(kind: &ContainerKind) -> Alignment {
    match kind {
        ContainerKind::Object(_) => Alignment::Source,
        _ => Alignment::Model,
    }
}

fn cast_value(value: Value, ty: &LensType) -> Result<Value> {
    match (ty, value) {
        (LensType::Str, v @ Value::Str(_)) => Ok(v),
        (LensType::Int, Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| LensError::NoMatch(format!("cannot parse '{s}' as an integer"))),
        (LensType::Int, v @ Value::Int(_)) => Ok(v),
        (LensType::Float, Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| LensError::NoMatch(format!("cannot parse '{s}' as a float"))),
        (LensType::Float, v @ Value::Float(_)) => Ok(v),
        (LensType::Bool, Value::Str(s)) => match s.as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            other => Err(LensError::NoMatch(format!("cannot parse '{other}' as a bool"))),
        },
        (LensType::Bool, v @ Value::Bool(_)) => Ok(v),
        (LensType::List, v @ Value::List(_)) => Ok(v),
        (LensType::Map, v @ Value::Map(_)) => Ok(v),
        (LensType::Object(_), v @ Value::Map(_)) => Ok(v),
        (_, other) => Err(LensError::Programmer(format!(
            "value {other:?} does not match the lens's declared type"
        ))),
    }
}

fn check_value_kind(value: &Value, ty: &LensType) -> Result<()> {
    let expected = ty.value_kind();
    if value.kind() != expected {
        return Err(LensError::NoMatch(format!(
            "item of kind {:?} does not match lens type (expected {expected:?})",
            value.kind()
        )));
    }
    Ok(())
}

fn value_to_string(value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(LensError::Programmer(format!(
            "cannot render {other:?} as text directly; it needs a container-kind lens"
        ))),
    }
}

/// Applies this lens's own `auto_list`/`combine_chars`/`is_label`/`label`
/// options to the item it just produced (§3 "Lens options", `base_lenses.py`
/// `_process_outgoing_item`).
fn process_outgoing_item(lens: &Lens, mut item: Item) -> Item {
    let opts = lens.options();
    if opts.auto_list && matches!(opts.ty, Some(LensType::List)) {
        if let Value::List(mut items) = item.value {
            if items.len() == 1 {
                let list_meta = item.meta.take().unwrap_or_default();
                let mut singleton = items.pop().unwrap();
                let singleton_meta = singleton.meta.take();
                singleton.meta = Some(list_meta);
                if let Some(inner) = singleton_meta {
                    singleton.enable_meta().singleton_meta = Some(Box::new(inner));
                }
                item = singleton;
            } else {
                item.value = Value::List(items);
            }
        }
    } else if opts.combine_chars && matches!(opts.ty, Some(LensType::List)) {
        if let Value::List(items) = &item.value {
            // XXX: each character's own metadata is lost here, matching the
            // Python source's equivalent note.
            let combined: String = items.iter().filter_map(|i| i.value.as_str()).collect();
            let meta = item.meta.take();
            item.value = Value::Str(combined);
            item.meta = meta;
        }
    }

    if opts.is_label {
        item.enable_meta().is_label = true;
    } else if let Some(label) = &opts.label {
        item.enable_meta().label = Some(label.clone());
    }
    item
}

/// Reverses [`process_outgoing_item`] before PUT re-checks the item's shape
/// against the lens's declared type (`_process_incoming_item`).
fn process_incoming_item(lens: &Lens, mut item: Item) -> Item {
    let opts = lens.options();
    if opts.auto_list && matches!(opts.ty, Some(LensType::List)) && !item.value.is_list() {
        let list_meta = item
            .meta
            .as_ref()
            .and_then(|m| m.singleton_meta.clone())
            .map(|b| *b)
            .unwrap_or_default();
        let singleton_meta = item.meta.take();
        let mut singleton = item;
        singleton.meta = singleton_meta;
        item = Item::with_meta(Value::List(vec![singleton]), list_meta);
    } else if opts.combine_chars && matches!(opts.ty, Some(LensType::List)) {
        if let Value::Str(s) = &item.value {
            let chars: Vec<Item> = s.chars().map(|c| Item::new(Value::Str(c.to_string()))).collect();
            item.value = Value::List(chars);
        }
    }
    item
}

// -- Rollback helpers spanning an optional reader and an optional container --

fn tentative_scope_get<R>(
    reader: &mut ConcreteInputReader,
    mut container: Option<&mut Container>,
    f: impl FnOnce(&mut ConcreteInputReader, Option<&mut Container>) -> Result<R>,
) -> Result<R> {
    let reader_snap = reader.snapshot();
    let container_snap = container.as_deref().map(|c| c.snapshot());
    match f(reader, container.as_deref_mut()) {
        Ok(v) => Ok(v),
        Err(e) if e.is_rollback_safe() => {
            reader.restore(reader_snap);
            if let (Some(c), Some(s)) = (container.as_deref_mut(), container_snap) {
                c.restore(s);
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn tentative_scope_get_progress<R>(
    reader: &mut ConcreteInputReader,
    mut container: Option<&mut Container>,
    f: impl FnOnce(&mut ConcreteInputReader, Option<&mut Container>) -> Result<R>,
) -> (Result<R>, bool) {
    let reader_before = reader.snapshot();
    let container_before = container.as_deref().map(|c| c.snapshot());
    match f(reader, container.as_deref_mut()) {
        Ok(v) => {
            let reader_after = reader.snapshot();
            let reader_changed = !reader.state_eq(reader_before.as_ref(), reader_after.as_ref());
            let container_changed = match (container.as_deref_mut(), container_before) {
                (Some(c), Some(before)) => {
                    let after = c.snapshot();
                    !c.state_eq(before.as_ref(), after.as_ref())
                }
                _ => false,
            };
            (Ok(v), reader_changed || container_changed)
        }
        Err(e) if e.is_rollback_safe() => {
            reader.restore(reader_before);
            if let (Some(c), Some(s)) = (container.as_deref_mut(), container_before) {
                c.restore(s);
            }
            (Err(e), false)
        }
        Err(e) => (Err(e), false),
    }
}

fn tentative_scope_put<R>(
    mut reader: Option<&mut ConcreteInputReader>,
    mut container: Option<&mut Container>,
    f: impl FnOnce(Option<&mut ConcreteInputReader>, Option<&mut Container>) -> Result<R>,
) -> Result<R> {
    let reader_snap = reader.as_deref().map(|r| r.snapshot());
    let container_snap = container.as_deref().map(|c| c.snapshot());
    match f(reader.as_deref_mut(), container.as_deref_mut()) {
        Ok(v) => Ok(v),
        Err(e) if e.is_rollback_safe() => {
            if let (Some(r), Some(s)) = (reader.as_deref_mut(), reader_snap) {
                r.restore(s);
            }
            if let (Some(c), Some(s)) = (container.as_deref_mut(), container_snap) {
                c.restore(s);
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

// -- Forward recursion depth cap --

thread_local! {
    static FORWARD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn with_forward_depth<R>(limit: usize, f: impl FnOnce() -> Result<R>) -> Result<R> {
    let depth = FORWARD_DEPTH.with(|d| d.get());
    if depth >= limit {
        return Err(LensError::InfiniteRecursion { depth });
    }
    struct Guard(usize);
    impl Drop for Guard {
        fn drop(&mut self) {
            FORWARD_DEPTH.with(|d| d.set(self.0));
        }
    }
    let _guard = Guard(depth);
    FORWARD_DEPTH.with(|d| d.set(depth + 1));
    f()
}

fn consume_until_stop(stop: &Lens, reader: &mut ConcreteInputReader, include: bool) -> Result<String> {
    let start = reader.pos();
    loop {
        let snap = reader.snapshot();
        match dispatch_get(stop, reader, None) {
            Ok(_) => {
                if !include {
                    reader.restore(snap);
                }
                break;
            }
            Err(e) if e.is_rollback_safe() => reader.restore(snap),
            Err(e) => return Err(e),
        }
        if reader.consume_char().is_err() {
            break;
        }
    }
    Ok(reader.consumed_since(start).to_string())
}

// -- GET --

/// Calls `child.get` into `container` if one was supplied, storing whatever
/// comes back; when no container is present, a returned item is a
/// programmer error (an untyped context has nowhere to put it).
fn container_get(child: &Lens, reader: &mut ConcreteInputReader, container: Option<&mut Container>) -> Result<()> {
    match container {
        Some(c) => {
            if let Some(item) = dispatch_get(child, reader, Some(c))? {
                c.store(item)?;
            }
            Ok(())
        }
        None => {
            if dispatch_get(child, reader, None)?.is_some() {
                return Err(LensError::Programmer(
                    "a sub-lens produced an item outside of any enclosing container".into(),
                ));
            }
            Ok(())
        }
    }
}

pub(crate) fn dispatch_get(
    lens: &Lens,
    reader: &mut ConcreteInputReader,
    container: Option<&mut Container>,
) -> Result<Option<Item>> {
    let start = reader.pos();
    tracing::trace!(target: "lens.get", lens = %lens.debug_name(), pos = start, "dispatch_get");
    let ty = lens.ty().cloned();
    let container_kind = container_kind_of(ty.as_ref());

    let (proper_item, container_label): (Option<Item>, Option<String>) = if let Some(kind) = container_kind {
        let alignment = lens.options().alignment.unwrap_or_else(|| default_alignment(&kind));
        let mut sub = Container::new(kind, alignment);
        let returned = get_proper(lens, lens.kind(), reader, Some(&mut sub))?;
        if returned.is_some() {
            return Err(LensError::Programmer(format!(
                "{} is a container-kind lens but its GET returned an item directly",
                lens.debug_name()
            )));
        }
        let label = sub.container_label().map(str::to_string);
        (Some(Item::new(sub.unwrap())), label)
    } else {
        (get_proper(lens, lens.kind(), reader, container)?, None)
    };

    match ty {
        None => Ok(proper_item),
        Some(ty) => {
            let mut item = proper_item.ok_or_else(|| {
                LensError::Programmer(format!("{} is a STORE lens but produced no item", lens.debug_name()))
            })?;
            item.value = cast_value(item.value, &ty)?;
            {
                let meta = item.enable_meta();
                meta.origin_lens = Some(lens.id());
                meta.concrete_start = Some(start);
                meta.concrete_end = Some(reader.pos());
                meta.concrete_source = Some(reader.clone());
            }
            if let Some(label) = container_label {
                item.enable_meta().label = Some(label);
            }
            Ok(Some(process_outgoing_item(lens, item)))
        }
    }
}

/// Consumes a character matching `valid_chars`/`negate`, shared by GET and
/// by PUT's non-STORE "emit the next input character" path.
fn match_any_of(valid_chars: &str, negate: bool, reader: &mut ConcreteInputReader) -> Result<char> {
    let c = reader.consume_char()?;
    let ok = if negate { !valid_chars.contains(c) } else { valid_chars.contains(c) };
    if !ok {
        return Err(LensError::NoMatch(format!(
            "expected a character from the lens's set but got '{}'",
            escape_for_display(&c.to_string())
        )));
    }
    Ok(c)
}

/// Consumes exactly `text`, shared by GET and by PUT's non-STORE
/// "consume and re-emit" path.
fn match_literal(text: &str, reader: &mut ConcreteInputReader) -> Result<String> {
    let n = text.chars().count();
    let consumed = reader.consume_exact(n)?;
    if &consumed != text {
        return Err(LensError::NoMatch(format!(
            "expected literal '{}' but got '{}'",
            escape_for_display(text),
            escape_for_display(&consumed)
        )));
    }
    Ok(consumed)
}

fn match_empty(mode: Option<crate::options::EmptyMode>, reader: &ConcreteInputReader) -> Result<()> {
    use crate::options::EmptyMode;
    match mode {
        Some(EmptyMode::StartOfText) if reader.pos() != 0 => {
            Err(LensError::NoMatch("expected the start of the text".into()))
        }
        Some(EmptyMode::EndOfText) if !reader.is_exhausted() => {
            Err(LensError::NoMatch("expected the end of the text".into()))
        }
        _ => Ok(()),
    }
}

fn get_proper(
    lens: &Lens,
    kind: &LensKind,
    reader: &mut ConcreteInputReader,
    container: Option<&mut Container>,
) -> Result<Option<Item>> {
    match kind {
        // §4.5: "Consumes a valid char from the input, returning it if we
        // are a STORE lens" — a non-STORE AnyOf/Literal/Empty/Until still
        // consumes (and validates) the input but yields nothing to store,
        // so a punctuation/delimiter lens used bare never pollutes its
        // enclosing container.
        LensKind::AnyOf { valid_chars, negate } => {
            let c = match_any_of(valid_chars, *negate, reader)?;
            Ok(lens.has_type().then(|| Item::new(Value::Str(c.to_string()))))
        }
        LensKind::Literal { text } => {
            let consumed = match_literal(text, reader)?;
            Ok(lens.has_type().then(|| Item::new(Value::Str(consumed))))
        }
        LensKind::Empty { mode } => {
            match_empty(*mode, reader)?;
            Ok(lens.has_type().then(|| Item::new(Value::Str(String::new()))))
        }
        LensKind::And(children) => {
            let mut container = container;
            for child in children {
                container_get(child, reader, container.as_deref_mut())?;
            }
            Ok(None)
        }
        LensKind::Or(children) => {
            let mut container = container;
            for child in children {
                match tentative_scope_get(reader, container.as_deref_mut(), |r, c| dispatch_get(child, r, c)) {
                    Ok(item) => return Ok(item),
                    Err(e) if e.is_rollback_safe() => {
                        tracing::trace!(target: "lens.or", branch = %child.debug_name(), error = %e, "branch_rejected");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(LensError::NoMatch(format!("no branch of {} matched", lens.debug_name())))
        }
        LensKind::Repeat { child, min, max } => {
            let mut container = container;
            let mut count = 0usize;
            loop {
                if max.is_some_and(|m| count == m) {
                    break;
                }
                let (result, changed) =
                    tentative_scope_get_progress(reader, container.as_deref_mut(), |r, c| container_get(child, r, c));
                match result {
                    Ok(()) => {
                        if !changed {
                            break;
                        }
                        count += 1;
                    }
                    Err(e) if e.is_rollback_safe() => break,
                    Err(e) => return Err(e),
                }
            }
            if count < *min {
                return Err(LensError::TooFewIterations { min: *min, got: count });
            }
            Ok(None)
        }
        LensKind::Group(child) => {
            let item = dispatch_get(child, reader, container)?;
            if item.is_some() {
                return Err(LensError::Programmer(format!(
                    "{}'s child lens must be untyped; Group itself supplies the type",
                    lens.debug_name()
                )));
            }
            Ok(None)
        }
        LensKind::Forward { bound, recursion_limit } => {
            let child = bound
                .borrow()
                .clone()
                .ok_or_else(|| LensError::Programmer("Forward lens used before being bound".into()))?;
            tracing::trace!(target: "lens.forward", limit = recursion_limit, "forward_hop");
            with_forward_depth(*recursion_limit, || dispatch_get(&child, reader, container))
        }
        LensKind::Until { stop, include } => {
            let consumed = consume_until_stop(stop, reader, *include)?;
            if consumed.is_empty() {
                return Err(LensError::NoMatch("Until must consume at least one character".into()));
            }
            Ok(Some(Item::new(Value::Str(consumed))))
        }
        LensKind::Null => Err(LensError::NoMatch(format!(
            "{} always fails; it is a placeholder for an unfinished lens",
            lens.debug_name()
        ))),
    }
}

// -- PUT --

fn get_and_discard(lens: &Lens, reader: &mut ConcreteInputReader, mut container: Option<&mut Container>) -> Result<()> {
    let snap = container.as_deref().map(|c| c.snapshot());
    dispatch_get(lens, reader, container.as_deref_mut())?;
    if let (Some(c), Some(s)) = (container.as_deref_mut(), snap) {
        c.restore(s);
    }
    Ok(())
}

/// PUT counterpart of `container_get`: if a container is present, the
/// requesting lens draws its item (if any) from it; otherwise it must be
/// non-STORE and simply recurses with the reader alone.
fn container_put(
    child: &Lens,
    reader: Option<&mut ConcreteInputReader>,
    container: Option<&mut Container>,
) -> Result<String> {
    match container {
        Some(c) => container_consume_and_put(child, c, reader),
        None => dispatch_put(child, None, reader, None),
    }
}

/// Mirrors `AbstractContainer.consume_and_put_item`: a non-STORE lens simply
/// recurses (still carrying the container, so a STORE descendant further
/// down can draw from the same pool); a STORE lens is routed either to its
/// container's label (`is_label`) or to the best-matching candidate slot.
fn container_consume_and_put(
    lens: &Lens,
    container: &mut Container,
    reader: Option<&mut ConcreteInputReader>,
) -> Result<String> {
    if !lens.has_type() {
        return dispatch_put(lens, None, reader, Some(container));
    }

    if lens.options().is_label {
        let label = container
            .take_label()
            .ok_or_else(|| LensError::NoTokenToConsume("no label available to consume".into()))?;
        return dispatch_put(lens, Some(Item::new(Value::Str(label))), reader, None);
    }

    let ty = lens.ty().expect("checked has_type above");
    let want_kind = ty.value_kind();
    let label = lens.options().label.as_deref();

    if let Some((sub_idx, indices)) = container.sub_container_candidates(Some(lens.id()), want_kind, label) {
        let candidates: Vec<(usize, Item)> = indices
            .into_iter()
            .filter_map(|i| container.peek_sub_container(sub_idx, i).map(|item| (i, item.clone())))
            .collect();
        return try_candidates(lens, reader, candidates, |c, i| c.remove_from_sub_container(sub_idx, i), container);
    }

    let indices = container.candidates(label);
    let candidates: Vec<(usize, Item)> = indices
        .into_iter()
        .filter_map(|i| container.peek(i).map(|item| (i, item.clone())))
        .collect();
    try_candidates(lens, reader, candidates, |c, i| c.remove(i), container)
}

/// Tries each candidate item in order, rolling back the reader between
/// attempts; the first one whose PUT succeeds is removed from `container`.
fn try_candidates(
    lens: &Lens,
    mut reader: Option<&mut ConcreteInputReader>,
    candidates: Vec<(usize, Item)>,
    remove: impl Fn(&mut Container, usize) -> Result<Item>,
    container: &mut Container,
) -> Result<String> {
    for (idx, candidate) in candidates {
        let attempt = tentative_scope_put(reader.as_deref_mut(), None, |r, _| {
            dispatch_put(lens, Some(candidate.clone()), r, None)
        });
        match attempt {
            Ok(output) => {
                remove(container, idx)?;
                return Ok(output);
            }
            Err(e) if e.is_rollback_safe() => continue,
            Err(e) => return Err(e),
        }
    }
    Err(LensError::NoTokenToConsume(format!(
        "no candidate item available for {}",
        lens.debug_name()
    )))
}

pub(crate) fn dispatch_put(
    lens: &Lens,
    item: Option<Item>,
    reader: Option<&mut ConcreteInputReader>,
    container: Option<&mut Container>,
) -> Result<String> {
    tracing::trace!(target: "lens.put", lens = %lens.debug_name(), has_item = item.is_some(), has_reader = reader.is_some(), "dispatch_put");
    match lens.ty().cloned() {
        None => {
            if item.is_some() {
                return Err(LensError::Programmer(format!(
                    "{} is not a STORE lens but was given an item to PUT",
                    lens.debug_name()
                )));
            }
            if reader.is_none() {
                if let Some(default) = &lens.options().default {
                    return Ok(default.clone());
                }
            }
            put_proper(lens, lens.kind(), None, reader, container)
        }
        Some(ty) => match item {
            Some(item) => put_store_item(lens, &ty, item, reader),
            None => match container {
                Some(c) => container_consume_and_put(lens, c, reader),
                None => Err(LensError::Programmer(format!(
                    "{} is a STORE lens with no item and no container to draw one from",
                    lens.debug_name()
                ))),
            },
        },
    }
}

/// Reconstructs the reader this item was originally GOT from, seeked back
/// to its start position — the personal `item_input_reader` of the Python
/// source's `put` (`ConcreteInputReader(item._meta_data.concrete_input_reader)`
/// then `set_pos(concrete_start_position)`).
fn item_reader_at_start(item: &Item) -> Option<ConcreteInputReader> {
    let meta = item.meta.as_ref()?;
    let start = meta.concrete_start?;
    let mut r = meta.concrete_source.clone()?;
    r.set_pos(start);
    Some(r)
}

/// PUTs a concrete item through a STORE lens, choosing which reader (if
/// any) backs the nested PUT (§4.8 step 3.d). When the item was previously
/// GOT, it carries its own originating reader; if that reader is aligned
/// with the outer one (same source, same position — i.e. the item is still
/// in its original slot) the outer reader is reused as-is. If misaligned
/// (the item moved, e.g. on a model-level reorder) the outer reader is
/// consumed-and-discarded past whatever now occupies this slot, and the
/// item's own reader takes over so non-stored fragments around it (default
/// separators, etc.) still weave from where it originally came from. An
/// item with no concrete origin at all is a pure CREATE: the outer reader
/// is still discarded past this slot, but nothing backs the nested PUT.
fn put_store_item(
    lens: &Lens,
    ty: &LensType,
    item: Item,
    reader: Option<&mut ConcreteInputReader>,
) -> Result<String> {
    let item = process_incoming_item(lens, item);
    check_value_kind(&item.value, ty)?;
    let item_reader = item_reader_at_start(&item);

    let mut own_reader_storage: Option<ConcreteInputReader> = None;
    let reader_for_put: Option<&mut ConcreteInputReader> = match (reader, item_reader) {
        (Some(r), Some(item_reader)) if r.aligned_with(&item_reader) => Some(r),
        (Some(r), Some(item_reader)) => {
            get_and_discard(lens, r, None)?;
            own_reader_storage = Some(item_reader);
            own_reader_storage.as_mut()
        }
        (Some(r), None) => {
            get_and_discard(lens, r, None)?;
            None
        }
        (None, Some(item_reader)) => {
            own_reader_storage = Some(item_reader);
            own_reader_storage.as_mut()
        }
        (None, None) => None,
    };

    if let Some(kind) = container_kind_of(Some(ty)) {
        let alignment = lens.options().alignment.unwrap_or_else(|| default_alignment(&kind));
        let label = item.meta.as_ref().and_then(|m| m.label.clone());
        let mut sub = Container::wrap_for_put(item.value, kind, alignment)?.ok_or_else(|| {
            LensError::Programmer(format!(
                "{} declares a container type but received a non-container value",
                lens.debug_name()
            ))
        })?;
        sub.set_initial_label(label);
        let output = put_proper(lens, lens.kind(), None, reader_for_put, Some(&mut sub))?;
        if check_consumption() && !sub.is_fully_consumed() {
            return Err(LensError::NotFullyConsumed {
                remaining: format!("unconsumed item(s) remain in {}", lens.debug_name()),
            });
        }
        Ok(output)
    } else {
        let s = value_to_string(&item.value)?;
        put_proper(lens, lens.kind(), Some(Item::new(Value::Str(s))), reader_for_put, None)
    }
}

fn put_proper(
    lens: &Lens,
    kind: &LensKind,
    item: Option<Item>,
    reader: Option<&mut ConcreteInputReader>,
    container: Option<&mut Container>,
) -> Result<String> {
    match kind {
        // §4.5: when PUTting an item, validate it and ignore the reader
        // (whatever text occupied this spot was already drained by
        // `put_store_item` before we get here). When PUTting with no item
        // (a non-STORE lens), fall back to consuming the matching input
        // straight off the reader and re-emitting it verbatim, or fail
        // `NoDefault` if there's no input left to consume from.
        LensKind::AnyOf { valid_chars, negate } => match item {
            Some(item) => {
                // STORE PUT (vs CREATE): first consume a char from the
                // reader, if one is present, so the reader stays in sync
                // with our sibling lenses even though we emit the item's
                // own value rather than whatever character was read
                // (`base_lenses.py` AnyOf._put: "if concrete_input_reader:
                // self.get(concrete_input_reader)").
                if let Some(r) = reader {
                    match_any_of(valid_chars, *negate, r)?;
                }
                let s = item
                    .value
                    .as_str()
                    .ok_or_else(|| LensError::Programmer("AnyOf's item must be a string".into()))?;
                let c = s
                    .chars()
                    .next()
                    .ok_or_else(|| LensError::NoMatch("AnyOf's item must hold exactly one character".into()))?;
                let ok = if *negate { !valid_chars.contains(c) } else { valid_chars.contains(c) };
                if !ok {
                    return Err(LensError::NoMatch(format!(
                        "'{}' is outside the lens's character set",
                        escape_for_display(&c.to_string())
                    )));
                }
                Ok(c.to_string())
            }
            None => match reader {
                Some(r) => Ok(match_any_of(valid_chars, *negate, r)?.to_string()),
                None => Err(LensError::NoDefault(format!(
                    "{} has no default and no input to consume",
                    lens.debug_name()
                ))),
            },
        },
        LensKind::Literal { text } => {
            // Same "consume then validate" shape as AnyOf above, for both
            // STORE and non-STORE PUT.
            if let Some(r) = reader {
                match_literal(text, r)?;
            }
            if let Some(item) = &item {
                if item.value.as_str() != Some(text.as_str()) {
                    return Err(LensError::NoMatch(format!("item does not match literal '{text}'")));
                }
            }
            Ok(text.clone())
        }
        LensKind::Empty { mode } => {
            if item.is_none() {
                if let Some(r) = reader.as_deref() {
                    match_empty(*mode, r)?;
                }
            }
            Ok(String::new())
        }
        LensKind::And(children) => {
            let mut reader = reader;
            let mut container = container;
            let mut out = String::new();
            for child in children {
                out.push_str(&container_put(child, reader.as_deref_mut(), container.as_deref_mut())?);
            }
            Ok(out)
        }
        LensKind::Or(children) => put_or(lens, children, item, reader, container),
        LensKind::Repeat { child, min, max } => put_repeat(child, *min, *max, reader, container),
        LensKind::Group(child) => container_put(child, reader, container),
        LensKind::Forward { bound, recursion_limit } => {
            let child = bound
                .borrow()
                .clone()
                .ok_or_else(|| LensError::Programmer("Forward lens used before being bound".into()))?;
            with_forward_depth(*recursion_limit, || dispatch_put(&child, item, reader, container))
        }
        LensKind::Until { stop, include } => {
            // STORE: the consumed span is discarded once validated (the
            // item's own value is what gets emitted, not the source text).
            // Non-STORE: the consumed span *is* the emitted text, so there
            // is nothing to fall back on without a reader to consume from.
            let consumed = match reader {
                Some(r) => Some(consume_until_stop(stop, r, *include)?),
                None => None,
            };
            match item {
                Some(item) => Ok(item.value.as_str().map(str::to_string).unwrap_or_default()),
                None => consumed.ok_or_else(|| {
                    LensError::NoDefault(format!("{} has no default and no input to consume", lens.debug_name()))
                }),
            }
        }
        LensKind::Null => Err(LensError::Programmer(format!("{} always fails", lens.debug_name()))),
    }
}

/// The two-phase `Or` PUT algorithm (§4 "Combinator lenses"), interleaved
/// per branch as `base_lenses.py`'s `Or._put` does it: for each branch `a`,
/// first try `a` straight; only if that fails do we check whether `a` is the
/// branch that originally parsed the input (`a.get_and_discard(reader)`),
/// and if so, let some other branch `b` emit the new representation with no
/// reader of its own. Trying every branch's straight PUT before any
/// cross-PUT (as a flat two-pass loop) is wrong: a branch like `Empty()`
/// matches vacuously on a straight PUT regardless of what the reader holds,
/// so it would "win" before the branch that actually owns the original text
/// ever gets a chance to discard it — exactly the `Optional(x)` = `Or(x,
/// Empty())` hazard the spec calls out. Interleaving per `a` ensures each
/// branch's own discard-then-cross-PUT is tried before moving on.
fn put_or(
    lens: &Lens,
    children: &[Lens],
    item: Option<Item>,
    reader: Option<&mut ConcreteInputReader>,
    container: Option<&mut Container>,
) -> Result<String> {
    let mut reader = reader;
    let mut container = container;

    for branch_a in children {
        let item_clone = item.clone();
        let straight = tentative_scope_put(reader.as_deref_mut(), container.as_deref_mut(), |r, c| {
            if let Some(item) = item_clone {
                dispatch_put(branch_a, Some(item), r, None)
            } else {
                container_put(branch_a, r, c)
            }
        });
        match straight {
            Ok(s) => return Ok(s),
            Err(e) if !e.is_rollback_safe() => return Err(e),
            Err(_) => {}
        }

        if reader.is_none() {
            continue;
        }

        let cross = tentative_scope_put(reader.as_deref_mut(), container.as_deref_mut(), |r, mut c| {
            let r = r.ok_or_else(|| LensError::Programmer("Or cross-PUT requires a reader".into()))?;
            get_and_discard(branch_a, r, None)?;
            for branch_b in children {
                if branch_b.id() == branch_a.id() {
                    continue;
                }
                let item_clone = item.clone();
                // Cross-PUT emits only; the reader was already consumed by
                // `branch_a`'s discard above, so `branch_b` gets `None`
                // (base_lenses.py:965's `b.put(item, None)`), never a second
                // chance to consume from it.
                let attempt = tentative_scope_put(None, c.as_deref_mut(), |_, c| {
                    if let Some(item) = item_clone {
                        dispatch_put(branch_b, Some(item), None, None)
                    } else {
                        container_put(branch_b, None, c)
                    }
                });
                match attempt {
                    Ok(s) => return Ok(s),
                    Err(e) if e.is_rollback_safe() => continue,
                    Err(e) => return Err(e),
                }
            }
            Err(LensError::NoMatch(format!(
                "{} originally parsed this input but no other branch could cross-PUT",
                branch_a.debug_name()
            )))
        });
        match cross {
            Ok(s) => return Ok(s),
            Err(e) if e.is_rollback_safe() => continue,
            Err(e) => return Err(e),
        }
    }

    Err(LensError::NoMatch(format!("no branch of {} could PUT", lens.debug_name())))
}

/// The three-phase `Repeat` PUT algorithm (§4): A) weave while the reader
/// still aligns with further occurrences, B) once it doesn't, create any
/// remaining model items fresh, C) drain leftover input the model no longer
/// wants.
fn put_repeat(
    child: &Lens,
    min: usize,
    max: Option<usize>,
    reader: Option<&mut ConcreteInputReader>,
    container: Option<&mut Container>,
) -> Result<String> {
    let mut reader = reader;
    let mut container = container;
    let mut out = String::new();
    let mut count = 0usize;

    if reader.is_some() {
        loop {
            if max.is_some_and(|m| count == m) {
                break;
            }
            let attempt = tentative_scope_put(reader.as_deref_mut(), container.as_deref_mut(), |r, c| {
                container_put(child, r, c)
            });
            match attempt {
                Ok(s) => {
                    out.push_str(&s);
                    count += 1;
                }
                Err(e) if e.is_rollback_safe() => break,
                Err(e) => return Err(e),
            }
        }
    }

    loop {
        if max.is_some_and(|m| count == m) {
            break;
        }
        let attempt = tentative_scope_put(None, container.as_deref_mut(), |_, c| container_put(child, None, c));
        match attempt {
            Ok(s) => {
                out.push_str(&s);
                count += 1;
            }
            Err(e) if e.is_rollback_safe() => break,
            Err(e) => return Err(e),
        }
    }

    // Phase C only drains leftover input the model no longer wants when
    // there's still a shortfall against `max`; once `got == max` (as in the
    // bounded-digits scenario), the reader's remaining content is left
    // untouched rather than discarded.
    if max.is_none_or(|m| count < m) {
        if let Some(r) = reader.as_deref_mut() {
            loop {
                match tentative_scope_get(r, None, |r, _| dispatch_get(child, r, None)) {
                    Ok(_) => {}
                    Err(e) if e.is_rollback_safe() => break,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    if count < min {
        return Err(LensError::TooFewIterations { min, got: count });
    }
    Ok(out)
}

// -- Top-level orchestration (§4.8) --

/// GET: parses `text` against `lens`, producing a model [`Item`]. A
/// non-STORE top lens is transparently wrapped the way the Python source's
/// free function coerces it via `AutoGroup`, so `get(word_lens, "hi")` works
/// without the caller wrapping it in a `Group` themselves.
pub fn get(lens: &Lens, text: impl Into<Rc<str>>) -> Result<Item> {
    let wrapped = crate::util::auto_group(lens.clone());
    let mut reader = ConcreteInputReader::new(text);
    let item = dispatch_get(&wrapped, &mut reader, None)?;
    if check_consumption() && !reader.is_exhausted() {
        return Err(LensError::NotFullyConsumed {
            remaining: reader.remaining().to_string(),
        });
    }
    item.ok_or_else(|| LensError::Programmer("top-level lens produced no item".into()))
}

/// PUT: renders `item` back to text through `lens`, weaving unchanged
/// fragments of `original` (if given) and creating fresh text for anything
/// new.
pub fn put(lens: &Lens, item: Item, original: Option<&str>) -> Result<String> {
    let wrapped = crate::util::auto_group(lens.clone());
    match original {
        Some(text) => {
            let mut reader = ConcreteInputReader::new(text);
            dispatch_put(&wrapped, Some(item), Some(&mut reader), None)
        }
        None => dispatch_put(&wrapped, Some(item), None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LensOptions;

    #[test]
    fn non_store_any_of_is_invisible_to_get() {
        let sep = Lens::any_of("+", false, LensOptions::new());
        let mut reader = ConcreteInputReader::new("+");
        assert_eq!(dispatch_get(&sep, &mut reader, None).unwrap(), None);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn non_store_literal_consumes_and_is_invisible_to_get() {
        let kw = Lens::literal("==", LensOptions::new());
        let mut reader = ConcreteInputReader::new("==x");
        assert_eq!(dispatch_get(&kw, &mut reader, None).unwrap(), None);
        assert_eq!(reader.remaining(), "x");
    }

    #[test]
    fn non_store_any_of_put_re_emits_from_reader() {
        let sep = Lens::any_of("+-", false, LensOptions::new());
        let mut reader = ConcreteInputReader::new("-rest");
        let out = dispatch_put(&sep, None, Some(&mut reader), None).unwrap();
        assert_eq!(out, "-");
        assert_eq!(reader.remaining(), "rest");
    }

    #[test]
    fn non_store_any_of_put_with_no_reader_and_no_default_fails() {
        let sep = Lens::any_of("+-", false, LensOptions::new());
        let err = dispatch_put(&sep, None, None, None).unwrap_err();
        assert!(matches!(err, LensError::NoDefault(_)));
    }

    #[test]
    fn non_store_literal_put_falls_back_to_its_own_text() {
        let kw = Lens::literal("==", LensOptions::new());
        let out = dispatch_put(&kw, None, None, None).unwrap();
        assert_eq!(out, "==");
    }

    #[test]
    fn and_sequences_store_and_non_store_children() {
        let word = Lens::repeat(
            Lens::any_of("abcdefghijklmnopqrstuvwxyz", false, LensOptions::new().ty(LensType::Str)),
            1,
            None,
            LensOptions::new().ty(LensType::List).combine_chars(),
        );
        let lens = Lens::and(
            vec![word.clone(), Lens::literal("=", LensOptions::new()), word],
            LensOptions::new().ty(LensType::List),
        );
        let mut reader = ConcreteInputReader::new("abc=xyz");
        let item = dispatch_get(&lens, &mut reader, None).unwrap().unwrap();
        assert_eq!(
            item.value,
            Value::List(vec![Item::new(Value::Str("abc".into())), Item::new(Value::Str("xyz".into()))])
        );
        let out = put(&lens, item, Some("abc=xyz")).unwrap();
        assert_eq!(out, "abc=xyz");
    }

    #[test]
    fn until_non_store_re_emits_consumed_span() {
        let stop = Lens::literal(";", LensOptions::new());
        let until = Lens::until(stop, false, LensOptions::new());
        let mut reader = ConcreteInputReader::new("hello;");
        assert_eq!(dispatch_get(&until, &mut reader, None).unwrap(), None);
        assert_eq!(reader.remaining(), ";");

        let mut reader = ConcreteInputReader::new("hello;");
        let out = dispatch_put(&until, None, Some(&mut reader), None).unwrap();
        assert_eq!(out, "hello");
    }
}
