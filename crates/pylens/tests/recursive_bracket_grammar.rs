//! Recursive `Forward`: `R := '[' + (AnyOf(alphas,type=str) | R) + ']'`
//! wrapped in `Group(type=list)`. Covers weaving across recursive descent
//! (§4.8) and the `InfiniteRecursion` cap when `Or`'s branch order would
//! otherwise never terminate.

use pylens::{charsets, get, put, Item, Lens, LensError, LensOptions, LensType, Value};

fn bracketed(body: Lens) -> Lens {
    Lens::and(
        vec![Lens::literal("[", LensOptions::new()), body, Lens::literal("]", LensOptions::new())],
        LensOptions::new(),
    )
}

/// `Or` tries the plain letter before recursing, so weaving (an aligned
/// reader) bottoms out at the innermost occurrence instead of looping.
fn bracket_lens() -> Lens {
    let forward = Lens::forward();
    let letter = Lens::any_of(charsets::alphas(), false, LensOptions::new().ty(LensType::Str));
    let body = Lens::or(vec![letter, forward.clone()], LensOptions::new());
    let r = bracketed(body);
    forward.bind(r.clone());
    Lens::group(r, LensOptions::new().ty(LensType::List))
}

/// Reversing `Or`'s branch order: recursing before ever trying the letter
/// means a reader-less PUT can never make progress toward the base case.
fn non_terminating_bracket_lens() -> Lens {
    let forward = Lens::forward();
    let letter = Lens::any_of(charsets::alphas(), false, LensOptions::new().ty(LensType::Str));
    let body = Lens::or(vec![forward.clone(), letter], LensOptions::new());
    let r = bracketed(body);
    forward.bind(r.clone());
    Lens::group(r, LensOptions::new().ty(LensType::List))
}

#[test]
fn get_unwraps_every_level_of_nesting() {
    let item = get(bracket_lens(), "[[[h]]]").unwrap();
    assert_eq!(item.value, Value::List(vec![Item::new(Value::Str("h".into()))]));
}

#[test]
fn put_with_original_preserves_the_nesting_depth() {
    let original = "[[[h]]]";
    let mut parsed = get(bracket_lens(), original).unwrap();
    if let Value::List(items) = &mut parsed.value {
        items[0].value = Value::Str("p".into());
    }
    assert_eq!(put(bracket_lens(), parsed, Some(original)).unwrap(), "[[[p]]]");
}

#[test]
fn put_with_no_original_creates_the_shallowest_nesting() {
    let fresh = Item::new(Value::List(vec![Item::new(Value::Str("k".into()))]));
    assert_eq!(put(bracket_lens(), fresh, None).unwrap(), "[k]");
}

#[test]
fn reversed_branch_order_cannot_terminate_a_reader_less_put() {
    let fresh = Item::new(Value::List(vec![Item::new(Value::Str("k".into()))]));
    let err = put(non_terminating_bracket_lens(), fresh, None).unwrap_err();
    assert!(matches!(err, LensError::InfiniteRecursion { .. }));
}
