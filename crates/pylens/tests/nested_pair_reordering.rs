//! Nested pairs with a non-store `*|+` separator defaulting to `*`:
//! `Group(sub+sub, type=list)` where
//! `sub = Group(AnyOf(alphas,type=str)+AnyOf("*+",default="*")+AnyOf(nums,type=int), type=list)`.
//! Exercises model-level reordering: each moved item must weave its own
//! original fragment (§4.8 step 3.d), not the fragment now occupying its
//! old slot.

use pylens::{charsets, get, put, Item, Lens, LensOptions, LensType, Value};

fn sub_lens() -> Lens {
    Lens::group(
        Lens::and(
            vec![
                Lens::any_of(charsets::alphas(), false, LensOptions::new().ty(LensType::Str)),
                Lens::any_of("*+", false, LensOptions::new().default_value("*")),
                Lens::any_of(charsets::nums(), false, LensOptions::new().ty(LensType::Int)),
            ],
            LensOptions::new(),
        ),
        LensOptions::new().ty(LensType::List),
    )
}

fn outer_lens() -> Lens {
    Lens::group(
        Lens::and(vec![sub_lens(), sub_lens()], LensOptions::new()),
        LensOptions::new().ty(LensType::List),
    )
}

#[test]
fn get_splits_the_text_into_two_pairs() {
    let item = get(outer_lens(), "a+3x*6").unwrap();
    let expected = Value::List(vec![
        Item::new(Value::List(vec![Item::new(Value::Str("a".into())), Item::new(Value::Int(3))])),
        Item::new(Value::List(vec![Item::new(Value::Str("x".into())), Item::new(Value::Int(6))])),
    ]);
    assert_eq!(item.value, expected);
}

#[test]
fn reordering_the_model_weaves_each_pairs_own_original_separator() {
    let original = "a+3x*6";
    let parsed = get(outer_lens(), original).unwrap();
    let Value::List(mut items) = parsed.value else {
        panic!("expected a list");
    };
    items.swap(0, 1);
    let reordered = Item::new(Value::List(items));
    assert_eq!(put(outer_lens(), reordered, Some(original)).unwrap(), "x*6a+3");
}

#[test]
fn put_with_no_original_falls_back_to_the_default_separator() {
    let fresh = Item::new(Value::List(vec![
        Item::new(Value::List(vec![Item::new(Value::Str("b".into())), Item::new(Value::Int(9))])),
        Item::new(Value::List(vec![Item::new(Value::Str("c".into())), Item::new(Value::Int(4))])),
    ]));
    assert_eq!(put(outer_lens(), fresh, None).unwrap(), "b*9c*4");
}
