//! `Or` with `Empty`: `Group((AnyOf(alphas,type=str) | Empty()) +
//! AnyOf(nums,type=int), type=list)`. Deleting the optional branch's model
//! entry must delete its prior text rather than leave a gap.

use pylens::{charsets, get, optional, put, Item, Lens, LensOptions, LensType, Value};

fn lens() -> Lens {
    Lens::group(
        Lens::and(
            vec![
                optional(
                    Lens::any_of(charsets::alphas(), false, LensOptions::new().ty(LensType::Str)),
                    LensOptions::new(),
                ),
                Lens::any_of(charsets::nums(), false, LensOptions::new().ty(LensType::Int)),
            ],
            LensOptions::new(),
        ),
        LensOptions::new().ty(LensType::List),
    )
}

#[test]
fn get_stores_both_the_letter_and_the_digit() {
    let item = get(lens(), "a4").unwrap();
    assert_eq!(
        item.value,
        Value::List(vec![Item::new(Value::Str("a".into())), Item::new(Value::Int(4))])
    );
}

#[test]
fn deleting_the_optional_entry_erases_its_prior_text() {
    let original = "a4";
    let parsed = get(lens(), original).unwrap();
    let Value::List(mut items) = parsed.value else {
        panic!("expected a list");
    };
    items.remove(0);
    let edited = Item::new(Value::List(items));
    assert_eq!(put(lens(), edited, Some(original)).unwrap(), "4");
}
