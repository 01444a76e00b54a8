//! Static-label map: `Group(AnyOf(nums,type=int,label="number") +
//! AnyOf(alphas,type=str,label="character"), type=dict, alignment=SOURCE)`.
//! A label mismatch must surface as `NoTokenToConsume`, not a silent
//! fallback to positional order.

use pylens::{charsets, get, put, Alignment, Item, Lens, LensError, LensOptions, LensType, Value};

fn lens() -> Lens {
    Lens::group(
        Lens::and(
            vec![
                Lens::any_of(charsets::nums(), false, LensOptions::new().ty(LensType::Int).label("number")),
                Lens::any_of(
                    charsets::alphas(),
                    false,
                    LensOptions::new().ty(LensType::Str).label("character"),
                ),
            ],
            LensOptions::new(),
        ),
        LensOptions::new().ty(LensType::Map).alignment(Alignment::Source),
    )
}

#[test]
fn get_keys_the_digit_and_letter_by_their_declared_labels() {
    let item = get(lens(), "1a").unwrap();
    assert_eq!(
        item.value,
        Value::Map(vec![
            ("number".into(), Item::new(Value::Int(1))),
            ("character".into(), Item::new(Value::Str("a".into()))),
        ])
    );
}

#[test]
fn put_rewrites_both_fields_by_label() {
    let model = Item::new(Value::Map(vec![
        ("number".into(), Item::new(Value::Int(4))),
        ("character".into(), Item::new(Value::Str("q".into()))),
    ]));
    assert_eq!(put(lens(), model, Some("1a")).unwrap(), "4q");
}

#[test]
fn a_wrong_label_has_no_candidate_to_consume() {
    let model = Item::new(Value::Map(vec![
        ("number".into(), Item::new(Value::Int(4))),
        ("wrong_label".into(), Item::new(Value::Str("q".into()))),
    ]));
    let err = put(lens(), model, Some("1a")).unwrap_err();
    assert!(matches!(err, LensError::NoTokenToConsume(_)));
}
