//! Dynamic-label map with SOURCE alignment:
//! `Repeat(Group(AnyOf(alphas,type=str,is_label=True)+AnyOf("*+-",default="*")+AnyOf(nums,type=int), type=list), type=dict, alignment=SOURCE)`.
//! Each iteration's leading letter becomes the dict key rather than a list
//! element; deleting a key must remove exactly its own source span.

use pylens::{charsets, get, put, Alignment, Item, Lens, LensOptions, LensType, Value};

fn lens() -> Lens {
    Lens::repeat(
        Lens::group(
            Lens::and(
                vec![
                    Lens::any_of(charsets::alphas(), false, LensOptions::new().ty(LensType::Str).is_label()),
                    Lens::any_of("*+-", false, LensOptions::new().default_value("*")),
                    Lens::any_of(charsets::nums(), false, LensOptions::new().ty(LensType::Int)),
                ],
                LensOptions::new(),
            ),
            LensOptions::new().ty(LensType::List),
        ),
        0,
        None,
        LensOptions::new().ty(LensType::Map).alignment(Alignment::Source),
    )
}

#[test]
fn get_keys_each_group_by_its_leading_letter() {
    let item = get(lens(), "a+3c-2z*7").unwrap();
    assert_eq!(
        item.value,
        Value::Map(vec![
            ("a".into(), Item::new(Value::List(vec![Item::new(Value::Int(3))]))),
            ("c".into(), Item::new(Value::List(vec![Item::new(Value::Int(2))]))),
            ("z".into(), Item::new(Value::List(vec![Item::new(Value::Int(7))]))),
        ])
    );
}

#[test]
fn deleting_a_key_removes_only_its_own_source_span() {
    let original = "a+3c-2z*7";
    let parsed = get(lens(), original).unwrap();
    let Value::Map(mut entries) = parsed.value else {
        panic!("expected a map");
    };
    entries.retain(|(key, _)| key != "c");
    let edited = Item::new(Value::Map(entries));
    assert_eq!(put(lens(), edited, Some(original)).unwrap(), "a+3z*7");
}
