//! Utility lenses (§2 "Utility lenses"): shortcuts built entirely on the
//! primitive/combinator algebra, ported from `util_lenses.py`'s thin
//! subclasses of `Repeat`/`Or`/`And`/`Group` rather than new `LensKind`
//! variants.

use crate::charsets::{alphanums, alphas};
use crate::lens::Lens;
use crate::options::{EmptyMode, LensOptions, LensType};

/// `OneOrMore`/`OM`: `Repeat` with a floor of one iteration.
pub fn one_or_more(child: Lens, options: LensOptions) -> Lens {
    Lens::repeat(child, 1, None, options)
}

/// `ZeroOrMore`/`ZM`: `Repeat` with no floor.
pub fn zero_or_more(child: Lens, options: LensOptions) -> Lens {
    Lens::repeat(child, 0, None, options)
}

/// `Optional`/`O`: `Or(lens, Empty())`, so a missing model value PUTs as
/// nothing and deletes whatever the lens matched on GET.
pub fn optional(child: Lens, options: LensOptions) -> Lens {
    Lens::or(vec![child, Lens::empty(LensOptions::new())], options)
}

/// `List`: a shortcut for `item (delimiter item)*`.
pub fn list_of(item: Lens, delimiter: Lens, options: LensOptions) -> Lens {
    let tail = zero_or_more(
        Lens::and(vec![delimiter, item.clone()], LensOptions::new()),
        LensOptions::new(),
    );
    Lens::and(vec![item, tail], options)
}

/// `NewLine`/`NL`: a newline character, or the end of the text.
pub fn new_line(options: LensOptions) -> Lens {
    Lens::or(
        vec![
            Lens::literal("\n", LensOptions::new()),
            Lens::empty_at(EmptyMode::EndOfText, LensOptions::new()),
        ],
        options,
    )
}

/// `Word`: a run of `body_chars`, with `init_chars` governing only the
/// first character when given. Promotes to `type=list, combine_chars=true`
/// when this is a STORE lens, so the caller still sees a single `str`
/// (§4.6 `combine_chars`); `is_label`/`label` implicitly request `type=str`
/// the same way.
pub fn word(
    body_chars: &str,
    init_chars: Option<&str>,
    min_count: usize,
    max_count: Option<usize>,
    negate: bool,
    mut options: LensOptions,
) -> Lens {
    debug_assert!(min_count > 0, "Word's min_count should be more than zero");

    if (options.is_label || options.label.is_some()) && options.ty.is_none() {
        options.ty = Some(LensType::Str);
    }

    let any_of_type = match &options.ty {
        Some(LensType::Str) => {
            options.ty = Some(LensType::List);
            Some(LensType::Str)
        }
        Some(_) => {
            debug_assert!(false, "if set, the type of Word should be str");
            None
        }
        None => None,
    };
    options.combine_chars = true;

    let char_options = |ty: &Option<LensType>| match ty {
        Some(ty) => LensOptions::new().ty(ty.clone()),
        None => LensOptions::new(),
    };

    let left = Lens::any_of(init_chars.unwrap_or(body_chars), negate, char_options(&any_of_type));
    let right = Lens::repeat(
        Lens::any_of(body_chars, negate, char_options(&any_of_type)),
        min_count - 1,
        max_count.map(|m| m - 1),
        LensOptions::new(),
    );

    Lens::and(vec![left, right], options)
}

/// `Whitespace`/`WS`: plain spaces, or (if requested) a `\`-continued or
/// indent-continued logical line; falls back to `Empty` when `default` is
/// the empty string or `optional` is set. Never a STORE lens.
#[allow(clippy::too_many_arguments)]
pub fn whitespace(
    default: &str,
    optional_: bool,
    space_chars: &str,
    slash_continuation: bool,
    indent_continuation: bool,
    mut options: LensOptions,
) -> Lens {
    debug_assert!(!options.has_type(), "Whitespace cannot be used as a STORE lens");

    let spaces = || word(space_chars, None, 1, None, false, LensOptions::new().name("spaces"));

    let mut branches = Vec::new();
    if slash_continuation {
        branches.push(Lens::and(
            vec![
                optional(spaces(), LensOptions::new()),
                Lens::literal("\\\n", LensOptions::new()),
                optional(spaces(), LensOptions::new()),
            ],
            LensOptions::new(),
        ));
    }
    if indent_continuation {
        branches.push(Lens::and(
            vec![
                optional(spaces(), LensOptions::new()),
                Lens::literal("\n", LensOptions::new()),
                spaces(),
            ],
            LensOptions::new(),
        ));
    }
    branches.push(spaces());
    if default.is_empty() || optional_ {
        branches.push(Lens::empty(LensOptions::new()));
    }

    options.default = Some(default.to_string());
    Lens::or(branches, options)
}

/// `KeyValue`: a `Group` defaulting to `type=list, auto_list=true`, so a
/// single extracted value can be stored under a key without the caller
/// repeating those two options every time.
pub fn key_value(child: Lens, mut options: LensOptions) -> Lens {
    if options.ty.is_none() {
        options.ty = Some(LensType::List);
    }
    if !options.auto_list {
        options.auto_list = true;
    }
    Lens::group(child, options)
}

/// `BlankLine`: optional horizontal whitespace followed by a newline.
pub fn blank_line(options: LensOptions) -> Lens {
    Lens::and(
        vec![whitespace("", false, " \t", false, false, LensOptions::new()), new_line(LensOptions::new())],
        options,
    )
}

/// `Keyword`: a `Word` over alphanumerics (plus `additional_chars`), whose
/// first character must be a letter or one of `additional_chars` rather
/// than a digit.
pub fn keyword(
    additional_chars: &str,
    min_count: usize,
    max_count: Option<usize>,
    negate: bool,
    options: LensOptions,
) -> Lens {
    let body = format!("{}{additional_chars}", alphanums());
    let init = format!("{}{additional_chars}", alphas());
    word(&body, Some(&init), min_count, max_count, negate, options)
}

/// `HashComment`: a `#`-introduced comment running to the end of the line.
pub fn hash_comment(options: LensOptions) -> Lens {
    Lens::and(
        vec![
            Lens::literal("#", LensOptions::new()),
            Lens::until(new_line(LensOptions::new()), false, LensOptions::new()),
            new_line(LensOptions::new()),
        ],
        options,
    )
}

/// `AutoGroup`: wraps `lens` in a `type=list, auto_list=true` `Group` if it
/// has no type of its own; a no-op if it's already a STORE lens, since
/// wrapping it further would be observationally transparent anyway (§6
/// "a top-level lens that has no type is wrapped in AutoGroup").
pub fn auto_group(lens: Lens) -> Lens {
    if lens.has_type() {
        lens
    } else {
        Lens::group(lens, LensOptions::new().ty(LensType::List).auto_list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{get, put};
    use pylens_item::{Item, Value};

    #[test]
    fn one_or_more_requires_at_least_one_match() {
        let digits = one_or_more(
            Lens::any_of("0123456789", false, LensOptions::new().ty(LensType::Str)),
            LensOptions::new().ty(LensType::List).combine_chars(),
        );
        assert!(get(&digits, "").is_err());
        let item = get(&digits, "123").unwrap();
        assert_eq!(item.value, Value::Str("123".into()));
    }

    #[test]
    fn optional_lets_empty_model_delete_prior_text() {
        let lens = optional(
            Lens::any_of("x", false, LensOptions::new().ty(LensType::Str)),
            LensOptions::new().ty(LensType::Str),
        );
        let item = get(&lens, "x").unwrap();
        assert_eq!(item.value, Value::Str("x".into()));

        let out = put(&lens, Item::new(Value::Str(String::new())), Some("x")).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn new_line_matches_newline_or_end_of_text() {
        let nl = new_line(LensOptions::new());
        assert!(get(&nl, "\n").is_ok());
        assert!(get(&nl, "").is_ok());
        assert!(get(&nl, "x").is_err());
    }

    #[test]
    fn word_combines_chars_into_a_single_string() {
        let w = word("abc", None, 1, None, false, LensOptions::new().ty(LensType::Str));
        let item = get(&w, "cab").unwrap();
        assert_eq!(item.value, Value::Str("cab".into()));
        assert_eq!(put(&w, item, None).unwrap(), "cab");
    }

    #[test]
    fn keyword_requires_a_letter_first() {
        let kw = keyword("_", 1, None, false, LensOptions::new().ty(LensType::Str));
        assert_eq!(get(&kw, "foo_1").unwrap().value, Value::Str("foo_1".into()));
        assert!(get(&kw, "1foo").is_err());
    }

    #[test]
    fn whitespace_falls_back_to_default_on_create() {
        let ws = whitespace(" ", false, " \t", false, false, LensOptions::new());
        assert_eq!(put(&ws, Item::new(Value::Str(String::new())), None).unwrap(), " ");
    }

    #[test]
    fn hash_comment_runs_to_end_of_line() {
        let lens = hash_comment(LensOptions::new());
        assert!(get(&lens, "# hi\n").is_ok());
    }

    #[test]
    fn auto_group_is_a_no_op_for_already_typed_lenses() {
        let typed = Lens::literal("x", LensOptions::new().ty(LensType::Str));
        let wrapped = auto_group(typed);
        assert_eq!(get(&wrapped, "x").unwrap().value, Value::Str("x".into()));
    }
}
