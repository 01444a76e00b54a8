//! The lens algebra (§3 "Lens") and its GET/PUT dispatch engine (§4): the
//! tagged-union `Lens` value and its builder options, the GET/PUT engine
//! that exhaustively matches over it, and the utility-lens shortcuts built
//! on top of the primitive/combinator constructors.

mod engine;
mod lens;
mod options;
mod util;

pub mod charsets;

pub use engine::{get, put};
pub use lens::{Lens, DEFAULT_FORWARD_RECURSION_LIMIT};
pub use options::{EmptyMode, LensOptions, LensType};
pub use util::{
    auto_group, blank_line, hash_comment, key_value, keyword, list_of, new_line, one_or_more,
    optional, whitespace, word, zero_or_more,
};
