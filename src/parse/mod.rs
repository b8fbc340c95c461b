//! PEG 解析エンジンの中核モジュール。
//!
//! パーサーは `children()` と visitor フックを持つ共有グラフノードで、
//! 実行は単一の `ParseState` を貫くトランザクション付き呼び出しで進む。
//! 失敗時は副作用ジャーナルの巻き戻しで観測可能な効果をすべて取り消す。

pub mod combinator;
pub mod effect;
pub mod fixture;
pub mod input;
pub mod line_map;
pub mod parser;
pub mod result;
pub mod runner;
pub mod state;
pub mod value;
pub mod visitor;
pub mod walker;
pub mod well_formed;

pub use combinator::{
    action, alnum, alpha, any_char, char_if, char_range, char_set, choice, digit, empty, eof,
    fail, ident_continue, ident_start, lazy, left_recursive, literal, lookahead, many, many1,
    not_followed_by, opt, repeat, rule, sep, sep_exact, sep_trailing, seq, token_eq, token_if,
    whitespace, Action, ActionScope, Around, CharPredicate, Choice, Empty, Eof, Fail, Lazy,
    LeftRecursive, Literal, Lookahead, Not, Optional, Repeat, Rule, Sequence, TokenPredicate,
};
pub use effect::SideEffect;
pub use fixture::{FixtureError, FixtureErrorKind, TestFixture};
pub use input::Input;
pub use line_map::{LineMap, Location};
pub use parser::{Parser, ParserRef};
pub use result::{ParseResult, Thrown};
pub use runner::{run, run_text, run_tokens, run_with_default};
pub use state::{CallFrame, ParseMetrics, ParseState};
pub use value::{value, StackValue, Value};
pub use visitor::ParserVisitor;
pub use walker::{reachable, ParserWalker, WalkEvent};
