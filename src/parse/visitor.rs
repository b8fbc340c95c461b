use super::combinator::{
    Action, Around, CharPredicate, Choice, Empty, Eof, Fail, Lazy, LeftRecursive, Literal,
    Lookahead, Not, Optional, Repeat, Rule, Sequence, TokenPredicate,
};
use super::parser::Parser;

/// パーサー種別ごとの二重ディスパッチ。
///
/// 各ノードの `accept` が自分の種別のフックを呼ぶ。未実装のフックは
/// `visit_other` に落ちるため、必要な種別だけ実装すればよい。
/// 利用側が定義した独自ノードは `accept` から `visit_other` を呼ぶこと。
pub trait ParserVisitor {
    fn visit_other(&mut self, _parser: &dyn Parser) {}

    fn visit_literal(&mut self, parser: &Literal) {
        self.visit_other(parser);
    }

    fn visit_char_predicate(&mut self, parser: &CharPredicate) {
        self.visit_other(parser);
    }

    fn visit_token_predicate(&mut self, parser: &TokenPredicate) {
        self.visit_other(parser);
    }

    fn visit_empty(&mut self, parser: &Empty) {
        self.visit_other(parser);
    }

    fn visit_fail(&mut self, parser: &Fail) {
        self.visit_other(parser);
    }

    fn visit_eof(&mut self, parser: &Eof) {
        self.visit_other(parser);
    }

    fn visit_sequence(&mut self, parser: &Sequence) {
        self.visit_other(parser);
    }

    fn visit_choice(&mut self, parser: &Choice) {
        self.visit_other(parser);
    }

    fn visit_optional(&mut self, parser: &Optional) {
        self.visit_other(parser);
    }

    fn visit_repeat(&mut self, parser: &Repeat) {
        self.visit_other(parser);
    }

    fn visit_lookahead(&mut self, parser: &Lookahead) {
        self.visit_other(parser);
    }

    fn visit_not(&mut self, parser: &Not) {
        self.visit_other(parser);
    }

    fn visit_around(&mut self, parser: &Around) {
        self.visit_other(parser);
    }

    fn visit_left_recursive(&mut self, parser: &LeftRecursive) {
        self.visit_other(parser);
    }

    fn visit_action(&mut self, parser: &Action) {
        self.visit_other(parser);
    }

    fn visit_rule(&mut self, parser: &Rule) {
        self.visit_other(parser);
    }

    fn visit_lazy(&mut self, parser: &Lazy) {
        self.visit_other(parser);
    }
}
