use once_cell::sync::OnceCell;
use std::sync::Arc;
use unicode_ident::{is_xid_continue, is_xid_start};

use super::effect::SideEffect;
use super::parser::{Parser, ParserRef};
use super::state::{ParseState, Seed};
use super::value::{StackValue, Value};
use super::visitor::ParserVisitor;

// --- 葉パーサー ---

/// 固定文字列との前方一致。テキスト入力専用。
pub struct Literal {
    pub text: String,
}

impl Parser for Literal {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        if state.input().starts_with(&self.text, state.pos) {
            state.pos += self.text.len();
            true
        } else {
            false
        }
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_literal(self);
    }

    fn label(&self) -> String {
        format!("{:?}", self.text)
    }

    fn records_errors(&self) -> bool {
        true
    }
}

pub fn literal(text: impl Into<String>) -> ParserRef {
    Arc::new(Literal { text: text.into() })
}

/// 述語を満たす 1 文字。テキスト入力専用。
pub struct CharPredicate {
    pub name: String,
    pred: Arc<dyn Fn(char) -> bool + Send + Sync>,
}

impl Parser for CharPredicate {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        match state.input().char_at(state.pos) {
            Some(ch) if (self.pred)(ch) => {
                state.pos += ch.len_utf8();
                true
            }
            _ => false,
        }
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_char_predicate(self);
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn records_errors(&self) -> bool {
        true
    }
}

pub fn char_if(
    name: impl Into<String>,
    pred: impl Fn(char) -> bool + Send + Sync + 'static,
) -> ParserRef {
    Arc::new(CharPredicate {
        name: name.into(),
        pred: Arc::new(pred),
    })
}

pub fn any_char() -> ParserRef {
    char_if("<any>", |_| true)
}

pub fn char_range(low: char, high: char) -> ParserRef {
    char_if(format!("[{}-{}]", low, high), move |ch| {
        (low..=high).contains(&ch)
    })
}

pub fn char_set(chars: impl Into<String>) -> ParserRef {
    let chars = chars.into();
    let name = format!("[{}]", chars);
    char_if(name, move |ch| chars.contains(ch))
}

pub fn alpha() -> ParserRef {
    char_if("<alpha>", |ch| ch.is_alphabetic())
}

pub fn alnum() -> ParserRef {
    char_if("<alnum>", |ch| ch.is_alphanumeric())
}

pub fn digit() -> ParserRef {
    char_if("<digit>", |ch| ch.is_ascii_digit())
}

pub fn whitespace() -> ParserRef {
    char_if("<space>", |ch| ch.is_whitespace())
}

/// 識別子の開始文字。`_` と XID_Start を許す。
pub fn ident_start() -> ParserRef {
    char_if("<ident-start>", |ch| ch == '_' || is_xid_start(ch))
}

/// 識別子の継続文字。`_` と XID_Continue を許す。
pub fn ident_continue() -> ParserRef {
    char_if("<ident-continue>", |ch| ch == '_' || is_xid_continue(ch))
}

/// 述語を満たす 1 トークン。トークン入力専用。
pub struct TokenPredicate {
    pub name: String,
    pred: Arc<dyn Fn(&dyn StackValue) -> bool + Send + Sync>,
}

impl Parser for TokenPredicate {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let matched = state
            .input()
            .token_at(state.pos)
            .map(|token| (self.pred)(token.as_ref()))
            .unwrap_or(false);
        if matched {
            state.pos += 1;
        }
        matched
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_token_predicate(self);
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn records_errors(&self) -> bool {
        true
    }
}

pub fn token_if(
    name: impl Into<String>,
    pred: impl Fn(&dyn StackValue) -> bool + Send + Sync + 'static,
) -> ParserRef {
    Arc::new(TokenPredicate {
        name: name.into(),
        pred: Arc::new(pred),
    })
}

/// 動的等価で一致するトークン。
pub fn token_eq(expected: Value) -> ParserRef {
    let name = format!("{:?}", expected);
    token_if(name, move |token| expected.eq_dyn(token))
}

/// 常に成功し、何も消費しない。
pub struct Empty;

impl Parser for Empty {
    fn do_parse(&self, _state: &mut ParseState) -> bool {
        true
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_empty(self);
    }

    fn label(&self) -> String {
        "empty".to_string()
    }
}

pub fn empty() -> ParserRef {
    Arc::new(Empty)
}

/// 常に失敗する。メッセージが期待集合に載る。
pub struct Fail {
    pub message: String,
}

impl Parser for Fail {
    fn do_parse(&self, _state: &mut ParseState) -> bool {
        false
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_fail(self);
    }

    fn label(&self) -> String {
        self.message.clone()
    }

    fn records_errors(&self) -> bool {
        true
    }
}

pub fn fail(message: impl Into<String>) -> ParserRef {
    Arc::new(Fail {
        message: message.into(),
    })
}

/// 入力終端でのみ成功する。
pub struct Eof;

impl Parser for Eof {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        state.pos >= state.input().len()
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_eof(self);
    }

    fn label(&self) -> String {
        "<eof>".to_string()
    }

    fn records_errors(&self) -> bool {
        true
    }
}

pub fn eof() -> ParserRef {
    Arc::new(Eof)
}

// --- 合成パーサー ---

/// 全子パーサーの順次一致。
pub struct Sequence {
    pub children: Vec<ParserRef>,
}

impl Parser for Sequence {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        self.children.iter().all(|child| child.parse(state))
    }

    fn children(&self) -> Vec<ParserRef> {
        self.children.clone()
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_sequence(self);
    }

    fn label(&self) -> String {
        format!("seq({})", join_labels(&self.children))
    }
}

pub fn seq(children: Vec<ParserRef>) -> ParserRef {
    Arc::new(Sequence { children })
}

/// PEG の順序付き選択。最初に成功した候補で確定する。
pub struct Choice {
    pub children: Vec<ParserRef>,
}

impl Parser for Choice {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        self.children.iter().any(|child| child.parse(state))
    }

    fn children(&self) -> Vec<ParserRef> {
        self.children.clone()
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_choice(self);
    }

    fn label(&self) -> String {
        format!("choice({})", join_labels(&self.children))
    }
}

pub fn choice(children: Vec<ParserRef>) -> ParserRef {
    Arc::new(Choice { children })
}

/// 0 回または 1 回。常に成功する。
pub struct Optional {
    pub child: ParserRef,
}

impl Parser for Optional {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let _ = self.child.parse(state);
        true
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_optional(self);
    }

    fn label(&self) -> String {
        format!("opt({})", self.child.label())
    }
}

pub fn opt(child: ParserRef) -> ParserRef {
    Arc::new(Optional { child })
}

/// 貪欲な繰り返し。`min` 回未満なら失敗、`max` 到達で打ち切る。
///
/// 子が位置を進めずに成功した場合はその反復を最後として終了し、
/// 無限ループを避ける。
pub struct Repeat {
    pub child: ParserRef,
    pub min: usize,
    pub max: Option<usize>,
}

impl Parser for Repeat {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let mut count = 0usize;
        loop {
            if let Some(max) = self.max {
                if count >= max {
                    break;
                }
            }
            let before = state.pos;
            if !self.child.parse(state) {
                break;
            }
            count += 1;
            if state.pos == before {
                break;
            }
        }
        count >= self.min
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_repeat(self);
    }

    fn label(&self) -> String {
        let child = self.child.label();
        match (self.min, self.max) {
            (0, None) => format!("many({})", child),
            (1, None) => format!("many1({})", child),
            (min, None) => format!("repeat({}, {}..)", child, min),
            (min, Some(max)) => format!("repeat({}, {}..={})", child, min, max),
        }
    }
}

pub fn repeat(child: ParserRef, min: usize, max: Option<usize>) -> ParserRef {
    Arc::new(Repeat { child, min, max })
}

pub fn many(child: ParserRef) -> ParserRef {
    repeat(child, 0, None)
}

pub fn many1(child: ParserRef) -> ParserRef {
    repeat(child, 1, None)
}

/// 子の成否だけを調べる。成功しても位置とジャーナルを必ず復元する。
pub struct Lookahead {
    pub child: ParserRef,
}

impl Parser for Lookahead {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let pos0 = state.pos;
        let log0 = state.log_size();
        let matched = self.child.parse(state);
        if matched {
            state.rollback_to(log0);
            state.pos = pos0;
        }
        matched
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_lookahead(self);
    }

    fn label(&self) -> String {
        format!("lookahead({})", self.child.label())
    }
}

pub fn lookahead(child: ParserRef) -> ParserRef {
    Arc::new(Lookahead { child })
}

/// 否定先読み。子が失敗したときだけ成功し、内側の失敗は期待集合に載せない。
pub struct Not {
    pub child: ParserRef,
}

impl Parser for Not {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let pos0 = state.pos;
        let log0 = state.log_size();
        state.enter_silent();
        let matched = self.child.parse(state);
        state.exit_silent();
        if matched {
            state.rollback_to(log0);
            state.pos = pos0;
            return false;
        }
        true
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_not(self);
    }

    fn label(&self) -> String {
        format!("not({})", self.child.label())
    }
}

pub fn not_followed_by(child: ParserRef) -> ParserRef {
    Arc::new(Not { child })
}

/// 区切り付き繰り返し。`around` の列を `inside` で区切る。
///
/// `exact` なら回数を `min` に固定し、`trailing` なら末尾の区切りを
/// 黙って 1 回だけ試す（失敗しても成否と期待集合に影響しない）。
pub struct Around {
    pub min: usize,
    pub exact: bool,
    pub trailing: bool,
    pub around: ParserRef,
    pub inside: ParserRef,
    inside_then_around: ParserRef,
}

impl Around {
    pub fn new(
        min: usize,
        exact: bool,
        trailing: bool,
        around: ParserRef,
        inside: ParserRef,
    ) -> Self {
        let inside_then_around = seq(vec![inside.clone(), around.clone()]);
        Self {
            min,
            exact,
            trailing,
            around,
            inside,
            inside_then_around,
        }
    }

    fn trailing_attempt(&self, state: &mut ParseState) {
        state.enter_silent();
        let _ = self.inside.parse(state);
        state.exit_silent();
    }
}

impl Parser for Around {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        if !self.around.parse(state) {
            if self.min == 0 && self.trailing {
                self.trailing_attempt(state);
            }
            return self.min == 0;
        }
        for _ in 1..self.min {
            if !self.inside_then_around.parse(state) {
                return false;
            }
        }
        if !self.exact {
            while self.inside_then_around.parse(state) {}
        }
        if self.trailing {
            self.trailing_attempt(state);
        }
        true
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.around.clone(), self.inside.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_around(self);
    }

    fn label(&self) -> String {
        let mut out = format!(
            "around({}, {}, {}",
            self.around.label(),
            self.inside.label(),
            self.min
        );
        if self.exact {
            out.push_str(", exact");
        }
        if self.trailing {
            out.push_str(", trailing");
        }
        out.push(')');
        out
    }
}

pub fn sep(min: usize, around: ParserRef, inside: ParserRef) -> ParserRef {
    Arc::new(Around::new(min, false, false, around, inside))
}

pub fn sep_exact(min: usize, around: ParserRef, inside: ParserRef) -> ParserRef {
    Arc::new(Around::new(min, true, false, around, inside))
}

pub fn sep_trailing(min: usize, around: ParserRef, inside: ParserRef) -> ParserRef {
    Arc::new(Around::new(min, false, true, around, inside))
}

/// シード成長による左再帰対応。
///
/// 同じ位置での再入にはその時点のシードを再生して返し、本体を
/// 伸長しなくなるまで再実行して最長一致を採用する。シードの副作用は
/// ジャーナルの複製として保持し、再生時も記録し直すので親の巻き戻しが効く。
pub struct LeftRecursive {
    pub name: String,
    pub child: ParserRef,
}

impl LeftRecursive {
    fn replay(state: &mut ParseState, seed: Seed) -> bool {
        match seed.end {
            None => false,
            Some(end) => {
                for effect in seed.effects {
                    state.apply(effect);
                }
                state.pos = end;
                true
            }
        }
    }
}

impl Parser for LeftRecursive {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let key = (self as *const Self as usize, state.pos);
        if let Some(seed) = state.seed_cloned(key) {
            return Self::replay(state, seed);
        }
        let pos0 = state.pos;
        state.set_seed(key, Seed::default());
        loop {
            let log0 = state.log_size();
            if !self.child.parse(state) {
                break;
            }
            let grown = state
                .seed_end(key)
                .map_or(true, |best| state.pos > best);
            if !grown {
                state.rollback_to(log0);
                state.pos = pos0;
                break;
            }
            let seed = Seed {
                end: Some(state.pos),
                effects: state.log_tail(log0),
            };
            state.set_seed(key, seed);
            state.rollback_to(log0);
            state.pos = pos0;
        }
        let seed = state.take_seed(key).unwrap_or_default();
        Self::replay(state, seed)
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_left_recursive(self);
    }

    fn label(&self) -> String {
        format!("left_recursive({})", self.name)
    }
}

/// 左再帰規則を構築する。`build` には自己参照が渡される。
pub fn left_recursive(
    name: impl Into<String>,
    build: impl FnOnce(ParserRef) -> ParserRef,
) -> ParserRef {
    let name = name.into();
    let slot = Arc::new(Lazy::new(name.clone()));
    let self_ref: ParserRef = slot.clone();
    let child = build(self_ref);
    let node: ParserRef = Arc::new(LeftRecursive { name, child });
    slot.define(node.clone());
    node
}

/// 意味アクションのスコープ。一致範囲とジャーナル付きスタック操作を公開する。
pub struct ActionScope<'a> {
    state: &'a mut ParseState,
    start: usize,
}

impl ActionScope<'_> {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.state.pos
    }

    /// 子パーサーが一致したテキスト。トークン入力では `None`。
    pub fn matched_text(&self) -> Option<&str> {
        self.state.input().slice_text(self.start, self.state.pos)
    }

    /// 子パーサーが一致したトークン列。テキスト入力では `None`。
    pub fn matched_tokens(&self) -> Option<&[Value]> {
        self.state.input().slice_tokens(self.start, self.state.pos)
    }

    pub fn push(&mut self, value: Value) {
        self.state.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.state.pop()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.state.peek()
    }

    pub fn stack_len(&self) -> usize {
        self.state.stack_len()
    }

    /// 独自の可逆効果を記録する。巻き戻し時に逆操作が呼ばれる。
    pub fn apply(&mut self, effect: SideEffect) {
        self.state.apply(effect);
    }
}

pub type ActionFn = dyn Fn(&mut ActionScope<'_>) + Send + Sync;

/// 子の成功後にユーザー関数を走らせる。スタック操作はジャーナルされるため、
/// 外側のパーサーが失敗しても痕跡は残らない。
pub struct Action {
    pub child: ParserRef,
    f: Arc<ActionFn>,
}

impl Parser for Action {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        let start = state.pos;
        if !self.child.parse(state) {
            return false;
        }
        let mut scope = ActionScope { state, start };
        (self.f)(&mut scope);
        true
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_action(self);
    }

    fn label(&self) -> String {
        format!("action({})", self.child.label())
    }
}

pub fn action(
    child: ParserRef,
    f: impl Fn(&mut ActionScope<'_>) + Send + Sync + 'static,
) -> ParserRef {
    Arc::new(Action {
        child,
        f: Arc::new(f),
    })
}

/// 名前付けラッパー。診断と呼び出しスタックに規則名を出す。
pub struct Rule {
    pub name: String,
    pub child: ParserRef,
}

impl Parser for Rule {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        self.child.parse(state)
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.child.clone()]
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_rule(self);
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

pub fn rule(name: impl Into<String>, child: ParserRef) -> ParserRef {
    Arc::new(Rule {
        name: name.into(),
        child,
    })
}

/// 循環参照の切断点。構築後に `define` で実体を差し込む。
///
/// 表示は `<名前>` に留め、ラベル生成が循環しないようにする。
pub struct Lazy {
    pub name: String,
    cell: OnceCell<ParserRef>,
}

impl Lazy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
        }
    }

    /// 参照先を確定する。二重定義は文法構築のバグとして即座に落とす。
    pub fn define(&self, target: ParserRef) {
        if self.cell.set(target).is_err() {
            panic!("遅延参照 <{}> が二重に定義されました", self.name);
        }
    }

    pub fn target(&self) -> Option<&ParserRef> {
        self.cell.get()
    }
}

impl Parser for Lazy {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        match self.cell.get() {
            Some(target) => target.parse(state),
            None => panic!("遅延参照 <{}> が未定義のまま実行されました", self.name),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        self.cell.get().cloned().into_iter().collect()
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_lazy(self);
    }

    fn label(&self) -> String {
        format!("<{}>", self.name)
    }
}

pub fn lazy(name: impl Into<String>) -> Arc<Lazy> {
    Arc::new(Lazy::new(name))
}

fn join_labels(children: &[ParserRef]) -> String {
    children
        .iter()
        .map(|child| child.label())
        .collect::<Vec<_>>()
        .join(", ")
}
