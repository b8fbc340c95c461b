use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use momiji::parse::{
    action, empty, literal, not_followed_by, run_with_default, seq, value, FixtureErrorKind,
    Parser, ParserRef, ParserVisitor, ParseState, TestFixture,
};

fn ab() -> ParserRef {
    seq(vec![literal("a"), literal("b")])
}

#[test]
fn fixture_accepts_full_matches() {
    let fixture = TestFixture::new(ab());
    let result = fixture.success("ab");
    assert_eq!(result.match_size, 2);
}

#[test]
fn fixture_rejects_partial_matches() {
    let fixture = TestFixture::new(literal("a"));
    let error = fixture.check_success("ab").unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::FullMatch);
    assert!(error.message.contains("全入力"), "{}", error.message);
}

#[test]
fn fixture_failure_assertions() {
    let fixture = TestFixture::new(ab());
    fixture.failure("ac");
    fixture.failure_at("ac", 1);

    let error = fixture.check_failure_at("ac", 0).unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::ErrorPosition);
}

#[test]
fn fixture_checks_stack_top() {
    let parser = action(literal("ab"), |scope| {
        scope.push(value("AB".to_string()));
    });
    let fixture = TestFixture::new(parser);
    fixture.success_expect("ab", value("AB".to_string()));

    let error = fixture
        .check_success_expect("ab", value("XY".to_string()))
        .unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::ValueMismatch);
}

#[test]
fn fixture_reports_missing_diagnostics() {
    // 葉の失敗を伴わない失敗は診断ゼロになり、それ自体を検出する。
    let fixture = TestFixture::new(not_followed_by(empty()));
    let error = fixture.check_failure("").unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::NoDiagnostic);
}

/// ジャーナルを通さず外部状態で動きを変える行儀の悪いパーサー。
/// 一回目だけ 1 文字消費する。
struct ConsumeOnce {
    used: AtomicBool,
}

impl Parser for ConsumeOnce {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        if !self.used.swap(true, Ordering::SeqCst) {
            state.pos += 1;
        }
        true
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_other(self);
    }

    fn label(&self) -> String {
        "consume_once".to_string()
    }
}

#[test]
fn double_run_catches_unjournaled_consumption() {
    let parser: ParserRef = Arc::new(ConsumeOnce {
        used: AtomicBool::new(false),
    });
    let fixture = TestFixture::new(parser);
    let error = fixture.check_success("a").unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::MatchSize);
    assert!(
        error.message.contains("match_size"),
        "食い違ったフィールド名を報告する: {}",
        error.message
    );
    assert!(error.message.contains("### 一回目の解析 ###"));
    assert!(error.message.contains("### 二回目の解析 ###"));
}

/// 一回目だけ成功する行儀の悪いパーサー。
struct SucceedOnce {
    used: AtomicBool,
}

impl Parser for SucceedOnce {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        if self.used.swap(true, Ordering::SeqCst) {
            return false;
        }
        state.pos += 1;
        true
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_other(self);
    }

    fn label(&self) -> String {
        "succeed_once".to_string()
    }
}

#[test]
fn double_run_catches_success_flip() {
    let parser: ParserRef = Arc::new(SucceedOnce {
        used: AtomicBool::new(false),
    });
    let fixture = TestFixture::new(parser);
    let error = fixture.check_success("a").unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::Success);
    assert!(error.message.contains("success"), "{}", error.message);
}

/// 二回目だけ panic する行儀の悪いパーサー。
struct PanicOnSecondRun {
    used: AtomicBool,
}

impl Parser for PanicOnSecondRun {
    fn do_parse(&self, state: &mut ParseState) -> bool {
        if self.used.swap(true, Ordering::SeqCst) {
            panic!("二回目で壊れました");
        }
        state.pos += 1;
        true
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_other(self);
    }

    fn label(&self) -> String {
        "panic_on_second_run".to_string()
    }
}

#[test]
fn double_run_catches_thrown_divergence() {
    let parser: ParserRef = Arc::new(PanicOnSecondRun {
        used: AtomicBool::new(false),
    });
    let fixture = TestFixture::new(parser);
    let error = fixture.check_success("a").unwrap_err();
    assert_eq!(error.kind, FixtureErrorKind::Thrown);
    assert!(
        error.message.contains("二回目の解析のみ panic"),
        "{}",
        error.message
    );
}

#[test]
fn panics_in_actions_are_captured_without_rollback() {
    let parser = seq(vec![
        action(literal("a"), |scope| scope.push(value("A".to_string()))),
        action(literal("b"), |_scope| panic!("アクションが壊れました")),
    ]);
    let result = run_with_default(&parser, "ab");
    assert!(!result.success);
    let thrown = result.thrown.expect("panic が捕捉されるはず");
    assert!(thrown.message.contains("アクション"), "{}", thrown.message);
    // 例外経路では値スタックを巻き戻さず、事後検査のため残す。
    assert_eq!(result.value_stack.len(), 1);
}

/// 呼び出し側のフラグで打ち切る素朴なキャンセルトークン。
struct CancelGate {
    cancelled: Arc<AtomicBool>,
}

impl Parser for CancelGate {
    fn do_parse(&self, _state: &mut ParseState) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }

    fn accept(&self, visitor: &mut dyn ParserVisitor) {
        visitor.visit_other(self);
    }

    fn label(&self) -> String {
        "<cancel-gate>".to_string()
    }
}

#[test]
fn cancellation_stays_caller_driven() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let gate: ParserRef = Arc::new(CancelGate {
        cancelled: cancelled.clone(),
    });
    let parser = seq(vec![gate, literal("a")]);

    let result = run_with_default(&parser, "a");
    assert!(result.success, "フラグが立つまでは通常どおり解析する");

    cancelled.store(true, Ordering::SeqCst);
    let result = run_with_default(&parser, "a");
    assert!(!result.success, "フラグが立ったら以後の解析は失敗する");
}
