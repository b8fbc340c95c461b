use momiji::parse::{
    action, choice, lazy, left_recursive, literal, opt, run_text, run_with_default, seq, value,
    ActionScope, ParserRef, StackValue, TestFixture,
};
use momiji::{ConfigError, RunConfig};

fn pop_string(scope: &mut ActionScope<'_>) -> String {
    let value = scope.pop().expect("値スタックに要素があるはず");
    value
        .as_any()
        .downcast_ref::<String>()
        .expect("String が積まれているはず")
        .clone()
}

fn one() -> ParserRef {
    action(literal("1"), |scope| {
        let text = scope.matched_text().unwrap_or_default().to_string();
        scope.push(value(text));
    })
}

/// `sum = sum "+" "1" | "1"` を左結合の文字列 AST で組み立てる。
fn sum_grammar() -> ParserRef {
    let leaf = one();
    left_recursive("sum", move |rec| {
        choice(vec![
            action(seq(vec![rec, literal("+"), leaf.clone()]), |scope| {
                let rhs = pop_string(scope);
                let lhs = pop_string(scope);
                scope.push(value(format!("({}+{})", lhs, rhs)));
            }),
            leaf.clone(),
        ])
    })
}

#[test]
fn seed_growing_takes_longest_match() {
    let result = run_with_default(&sum_grammar(), "1+1+1");
    assert!(result.success);
    assert_eq!(result.match_size, 5);
    assert!(result.full_match);
}

#[test]
fn left_recursion_builds_left_associated_ast() {
    let fixture = TestFixture::new(sum_grammar());
    fixture.success_expect("1+1+1", value("((1+1)+1)".to_string()));
    fixture.success_expect("1", value("1".to_string()));
}

#[test]
fn left_recursion_failure_reports_leaf() {
    let result = run_with_default(&sum_grammar(), "+1");
    assert!(!result.success);
    assert_eq!(result.error_pos, Some(0));
    assert!(result.expected.iter().any(|label| label == "\"1\""));
}

#[test]
fn partial_match_stops_before_trailing_garbage() {
    // 末尾の "+x" は伸長に失敗するので、直前までの最長一致を返す。
    let result = run_with_default(&sum_grammar(), "1+1+x");
    assert!(result.success);
    assert_eq!(result.match_size, 3);
    assert!(!result.full_match);
}

#[test]
fn well_formedness_check_accepts_guarded_grammar() {
    let config = RunConfig {
        well_formedness_check: true,
        ..RunConfig::default()
    };
    let result = run_text(&sum_grammar(), "1+1", &config).expect("保護済み左再帰は検査を通る");
    assert!(result.full_match);
}

#[test]
fn well_formedness_check_rejects_naked_left_recursion() {
    let expr = lazy("expr");
    let expr_ref: ParserRef = expr.clone();
    expr.define(choice(vec![
        seq(vec![expr_ref, literal("+"), literal("1")]),
        literal("1"),
    ]));
    let root: ParserRef = expr;

    let config = RunConfig {
        well_formedness_check: true,
        ..RunConfig::default()
    };
    let error = run_text(&root, "1+1", &config).unwrap_err();
    match error {
        ConfigError::UnguardedLeftRecursion { cycle } => {
            assert!(cycle.contains("<expr>"), "循環経路に規則名が載る: {cycle}");
        }
        other => panic!("左再帰の検出を期待しました: {other}"),
    }
}

#[test]
fn well_formedness_check_sees_through_nullable_prefix() {
    // 省略可能な前置があっても先頭到達は変わらない。
    let expr = lazy("expr");
    let expr_ref: ParserRef = expr.clone();
    expr.define(seq(vec![opt(literal("-")), expr_ref, literal("1")]));
    let root: ParserRef = expr;

    let config = RunConfig {
        well_formedness_check: true,
        ..RunConfig::default()
    };
    let error = run_text(&root, "1", &config).unwrap_err();
    assert!(matches!(error, ConfigError::UnguardedLeftRecursion { .. }));
}

#[test]
fn well_formedness_check_rejects_undefined_reference() {
    let hole = lazy("hole");
    let hole_ref: ParserRef = hole.clone();
    let root = seq(vec![hole_ref, literal("a")]);

    let config = RunConfig {
        well_formedness_check: true,
        ..RunConfig::default()
    };
    let error = run_text(&root, "a", &config).unwrap_err();
    assert_eq!(
        error,
        ConfigError::UnboundReference {
            name: "hole".to_string()
        }
    );
}

#[test]
fn undefined_reference_without_check_is_captured_as_thrown() {
    let hole = lazy("hole");
    let hole_ref: ParserRef = hole.clone();
    let root = seq(vec![hole_ref, literal("a")]);

    let result = run_with_default(&root, "a");
    assert!(!result.success);
    let thrown = result.thrown.expect("未定義参照の panic が捕捉されるはず");
    assert!(thrown.message.contains("未定義"), "{}", thrown.message);
}

#[test]
fn depth_guard_converts_runaway_recursion_into_thrown() {
    let expr = lazy("expr");
    let expr_ref: ParserRef = expr.clone();
    expr.define(seq(vec![expr_ref, literal("1")]));
    let root: ParserRef = expr;

    let config = RunConfig::default().with_extension("parse", |mut ext| {
        ext.insert("max_depth".into(), 64.into());
        ext
    });
    let result = run_text(&root, "1", &config).expect("設定は妥当");
    assert!(!result.success);
    let thrown = result.thrown.expect("深度ガードの panic が捕捉されるはず");
    assert!(thrown.message.contains("再帰深度"), "{}", thrown.message);
}

#[test]
fn nested_left_recursion_keys_by_position() {
    // 括弧の中で同じ規則に別位置から入り直しても、シードは位置ごとに独立する。
    let leaf = one();
    let grammar = left_recursive("sum", move |rec| {
        let parenthesized = action(
            seq(vec![literal("("), rec.clone(), literal(")")]),
            |scope| {
                let inner = pop_string(scope);
                scope.push(value(format!("[{}]", inner)));
            },
        );
        choice(vec![
            action(seq(vec![rec, literal("+"), leaf.clone()]), |scope| {
                let rhs = pop_string(scope);
                let lhs = pop_string(scope);
                scope.push(value(format!("({}+{})", lhs, rhs)));
            }),
            parenthesized,
            leaf.clone(),
        ])
    });

    let fixture = TestFixture::new(grammar);
    fixture.success_expect("(1+1)+1", value("([(1+1)]+1)".to_string()));
}
