use std::panic::{self, AssertUnwindSafe};

use super::input::Input;
use super::parser::ParserRef;
use super::result::{ParseResult, Thrown};
use super::state::ParseState;
use super::value::Value;
use super::well_formed;
use crate::run_config::{ConfigError, RunConfig};

/// バッチランナー。設定検査と（必要なら）文法検査を済ませてから駆動する。
///
/// 解析失敗は `ParseResult` の値として返り、利用側アクションの panic は
/// 捕捉して `thrown` に載せる。panic 時の値スタックと最遠エラーは
/// 直前の状態のまま公開する。
pub fn run(parser: &ParserRef, input: Input, config: &RunConfig) -> Result<ParseResult, ConfigError> {
    config.validate()?;
    if config.well_formedness_check {
        well_formed::check(parser)?;
    }
    let input_len = input.len();
    let mut state = ParseState::new(input, config.clone());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| parser.parse(&mut state)));
    Ok(assemble(state, outcome, input_len))
}

/// テキスト入力のエイリアス。
pub fn run_text(
    parser: &ParserRef,
    source: &str,
    config: &RunConfig,
) -> Result<ParseResult, ConfigError> {
    run(parser, Input::text(source), config)
}

/// トークン入力のエイリアス。
pub fn run_tokens(
    parser: &ParserRef,
    tokens: Vec<Value>,
    config: &RunConfig,
) -> Result<ParseResult, ConfigError> {
    run(parser, Input::tokens(tokens), config)
}

/// 既定設定での実行。既定の `RunConfig` は常に `validate` を通る。
pub fn run_with_default(parser: &ParserRef, source: &str) -> ParseResult {
    match run_text(parser, source, &RunConfig::default()) {
        Ok(result) => result,
        // 既定設定で構成エラーは起こり得ない。
        Err(error) => unreachable!("既定設定の実行が構成エラーになりました: {error}"),
    }
}

fn assemble(
    mut state: ParseState,
    outcome: Result<bool, Box<dyn std::any::Any + Send>>,
    input_len: usize,
) -> ParseResult {
    let (success, thrown) = match outcome {
        Ok(success) => (success, None),
        Err(payload) => (false, Some(Thrown::from_panic(payload))),
    };
    let match_size = if success { state.pos } else { 0 };
    ParseResult {
        success,
        full_match: success && state.pos >= input_len,
        match_size,
        value_stack: state.stack().to_vec(),
        error_pos: state.error_pos(),
        expected: state.expected_labels(),
        thrown,
        call_stack: state.take_error_call_stack(),
        trace: state.take_trace(),
        metrics: state.take_metrics(),
        input: state.input().clone(),
    }
}
