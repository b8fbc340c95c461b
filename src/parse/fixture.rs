use thiserror::Error;

use super::input::Input;
use super::line_map::LineMap;
use super::parser::ParserRef;
use super::result::ParseResult;
use super::runner::run;
use super::value::{StackValue, Value};
use crate::run_config::RunConfig;

/// 二重実行ハーネス。
///
/// 同じ入力で同じパーサーを二度走らせ、観測結果の食い違いを検出する。
/// ジャーナルを通さない副作用はここで露見する。一回目が失敗した場合、
/// 二回目は診断のため呼び出しスタック記録を強制的に有効にする。
pub struct TestFixture {
    pub parser: ParserRef,
    /// 桁の開始値。既定 1、0 も許す。
    pub column_start: usize,
    /// タブの表示幅。既定 4。
    pub tab_width: usize,
    /// 常に呼び出しスタックを記録するか。既定 true。
    pub record_call_stack: bool,
    /// レポートにトレースを連結する際の区切り。
    pub trace_separator: String,
}

/// ハーネスの検査失敗。`kind` が食い違ったフィールドを示す。
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct FixtureError {
    pub kind: FixtureErrorKind,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureErrorKind {
    /// panic の有無または内容の不一致。
    Thrown,
    /// `success` の不一致。
    Success,
    /// `match_size` の不一致。
    MatchSize,
    /// `error_pos` の不一致、または期待した位置との不一致。
    ErrorPosition,
    /// 成功したが全入力を消費していない。
    FullMatch,
    /// 失敗を期待したのに全入力に一致した。
    UnexpectedMatch,
    /// 失敗したのに panic も解析エラーも報告されていない。
    NoDiagnostic,
    /// 値スタックが空。
    EmptyStack,
    /// スタック先頭が期待値と一致しない。
    ValueMismatch,
    /// 実行設定が不正（ハーネス自体の誤用）。
    Config,
}

impl FixtureError {
    fn new(kind: FixtureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl TestFixture {
    pub fn new(parser: ParserRef) -> Self {
        Self {
            parser,
            column_start: 1,
            tab_width: 4,
            record_call_stack: true,
            trace_separator: "\n------".to_string(),
        }
    }

    fn line_map(&self, input: &Input) -> Option<LineMap> {
        input
            .source_text()
            .map(|source| LineMap::with_layout(source, self.tab_width, self.column_start))
    }

    fn run_once(&self, input: &Input, record: bool) -> Result<ParseResult, FixtureError> {
        let config = RunConfig {
            record_call_stack: record,
            ..RunConfig::default()
        };
        run(&self.parser, input.clone(), &config)
            .map_err(|error| FixtureError::new(FixtureErrorKind::Config, error.to_string()))
    }

    fn render(&self, result: &ParseResult, map: Option<&LineMap>) -> String {
        let mut out = result.to_report(map);
        if !result.trace.is_empty() {
            out.push_str(&self.trace_separator);
            out.push('\n');
            out.push_str(&result.trace.join("\n"));
        }
        out
    }

    /// 先頭メッセージに二回分のレポートを添える。
    fn compared_status(
        &self,
        head: &str,
        map: Option<&LineMap>,
        first: &ParseResult,
        second: &ParseResult,
    ) -> String {
        format!(
            "{} パーサーが状態を持っていませんか？\n\n### 一回目の解析 ###\n\n{}\n\n### 二回目の解析 ###\n\n{}",
            head,
            self.render(first, map),
            self.render(second, map),
        )
    }

    /// 二度実行して観測結果を突き合わせる。
    fn double_run(
        &self,
        input: &Input,
    ) -> Result<(ParseResult, Option<LineMap>), FixtureError> {
        let map = self.line_map(input);
        let first = self.run_once(input, self.record_call_stack)?;
        let second = self.run_once(input, self.record_call_stack || !first.success)?;

        let mismatch = |kind: FixtureErrorKind, head: &str| {
            Err(FixtureError::new(
                kind,
                self.compared_status(head, map.as_ref(), &first, &second),
            ))
        };

        if second.thrown.is_some() && first.thrown.is_none() {
            return mismatch(
                FixtureErrorKind::Thrown,
                "二回目の解析のみ panic が発生しました。",
            );
        }
        if first.thrown.is_some() && second.thrown.is_none() {
            return mismatch(
                FixtureErrorKind::Thrown,
                "一回目の解析のみ panic が発生しました。",
            );
        }
        if let (Some(first_thrown), Some(second_thrown)) = (&first.thrown, &second.thrown) {
            if first_thrown != second_thrown {
                return mismatch(
                    FixtureErrorKind::Thrown,
                    "panic の内容が二回の解析で一致しません。",
                );
            }
        }
        if first.success != second.success {
            return mismatch(
                FixtureErrorKind::Success,
                "成功フラグ（success）が二回の解析で一致しません。",
            );
        }
        if first.success {
            if first.match_size != second.match_size {
                return mismatch(
                    FixtureErrorKind::MatchSize,
                    "消費量（match_size）が二回の解析で一致しません。",
                );
            }
        } else if first.error_pos != second.error_pos {
            return mismatch(
                FixtureErrorKind::ErrorPosition,
                "失敗位置（error_pos）が二回の解析で一致しません。",
            );
        }

        // 以降の検査は一回目の結果を基準にする。
        Ok((first, map))
    }

    /// 全入力への一致を検査する。失敗理由を `FixtureError` で返す。
    pub fn check_success(&self, input: impl Into<Input>) -> Result<ParseResult, FixtureError> {
        let input = input.into();
        let (result, map) = self.double_run(&input)?;
        if !result.full_match {
            return Err(FixtureError::new(
                FixtureErrorKind::FullMatch,
                format!(
                    "全入力への一致を期待しました。\n\n{}",
                    self.render(&result, map.as_ref())
                ),
            ));
        }
        Ok(result)
    }

    /// 全入力への一致を表明する。不一致なら詳細レポート付きで panic する。
    pub fn success(&self, input: impl Into<Input>) -> ParseResult {
        self.check_success(input)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    /// 一致に加えて値スタック先頭を検査する。
    pub fn check_success_expect(
        &self,
        input: impl Into<Input>,
        expected: Value,
    ) -> Result<ParseResult, FixtureError> {
        let result = self.check_success(input)?;
        match result.value_stack.last() {
            None => Err(FixtureError::new(
                FixtureErrorKind::EmptyStack,
                "値スタックが空です。",
            )),
            Some(top) if !top.eq_dyn(expected.as_ref()) => Err(FixtureError::new(
                FixtureErrorKind::ValueMismatch,
                format!(
                    "値スタック先頭が期待値と一致しません: 実際 {:?} / 期待 {:?}",
                    top, expected
                ),
            )),
            Some(_) => Ok(result),
        }
    }

    pub fn success_expect(&self, input: impl Into<Input>, expected: Value) -> ParseResult {
        self.check_success_expect(input, expected)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    /// 全入力への一致が失敗することを検査する。
    pub fn check_failure(&self, input: impl Into<Input>) -> Result<ParseResult, FixtureError> {
        let input = input.into();
        let map = self.line_map(&input);
        let result = self.run_once(&input, self.record_call_stack)?;
        if result.full_match {
            return Err(FixtureError::new(
                FixtureErrorKind::UnexpectedMatch,
                format!(
                    "失敗を期待しましたが全入力に一致しました。\n\n{}",
                    self.render(&result, map.as_ref())
                ),
            ));
        }
        if !result.success {
            if let Some(thrown) = &result.thrown {
                return Err(FixtureError::new(
                    FixtureErrorKind::Thrown,
                    format!("解析失敗ではなく panic で終了しました: {}", thrown.message),
                ));
            }
            if result.error_pos.is_none() {
                return Err(FixtureError::new(
                    FixtureErrorKind::NoDiagnostic,
                    "解析エラーが報告されていません。",
                ));
            }
        }
        Ok(result)
    }

    pub fn failure(&self, input: impl Into<Input>) -> ParseResult {
        self.check_failure(input)
            .unwrap_or_else(|error| panic!("{}", error))
    }

    /// 失敗に加えて最遠エラー位置を検査する。
    pub fn check_failure_at(
        &self,
        input: impl Into<Input>,
        error_pos: usize,
    ) -> Result<ParseResult, FixtureError> {
        let result = self.check_failure(input)?;
        if result.error_pos != Some(error_pos) {
            return Err(FixtureError::new(
                FixtureErrorKind::ErrorPosition,
                format!(
                    "最遠エラー位置が期待と一致しません: 実際 {:?} / 期待 {}",
                    result.error_pos, error_pos
                ),
            ));
        }
        Ok(result)
    }

    pub fn failure_at(&self, input: impl Into<Input>, error_pos: usize) -> ParseResult {
        self.check_failure_at(input, error_pos)
            .unwrap_or_else(|error| panic!("{}", error))
    }
}
