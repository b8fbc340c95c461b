use serde_json::{json, Value as JsonValue};
use std::any::Any;

use super::input::Input;
use super::line_map::LineMap;
use super::state::{CallFrame, ParseMetrics};
use super::value::Value;

/// 捕捉した panic のペイロード。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thrown {
    pub message: String,
}

impl Thrown {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "文字列以外の panic ペイロード".to_string()
        };
        Self { message }
    }
}

/// 1 回の実行の不変な結果。
///
/// 失敗は値として返り、例外的失敗（panic）は `thrown` に載る。
/// panic 時の値スタックは巻き戻さず、事後検査のためそのまま残す。
#[derive(Clone, Debug)]
pub struct ParseResult {
    pub success: bool,
    /// 成功かつ入力終端まで消費したか。
    pub full_match: bool,
    pub match_size: usize,
    pub value_stack: Vec<Value>,
    pub error_pos: Option<usize>,
    /// 最遠失敗位置で失敗した葉パーサーの表示名（重複なし・記録順）。
    pub expected: Vec<String>,
    pub thrown: Option<Thrown>,
    pub call_stack: Option<Vec<CallFrame>>,
    pub trace: Vec<String>,
    pub metrics: Option<ParseMetrics>,
    /// 解析対象の入力。位置の整形に使い回す。
    pub input: Input,
}

impl ParseResult {
    /// 既定レイアウトの LineMap。トークン入力では `None`。
    pub fn line_map(&self) -> Option<LineMap> {
        self.input.source_text().map(LineMap::new)
    }

    /// 人間向けレポートを固定の節順で書き出す。
    ///
    /// 節順は 結果行 / 一致長または失敗位置 / 期待集合 / 呼び出しスタック /
    /// 値スタック。書式はゴールデンテストの対象なので安定させること。
    pub fn append_to(&self, out: &mut String, map: Option<&LineMap>) {
        if let Some(thrown) = &self.thrown {
            out.push_str("解析中断（panic）: ");
            out.push_str(&thrown.message);
            out.push('\n');
        } else if self.full_match {
            out.push_str("解析成功（全入力を消費）\n");
        } else if self.success {
            out.push_str("解析成功（部分一致）\n");
        } else {
            out.push_str("解析失敗\n");
        }

        if self.success {
            out.push_str(&format!("一致長: {}\n", self.match_size));
        } else {
            out.push_str(&format!(
                "最遠エラー位置: {}\n",
                format_position(self.error_pos, map)
            ));
            if !self.expected.is_empty() {
                out.push_str("期待される構文:\n");
                for label in &self.expected {
                    out.push_str(&format!("  - {}\n", label));
                }
            }
        }

        if let Some(frames) = &self.call_stack {
            out.push_str("呼び出しスタック:\n");
            for frame in frames {
                out.push_str(&format!(
                    "  {} @{}\n",
                    frame.label,
                    format_position(Some(frame.pos), map)
                ));
            }
        }

        out.push_str(&format!("値スタック: {} 要素\n", self.value_stack.len()));
        for (index, value) in self.value_stack.iter().enumerate() {
            out.push_str(&format!("  [{}] {:?}\n", index, value));
        }
    }

    pub fn to_report(&self, map: Option<&LineMap>) -> String {
        let mut out = String::new();
        self.append_to(&mut out, map);
        out
    }

    /// CLI / LSP 連携向けの JSON 表現。
    pub fn to_json(&self) -> JsonValue {
        json!({
            "success": self.success,
            "full_match": self.full_match,
            "match_size": self.match_size,
            "error_pos": self.error_pos,
            "expected": self.expected.clone(),
            "thrown": self.thrown.as_ref().map(|thrown| thrown.message.clone()),
            "stack_depth": self.value_stack.len(),
            "metrics": self.metrics.as_ref().map(ParseMetrics::to_json),
        })
    }
}

fn format_position(pos: Option<usize>, map: Option<&LineMap>) -> String {
    match pos {
        None => "記録なし".to_string(),
        Some(pos) => match map {
            Some(map) => map.location(pos).to_string(),
            None => pos.to_string(),
        },
    }
}
