use indexmap::IndexSet;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

use super::effect::SideEffect;
use super::input::Input;
use super::value::Value;
use crate::run_config::RunConfig;

const DEFAULT_MAX_DEPTH: usize = 2048;
const DEFAULT_TRACE_LIMIT: usize = 10_000;

/// 実行中のパーサー呼び出しを表すフレーム。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    pub label: String,
    pub pos: usize,
}

/// `profile` 有効時に収集する実行メトリクス。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseMetrics {
    pub invocations: u64,
    pub backtracks: u64,
    pub effects_applied: u64,
    pub effects_undone: u64,
    pub max_depth: usize,
}

impl ParseMetrics {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "invocations": self.invocations,
            "backtracks": self.backtracks,
            "effects_applied": self.effects_applied,
            "effects_undone": self.effects_undone,
            "max_depth": self.max_depth,
        })
    }
}

/// 左再帰の成長中に保持するシード。`end` が `None` なら失敗シード。
#[derive(Clone, Debug, Default)]
pub(crate) struct Seed {
    pub(crate) end: Option<usize>,
    pub(crate) effects: Vec<SideEffect>,
}

/// 1 回の実行が占有する可変コンテキスト。
///
/// カーソル・値スタック・ジャーナル・最遠エラー・呼び出しスタックを
/// すべてここに集約する。パーサーノード自体は状態を持たない。
pub struct ParseState {
    input: Input,
    /// 現在のカーソル位置。失敗時は保存した整数で復元する（ジャーナル対象外）。
    pub pos: usize,
    pub run_config: RunConfig,
    stack: Vec<Value>,
    log: Vec<SideEffect>,
    error_pos: Option<usize>,
    expected: IndexSet<String>,
    error_call_stack: Option<Vec<CallFrame>>,
    call_stack: Vec<CallFrame>,
    silent: u32,
    seeds: HashMap<(usize, usize), Seed>,
    trace: Vec<String>,
    trace_truncated: bool,
    trace_limit: usize,
    depth: usize,
    max_depth: usize,
    metrics: Option<ParseMetrics>,
}

fn decode_parse_tunable(config: &RunConfig, key: &str, default: usize) -> usize {
    config
        .extensions
        .get("parse")
        .and_then(|ext| ext.get(key))
        .and_then(JsonValue::as_u64)
        .and_then(|value| usize::try_from(value).ok())
        .unwrap_or(default)
}

impl ParseState {
    pub fn new(input: Input, run_config: RunConfig) -> Self {
        let max_depth = decode_parse_tunable(&run_config, "max_depth", DEFAULT_MAX_DEPTH);
        let trace_limit = decode_parse_tunable(&run_config, "trace_limit", DEFAULT_TRACE_LIMIT);
        let metrics = run_config.profile.then(ParseMetrics::default);
        Self {
            input,
            pos: 0,
            run_config,
            stack: Vec::new(),
            log: Vec::new(),
            error_pos: None,
            expected: IndexSet::new(),
            error_call_stack: None,
            call_stack: Vec::new(),
            silent: 0,
            seeds: HashMap::new(),
            trace: Vec::new(),
            trace_truncated: false,
            trace_limit,
            depth: 0,
            max_depth,
            metrics,
        }
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    // --- 値スタック（ジャーナル経由） ---

    /// 値を積む。逆操作込みで記録されるため、親の失敗で自動的に戻る。
    pub fn push(&mut self, value: Value) {
        let forward = value;
        self.apply(SideEffect::new(
            move |state| state.stack.push(forward.clone()),
            |state| {
                state.stack.pop();
            },
        ));
    }

    /// 値を取り出す。空なら `None`。取り出しもジャーナルされる。
    pub fn pop(&mut self) -> Option<Value> {
        let popped = self.stack.last()?.clone();
        let restore = popped.clone();
        self.apply(SideEffect::new(
            |state| {
                state.stack.pop();
            },
            move |state| state.stack.push(restore.clone()),
        ));
        Some(popped)
    }

    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    // --- ジャーナル ---

    /// 効果を即時適用しつつ記録する。利用側が独自の逆操作を渡す入口。
    pub fn apply(&mut self, effect: SideEffect) {
        effect.run_apply(self);
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.effects_applied += 1;
        }
        self.log.push(effect);
    }

    pub fn log_size(&self) -> usize {
        self.log.len()
    }

    /// 記録長 `mark` まで巻き戻す。逆操作は記録の逆順に走る。
    pub fn rollback_to(&mut self, mark: usize) {
        if mark >= self.log.len() {
            return;
        }
        let tail = self.log.split_off(mark);
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.effects_undone += tail.len() as u64;
        }
        for effect in tail.iter().rev() {
            effect.run_undo(self);
        }
    }

    pub(crate) fn log_tail(&self, from: usize) -> Vec<SideEffect> {
        self.log[from..].to_vec()
    }

    // --- 最遠エラー ---

    /// 葉パーサーの失敗を記録する。位置が後退した報告は無視する。
    pub fn record_failure(&mut self, pos: usize, label: String) {
        if self.silent > 0 {
            return;
        }
        match self.error_pos {
            Some(error_pos) if pos < error_pos => {}
            Some(error_pos) if pos == error_pos => {
                self.expected.insert(label);
            }
            _ => {
                self.error_pos = Some(pos);
                self.expected.clear();
                self.expected.insert(label);
                if self.run_config.record_call_stack {
                    self.error_call_stack = Some(self.call_stack.clone());
                }
            }
        }
    }

    /// 失敗記録を一時停止する。`not_followed_by` と区切りの黙示試行が使う。
    pub fn enter_silent(&mut self) {
        self.silent += 1;
    }

    pub fn exit_silent(&mut self) {
        debug_assert!(self.silent > 0, "enter_silent と対になっていません");
        self.silent = self.silent.saturating_sub(1);
    }

    pub fn error_pos(&self) -> Option<usize> {
        self.error_pos
    }

    pub fn expected_labels(&self) -> Vec<String> {
        self.expected.iter().cloned().collect()
    }

    pub(crate) fn take_error_call_stack(&mut self) -> Option<Vec<CallFrame>> {
        self.error_call_stack.take()
    }

    // --- 呼び出し追跡 ---

    pub(crate) fn needs_invocation_label(&self) -> bool {
        self.run_config.record_call_stack || self.run_config.trace
    }

    pub(crate) fn enter_invocation(&mut self, label: Option<&str>, pos: usize) {
        self.depth += 1;
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.invocations += 1;
            metrics.max_depth = metrics.max_depth.max(self.depth);
        }
        if self.depth > self.max_depth {
            panic!("解析の再帰深度が上限 {} を超えました", self.max_depth);
        }
        if let Some(label) = label {
            if self.run_config.record_call_stack {
                self.call_stack.push(CallFrame {
                    label: label.to_string(),
                    pos,
                });
            }
            if self.run_config.trace {
                let line = format!("{}→ {} @{}", "  ".repeat(self.depth - 1), label, pos);
                self.trace_line(line);
            }
        }
    }

    pub(crate) fn exit_invocation(&mut self, label: Option<&str>, success: bool) {
        if let Some(label) = label {
            if self.run_config.trace {
                let mark = if success { "✓" } else { "✗" };
                let line = format!(
                    "{}{} {} @{}",
                    "  ".repeat(self.depth.saturating_sub(1)),
                    mark,
                    label,
                    self.pos
                );
                self.trace_line(line);
            }
            if self.run_config.record_call_stack {
                self.call_stack.pop();
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn record_backtrack(&mut self) {
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.backtracks += 1;
        }
    }

    fn trace_line(&mut self, line: String) {
        if self.trace.len() >= self.trace_limit {
            if !self.trace_truncated {
                self.trace
                    .push("…トレース上限に達したため以降は省略します".to_string());
                self.trace_truncated = true;
            }
            return;
        }
        self.trace.push(line);
    }

    pub(crate) fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }

    pub(crate) fn take_metrics(&mut self) -> Option<ParseMetrics> {
        self.metrics.take()
    }

    // --- 左再帰シード ---

    pub(crate) fn seed_cloned(&self, key: (usize, usize)) -> Option<Seed> {
        self.seeds.get(&key).cloned()
    }

    pub(crate) fn seed_end(&self, key: (usize, usize)) -> Option<usize> {
        self.seeds.get(&key).and_then(|seed| seed.end)
    }

    pub(crate) fn set_seed(&mut self, key: (usize, usize), seed: Seed) {
        self.seeds.insert(key, seed);
    }

    pub(crate) fn take_seed(&mut self, key: (usize, usize)) -> Option<Seed> {
        self.seeds.remove(&key)
    }
}
