use std::sync::Arc;

use super::value::Value;

/// 入力ビュー。文字列かトークン列を一様に扱う。
///
/// 位置はテキスト入力ではバイトオフセット、トークン入力では添字を指す。
/// テキストの前進は常に UTF-8 境界単位で行う。
#[derive(Clone, Debug)]
pub enum Input {
    Text(Arc<str>),
    Tokens(Arc<Vec<Value>>),
}

impl Input {
    pub fn text(source: impl Into<Arc<str>>) -> Self {
        Self::Text(source.into())
    }

    pub fn tokens(items: Vec<Value>) -> Self {
        Self::Tokens(Arc::new(items))
    }

    /// 終端位置。テキストはバイト長、トークン列は要素数。
    pub fn len(&self) -> usize {
        match self {
            Self::Text(source) => source.len(),
            Self::Tokens(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 指定位置の文字。トークン入力では常に `None`。
    pub fn char_at(&self, pos: usize) -> Option<char> {
        match self {
            Self::Text(source) => source.get(pos..)?.chars().next(),
            Self::Tokens(_) => None,
        }
    }

    pub fn starts_with(&self, needle: &str, pos: usize) -> bool {
        match self {
            Self::Text(source) => source
                .get(pos..)
                .map(|rest| rest.starts_with(needle))
                .unwrap_or(false),
            Self::Tokens(_) => false,
        }
    }

    /// 指定位置のトークン。テキスト入力では常に `None`。
    pub fn token_at(&self, pos: usize) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Tokens(items) => items.get(pos),
        }
    }

    pub fn slice_text(&self, start: usize, end: usize) -> Option<&str> {
        match self {
            Self::Text(source) => source.get(start..end),
            Self::Tokens(_) => None,
        }
    }

    pub fn slice_tokens(&self, start: usize, end: usize) -> Option<&[Value]> {
        match self {
            Self::Text(_) => None,
            Self::Tokens(items) => items.get(start..end),
        }
    }

    /// テキスト入力の全体。LineMap の構築に使う。
    pub fn source_text(&self) -> Option<&str> {
        match self {
            Self::Text(source) => Some(source),
            Self::Tokens(_) => None,
        }
    }
}

impl From<&str> for Input {
    fn from(source: &str) -> Self {
        Self::text(source)
    }
}

impl From<String> for Input {
    fn from(source: String) -> Self {
        Self::text(source)
    }
}

impl From<Vec<Value>> for Input {
    fn from(items: Vec<Value>) -> Self {
        Self::tokens(items)
    }
}
