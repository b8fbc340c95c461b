use std::fmt;
use std::sync::Arc;

/// テキスト入力のオフセットを行・桁へ写像する。
///
/// 行は慣例どおり 1 始まり。桁の開始値とタブ幅は調整でき、タブは
/// `tab_width - (column - column_start) % tab_width` 桁ぶん進む。
#[derive(Clone, Debug)]
pub struct LineMap {
    source: Arc<str>,
    line_starts: Vec<usize>,
    tab_width: usize,
    column_start: usize,
}

/// 行・桁の組。表示は `行:桁`。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl LineMap {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self::with_layout(source, 4, 1)
    }

    pub fn with_layout(
        source: impl Into<Arc<str>>,
        tab_width: usize,
        column_start: usize,
    ) -> Self {
        let source = source.into();
        let mut line_starts = vec![0];
        for (index, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(index + 1);
            }
        }
        Self {
            source,
            line_starts,
            tab_width: tab_width.max(1),
            column_start,
        }
    }

    /// バイトオフセットを位置へ写像する。範囲外は終端に丸める。
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.source.len());
        let line_index = self
            .line_starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line_index];
        let mut column = self.column_start;
        for (index, ch) in self.source[line_start..].char_indices() {
            if line_start + index >= offset {
                break;
            }
            if ch == '\t' {
                column += self.tab_width - (column - self.column_start) % self.tab_width;
            } else {
                column += 1;
            }
        }
        Location {
            line: line_index + 1,
            column,
        }
    }
}
