use std::collections::HashSet;

use super::parser::{parser_key, ParserRef};

/// 走査イベント。各ノードは Before/After をちょうど一度ずつ受け取り、
/// 再遭遇のたびに Recurse（経路上の逆辺）か Visited のどちらか一度を受け取る。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkEvent {
    Before,
    After,
    Recurse,
    Visited,
}

/// 循環を許すパーサーグラフの前順/後順 DFS。
///
/// 走査中の経路集合と訪問済み集合を分けて持ち、逆辺と横断辺を区別する。
#[derive(Default)]
pub struct ParserWalker {
    visited: HashSet<usize>,
    on_path: HashSet<usize>,
}

impl ParserWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn walk(&mut self, parser: &ParserRef, work: &mut dyn FnMut(&ParserRef, WalkEvent)) {
        let key = parser_key(parser);
        if self.on_path.contains(&key) {
            work(parser, WalkEvent::Recurse);
            return;
        }
        if !self.visited.insert(key) {
            work(parser, WalkEvent::Visited);
            return;
        }
        self.on_path.insert(key);
        work(parser, WalkEvent::Before);
        for child in parser.children() {
            self.walk(&child, work);
        }
        work(parser, WalkEvent::After);
        self.on_path.remove(&key);
    }
}

/// ルートから到達できる全ノードを Before 順で集める。
pub fn reachable(root: &ParserRef) -> Vec<ParserRef> {
    let mut nodes = Vec::new();
    let mut walker = ParserWalker::new();
    walker.walk(root, &mut |parser, event| {
        if event == WalkEvent::Before {
            nodes.push(parser.clone());
        }
    });
    nodes
}
