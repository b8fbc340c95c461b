use std::collections::{HashMap, HashSet};

use super::combinator::{Around, Lazy, LeftRecursive, Literal, Sequence};
use super::parser::{parser_key, Parser, ParserRef};
use super::visitor::ParserVisitor;
use super::walker::reachable;
use crate::run_config::ConfigError;

/// 文法の構造検査。
///
/// 未定義の遅延参照と、`LeftRecursive` で保護されていない左再帰
/// （空許容な先頭経由の循環）を実行前に検出する。
pub fn check(root: &ParserRef) -> Result<(), ConfigError> {
    let nodes = reachable(root);

    for node in &nodes {
        let mut probe = LazyProbe { undefined: None };
        node.accept(&mut probe);
        if let Some(name) = probe.undefined {
            return Err(ConfigError::UnboundReference { name });
        }
    }

    let nullable = compute_nullable(&nodes);
    detect_left_cycle(&nodes, &nullable)
}

struct LazyProbe {
    undefined: Option<String>,
}

impl ParserVisitor for LazyProbe {
    fn visit_lazy(&mut self, parser: &Lazy) {
        if parser.target().is_none() {
            self.undefined = Some(parser.name.clone());
        }
    }
}

/// 空一致し得るかを不動点まで伝播させる。初期値はすべて「不可」。
fn compute_nullable(nodes: &[ParserRef]) -> HashMap<usize, bool> {
    let mut nullable: HashMap<usize, bool> =
        nodes.iter().map(|node| (parser_key(node), false)).collect();
    loop {
        let mut changed = false;
        for node in nodes {
            let mut pass = NullablePass {
                nullable: &nullable,
                result: false,
            };
            node.accept(&mut pass);
            let key = parser_key(node);
            if pass.result && !nullable.get(&key).copied().unwrap_or(false) {
                nullable.insert(key, true);
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

struct NullablePass<'a> {
    nullable: &'a HashMap<usize, bool>,
    result: bool,
}

impl NullablePass<'_> {
    fn lookup(&self, child: &ParserRef) -> bool {
        self.nullable
            .get(&parser_key(child))
            .copied()
            .unwrap_or(false)
    }
}

impl ParserVisitor for NullablePass<'_> {
    // 既定（葉と独自ノード）は空一致なし扱い。
    fn visit_other(&mut self, _parser: &dyn Parser) {
        self.result = false;
    }

    fn visit_literal(&mut self, parser: &Literal) {
        self.result = parser.text.is_empty();
    }

    fn visit_empty(&mut self, _parser: &super::combinator::Empty) {
        self.result = true;
    }

    fn visit_eof(&mut self, _parser: &super::combinator::Eof) {
        self.result = true;
    }

    fn visit_sequence(&mut self, parser: &Sequence) {
        self.result = parser.children.iter().all(|child| self.lookup(child));
    }

    fn visit_choice(&mut self, parser: &super::combinator::Choice) {
        self.result = parser.children.iter().any(|child| self.lookup(child));
    }

    fn visit_optional(&mut self, _parser: &super::combinator::Optional) {
        self.result = true;
    }

    fn visit_repeat(&mut self, parser: &super::combinator::Repeat) {
        self.result = parser.min == 0 || self.lookup(&parser.child);
    }

    fn visit_lookahead(&mut self, _parser: &super::combinator::Lookahead) {
        self.result = true;
    }

    fn visit_not(&mut self, _parser: &super::combinator::Not) {
        self.result = true;
    }

    fn visit_around(&mut self, parser: &Around) {
        self.result = parser.min == 0 || self.lookup(&parser.around);
    }

    fn visit_left_recursive(&mut self, parser: &LeftRecursive) {
        self.result = self.lookup(&parser.child);
    }

    fn visit_action(&mut self, parser: &super::combinator::Action) {
        self.result = self.lookup(&parser.child);
    }

    fn visit_rule(&mut self, parser: &super::combinator::Rule) {
        self.result = self.lookup(&parser.child);
    }

    fn visit_lazy(&mut self, parser: &Lazy) {
        self.result = parser.target().map_or(false, |target| self.lookup(target));
    }
}

/// 入力を消費せずに到達し得る先頭の子（左呼び出し辺）。
fn first_edges(node: &ParserRef, nullable: &HashMap<usize, bool>) -> Vec<ParserRef> {
    let mut pass = FirstEdgesPass {
        nullable,
        edges: Vec::new(),
        fallback: true,
    };
    node.accept(&mut pass);
    if pass.fallback {
        // フックを持たないノードは全子を保守的に辿る。
        node.children()
    } else {
        pass.edges
    }
}

struct FirstEdgesPass<'a> {
    nullable: &'a HashMap<usize, bool>,
    edges: Vec<ParserRef>,
    fallback: bool,
}

impl FirstEdgesPass<'_> {
    fn lookup(&self, child: &ParserRef) -> bool {
        self.nullable
            .get(&parser_key(child))
            .copied()
            .unwrap_or(false)
    }
}

impl ParserVisitor for FirstEdgesPass<'_> {
    fn visit_sequence(&mut self, parser: &Sequence) {
        self.fallback = false;
        for child in &parser.children {
            self.edges.push(child.clone());
            if !self.lookup(child) {
                break;
            }
        }
    }

    fn visit_around(&mut self, parser: &Around) {
        self.fallback = false;
        self.edges.push(parser.around.clone());
        if self.lookup(&parser.around) {
            self.edges.push(parser.inside.clone());
        }
    }

    // 左再帰ラッパーはシードで再入を止めるため、左呼び出し辺を作らない。
    fn visit_left_recursive(&mut self, _parser: &LeftRecursive) {
        self.fallback = false;
    }
}

fn detect_left_cycle(
    nodes: &[ParserRef],
    nullable: &HashMap<usize, bool>,
) -> Result<(), ConfigError> {
    let mut done: HashSet<usize> = HashSet::new();
    for node in nodes {
        let mut on_path: Vec<(usize, String)> = Vec::new();
        let mut path_set: HashSet<usize> = HashSet::new();
        if let Some(cycle) = dfs(node, nullable, &mut on_path, &mut path_set, &mut done) {
            return Err(ConfigError::UnguardedLeftRecursion { cycle });
        }
    }
    Ok(())
}

fn dfs(
    node: &ParserRef,
    nullable: &HashMap<usize, bool>,
    on_path: &mut Vec<(usize, String)>,
    path_set: &mut HashSet<usize>,
    done: &mut HashSet<usize>,
) -> Option<String> {
    let key = parser_key(node);
    if path_set.contains(&key) {
        let start = on_path
            .iter()
            .position(|(entry, _)| *entry == key)
            .unwrap_or(0);
        let mut labels: Vec<String> = on_path[start..]
            .iter()
            .map(|(_, label)| label.clone())
            .collect();
        labels.push(node.label());
        return Some(labels.join(" -> "));
    }
    if done.contains(&key) {
        return None;
    }
    on_path.push((key, node.label()));
    path_set.insert(key);
    for edge in first_edges(node, nullable) {
        if let Some(cycle) = dfs(&edge, nullable, on_path, path_set, done) {
            return Some(cycle);
        }
    }
    on_path.pop();
    path_set.remove(&key);
    done.insert(key);
    None
}
