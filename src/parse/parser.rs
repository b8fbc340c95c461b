use std::sync::Arc;

use super::state::ParseState;
use super::visitor::ParserVisitor;

/// パーサーグラフの共有参照。ノードの同一性はデータポインタで判定する。
pub type ParserRef = Arc<dyn Parser>;

pub(crate) fn parser_key(parser: &ParserRef) -> usize {
    Arc::as_ptr(parser) as *const () as usize
}

/// パーサーグラフのノード。構築後はイミュータブルで、複数の実行から共有できる。
///
/// ノード固有の規則は `do_parse` に書く。呼び出しは必ず `parse` を経由し、
/// スナップショット・巻き戻し・最遠エラー更新のプロトコルを一元化する。
pub trait Parser: Send + Sync + 'static {
    /// ノード固有の解析規則。成否のみ返し、状態への効果はジャーナル経由にする。
    fn do_parse(&self, state: &mut ParseState) -> bool;

    /// 子ノード。循環グラフでは逆辺を含んでよい。
    fn children(&self) -> Vec<ParserRef> {
        Vec::new()
    }

    /// 種別ごとの visitor フックを起動する。
    fn accept(&self, visitor: &mut dyn ParserVisitor);

    /// 診断に使う表示名。`Rule` は規則名、`Lazy` は `<名前>` で循環を断ち切る。
    fn label(&self) -> String;

    /// 最遠エラーの期待集合に寄与する葉パーサーだけが `true` を返す。
    fn records_errors(&self) -> bool {
        false
    }

    /// トランザクション付き呼び出し。
    ///
    /// 1. 位置とジャーナル長を記録し、必要なら呼び出しフレームを積む。
    /// 2. `do_parse` を実行してフレームを降ろす。
    /// 3. 失敗ならジャーナルと位置を復元し、葉なら最遠エラーを更新する。
    /// 4. 成功なら何もしない（コミットは no-op）。位置は後退しない。
    fn parse(&self, state: &mut ParseState) -> bool {
        let pos0 = state.pos;
        let log0 = state.log_size();
        let label = state.needs_invocation_label().then(|| self.label());
        state.enter_invocation(label.as_deref(), pos0);
        let success = self.do_parse(state);
        state.exit_invocation(label.as_deref(), success);
        if success {
            debug_assert!(state.pos >= pos0, "成功したパーサーが位置を後退させました");
            return true;
        }
        state.record_backtrack();
        state.rollback_to(log0);
        state.pos = pos0;
        if self.records_errors() {
            state.record_failure(pos0, self.label());
        }
        false
    }
}
