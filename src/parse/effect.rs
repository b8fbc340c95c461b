use std::sync::Arc;

use super::state::ParseState;

/// ジャーナルの 1 エントリ。順方向と逆方向の操作を対で持つ。
///
/// `apply` は `ParseState::apply` 経由で即時実行と同時に記録され、
/// 巻き戻しでは記録の逆順に `undo` が走る。左再帰のシード再生で
/// 再適用されるため、どちらの閉包も繰り返し呼べる必要がある。
#[derive(Clone)]
pub struct SideEffect {
    apply: Arc<dyn Fn(&mut ParseState) + Send + Sync>,
    undo: Arc<dyn Fn(&mut ParseState) + Send + Sync>,
}

impl SideEffect {
    pub fn new(
        apply: impl Fn(&mut ParseState) + Send + Sync + 'static,
        undo: impl Fn(&mut ParseState) + Send + Sync + 'static,
    ) -> Self {
        Self {
            apply: Arc::new(apply),
            undo: Arc::new(undo),
        }
    }

    pub(crate) fn run_apply(&self, state: &mut ParseState) {
        (self.apply)(state);
    }

    pub(crate) fn run_undo(&self, state: &mut ParseState) {
        (self.undo)(state);
    }
}

impl std::fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffect").finish_non_exhaustive()
    }
}
