use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 値スタックに積める AST 断片。型消去しつつ表示と動的比較を保つ。
///
/// `Any + Debug + PartialEq` を満たす型には包括実装が付くため、
/// 利用側で明示的に実装する必要はない。
pub trait StackValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// 同じ具象型同士でのみ等しくなる動的比較。
    fn eq_dyn(&self, other: &dyn StackValue) -> bool;
}

impl<T> StackValue for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn StackValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |value| value == self)
    }
}

/// 値スタックの要素。Arc 共有なので複製は参照カウントのみ。
pub type Value = Arc<dyn StackValue>;

/// `Value` を構築するヘルパ。
pub fn value<T: StackValue>(inner: T) -> Value {
    Arc::new(inner)
}
