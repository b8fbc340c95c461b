use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// RunConfig 拡張のネームスペースごとの値を保持する。
pub type RunConfigExtensionValue = Map<std::string::String, Value>;

/// `extensions` 全体を表すマップ。名前空間ごとに JSON 互換の値を保持する。
pub type RunConfigExtensions = HashMap<std::string::String, RunConfigExtensionValue>;

/// パーサー実行時に利用する設定。
///
/// 列挙されたフィールド以外の調整は `extensions` の名前空間経由で渡す。
/// 未知の名前空間・キーは `validate` で拒否する。
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// 最遠エラー更新時に呼び出しスタックのスナップショットを保存する。
    pub record_call_stack: bool,
    /// 呼び出しごとのトレース行を記録する。
    pub trace: bool,
    /// 実行前に文法の構造検査（未保護の左再帰など）を行う。
    pub well_formedness_check: bool,
    /// 実行メトリクスを収集する。
    pub profile: bool,
    pub extensions: RunConfigExtensions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            record_call_stack: false,
            trace: false,
            well_formedness_check: false,
            profile: false,
            extensions: RunConfigExtensions::new(),
        }
    }
}

/// `extensions["parse"]` で認識するキー。
const PARSE_EXTENSION_KEYS: &[&str] = &["max_depth", "trace_limit"];

impl RunConfig {
    /// 指定した名前空間の拡張設定をイミュータブルに更新する。
    pub fn with_extension<F>(&self, key: &str, update: F) -> Self
    where
        F: FnOnce(RunConfigExtensionValue) -> RunConfigExtensionValue,
    {
        let mut extensions = self.extensions.clone();
        let current = extensions.remove(key).unwrap_or_default();
        extensions.insert(key.to_string(), update(current));
        Self {
            extensions,
            ..self.clone()
        }
    }

    /// 未知のオプションを拒否する。`run` の冒頭で呼ばれる。
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (namespace, values) in &self.extensions {
            if namespace != "parse" {
                return Err(ConfigError::UnknownNamespace {
                    namespace: namespace.clone(),
                });
            }
            for (key, value) in values {
                if !PARSE_EXTENSION_KEYS.contains(&key.as_str()) {
                    return Err(ConfigError::UnknownOption {
                        namespace: namespace.clone(),
                        key: key.clone(),
                    });
                }
                if value.as_u64().is_none() {
                    return Err(ConfigError::InvalidOption {
                        namespace: namespace.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// 設定や文法構造の誤り。`run` から即座に返され、`ParseResult` にはならない。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("未知の設定名前空間です: {namespace}")]
    UnknownNamespace { namespace: String },
    #[error("未知の設定キーです: {namespace}.{key}")]
    UnknownOption { namespace: String, key: String },
    #[error("設定値が不正です（非負整数のみ）: {namespace}.{key}")]
    InvalidOption { namespace: String, key: String },
    #[error("未定義の遅延参照があります: <{name}>")]
    UnboundReference { name: String },
    #[error("LeftRecursive で保護されていない左再帰を検出しました: {cycle}")]
    UnguardedLeftRecursion { cycle: String },
}
