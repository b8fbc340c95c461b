//! momiji — バックトラッキング PEG パーサーコンビネーターの実行エンジン。
//!
//! パーサーは共有イミュータブルなグラフノードとして構築し、`parse::run` が
//! 単一の `ParseState` を駆動する。失敗時の巻き戻しは副作用ジャーナルで
//! 実現し、最遠失敗位置の診断と二重実行ハーネスを備える。

pub mod parse;
pub mod run_config;

pub use run_config::{ConfigError, RunConfig};
