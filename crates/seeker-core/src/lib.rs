//! seeker-core
//!
//! Core building blocks for the file-search dispatch pipeline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, translation, query, file, messages, state）
//! - **ports**: 外部コラボレータの抽象（Translator, SearchProvider, Notifier）
//! - **queue**: durable queue の抽象と実装（AMQP / in-memory）、接続リトライ
//! - **app**: producer, ingress, pipeline, consumer loop, worker group
//! - **clients**: ports の HTTP 実装（Gemini, Google Drive, Telegram）
//! - **config**: 環境変数からの設定
//! - **error**: 関心ごとのエラー型

pub mod app;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod queue;
