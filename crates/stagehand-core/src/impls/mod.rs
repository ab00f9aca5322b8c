//! Impls - port trait の具体実装
//!
//! 本番系（プロセス spawn、QML ランナー、web ホスト橋渡し）と、開発・
//! テスト用のインメモリ差し替え実装をここに集めます。core の他の層は
//! trait 越しにしかこれらを見ません。

pub mod memory;
pub mod native;
pub mod qml;
pub mod web;

pub use self::native::{LinkCommand, LinkTx, NativeProcessBackend};
pub use self::qml::QmlRunnerBackend;
pub use self::web::WebAppBackend;
