//! 도메인 모델 모듈.

pub mod events;
pub mod intent;
pub mod order;
pub mod position;
pub mod reconciliation;

pub use events::*;
pub use intent::*;
pub use order::*;
pub use position::*;
pub use reconciliation::*;
