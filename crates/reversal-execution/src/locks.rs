//! 심볼별 직렬화 락.
//!
//! 같은 심볼에 대한 장부 변이는 한 번에 하나만 일어나야 합니다.
//! venue 호출은 락 밖에서 수행하고, 재획득 후 CAS로 재검증합니다.
//! 락을 쥔 채 venue를 기다리면 느린 심볼 하나가 전체 사이클을 막습니다.

use std::collections::HashMap;
use std::sync::Arc;

use reversal_core::Symbol;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 심볼별 뮤텍스 레지스트리.
#[derive(Clone, Default)]
pub struct SymbolLocks {
    inner: Arc<Mutex<HashMap<Symbol, Arc<Mutex<()>>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼 락을 획득합니다. 가드를 드롭하면 해제됩니다.
    pub async fn acquire(&self, symbol: &Symbol) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.inner.lock().await;
            registry
                .entry(symbol.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
