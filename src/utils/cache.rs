use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    timestamp: Instant,
}

/// Cache em memória com TTL fixo.
///
/// Usado para a lista de anos (RPC), resultados de busca, artefatos de
/// callback já consumidos e fluxos PKCE pendentes. O lock nunca é mantido
/// através de um `.await`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CachedEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.timestamp.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.timestamp.elapsed() < ttl);
            entries.insert(key, CachedEntry {
                value,
                timestamp: Instant::now(),
            });
        }
    }

    /// Insere somente se a chave não existir (ou estiver expirada).
    /// Retorna `true` quando esta chamada ficou com a chave.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.timestamp.elapsed() < ttl);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, CachedEntry {
            value,
            timestamp: Instant::now(),
        });
        true
    }

    /// Remove e devolve o valor, se ainda válido.
    pub fn take(&self, key: &K) -> Option<V> {
        let entry = self.entries.lock().ok()?.remove(key)?;
        (entry.timestamp.elapsed() < self.ttl).then_some(entry.value)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}
