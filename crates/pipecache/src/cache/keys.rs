//! Cache key generation.

use std::fmt;

use pipecache_core::Request;

/// Key unica para una entrada de cache.
///
/// Formato `{namespace}:{identifier}`, donde el namespace es el nombre del
/// tipo de request. Dos tipos distintos nunca comparten keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Crea una key a partir de un namespace y un identificador.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipecache::cache::CacheKey;
    ///
    /// let key = CacheKey::new("orders::GetOrder", "42");
    /// assert_eq!(key.as_str(), "orders::GetOrder:42");
    /// ```
    pub fn new(namespace: &str, identifier: &str) -> Self {
        Self(format!("{}:{}", namespace, identifier))
    }

    /// Crea la key de `identifier` dentro del namespace del request `R`.
    pub fn for_request<R: Request>(identifier: &str) -> Self {
        Self::new(R::name(), identifier)
    }

    /// Retorna la key como string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume la key y retorna el string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Elimina keys duplicadas conservando el orden de la primera aparicion.
pub(crate) fn dedup_keys(keys: impl IntoIterator<Item = CacheKey>) -> Vec<CacheKey> {
    let mut unique: Vec<CacheKey> = Vec::new();
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}
