use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{CoreError, Keyword, LinkRegistry, RedirectList, RedirectStore};

/// In-memory settings store. Lists are kept in keyword order.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<Keyword, RedirectList>>,
}

/// In-memory shortlink registry.
pub struct InMemoryLinkRegistry {
    links: Mutex<BTreeMap<Keyword, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectStore for InMemoryStore {
    fn get(&self, keyword: &Keyword) -> Result<Option<RedirectList>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(keyword).cloned())
    }

    fn put(&self, list: RedirectList) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.insert(list.keyword.clone(), list);
        Ok(())
    }

    fn delete(&self, keyword: &Keyword) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        match map.remove(keyword) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound),
        }
    }

    fn list(&self) -> Result<Vec<RedirectList>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.values().cloned().collect())
    }
}

impl InMemoryLinkRegistry {
    pub fn new() -> Self {
        Self {
            links: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryLinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkRegistry for InMemoryLinkRegistry {
    fn lookup(&self, keyword: &Keyword) -> Result<Option<String>, CoreError> {
        let map = self
            .links
            .lock()
            .map_err(|_| CoreError::Registry("mutex poisoned".into()))?;
        Ok(map.get(keyword).cloned())
    }

    fn create(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        let mut map = self
            .links
            .lock()
            .map_err(|_| CoreError::Registry("mutex poisoned".into()))?;
        if map.contains_key(keyword) {
            return Err(CoreError::Registry(format!(
                "shortlink '{}' already exists",
                keyword
            )));
        }
        map.insert(keyword.clone(), url.to_string());
        Ok(())
    }

    fn update(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        let mut map = self
            .links
            .lock()
            .map_err(|_| CoreError::Registry("mutex poisoned".into()))?;
        match map.get_mut(keyword) {
            Some(existing) => {
                *existing = url.to_string();
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entry;

    fn list(keyword: &str, url: &str) -> RedirectList {
        RedirectList::new(
            Keyword::new(keyword).unwrap(),
            vec![Entry::new(url, 1.0)],
            true,
        )
        .unwrap()
    }

    #[test]
    fn put_replaces_wholesale() {
        let store = InMemoryStore::new();
        store.put(list("k", "https://old.com")).unwrap();
        store.put(list("k", "https://new.com")).unwrap();
        let got = store.get(&Keyword::new("k").unwrap()).unwrap().unwrap();
        assert_eq!(got.entries(), &[Entry::new("https://new.com", 1.0)]);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_is_ordered_by_keyword() {
        let store = InMemoryStore::new();
        store.put(list("zeta", "https://z.com")).unwrap();
        store.put(list("alpha", "https://a.com")).unwrap();
        let keys: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|l| l.keyword.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.delete(&Keyword::new("nope").unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[test]
    fn registry_create_then_update() {
        let reg = InMemoryLinkRegistry::new();
        let k = Keyword::new("promo").unwrap();
        assert_eq!(reg.lookup(&k).unwrap(), None);
        reg.create(&k, "https://a.com").unwrap();
        assert!(reg.create(&k, "https://b.com").is_err());
        reg.update(&k, "https://b.com").unwrap();
        assert_eq!(reg.lookup(&k).unwrap().as_deref(), Some("https://b.com"));
    }
}
