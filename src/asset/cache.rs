use super::Handle;

/// Append-only arena with tombstones; indices are never recycled.
pub struct AssetCache<T> {
    items: Vec<Option<T>>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let index = self.items.len() as u32;
        self.items.push(Some(item));
        Handle::new(index)
    }

    /// Returns None if the handle is out of range or the asset was removed.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        self.items.get_mut(handle.index()).and_then(Option::take)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_ref().map(|item| (Handle::new(i as u32), item)))
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|item| item.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_invalid_handle_returns_none() {
        let cache: AssetCache<u32> = AssetCache::default();
        assert!(cache.get(Handle::new(999)).is_none());
    }

    #[test]
    fn removed_slot_is_not_reused() {
        let mut cache = AssetCache::new();
        let a = cache.insert(1u32);
        assert_eq!(cache.remove(a), Some(1));
        assert!(cache.get(a).is_none());
        let b = cache.insert(2u32);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 1);
        assert!(cache.remove(a).is_none());
    }
}
