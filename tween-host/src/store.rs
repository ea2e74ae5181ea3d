//! # Store 模块
//!
//! 宿主侧的对象仓库：按名称注册对象，每个对象持有一组具名 `f64` 属性。
//!
//! 仓库为每个对象分配 [`TargetHandle`]。槽位被回收复用时代数递增，
//! 过期句柄的读写会被拒绝，补间因此不会写到后来占用同一槽位的对象上。

use std::collections::BTreeMap;

use thiserror::Error;
use tween_runtime::TargetHandle;

/// 仓库错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// 句柄已过期或从未分配
    #[error("句柄已失效: {0}")]
    StaleHandle(TargetHandle),
    /// 对象没有该属性
    #[error("对象 {object} 没有属性 {property}")]
    UnknownProperty { object: String, property: String },
    /// 名称已被占用
    #[error("对象名已存在: {0}")]
    DuplicateName(String),
}

/// 仓库中的对象
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub name: String,
    pub properties: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    object: Option<StoredObject>,
}

/// 属性仓库
#[derive(Debug, Default)]
pub struct PropertyStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册对象，返回其句柄
    pub fn register(
        &mut self,
        name: impl Into<String>,
        properties: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<TargetHandle, StoreError> {
        let name = name.into();
        if self.find(&name).is_some() {
            return Err(StoreError::DuplicateName(name));
        }

        let object = StoredObject {
            name,
            properties: properties.into_iter().collect(),
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.object = Some(object);
        Ok(TargetHandle::new(index, slot.generation))
    }

    /// 注销对象；之后该句柄的所有访问都会失败
    pub fn unregister(&mut self, handle: TargetHandle) -> Option<StoredObject> {
        let slot = self.slot_mut(handle)?;
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        object
    }

    pub fn is_alive(&self, handle: TargetHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn object(&self, handle: TargetHandle) -> Option<&StoredObject> {
        self.slot(handle).and_then(|s| s.object.as_ref())
    }

    /// 按名称查找存活对象
    pub fn find(&self, name: &str) -> Option<TargetHandle> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            slot.object
                .as_ref()
                .filter(|o| o.name == name)
                .map(|_| TargetHandle::new(i as u32, slot.generation))
        })
    }

    pub fn name_of(&self, handle: TargetHandle) -> Option<&str> {
        self.object(handle).map(|o| o.name.as_str())
    }

    pub fn get(&self, handle: TargetHandle, property: &str) -> Result<f64, StoreError> {
        let object = self.object(handle).ok_or(StoreError::StaleHandle(handle))?;
        object
            .properties
            .get(property)
            .copied()
            .ok_or_else(|| StoreError::UnknownProperty {
                object: object.name.clone(),
                property: property.to_string(),
            })
    }

    pub fn set(&mut self, handle: TargetHandle, property: &str, value: f64) -> Result<(), StoreError> {
        let object = self
            .slot_mut(handle)
            .and_then(|s| s.object.as_mut())
            .ok_or(StoreError::StaleHandle(handle))?;
        match object.properties.get_mut(property) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(StoreError::UnknownProperty {
                object: object.name.clone(),
                property: property.to_string(),
            }),
        }
    }

    /// 所有存活对象的属性快照，按名称排序
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.objects()
            .map(|o| (o.name.clone(), o.properties.clone()))
            .collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = &StoredObject> {
        self.slots.iter().filter_map(|s| s.object.as_ref())
    }

    pub fn len(&self) -> usize {
        self.objects().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, handle: TargetHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation() && s.object.is_some())
    }

    fn slot_mut(&mut self, handle: TargetHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation() && s.object.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_register_and_access() {
        let mut store = PropertyStore::new();
        let h = store.register("box", props(&[("x", 1.0)])).unwrap();

        assert_eq!(store.get(h, "x"), Ok(1.0));
        store.set(h, "x", 5.0).unwrap();
        assert_eq!(store.get(h, "x"), Ok(5.0));
        assert_eq!(store.find("box"), Some(h));
        assert_eq!(store.name_of(h), Some("box"));
    }

    #[test]
    fn test_unknown_property() {
        let mut store = PropertyStore::new();
        let h = store.register("box", props(&[("x", 1.0)])).unwrap();
        assert!(matches!(
            store.set(h, "y", 1.0),
            Err(StoreError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = PropertyStore::new();
        store.register("box", props(&[])).unwrap();
        assert_eq!(
            store.register("box", props(&[])),
            Err(StoreError::DuplicateName("box".to_string()))
        );
    }

    #[test]
    fn test_reused_slot_invalidates_old_handle() {
        let mut store = PropertyStore::new();
        let old = store.register("a", props(&[("x", 1.0)])).unwrap();
        store.unregister(old);

        // 同一槽位被新对象复用，代数不同
        let new = store.register("b", props(&[("x", 2.0)])).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);

        assert!(!store.is_alive(old));
        assert_eq!(store.set(old, "x", 9.0), Err(StoreError::StaleHandle(old)));
        assert_eq!(store.get(new, "x"), Ok(2.0));
    }

    #[test]
    fn test_snapshot_sorted() {
        let mut store = PropertyStore::new();
        store.register("b", props(&[("x", 1.0)])).unwrap();
        store.register("a", props(&[("y", 2.0)])).unwrap();

        let names: Vec<String> = store.snapshot().into_keys().collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.len(), 2);
    }
}
