//! # Target 模块
//!
//! 补间目标句柄。
//!
//! 句柄由外部对象仓库分配，补间系统只把它当作可比较的不透明值，
//! 从不解引用。真正的写入由调用方提供的 action 回调完成。

use std::fmt;

/// 目标句柄
///
/// `index` 指向外部仓库的槽位，`generation` 在槽位被回收复用时递增，
/// 仓库据此判断句柄是否已经过期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

impl TargetHandle {
    /// 空句柄：对应的 TweenData 会立即完成，不会调用 action
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// 计数器补间使用的独立目标，不对应任何外部对象
    pub const DETACHED: Self = Self {
        index: u32::MAX - 1,
        generation: 0,
    };

    /// 创建句柄（由外部仓库调用）
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// 槽位索引
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// 代数
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// 是否为空句柄
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// 是否为计数器目标
    pub fn is_detached(&self) -> bool {
        *self == Self::DETACHED
    }
}

impl Default for TargetHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Target(null)")
        } else if self.is_detached() {
            write!(f, "Target(detached)")
        } else {
            write!(f, "Target({}v{})", self.index, self.generation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_equality() {
        let a = TargetHandle::new(3, 1);
        let b = TargetHandle::new(3, 1);
        let stale = TargetHandle::new(3, 0);

        assert_eq!(a, b);
        // 同一槽位不同代数视为不同目标
        assert_ne!(a, stale);
        assert_eq!(a.index(), 3);
        assert_eq!(a.generation(), 1);
    }

    #[test]
    fn test_sentinels() {
        assert!(TargetHandle::NULL.is_null());
        assert!(!TargetHandle::DETACHED.is_null());
        assert!(TargetHandle::DETACHED.is_detached());
        assert_eq!(TargetHandle::default(), TargetHandle::NULL);
        assert_eq!(TargetHandle::NULL.to_string(), "Target(null)");
        assert_eq!(TargetHandle::new(2, 5).to_string(), "Target(2v5)");
    }
}
