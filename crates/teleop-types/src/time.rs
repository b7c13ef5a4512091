//! 单调时间戳
//!
//! **App Start Relative Time Pattern**:
//! - 以进程内第一次访问时刻为锚点的单调时间
//! - 不受系统时钟调整（NTP、手动修改）影响
//! - 以微秒 `u64` 表示，纯组件以参数形式接收，便于确定性测试

use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// 全局单调时间锚点（首次访问时设置，之后不再改变）
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 单调时间戳（微秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// 时间零点
    pub const ZERO: Self = Timestamp(0);

    /// 当前单调时间（相对进程锚点）
    pub fn now() -> Self {
        let start = APP_START.get_or_init(Instant::now);
        Timestamp(start.elapsed().as_micros() as u64)
    }

    /// 从毫秒创建
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms * 1_000)
    }

    /// 从微秒创建
    pub const fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    /// 微秒值
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// 距 `earlier` 的时长（`earlier` 更晚时饱和为 0）
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// 向后偏移
    pub fn saturating_add(self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(d.as_micros() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}s", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_time_always_increases() {
        let t1 = Timestamp::now();
        thread::sleep(Duration::from_millis(10));
        let t2 = Timestamp::now();

        assert!(t2 > t1, "Monotonic time should always increase");
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(600);
        assert_eq!(
            late.saturating_duration_since(early),
            Duration::from_millis(500)
        );
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_saturating_add() {
        let t = Timestamp::from_millis(1).saturating_add(Duration::from_micros(5));
        assert_eq!(t.as_micros(), 1_005);
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::from_micros(1_500_042).to_string(), "1.500042s");
    }
}
