//! 笛卡尔空间位姿类型
//!
//! 提供末端执行器的 6 自由度位姿表示（位置 + 四元数姿态）。
//!
//! # 设计目标
//!
//! - **值语义**: 所有类型均为 `Copy`，按分量运算组合
//! - **数值稳定**: 四元数归一化防止 NaN 传播
//! - **易用转换**: 欧拉角 ↔ 四元数
//!
//! # 示例
//!
//! ```rust
//! use teleop_types::{Pose, Quaternion};
//!
//! // 创建位姿
//! let pose = Pose::from_position_euler(
//!     0.5, 0.0, 0.3,  // x, y, z (米)
//!     0.0, 0.0, 1.57, // roll, pitch, yaw (弧度)
//! );
//!
//! // 四元数转欧拉角
//! let (roll, pitch, yaw) = pose.orientation.to_euler();
//! assert!((yaw - 1.57).abs() < 1e-9);
//! # let _ = (roll, pitch);
//! ```

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// 四元数归一化阈值（避免除零）
///
/// 当四元数的模平方小于此值时，归一化会返回单位四元数。
const QUATERNION_NORM_THRESHOLD: f64 = 1e-10;

/// 插值时视为同一姿态的半角正弦阈值
const SLERP_MIN_SIN: f64 = 1e-15;

/// 三维位置向量（米）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position3D {
    /// X 坐标（米）
    pub x: f64,
    /// Y 坐标（米）
    pub y: f64,
    /// Z 坐标（米）
    pub z: f64,
}

impl Position3D {
    /// 创建新的三维位置
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position3D { x, y, z }
    }

    /// 零向量
    pub const ZERO: Self = Position3D::new(0.0, 0.0, 0.0);

    /// 计算向量长度（范数）
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// 点积
    pub fn dot(&self, other: &Position3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 叉积
    pub fn cross(&self, other: &Position3D) -> Position3D {
        Position3D {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// 三个分量是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 按轴取出分量（0 = x, 1 = y, 2 = z）
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// 从数组构造
    pub const fn from_array(v: [f64; 3]) -> Self {
        Position3D::new(v[0], v[1], v[2])
    }
}

impl Add for Position3D {
    type Output = Position3D;

    fn add(self, rhs: Position3D) -> Position3D {
        Position3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position3D {
    type Output = Position3D;

    fn sub(self, rhs: Position3D) -> Position3D {
        Position3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position3D {
    type Output = Position3D;

    fn mul(self, k: f64) -> Position3D {
        Position3D::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Neg for Position3D {
    type Output = Position3D;

    fn neg(self) -> Position3D {
        Position3D::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Position3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// 四元数（用于表示3D旋转）
///
/// 四元数避免了欧拉角的万向节锁问题。位姿中的四元数始终保持单位长度，
/// 任何组合运算之后都应调用 [`Quaternion::normalize`]。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    /// 实部
    pub w: f64,
    /// 虚部 i
    pub x: f64,
    /// 虚部 j
    pub y: f64,
    /// 虚部 k
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

impl Quaternion {
    /// 单位四元数（无旋转）
    pub const IDENTITY: Self = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// 直接由分量创建（不做归一化）
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Quaternion { w, x, y, z }
    }

    /// 从欧拉角创建四元数（Roll-Pitch-Yaw, ZYX顺序，弧度）
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let cr = (roll / 2.0).cos();
        let sr = (roll / 2.0).sin();
        let cp = (pitch / 2.0).cos();
        let sp = (pitch / 2.0).sin();
        let cy = (yaw / 2.0).cos();
        let sy = (yaw / 2.0).sin();

        Quaternion {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    /// 从旋转轴和角度创建（轴无需归一化；零轴返回单位四元数）
    pub fn from_axis_angle(axis: Position3D, angle: f64) -> Self {
        let n = axis.norm();
        if n < QUATERNION_NORM_THRESHOLD {
            return Quaternion::IDENTITY;
        }
        let s = (angle / 2.0).sin() / n;
        Quaternion {
            w: (angle / 2.0).cos(),
            x: axis.x * s,
            y: axis.y * s,
            z: axis.z * s,
        }
    }

    /// 转换为欧拉角（Roll-Pitch-Yaw）
    ///
    /// 返回 `(roll, pitch, yaw)`，单位弧度
    pub fn to_euler(self) -> (f64, f64, f64) {
        // Roll (x-axis rotation)
        let sinr_cosp = 2.0 * (self.w * self.x + self.y * self.z);
        let cosr_cosp = 1.0 - 2.0 * (self.x * self.x + self.y * self.y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        // Pitch (y-axis rotation)
        let sinp = 2.0 * (self.w * self.y - self.z * self.x);
        let pitch = if sinp.abs() >= 1.0 {
            // Gimbal lock
            std::f64::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        // Yaw (z-axis rotation)
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        (roll, pitch, yaw)
    }

    /// 模的平方
    pub fn norm_squared(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// 归一化（确保单位四元数）
    ///
    /// # 数值稳定性
    ///
    /// 如果四元数的模接近 0（< 1e-10），返回默认单位四元数 (1, 0, 0, 0)
    /// 以避免除零错误和 NaN 扩散。
    pub fn normalize(&self) -> Self {
        let norm_sq = self.norm_squared();

        if norm_sq < QUATERNION_NORM_THRESHOLD {
            tracing::warn!(
                "Normalizing near-zero quaternion (norm²={:.2e} < {:.2e}): {}, returning identity",
                norm_sq,
                QUATERNION_NORM_THRESHOLD,
                self
            );
            return Quaternion::IDENTITY;
        }

        let norm = norm_sq.sqrt();
        Quaternion {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// 四元数乘法（组合旋转）
    ///
    /// `a.multiply(&b)` 表示先施加 `b` 再施加 `a`（世界系左乘）。
    pub fn multiply(&self, other: &Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        }
    }

    /// 共轭（单位四元数时即逆旋转）
    pub fn conjugate(&self) -> Quaternion {
        Quaternion {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// 四维点积
    pub fn dot(&self, other: &Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 两个姿态之间的最短旋转角（弧度，范围 `[0, π]`）
    ///
    /// `q` 与 `-q` 表示同一姿态。用 `atan2` 而不是 `acos`，
    /// 在接近零角度时仍保持精度。
    pub fn angle_to(&self, other: &Quaternion) -> f64 {
        let r = self.normalize().conjugate().multiply(&other.normalize());
        let v = (r.x * r.x + r.y * r.y + r.z * r.z).sqrt();
        2.0 * v.atan2(r.w.abs())
    }

    /// 球面线性插值（最短路径）
    ///
    /// `t = 0` 返回 `self`，`t = 1` 返回 `other`（或其等价的 `-other`）。
    /// 结果与 `self` 的夹角严格等于 `t × self.angle_to(other)`。
    pub fn slerp(&self, other: &Quaternion, t: f64) -> Quaternion {
        let a = self.normalize();
        let mut r = a.conjugate().multiply(&other.normalize());
        if r.w < 0.0 {
            r = Quaternion::new(-r.w, -r.x, -r.y, -r.z);
        }

        let v = (r.x * r.x + r.y * r.y + r.z * r.z).sqrt();
        if v < SLERP_MIN_SIN {
            return a;
        }

        let half = v.atan2(r.w) * t;
        let s = half.sin() / v;
        let step = Quaternion::new(half.cos(), r.x * s, r.y * s, r.z * s);
        a.multiply(&step).normalize()
    }

    /// 用此旋转变换一个向量
    pub fn rotate(&self, v: Position3D) -> Position3D {
        let u = Position3D::new(self.x, self.y, self.z);
        let t = u.cross(&v) * 2.0;
        v + t * self.w + u.cross(&t)
    }

    /// 四个分量是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Q({:.3}, {:.3}, {:.3}, {:.3})",
            self.w, self.x, self.y, self.z
        )
    }
}

/// 末端执行器位姿（位置 + 姿态）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    /// 位置（米，世界坐标系）
    pub position: Position3D,
    /// 姿态（单位四元数）
    pub orientation: Quaternion,
}

impl Pose {
    /// 从位置和四元数创建
    pub const fn new(position: Position3D, orientation: Quaternion) -> Self {
        Pose {
            position,
            orientation,
        }
    }

    /// 从位置和欧拉角创建
    pub fn from_position_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Pose {
            position: Position3D::new(x, y, z),
            orientation: Quaternion::from_euler(roll, pitch, yaw),
        }
    }

    /// 纯平移位姿（无旋转）
    pub const fn from_position(x: f64, y: f64, z: f64) -> Self {
        Pose::new(Position3D::new(x, y, z), Quaternion::IDENTITY)
    }

    /// 零位姿（原点，无旋转）
    pub const ZERO: Self = Pose {
        position: Position3D::ZERO,
        orientation: Quaternion::IDENTITY,
    };

    /// 所有分量是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }

    /// 线位移距离（米）
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position - self.position).norm()
    }

    /// 在容差内比较两个位姿（位置距离和姿态角都不超过 `tolerance`）
    pub fn approx_eq(&self, other: &Pose, tolerance: f64) -> bool {
        self.distance_to(other) <= tolerance
            && self.orientation.angle_to(&other.orientation) <= tolerance
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose(pos: {}, quat: {})",
            self.position, self.orientation
        )
    }
}
