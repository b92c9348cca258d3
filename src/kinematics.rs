//! Three- and four-vectors with the handful of operations the phase-space construction and the
//! integrand need.
//!
//! Four-vectors use the metric $(+,-,-,-)$ and store their components as `(t, x, y, z)`.

use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A spatial vector.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Vector3<T> {
    /// x component
    pub x: T,
    /// y component
    pub y: T,
    /// z component
    pub z: T,
}

impl<T: Float> Vector3<T> {
    /// Constructor.
    #[inline]
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    /// The unit vector with polar angle $\theta = \arccos(\cos\theta)$ and azimuth $\phi$.
    #[inline]
    pub fn from_cos_theta_phi(cos_theta: T, phi: T) -> Self {
        let sin_theta = (T::one() - cos_theta * cos_theta).max(T::zero()).sqrt();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Self::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
    }

    /// Euclidean scalar product.
    #[inline]
    pub fn dot(&self, other: &Self) -> T {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared length.
    #[inline]
    pub fn mag2(&self) -> T {
        self.dot(self)
    }

    /// Length.
    #[inline]
    pub fn mag(&self) -> T {
        self.mag2().sqrt()
    }

    /// Returns the vector scaled to unit length. The null vector is returned unchanged.
    pub fn unit(&self) -> Self {
        let mag = self.mag();
        if mag > T::zero() {
            *self * mag.recip()
        } else {
            *self
        }
    }

    /// Transverse component.
    #[inline]
    pub fn pt(&self) -> T {
        self.x.hypot(self.y)
    }

    /// Azimuth in $(-\pi, \pi]$.
    #[inline]
    pub fn phi(&self) -> T {
        if self.x == T::zero() && self.y == T::zero() {
            T::zero()
        } else {
            self.y.atan2(self.x)
        }
    }

    /// Cosine of the polar angle.
    #[inline]
    pub fn cos_theta(&self) -> T {
        let mag = self.mag();
        if mag > T::zero() {
            self.z / mag
        } else {
            T::one()
        }
    }

    /// Pseudo-rapidity, $\eta = -\ln \tan (\theta/2)$.
    pub fn eta(&self) -> T {
        let pt = self.pt();
        if pt > T::zero() {
            (self.z / pt).asinh()
        } else if self.z >= T::zero() {
            T::infinity()
        } else {
            T::neg_infinity()
        }
    }

    /// The angle between `self` and `other` in $[0, \pi]$.
    pub fn angle(&self, other: &Self) -> T {
        let norm = (self.mag2() * other.mag2()).sqrt();
        if norm > T::zero() {
            (self.dot(other) / norm).max(-T::one()).min(T::one()).acos()
        } else {
            T::zero()
        }
    }
}

impl<T: Float> Add for Vector3<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl<T: Float> Sub for Vector3<T> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl<T: Float> Neg for Vector3<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl<T: Float> Mul<T> for Vector3<T> {
    type Output = Self;

    fn mul(self, factor: T) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// A four-momentum.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LorentzVector<T> {
    /// Energy
    pub t: T,
    /// x component of the momentum
    pub x: T,
    /// y component of the momentum
    pub y: T,
    /// z component of the momentum
    pub z: T,
}

impl<T: Float + fmt::Display> fmt::Display for LorentzVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(t:{}, x:{}, y:{}, z:{})",
            self.t, self.x, self.y, self.z
        )
    }
}

impl<T: Float> LorentzVector<T> {
    /// Constructs the vector from its components.
    #[inline]
    pub fn from_args(t: T, x: T, y: T, z: T) -> Self {
        Self { t, x, y, z }
    }

    /// A particle of mass `mass` and energy `energy` moving along the unit vector `dir`. The energy
    /// is raised to the mass if it is smaller.
    pub fn from_direction(dir: &Vector3<T>, energy: T, mass: T) -> Self {
        let energy = energy.max(mass);
        let p = (energy * energy - mass * mass).sqrt();
        Self::from_args(energy, dir.x * p, dir.y * p, dir.z * p)
    }

    /// Constructs a four-momentum from transverse momentum, pseudo-rapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: T, eta: T, phi: T, mass: T) -> Self {
        let pt = pt.abs();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (x, y, z) = (pt * cos_phi, pt * sin_phi, pt * eta.sinh());
        let t = (x * x + y * y + z * z + mass * mass).sqrt();
        Self::from_args(t, x, y, z)
    }

    /// Constructs a four-momentum from its spatial part and its mass.
    pub fn from_momentum_mass(p: &Vector3<T>, mass: T) -> Self {
        Self::from_args((p.mag2() + mass * mass).sqrt(), p.x, p.y, p.z)
    }

    /// The spatial part.
    #[inline]
    pub fn vect(&self) -> Vector3<T> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Minkowski square, $p^2$.
    #[inline]
    pub fn square(&self) -> T {
        self.t * self.t - self.x * self.x - self.y * self.y - self.z * self.z
    }

    /// Minkowski scalar product.
    #[inline]
    pub fn dot(&self, other: &Self) -> T {
        self.t * other.t - self.x * other.x - self.y * other.y - self.z * other.z
    }

    /// Squared length of the spatial part.
    #[inline]
    pub fn spatial_squared(&self) -> T {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length of the spatial part.
    #[inline]
    pub fn spatial_distance(&self) -> T {
        self.spatial_squared().sqrt()
    }

    /// Invariant mass. Space-like vectors return the negative square root of $|p^2|$.
    pub fn mass(&self) -> T {
        let m2 = self.square();
        if m2 < T::zero() {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    /// Transverse momentum.
    #[inline]
    pub fn pt(&self) -> T {
        self.x.hypot(self.y)
    }

    /// Pseudo-rapidity.
    #[inline]
    pub fn eta(&self) -> T {
        self.vect().eta()
    }

    /// Azimuth.
    #[inline]
    pub fn phi(&self) -> T {
        self.vect().phi()
    }

    /// Velocity, $|\vec{p}|/E$.
    #[inline]
    pub fn beta(&self) -> T {
        self.spatial_distance() / self.t
    }

    /// Boosts the vector by the velocity `beta`.
    pub fn boost(&self, beta: &Vector3<T>) -> Self {
        let b2 = beta.mag2();
        let gamma = (T::one() - b2).sqrt().recip();
        let bp = beta.dot(&self.vect());
        let gamma2 = if b2 > T::zero() {
            (gamma - T::one()) / b2
        } else {
            T::zero()
        };
        let factor = gamma2 * bp + gamma * self.t;
        Self::from_args(
            gamma * (self.t + bp),
            beta.x.mul_add(factor, self.x),
            beta.y.mul_add(factor, self.y),
            beta.z.mul_add(factor, self.z),
        )
    }
}

impl<T: Float> Add for LorentzVector<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::from_args(
            self.t + other.t,
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
        )
    }
}

impl<T: Float> AddAssign for LorentzVector<T> {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl<T: Float> Sub for LorentzVector<T> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::from_args(
            self.t - other.t,
            self.x - other.x,
            self.y - other.y,
            self.z - other.z,
        )
    }
}

/// Wraps an azimuth into $(-\pi, \pi]$.
pub fn wrap_phi<T: Float>(phi: T) -> T {
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let two_pi = pi + pi;
    if phi > pi {
        phi - two_pi
    } else if phi <= -pi {
        phi + two_pi
    } else {
        phi
    }
}
