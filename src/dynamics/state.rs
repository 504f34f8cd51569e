use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665;            // standard gravity, m/s^2
pub const EARTH_RADIUS: f64 = 6_378_135.0; // equatorial radius, m
pub const MU_EARTH: f64 = 3.986_004e14; // m^3/s^2
pub const OMEGA_EARTH: f64 = 7.292_115_9e-5; // rad/s
pub const P0: f64 = 101_325.0;          // sea-level pressure, Pa

// ---------------------------------------------------------------------------
// Central body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Earth {
    pub omega: f64, // rad/s
    pub r0: f64,    // m
    pub mu: f64,    // m^3/s^2
    pub g0: f64,    // m/s^2
    pub p0: f64,    // Pa
}

impl Default for Earth {
    fn default() -> Self {
        Earth { omega: OMEGA_EARTH, r0: EARTH_RADIUS, mu: MU_EARTH, g0: G0, p0: P0 }
    }
}

impl Earth {
    pub fn gravity(&self, r: f64) -> f64 {
        self.mu / (r * r)
    }

    pub fn altitude(&self, r: f64) -> f64 {
        r - self.r0
    }
}

// ---------------------------------------------------------------------------
// Planar point-mass state
// ---------------------------------------------------------------------------

/// State at one instant, velocity relative to the rotating Earth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub r: f64,      // m
    pub lambda: f64, // rad
    pub v: f64,      // m/s
    pub phi: f64,    // rad, flight-path angle
    pub m: f64,      // kg
}

impl State {
    pub const NAMES: [&'static str; 5] = ["r", "lambda", "v", "phi", "m"];

    pub fn apply(&self, d: &Deriv, dt: f64) -> State {
        State {
            r: self.r + d.r_dot * dt,
            lambda: self.lambda + d.lambda_dot * dt,
            v: self.v + d.v_dot * dt,
            phi: self.phi + d.phi_dot * dt,
            m: self.m + d.m_dot * dt,
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.r, self.lambda, self.v, self.phi, self.m]
    }

    pub fn from_array(a: [f64; 5]) -> State {
        State { r: a[0], lambda: a[1], v: a[2], phi: a[3], m: a[4] }
    }
}

/// Time derivative of a [`State`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Deriv {
    pub r_dot: f64,
    pub lambda_dot: f64,
    pub v_dot: f64,
    pub phi_dot: f64,
    pub m_dot: f64,
}

impl Deriv {
    /// RK4 blend `(k1 + 2 k2 + 2 k3 + k4) / 6`.
    pub fn blend(k1: &Deriv, k2: &Deriv, k3: &Deriv, k4: &Deriv) -> Deriv {
        let f = |a: f64, b: f64, c: f64, d: f64| (a + 2.0 * b + 2.0 * c + d) / 6.0;
        Deriv {
            r_dot: f(k1.r_dot, k2.r_dot, k3.r_dot, k4.r_dot),
            lambda_dot: f(k1.lambda_dot, k2.lambda_dot, k3.lambda_dot, k4.lambda_dot),
            v_dot: f(k1.v_dot, k2.v_dot, k3.v_dot, k4.v_dot),
            phi_dot: f(k1.phi_dot, k2.phi_dot, k3.phi_dot, k4.phi_dot),
            m_dot: f(k1.m_dot, k2.m_dot, k3.m_dot, k4.m_dot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_gravity_close_to_standard() {
        let e = Earth::default();
        assert!((e.gravity(e.r0) - G0).abs() < 0.02, "g(r0) = {}", e.gravity(e.r0));
    }

    #[test]
    fn apply_scales_derivative() {
        let s = State { r: 1.0, lambda: 0.0, v: 2.0, phi: 0.5, m: 10.0 };
        let d = Deriv { r_dot: 1.0, lambda_dot: 0.1, v_dot: -2.0, phi_dot: 0.0, m_dot: -4.0 };
        let n = s.apply(&d, 0.5);
        assert_eq!(n.as_array(), [1.5, 0.05, 1.0, 0.5, 8.0]);
    }
}
