/// Speed of a circular orbit of radius `r`.
pub fn circular_velocity(mu: f64, r: f64) -> f64 {
    (mu / r).sqrt()
}

/// Circularization burn at apogee of an orbit with radii `(ra, rp)`.
///
/// Returns `(delta_v2, d/dra, d/drp)`. The burn is the second half of a
/// Hohmann ascent: the first half is flown, the coast to apogee and this
/// burn are solved analytically.
pub fn circularization(mu: f64, ra: f64, rp: f64) -> (f64, f64, f64) {
    let s = ra + rp;
    let g = 2.0 * mu * rp / (ra * s);
    let v_apo = g.sqrt();
    let v_circ = circular_velocity(mu, ra);

    let dg_dra = -2.0 * mu * rp * (2.0 * ra + rp) / (ra * ra * s * s);
    let dg_drp = 2.0 * mu / (s * s);
    (
        v_circ - v_apo,
        -0.5 * v_circ / ra - dg_dra / (2.0 * v_apo),
        -dg_drp / (2.0 * v_apo),
    )
}

/// Mass left after a burn of `dv` by the rocket equation.
///
/// Returns `(m_final, d/dm0, d/ddv, d/disp)`.
pub fn rocket_equation(m0: f64, dv: f64, isp: f64, g0: f64) -> (f64, f64, f64, f64) {
    let ve = isp * g0;
    let ratio = (-dv / ve).exp();
    let m = m0 * ratio;
    (m, ratio, -m / ve, m * dv / (isp * ve))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::{EARTH_RADIUS, MU_EARTH};

    #[test]
    fn circular_orbit_needs_no_burn() {
        let (dv, ..) = circularization(3.986e14, 6.778e6, 6.778e6);
        assert!(dv.abs() < 1e-9, "delta_v2 = {}", dv);
    }

    #[test]
    fn leo_to_geo_apogee_burn() {
        // second Hohmann burn from 200 km to GEO is about 1.47 km/s
        let (dv, ..) = circularization(MU_EARTH, 42_164_000.0, EARTH_RADIUS + 200e3);
        assert!(dv > 1400.0 && dv < 1550.0, "apogee burn {:.0} m/s", dv);
    }

    #[test]
    fn partials_match_finite_differences() {
        let (ra, rp) = (EARTH_RADIUS + 410e3, EARTH_RADIUS + 150e3);
        let (_, d_ra, d_rp) = circularization(MU_EARTH, ra, rp);
        let h = 1.0;
        let fd_ra = (circularization(MU_EARTH, ra + h, rp).0 - circularization(MU_EARTH, ra - h, rp).0) / (2.0 * h);
        let fd_rp = (circularization(MU_EARTH, ra, rp + h).0 - circularization(MU_EARTH, ra, rp - h).0) / (2.0 * h);
        assert!((d_ra - fd_ra).abs() < 1e-8, "{} vs {}", d_ra, fd_ra);
        assert!((d_rp - fd_rp).abs() < 1e-8, "{} vs {}", d_rp, fd_rp);

        let (m, d_m0, d_dv, d_isp) = rocket_equation(20_000.0, 75.0, 340.0, 9.80665);
        assert!(m < 20_000.0);
        assert!((d_m0 - m / 20_000.0).abs() < 1e-15);
        let fd = (rocket_equation(20_000.0, 75.0 + 1e-3, 340.0, 9.80665).0
            - rocket_equation(20_000.0, 75.0 - 1e-3, 340.0, 9.80665).0)
            / 2e-3;
        assert!((d_dv - fd).abs() < 1e-6);
        assert!(d_isp > 0.0);
    }
}
