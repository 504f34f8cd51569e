//! Tank geometry of a stage with two stacked tanks and ellipsoidal domes.

use std::f64::consts::PI;

use crate::error::Result;
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

const DOME_RATIO: f64 = 0.3; // dome height / diameter
const SKIRT: f64 = 0.5; // m, added to the stack length

/// Surface of one dome by Knud Thomsen's ellipsoid approximation.
///
/// Both semi-axes scale with `d`, so the result is `k·d²`.
pub fn dome_surface(d: f64, p: f64) -> f64 {
    let r = d / 2.0;
    let h = DOME_RATIO * d;
    4.0 * PI * ((r.powf(2.0 * p) + 2.0 * r.powf(p) * h.powf(p)) / 3.0).powf(1.0 / p)
}

/// Combined volume of the two domes of one tank.
fn dome_volume(d: f64) -> f64 {
    4.0 / 3.0 * PI * (d / 2.0).powi(2) * DOME_RATIO * d
}

// ---------------------------------------------------------------------------
// Tank volumes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TankVolume {
    pub mu_f: f64,   // kg/m³, fuel
    pub mu_lox: f64, // kg/m³
}

impl Component for TankVolume {
    fn name(&self) -> &str {
        "tank_volume"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("o_f", ""), PortSpec::scalar("mp", "kg")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("V_F", "m**3"), PortSpec::scalar("V_LOX", "m**3")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new()
            .declare_all("V_F", &["o_f", "mp"], Pattern::Single)
            .declare_all("V_LOX", &["o_f", "mp"], Pattern::Single)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let o_f = inputs.scalar(self.name(), "o_f")?;
        let mp = inputs.scalar(self.name(), "mp")?;
        Ok(Values::new()
            .with_scalar("V_F", mp / (self.mu_f * (1.0 + o_f)))
            .with_scalar("V_LOX", o_f * mp / (self.mu_lox * (1.0 + o_f))))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let o_f = inputs.scalar(self.name(), "o_f")?;
        let mp = inputs.scalar(self.name(), "mp")?;
        let k = 1.0 + o_f;
        p.set("V_F", "mp", 0, 1.0 / (self.mu_f * k));
        p.set("V_F", "o_f", 0, -mp / (self.mu_f * k * k));
        p.set("V_LOX", "mp", 0, o_f / (self.mu_lox * k));
        p.set("V_LOX", "o_f", 0, mp / (self.mu_lox * k * k));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Surfaces and length
// ---------------------------------------------------------------------------

/// Tank surfaces, exterior surface and stack length from propellant load.
#[derive(Debug, Clone)]
pub struct TankSizing {
    pub mu_f: f64,
    pub mu_lox: f64,
    pub knud_p: f64,
}

struct Sized {
    s_ox: f64,
    s_f: f64,
    s_dome: f64,
    s_ext: f64,
    length: f64,
    // [d/dmp, d/do_f, d/dD]
    d_s_ox: [f64; 3],
    d_s_f: [f64; 3],
    d_s_dome: [f64; 3],
    d_s_ext: [f64; 3],
    d_length: [f64; 3],
}

impl TankSizing {
    fn size(&self, mp: f64, o_f: f64, d: f64) -> Sized {
        let k = 1.0 + o_f;
        let v_f = mp / (k * self.mu_f);
        let v_ox = (mp - mp / k) / self.mu_lox;
        let dv_f = [1.0 / (k * self.mu_f), -mp / (k * k * self.mu_f), 0.0];
        let dv_ox = [o_f / (k * self.mu_lox), mp / (k * k * self.mu_lox), 0.0];

        let vd = dome_volume(d);
        let dvd = 0.3 * PI * d * d; // = 3·vd/d
        let s_dome = dome_surface(d, self.knud_p);
        let ds_dome = 2.0 * s_dome / d;

        let area = PI * d * d / 4.0;
        let darea = PI * d / 2.0;

        // L_virole·area + S_dome collapses to V − vd + S_dome
        let s_ox = v_ox - vd + s_dome;
        let s_f = v_f - vd + s_dome;

        let cyl = v_ox + v_f - 2.0 * vd;
        let length = cyl / area + 4.0 * DOME_RATIO * d + SKIRT;
        let d_length = [
            (dv_ox[0] + dv_f[0]) / area,
            (dv_ox[1] + dv_f[1]) / area,
            -2.0 * dvd / area - cyl * darea / (area * area) + 4.0 * DOME_RATIO,
        ];
        let s_ext = PI * d * length;
        let d_s_ext = [PI * d * d_length[0], PI * d * d_length[1], PI * length + PI * d * d_length[2]];

        Sized {
            s_ox,
            s_f,
            s_dome,
            s_ext,
            length,
            d_s_ox: [dv_ox[0], dv_ox[1], ds_dome - dvd],
            d_s_f: [dv_f[0], dv_f[1], ds_dome - dvd],
            d_s_dome: [0.0, 0.0, ds_dome],
            d_s_ext,
            d_length,
        }
    }

    fn read(&self, inputs: &Values) -> Result<Sized> {
        Ok(self.size(
            inputs.scalar(self.name(), "mp")?,
            inputs.scalar(self.name(), "o_f")?,
            inputs.scalar(self.name(), "D")?,
        ))
    }
}

const SIZING_OUTPUTS: [&str; 6] = ["S_OX", "S_F", "S_totale", "S_dome", "S_exterieur", "L_total"];

impl Component for TankSizing {
    fn name(&self) -> &str {
        "sizing"
    }

    fn num_nodes(&self) -> usize {
        1
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::scalar("mp", "kg"), PortSpec::scalar("o_f", ""), PortSpec::scalar("D", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::scalar("S_OX", "m**2"),
            PortSpec::scalar("S_F", "m**2"),
            PortSpec::scalar("S_totale", "m**2"),
            PortSpec::scalar("S_dome", "m**2"),
            PortSpec::scalar("S_exterieur", "m**2"),
            PortSpec::scalar("L_total", "m"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SIZING_OUTPUTS.into_iter().fold(SparsityTemplate::new(), |t, of| {
            if of == "S_dome" {
                t.declare(of, "D", Pattern::Single)
            } else {
                t.declare_all(of, &["mp", "o_f", "D"], Pattern::Single)
            }
        })
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let s = self.read(inputs)?;
        Ok(Values::new()
            .with_scalar("S_OX", s.s_ox)
            .with_scalar("S_F", s.s_f)
            .with_scalar("S_totale", s.s_ox + s.s_f)
            .with_scalar("S_dome", s.s_dome)
            .with_scalar("S_exterieur", s.s_ext)
            .with_scalar("L_total", s.length))
    }

    fn compute_partials(&self, inputs: &Values, p: &mut Partials) -> Result<()> {
        let s = self.read(inputs)?;
        let total: Vec<f64> = s.d_s_ox.iter().zip(&s.d_s_f).map(|(a, b)| a + b).collect();
        for (k, wrt) in ["mp", "o_f", "D"].into_iter().enumerate() {
            p.set("S_OX", wrt, 0, s.d_s_ox[k]);
            p.set("S_F", wrt, 0, s.d_s_f[k]);
            p.set("S_totale", wrt, 0, total[k]);
            p.set("S_exterieur", wrt, 0, s.d_s_ext[k]);
            p.set("L_total", wrt, 0, s.d_length[k]);
        }
        p.set("S_dome", "D", 0, s.d_s_dome[2]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    fn sizing() -> TankSizing {
        TankSizing { mu_f: 810.0, mu_lox: 1141.0, knud_p: 1.6075 }
    }

    #[test]
    fn dome_surface_scales_with_diameter_squared() {
        let p = 1.6075;
        let (s2, s4) = (dome_surface(2.0, p), dome_surface(4.0, p));
        assert!((s4 / s2 - 4.0).abs() < 1e-12);
        // an oblate dome lies between the flat disc pair and the sphere
        let r: f64 = 1.0;
        assert!(s2 > 2.0 * PI * r * r && s2 < 4.0 * PI * r * r, "dome surface {}", s2);
    }

    #[test]
    fn reference_stage_geometry() {
        let out = sizing()
            .compute(&Values::new().with_scalar("mp", 250_951.47).with_scalar("o_f", 2.3133).with_scalar("D", 4.9973))
            .unwrap();
        let length = out.first("L_total").unwrap();
        assert!(length > 12.0 && length < 30.0, "stack length {}", length);
        assert!(out.first("S_exterieur").unwrap() > out.first("S_totale").unwrap() / 2.0);
    }

    #[test]
    fn geometry_partials_match_finite_differences() {
        let inputs = Values::new()
            .with_scalar("mp", 250_000.0)
            .with_scalar("o_f", 2.4)
            .with_scalar("D", 4.6);
        for comp in [&sizing() as &dyn Component, &TankVolume { mu_f: 810.0, mu_lox: 1141.0 }] {
            for c in check_partials(comp, &inputs, 1e-6).unwrap() {
                assert!(c.declared && c.passes(1e-6), "{}: {:?}", comp.name(), c);
            }
        }
    }
}
