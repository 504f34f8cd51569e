use std::sync::OnceLock;

use log::debug;

use crate::error::Result;
use crate::interp::{akima::akima_sorted, PiecewiseCubic};
use crate::jacobian::{Component, Partials, Pattern, PortSpec, SparsityTemplate, Values};

// ---------------------------------------------------------------------------
// Tewari standard atmosphere (1976/1962 U.S. standard), 0 to 2000 km
// ---------------------------------------------------------------------------

const R_GAS: f64 = 287.0;       // J/(kg·K)
const G_TEWARI: f64 = 9.806;    // m/s^2
const T_SL: f64 = 288.15;       // K
const P_SL: f64 = 1.01325e5;    // Pa
const R_E: f64 = 6378.14e3;     // m
const B: f64 = 2.0 / R_E;       // gravity-variation coefficient, 1/m
const GAMMA_AIR: f64 = 1.4;

const LAYERS: usize = 21;

const Z: [f64; LAYERS + 1] = [
    0.0, 11019.1, 20063.1, 32161.9, 47350.1, 51412.5, 71802.0, 86000.0, 100000.0, 110000.0,
    120000.0, 150000.0, 160000.0, 170000.0, 190000.0, 230000.0, 300000.0, 400000.0, 500000.0,
    600000.0, 700000.0, 2000000.0,
];

const T: [f64; LAYERS + 1] = [
    288.15, 216.65, 216.65, 228.65, 270.65, 270.65, 214.65, 186.946, 210.02, 260.65, 360.65,
    960.65, 1110.60, 1210.65, 1350.65, 1550.65, 1830.65, 2160.65, 2420.65, 2590.65, 2700.0,
    2700.0,
];

// K/m
const LAPSE: [f64; LAYERS] = [
    -6.5e-3, 0.0, 1e-3, 2.8e-3, 0.0, -2.8e-3, -2e-3, 1.693e-3, 5e-3, 1e-2, 2e-2, 1.5e-2, 1e-2,
    7e-3, 5e-3, 4e-3, 3.3e-3, 2.6e-3, 1.7e-3, 1.1e-3, 0.0,
];

const TABLE_TOP: f64 = 1999e3; // m
const TABLE_STEP: f64 = 1e3;   // m

/// Temperature, pressure and density from `layer` base values at altitude `h`.
fn layer_state(layer: usize, h: f64, p_base: f64, rho_base: f64) -> (f64, f64, f64) {
    let (z, t, lr) = (Z[layer], T[layer], LAPSE[layer]);
    if lr != 0.0 {
        let tm = t + lr * (h - z);
        let c1 = 1.0 + B * (t / lr - z);
        let c2 = c1 * G_TEWARI / (R_GAS * lr);
        let c3 = tm / t;
        let c5 = (B * G_TEWARI * (h - z) / (R_GAS * lr)).exp();
        (tm, p_base * c3.powf(-c2) * c5, rho_base * c5 * c3.powf(-(c2 + 1.0)))
    } else {
        let c8 = -G_TEWARI * (h - z) * (1.0 - B * (h + z) / 2.0) / (R_GAS * t);
        (t, p_base * c8.exp(), rho_base * c8.exp())
    }
}

/// Pressure and density at every layer base.
fn layer_bases() -> ([f64; LAYERS + 1], [f64; LAYERS + 1]) {
    let mut p = [0.0; LAYERS + 1];
    let mut rho = [0.0; LAYERS + 1];
    p[0] = P_SL;
    rho[0] = P_SL / (R_GAS * T_SL);
    for i in 0..LAYERS {
        let lr = LAPSE[i];
        if lr != 0.0 {
            // bases use the tabulated temperature ratio, not the lapse-rate one
            let c1 = 1.0 + B * (T[i] / lr - Z[i]);
            let c2 = c1 * G_TEWARI / (R_GAS * lr);
            let c3 = T[i + 1] / T[i];
            let c5 = (B * G_TEWARI * (Z[i + 1] - Z[i]) / (R_GAS * lr)).exp();
            p[i + 1] = p[i] * c3.powf(-c2) * c5;
            rho[i + 1] = rho[i] * c5 * c3.powf(-(c2 + 1.0));
        } else {
            let (_, pi, ri) = layer_state(i, Z[i + 1], p[i], rho[i]);
            p[i + 1] = pi;
            rho[i + 1] = ri;
        }
    }
    (p, rho)
}

/// Exact layered model: `(T [K], P [Pa], rho [kg/m^3])` at altitude `h`.
/// Altitudes at or above 2000 km use the top layer.
pub fn tewari(h: f64) -> (f64, f64, f64) {
    let (p, rho) = layer_bases();
    let layer = (0..LAYERS).find(|&i| h < Z[i + 1]).unwrap_or(LAYERS - 1);
    layer_state(layer, h, p[layer], rho[layer])
}

// ---------------------------------------------------------------------------
// Interpolated table
// ---------------------------------------------------------------------------

/// Atmospheric state and altitude derivatives at one point.
#[derive(Debug, Clone, Copy)]
pub struct AtmoSample {
    pub temperature: f64,  // K
    pub pressure: f64,     // Pa
    pub density: f64,      // kg/m^3
    pub sound_speed: f64,  // m/s
    pub dp_dh: f64,        // Pa/m
    pub drho_dh: f64,      // kg/m^4
    pub d2rho_dh2: f64,    // kg/m^5
    pub dsos_dh: f64,      // 1/s
}

/// Tewari model sampled every kilometre and Akima-interpolated per column.
#[derive(Debug, Clone)]
pub struct Atmosphere {
    temperature: PiecewiseCubic,
    pressure: PiecewiseCubic,
    density: PiecewiseCubic,
}

impl Atmosphere {
    pub fn tewari() -> Self {
        let (p_base, rho_base) = layer_bases();
        let n = (TABLE_TOP / TABLE_STEP) as usize + 1;
        let alt: Vec<f64> = (0..n).map(|i| i as f64 * TABLE_STEP).collect();

        let mut t = Vec::with_capacity(n);
        let mut p = Vec::with_capacity(n);
        let mut rho = Vec::with_capacity(n);
        let mut layer = 0;
        for &h in &alt {
            while layer < LAYERS - 1 && h >= Z[layer + 1] {
                layer += 1;
            }
            let (ti, pi, ri) = layer_state(layer, h, p_base[layer], rho_base[layer]);
            t.push(ti);
            p.push(pi);
            rho.push(ri);
        }
        debug!("atmosphere table built: {} samples up to {} km", n, TABLE_TOP / 1e3);

        Atmosphere {
            temperature: akima_sorted(&alt, &t),
            pressure: akima_sorted(&alt, &p),
            density: akima_sorted(&alt, &rho),
        }
    }

    /// Interpolated state at altitude `h` (m); extrapolates outside the table.
    pub fn at(&self, h: f64) -> AtmoSample {
        let t = self.temperature.sample(h);
        let p = self.pressure.sample(h);
        let rho = self.density.sample(h);
        let k = GAMMA_AIR * R_GAS;
        let sos = (k * t.value).sqrt();
        AtmoSample {
            temperature: t.value,
            pressure: p.value,
            density: rho.value,
            sound_speed: sos,
            dp_dh: p.d1,
            drho_dh: rho.d1,
            d2rho_dh2: rho.d2,
            dsos_dh: 0.5 * k * t.d1 / sos,
        }
    }
}

/// Process-wide table, built on first use.
pub fn standard() -> &'static Atmosphere {
    static TABLE: OnceLock<Atmosphere> = OnceLock::new();
    TABLE.get_or_init(Atmosphere::tewari)
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// `h = r − r0`
#[derive(Debug, Clone)]
pub struct Altitude {
    pub num_nodes: usize,
    pub r0: f64,
}

impl Component for Altitude {
    fn name(&self) -> &str {
        "altitude"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("r", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("h", "m")]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        SparsityTemplate::new().declare_fixed("h", "r", Pattern::Diagonal, 1.0)
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let r = inputs.require(self.name(), "r")?;
        Ok(Values::new().with("h", r.iter().map(|r| r - self.r0).collect()))
    }

    fn compute_partials(&self, _inputs: &Values, _partials: &mut Partials) -> Result<()> {
        Ok(())
    }
}

/// Ambient pressure, density, density gradient and speed of sound.
#[derive(Debug, Clone)]
pub struct Atmos {
    pub num_nodes: usize,
}

impl Component for Atmos {
    fn name(&self) -> &str {
        "atmos"
    }

    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn inputs(&self) -> Vec<PortSpec> {
        vec![PortSpec::nodal("h", "m")]
    }

    fn outputs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::nodal("P_a", "Pa"),
            PortSpec::nodal("rho", "kg/m**3"),
            PortSpec::nodal("d_rho_wrt_h", "kg/m**4"),
            PortSpec::nodal("sos", "m/s"),
        ]
    }

    fn declare_partials(&self) -> SparsityTemplate {
        ["P_a", "rho", "d_rho_wrt_h", "sos"]
            .into_iter()
            .fold(SparsityTemplate::new(), |t, of| t.declare(of, "h", Pattern::Diagonal))
    }

    fn compute(&self, inputs: &Values) -> Result<Values> {
        let h = inputs.require(self.name(), "h")?;
        let atm = standard();
        let samples: Vec<AtmoSample> = h.iter().map(|&h| atm.at(h)).collect();
        Ok(Values::new()
            .with("P_a", samples.iter().map(|s| s.pressure).collect())
            .with("rho", samples.iter().map(|s| s.density).collect())
            .with("d_rho_wrt_h", samples.iter().map(|s| s.drho_dh).collect())
            .with("sos", samples.iter().map(|s| s.sound_speed).collect()))
    }

    fn compute_partials(&self, inputs: &Values, partials: &mut Partials) -> Result<()> {
        let h = inputs.require(self.name(), "h")?;
        let atm = standard();
        for (i, &hi) in h.iter().enumerate() {
            let s = atm.at(hi);
            partials.set("P_a", "h", i, s.dp_dh);
            partials.set("rho", "h", i, s.drho_dh);
            partials.set("d_rho_wrt_h", "h", i, s.d2rho_dh2);
            partials.set("sos", "h", i, s.dsos_dh);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::check_partials;

    #[test]
    fn sea_level_standard_values() {
        let a = standard().at(0.0);
        assert!((a.temperature - 288.15).abs() < 0.01);
        assert!((a.pressure - 101_325.0).abs() < 1.0);
        assert!((a.density - 1.2252).abs() < 1e-3);
        assert!((a.sound_speed - 340.3).abs() < 0.2);
    }

    #[test]
    fn tropopause_layer() {
        let (t, p, _) = tewari(11_019.1);
        assert!((t - 216.65).abs() < 1e-9);
        assert!((p - 22_688.7).abs() < 1.0, "p = {}", p);
    }

    #[test]
    fn upper_layer_bases() {
        // stratopause and mesopause bases, carried from the tabulated temperatures
        let (t, p, rho) = tewari(51_412.5);
        assert!((t - 270.65).abs() < 1e-9);
        assert!((p - 69.95977).abs() / 69.95977 < 1e-5, "p = {}", p);
        assert!((rho - 9.006550e-4).abs() / 9.006550e-4 < 1e-5, "rho = {}", rho);

        let (t, p, rho) = tewari(86_000.0);
        assert!((t - 186.946).abs() < 1e-9);
        assert!((p - 0.4352854).abs() / 0.4352854 < 1e-5, "p = {}", p);
        assert!((rho - 8.112899e-6).abs() / 8.112899e-6 < 1e-5, "rho = {}", rho);

        let (_, p, _) = tewari(110_000.0);
        assert!((p - 1.069994e-2).abs() / 1.069994e-2 < 1e-5, "p = {}", p);
    }

    #[test]
    fn table_matches_exact_model_between_samples() {
        let atm = standard();
        // away from the layer bases, where the tabulated temperatures jump
        for h in [5_500.0, 25_500.0, 60_500.0, 150_500.0, 250_250.0] {
            let (_, p, rho) = tewari(h);
            let s = atm.at(h);
            assert!((s.pressure - p).abs() / p < 2e-3, "P at {} m", h);
            assert!((s.density - rho).abs() / rho < 2e-3, "rho at {} m", h);
        }
    }

    #[test]
    fn density_decreases_with_altitude() {
        let atm = standard();
        let mut prev = atm.at(0.0).density;
        for k in 1..200 {
            let rho = atm.at(k as f64 * 1_000.0).density;
            assert!(rho < prev, "density not decreasing at {} km", k);
            prev = rho;
        }
        assert!(atm.at(50_000.0).drho_dh < 0.0);
    }

    #[test]
    fn extrapolates_below_sea_level() {
        let a = standard().at(-200.0);
        assert!(a.density > standard().at(0.0).density);
        assert!(a.pressure.is_finite());
    }

    #[test]
    fn atmos_partials_match_finite_differences() {
        let comp = Atmos { num_nodes: 4 };
        let inputs = Values::new().with("h", vec![150.0, 12_345.0, 48_100.0, 95_200.0]);
        let report = check_partials(&comp, &inputs, 1e-5).unwrap();
        for c in &report {
            assert!(c.passes(1e-4), "{:?}", c);
        }
    }
}
