//! Offline tabulation of the BetaEta log-moment kernel `M(u0, Su)`.
//!
//! The kernel [`BetaEtaCore::m_precompute`] does not depend on β, α or κ,
//! so a single grid over `(η, u0, Su)` serves every parametrization.  Grid
//! axes are laid out with [`Concentrating1dMesher`]s; the top η point
//! (usually 1) is not tabulated since `η = 1` has its own closed form.
//!
//! A grid is persisted as Rust source (`const` arrays that can be compiled
//! in or parsed back with [`TabulationGrid::parse`]) or dumped as gnuplot
//! point lists.
//!
//! Corresponds to `QuantLib::detail::betaeta_tabulate`.

use std::io::Write;

use ql_core::{ensure, errors::Error, errors::Result, Real, Size};
use ql_methods::{Concentrating1dMesher, Fdm1dMesher};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::beta_eta_core::{BetaEtaConfig, BetaEtaCore};

// ─── Grid ─────────────────────────────────────────────────────────────────────

/// Tabulated values `m_pre[e][u][v] = M(u_pre[u], v_pre[v])` for
/// `η = eta_pre[e]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TabulationGrid {
    eta_pre: Vec<Real>,
    u_pre: Vec<Real>,
    v_pre: Vec<Real>,
    m_pre: Vec<Vec<Vec<Real>>>,
}

/// Layout of a written grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabulationFormat {
    /// Rust `const` arrays `ETA_PRE`, `U_PRE`, `V_PRE` and `M_PRE`.
    RustSource,
    /// Lines `eta u v M`, blank line after each `v` run.
    GnuplotEUV,
    /// Lines `u eta v M`, blank line after each `v` run.
    GnuplotUEV,
    /// Lines `v eta u M`, blank line after each `u` run.
    GnuplotVEU,
}

fn check_axis(name: &str, axis: &[Real]) -> Result<()> {
    ensure!(!axis.is_empty(), "{name} axis must not be empty");
    ensure!(
        axis.iter().all(|x| x.is_finite()),
        "{name} axis must be finite"
    );
    ensure!(
        axis.windows(2).all(|w| w[1] > w[0]),
        "{name} axis must be strictly increasing"
    );
    Ok(())
}

fn io_error(e: std::io::Error) -> Error {
    Error::Runtime(format!("could not write tabulation: {e}"))
}

impl TabulationGrid {
    /// Create a validated grid.
    ///
    /// # Errors
    /// `Precondition` if an axis is empty or not strictly increasing, an η
    /// is outside `[0, 1)`, `m_pre` does not have shape
    /// `eta_pre × u_pre × v_pre` or holds a non-finite value.
    pub fn new(
        eta_pre: Vec<Real>,
        u_pre: Vec<Real>,
        v_pre: Vec<Real>,
        m_pre: Vec<Vec<Vec<Real>>>,
    ) -> Result<Self> {
        let grid = Self {
            eta_pre,
            u_pre,
            v_pre,
            m_pre,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check the grid invariants.
    pub fn validate(&self) -> Result<()> {
        check_axis("eta", &self.eta_pre)?;
        check_axis("u", &self.u_pre)?;
        check_axis("v", &self.v_pre)?;
        ensure!(
            self.eta_pre[0] >= 0.0 && self.eta_pre[self.eta_pre.len() - 1] < 1.0,
            "tabulated eta must lie in [0,1)"
        );
        ensure!(
            self.m_pre.len() == self.eta_pre.len()
                && self.m_pre.iter().all(|row| {
                    row.len() == self.u_pre.len()
                        && row.iter().all(|col| col.len() == self.v_pre.len())
                }),
            "M values must have shape {} x {} x {}",
            self.eta_pre.len(),
            self.u_pre.len(),
            self.v_pre.len()
        );
        ensure!(
            self.m_pre.iter().flatten().flatten().all(|m| m.is_finite()),
            "M values must be finite"
        );
        Ok(())
    }

    /// η rows.
    pub fn eta_pre(&self) -> &[Real] {
        &self.eta_pre
    }

    /// `u0` nodes.
    pub fn u_pre(&self) -> &[Real] {
        &self.u_pre
    }

    /// `Su` nodes.
    pub fn v_pre(&self) -> &[Real] {
        &self.v_pre
    }

    /// Tabulated value at node `(e, u, v)`.
    pub fn m(&self, e: Size, u: Size, v: Size) -> Real {
        self.m_pre[e][u][v]
    }

    /// Write the grid to `out`.
    pub fn write<W: Write>(&self, format: TabulationFormat, out: &mut W) -> Result<()> {
        match format {
            TabulationFormat::RustSource => self.write_rust_source(out),
            TabulationFormat::GnuplotEUV => self.write_points(out, |g, f| {
                for (e, &eta) in g.eta_pre.iter().enumerate() {
                    for (i, &u) in g.u_pre.iter().enumerate() {
                        for (j, &v) in g.v_pre.iter().enumerate() {
                            f(Some([eta, u, v, g.m(e, i, j)]))?;
                        }
                        f(None)?;
                    }
                }
                Ok(())
            }),
            TabulationFormat::GnuplotUEV => self.write_points(out, |g, f| {
                for (i, &u) in g.u_pre.iter().enumerate() {
                    for (e, &eta) in g.eta_pre.iter().enumerate() {
                        for (j, &v) in g.v_pre.iter().enumerate() {
                            f(Some([u, eta, v, g.m(e, i, j)]))?;
                        }
                        f(None)?;
                    }
                }
                Ok(())
            }),
            TabulationFormat::GnuplotVEU => self.write_points(out, |g, f| {
                for (j, &v) in g.v_pre.iter().enumerate() {
                    for (e, &eta) in g.eta_pre.iter().enumerate() {
                        for (i, &u) in g.u_pre.iter().enumerate() {
                            f(Some([v, eta, u, g.m(e, i, j)]))?;
                        }
                        f(None)?;
                    }
                }
                Ok(())
            }),
        }
    }

    /// Drive `walk`, printing each point as one line and `None` as a blank line.
    fn write_points<W, G>(&self, out: &mut W, walk: G) -> Result<()>
    where
        W: Write,
        G: FnOnce(&Self, &mut dyn FnMut(Option<[Real; 4]>) -> Result<()>) -> Result<()>,
    {
        let mut emit = |point: Option<[Real; 4]>| -> Result<()> {
            let written = match point {
                Some([a, b, c, m]) => writeln!(out, "{a} {b} {c} {m}"),
                None => writeln!(out),
            };
            written.map_err(io_error)
        };
        walk(self, &mut emit)
    }

    fn write_rust_source<W: Write>(&self, out: &mut W) -> Result<()> {
        let (ne, nu, nv) = (self.eta_pre.len(), self.u_pre.len(), self.v_pre.len());
        let list = |xs: &[Real]| {
            xs.iter()
                .map(|x| format!("{x:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut text = String::new();
        text.push_str("// BetaEta log-moment tabulation M(eta, u0, Su)\n");
        text.push_str(&format!("// etaSteps = {ne} usize = {nu} vsize = {nv}\n\n"));
        text.push_str(&format!(
            "pub const ETA_PRE: [Real; {ne}] = [{}];\n\n",
            list(&self.eta_pre)
        ));
        text.push_str(&format!("pub const U_PRE: [Real; {nu}] = [{}];\n\n", list(&self.u_pre)));
        text.push_str(&format!("pub const V_PRE: [Real; {nv}] = [{}];\n\n", list(&self.v_pre)));
        text.push_str(&format!("pub const M_PRE: [[[Real; {nv}]; {nu}]; {ne}] = [\n"));
        for (e, row) in self.m_pre.iter().enumerate() {
            text.push_str(&format!("    // ========================  eta={:?}\n    [\n", self.eta_pre[e]));
            for (i, col) in row.iter().enumerate() {
                text.push_str(&format!(
                    "        // eta={:?} u={:?}\n        [{}],\n",
                    self.eta_pre[e],
                    self.u_pre[i],
                    list(col)
                ));
            }
            text.push_str("    ],\n");
        }
        text.push_str("];\n");
        out.write_all(text.as_bytes()).map_err(io_error)
    }

    /// Read a grid written with [`TabulationFormat::RustSource`].
    ///
    /// `//` comments are ignored.  The array sizes declared in the `const`
    /// types must match the number of values exactly.
    ///
    /// # Errors
    /// `InvalidArgument` for malformed text or mismatched sizes;
    /// `Precondition` if the grid read violates a grid invariant.
    pub fn parse(text: &str) -> Result<Self> {
        let code: String = text
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");

        let (eta_dims, eta_pre) = parse_const(&code, "ETA_PRE")?;
        let (u_dims, u_pre) = parse_const(&code, "U_PRE")?;
        let (v_dims, v_pre) = parse_const(&code, "V_PRE")?;
        let (m_dims, m_flat) = parse_const(&code, "M_PRE")?;

        for (name, dims, values) in [
            ("ETA_PRE", &eta_dims, &eta_pre),
            ("U_PRE", &u_dims, &u_pre),
            ("V_PRE", &v_dims, &v_pre),
        ] {
            if dims.len() != 1 || dims[0] != values.len() {
                return Err(Error::InvalidArgument(format!(
                    "{name} declares {dims:?} but holds {} values",
                    values.len()
                )));
            }
        }
        // innermost dimension comes first in `[[[Real; V]; U]; E]`
        let expected = [v_pre.len(), u_pre.len(), eta_pre.len()];
        if m_dims != expected || m_flat.len() != expected.iter().product::<Size>() {
            return Err(Error::InvalidArgument(format!(
                "M_PRE declares {m_dims:?} with {} values, axes require {expected:?}",
                m_flat.len()
            )));
        }

        let (nu, nv) = (u_pre.len(), v_pre.len());
        let m_pre = m_flat
            .chunks(nu * nv)
            .map(|row| row.chunks(nv).map(<[Real]>::to_vec).collect())
            .collect();
        Self::new(eta_pre, u_pre, v_pre, m_pre)
    }
}

/// Declared dimensions (innermost first) and flattened values of
/// `const NAME: TYPE = [ ... ];`.
fn parse_const(code: &str, name: &str) -> Result<(Vec<Size>, Vec<Real>)> {
    let malformed = |what: &str| Error::InvalidArgument(format!("{name}: {what}"));

    let key = format!("const {name}:");
    let start = code
        .find(&key)
        .ok_or_else(|| malformed("declaration not found"))?
        + key.len();
    let rest = &code[start..];
    let eq = rest.find('=').ok_or_else(|| malformed("missing '='"))?;
    // the type contains ';' separators, the terminating one follows '='
    let end = eq
        + rest[eq..]
            .find(';')
            .ok_or_else(|| malformed("missing ';'"))?;

    let ty = &rest[..eq];
    let dims = ty
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Size>().map_err(|e| malformed(&format!("bad dimension '{s}': {e}"))))
        .collect::<Result<Vec<_>>>()?;

    let body = &rest[eq + 1..end];
    let opens = body.matches('[').count();
    let closes = body.matches(']').count();
    if opens == 0 || opens != closes {
        return Err(malformed("unbalanced brackets"));
    }
    let values = body
        .split(|c: char| c == ',' || c == '[' || c == ']')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Real>().map_err(|e| malformed(&format!("bad value '{s}': {e}"))))
        .collect::<Result<Vec<_>>>()?;
    Ok((dims, values))
}

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Layout of a tabulation grid: range, size and concentration of each axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TabulationSpec {
    /// Lower end of the η mesh.
    pub eta_min: Real,
    /// Upper end of the η mesh (not tabulated itself).
    pub eta_max: Real,
    /// Number of η mesh points.
    pub etasteps: Size,
    /// Lower end of the `u0` axis.
    pub u0_min: Real,
    /// Upper end of the `u0` axis.
    pub u0_max: Real,
    /// Number of `u0` nodes.
    pub usize: Size,
    /// Lower end of the `Su` axis.
    pub v_min: Real,
    /// Upper end of the `Su` axis.
    pub v_max: Real,
    /// Number of `Su` nodes.
    pub vsize: Size,
    /// Anchor of the `u0` axis.
    pub cu: Real,
    /// Concentration around `cu`.
    pub densityu: Real,
    /// Anchor of the `Su` axis.
    pub cv: Real,
    /// Concentration around `cv`.
    pub densityv: Real,
    /// Anchor of the η axis.
    pub ce: Real,
    /// Concentration around `ce`.
    pub densitye: Real,
}

impl Default for TabulationSpec {
    fn default() -> Self {
        Self {
            eta_min: 0.0,
            eta_max: 1.0,
            etasteps: 11,
            u0_min: 0.001,
            u0_max: 5.0,
            usize: 30,
            v_min: 0.0,
            v_max: 1.0,
            vsize: 30,
            cu: 0.001,
            densityu: 0.1,
            cv: 0.0,
            densityv: 0.1,
            ce: 0.5,
            densitye: 1.0,
        }
    }
}

impl TabulationSpec {
    /// `(eta_pre, u_pre, v_pre)` laid out by concentrating meshers with the
    /// anchors as grid nodes.
    pub fn axes(&self) -> Result<(Vec<Real>, Vec<Real>, Vec<Real>)> {
        ensure!(self.etasteps >= 2, "at least two eta steps required");
        let em = Concentrating1dMesher::new(
            self.eta_min,
            self.eta_max,
            self.etasteps,
            Some((self.ce, self.densitye)),
            true,
        )?;
        let um = Concentrating1dMesher::new(
            self.u0_min,
            self.u0_max,
            self.usize,
            Some((self.cu, self.densityu)),
            true,
        )?;
        let vm = Concentrating1dMesher::new(
            self.v_min,
            self.v_max,
            self.vsize,
            Some((self.cv, self.densityv)),
            true,
        )?;
        let eta_pre = em.locations()[..em.size() - 1].to_vec();
        Ok((eta_pre, um.locations().to_vec(), vm.locations().to_vec()))
    }
}

/// Computes a [`TabulationGrid`] row by row.
///
/// Every η row uses its own core (β = 1, α = κ = 0.01, no time steps), so
/// rows are independent; with the `parallel` feature they are computed on
/// the rayon thread pool.
#[derive(Debug, Clone)]
pub struct TabulationBuilder {
    eta_pre: Vec<Real>,
    u_pre: Vec<Real>,
    v_pre: Vec<Real>,
    config: BetaEtaConfig,
}

impl TabulationBuilder {
    /// Builder for the axes of `spec`.
    pub fn from_spec(spec: &TabulationSpec) -> Result<Self> {
        let (eta_pre, u_pre, v_pre) = spec.axes()?;
        Self::from_axes(eta_pre, u_pre, v_pre)
    }

    /// Builder for explicit axes.
    pub fn from_axes(eta_pre: Vec<Real>, u_pre: Vec<Real>, v_pre: Vec<Real>) -> Result<Self> {
        check_axis("eta", &eta_pre)?;
        check_axis("u", &u_pre)?;
        check_axis("v", &v_pre)?;
        ensure!(
            eta_pre[0] >= 0.0 && eta_pre[eta_pre.len() - 1] < 1.0,
            "tabulated eta must lie in [0,1)"
        );
        Ok(Self {
            eta_pre,
            u_pre,
            v_pre,
            config: BetaEtaConfig::default(),
        })
    }

    /// Use `config` for the kernel evaluations.
    pub fn with_config(mut self, config: BetaEtaConfig) -> Self {
        self.config = config;
        self
    }

    /// Compute every row.
    pub fn build(&self) -> Result<TabulationGrid> {
        info!(
            eta_rows = self.eta_pre.len(),
            u_nodes = self.u_pre.len(),
            v_nodes = self.v_pre.len(),
            "tabulating BetaEta M(u0,Su)"
        );
        #[cfg(feature = "parallel")]
        let m_pre = self
            .eta_pre
            .par_iter()
            .map(|&eta| self.row(eta))
            .collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let m_pre = self
            .eta_pre
            .iter()
            .map(|&eta| self.row(eta))
            .collect::<Result<Vec<_>>>()?;
        TabulationGrid::new(
            self.eta_pre.clone(),
            self.u_pre.clone(),
            self.v_pre.clone(),
            m_pre,
        )
    }

    fn row(&self, eta: Real) -> Result<Vec<Vec<Real>>> {
        let core = BetaEtaCore::new(vec![], vec![0.01], vec![0.01], 1.0, eta)?
            .with_config(self.config.clone())?;
        let row = self
            .u_pre
            .iter()
            .map(|&u0| {
                debug!(eta, u0, "tabulating");
                self.v_pre
                    .iter()
                    .map(|&v| core.m_precompute(u0, v))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        info!(eta, "tabulated row");
        Ok(row)
    }
}

/// Tabulate with the layout `spec` and write the grid to `out` in `format`.
///
/// For Rust source the layout parameters are recorded in a leading comment.
/// Returns the computed grid.
pub fn betaeta_tabulate<W: Write>(
    format: TabulationFormat,
    out: &mut W,
    spec: &TabulationSpec,
) -> Result<TabulationGrid> {
    let grid = TabulationBuilder::from_spec(spec)?.build()?;
    if format == TabulationFormat::RustSource {
        let s = spec;
        writeln!(
            out,
            "// generated by betaeta_tabulate using the following parameters:\n\
             // eta_min = {} eta_max = {}\n\
             // u0_min = {} u0_max = {}\n\
             // v_min = {} v_max = {}\n\
             // usize = {} vsize = {} etaSteps = {}\n\
             // cu = {} densityu = {}\n\
             // cv = {} densityv = {}\n\
             // ce = {} densitye = {}\n",
            s.eta_min,
            s.eta_max,
            s.u0_min,
            s.u0_max,
            s.v_min,
            s.v_max,
            s.usize,
            s.vsize,
            s.etasteps,
            s.cu,
            s.densityu,
            s.cv,
            s.densityv,
            s.ce,
            s.densitye
        )
        .map_err(io_error)?;
    }
    grid.write(format, out)?;
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> TabulationGrid {
        TabulationGrid::new(
            vec![0.0, 0.25],
            vec![0.5, 1.0, 2.0],
            vec![0.0, 0.1],
            vec![
                vec![vec![0.0, 0.01], vec![0.0, 0.02], vec![0.0, -50.0]],
                vec![vec![0.0, 1.5e-7], vec![0.0, 0.125], vec![0.0, 0.3]],
            ],
        )
        .unwrap()
    }

    #[test]
    fn default_spec_axes() {
        let (eta, u, v) = TabulationSpec::default().axes().unwrap();
        assert_eq!(eta.len(), 10);
        assert_eq!(eta[0], 0.0);
        assert!((eta[5] - 0.5).abs() < 1e-15);
        assert!(eta[9] < 1.0);
        assert_eq!(u.len(), 30);
        assert_eq!(u[0], 0.001);
        assert_eq!(u[29], 5.0);
        assert_eq!(v.len(), 30);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[29], 1.0);
    }

    #[test]
    fn rust_source_round_trip() {
        let grid = small_grid();
        let mut out = Vec::new();
        grid.write(TabulationFormat::RustSource, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("pub const M_PRE: [[[Real; 2]; 3]; 2] = ["), "{text}");
        assert_eq!(TabulationGrid::parse(&text).unwrap(), grid);
    }

    #[test]
    fn parse_rejects_mismatched_dimensions() {
        let mut out = Vec::new();
        small_grid().write(TabulationFormat::RustSource, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let bad = text.replace("U_PRE: [Real; 3]", "U_PRE: [Real; 4]");
        assert!(matches!(TabulationGrid::parse(&bad), Err(Error::InvalidArgument(_))));
        let bad = text.replace("[[[Real; 2]; 3]; 2]", "[[[Real; 2]; 3]; 3]");
        assert!(matches!(TabulationGrid::parse(&bad), Err(Error::InvalidArgument(_))));
        assert!(matches!(TabulationGrid::parse("nothing here"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn gnuplot_layouts() {
        let grid = small_grid();
        let mut out = Vec::new();
        grid.write(TabulationFormat::GnuplotEUV, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // 2 x 3 blocks of 2 points, each followed by a blank line
        assert_eq!(lines.len(), 2 * 3 * 3);
        assert_eq!(lines[0], "0 0.5 0 0");
        assert_eq!(lines[1], "0 0.5 0.1 0.01");
        assert_eq!(lines[2], "");

        let mut out = Vec::new();
        grid.write(TabulationFormat::GnuplotVEU, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 * 2 * 4);
        assert_eq!(lines[0], "0 0 0.5 0");
        assert_eq!(lines[3], "");

        let mut out = Vec::new();
        grid.write(TabulationFormat::GnuplotUEV, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0.5 0 0 0\n0.5 0 0.1 0.01\n\n0.5 0.25 0 0\n"), "{text}");
    }

    #[test]
    fn grid_invariants() {
        assert!(TabulationGrid::new(vec![0.5, 1.0], vec![1.0], vec![0.0], vec![vec![vec![0.0]]; 2]).is_err());
        assert!(TabulationGrid::new(vec![0.5, 0.4], vec![1.0], vec![0.0], vec![vec![vec![0.0]]; 2]).is_err());
        assert!(TabulationGrid::new(vec![0.5], vec![1.0], vec![0.0], vec![vec![vec![0.0, 1.0]]]).is_err());
        assert!(TabulationGrid::new(vec![0.5], vec![1.0], vec![0.0], vec![vec![vec![Real::NAN]]]).is_err());
        assert!(TabulationBuilder::from_axes(vec![1.0], vec![1.0], vec![0.0]).is_err());
    }

    #[test]
    fn builder_is_deterministic_and_zero_without_variance() {
        let builder =
            TabulationBuilder::from_axes(vec![0.2], vec![0.5, 1.0], vec![0.0, 0.02]).unwrap();
        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.m(0, 0, 0), 0.0);
        assert_eq!(a.m(0, 1, 0), 0.0);
        assert!(a.m(0, 1, 1).is_finite());
    }
}
