//! Turns transforms into a flat operator list.
//!
//! Indirections (color spaces, looks, display/views, builtins) expand
//! recursively against the config. Every expansion of a named entity is
//! pushed on a `kind:name` stack; meeting a name already on the stack is a
//! [`ColorError::CircularReference`].
//!
//! Inverting a chain reverses it and inverts each op, except where the
//! config authored an explicit inverse (color space `to_reference` vs
//! `from_reference`, look inverse transforms); those are picked instead.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use colorpipe_lut::{CubeLut, Lut1D, Lut3D};

use crate::builtin;
use crate::cache::FileCache;
use crate::colorspace::{ColorSpace, ReferenceSpaceType};
use crate::config::ConfigDefinition;
use crate::context::{Context, UsedVars};
use crate::display::ViewTransform;
use crate::error::{ColorError, ColorResult};
use crate::look::{look_sequence, parse_looks, LookEntry};
use crate::op::{LogCurve, Op, IDENTITY_MATRIX};
use crate::processor::ProcessorMetadata;
use crate::transform::{
    AllocationTransform, AllocationType, DisplayViewTransform, FileTransform, LookTransform,
    RangeStyle, RangeTransform, Transform, TransformDirection,
};

use TransformDirection::{Forward, Inverse};

/// Decoded table handed back by a [`LutLoader`].
#[derive(Debug, Clone)]
pub enum LoadedLut {
    /// Per-channel curves.
    Lut1D(Arc<Lut1D>),
    /// RGB cube.
    Lut3D(Arc<Lut3D>),
}

/// Decodes LUT files referenced by file transforms.
///
/// Format parsing lives outside the engine; the engine only needs the
/// sample table and its domain.
pub trait LutLoader: Send + Sync {
    /// Loads the table stored at `path`.
    fn load(&self, path: &Path) -> ColorResult<LoadedLut>;
}

/// Loader for `.cube` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubeLoader;

impl LutLoader for CubeLoader {
    fn load(&self, path: &Path) -> ColorResult<LoadedLut> {
        let lut = colorpipe_lut::read_cube(path)
            .map_err(|source| ColorError::LutLoad {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(match lut {
            CubeLut::Lut1D(l) => LoadedLut::Lut1D(Arc::new(l)),
            CubeLut::Lut3D(l) => LoadedLut::Lut3D(Arc::new(l)),
        })
    }
}

/// Output of one build.
#[derive(Debug, Default)]
pub(crate) struct Built {
    pub ops: Vec<Op>,
    pub used: UsedVars,
    pub metadata: ProcessorMetadata,
}

/// One stage of a display/view chain. Inverting a chain walks the stages
/// backwards, each inverted.
enum Leg<'r> {
    Transform(Transform),
    ToReference(&'r ColorSpace),
    FromReference(&'r ColorSpace),
    Bridge {
        from: ReferenceSpaceType,
        to: ReferenceSpaceType,
        src: &'r str,
        dst: &'r str,
    },
    View(&'r ViewTransform),
}

/// Expansion state for one processor request.
pub(crate) struct Builder<'a> {
    registry: &'a ConfigDefinition,
    context: &'a Context,
    loader: &'a dyn LutLoader,
    files: &'a FileCache,
    stack: Vec<String>,
    built: Built,
}

impl<'a> Builder<'a> {
    pub fn new(
        registry: &'a ConfigDefinition,
        context: &'a Context,
        loader: &'a dyn LutLoader,
        files: &'a FileCache,
    ) -> Self {
        Self {
            registry,
            context,
            loader,
            files,
            stack: Vec::new(),
            built: Built::default(),
        }
    }

    /// Expands `transform` applied in `direction`.
    pub fn build(
        mut self,
        transform: &Transform,
        direction: TransformDirection,
    ) -> ColorResult<Built> {
        let mut ops = Vec::new();
        self.expand(transform, direction, &mut ops)?;
        trace!(kind = transform.kind_name(), ?direction, ops = ops.len(), "built op chain");
        self.built.ops = ops;
        Ok(self.built)
    }

    fn enter(&mut self, key: String) -> ColorResult<()> {
        if self.stack.iter().any(|k| k.eq_ignore_ascii_case(&key)) {
            let mut chain = self.stack.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(&key);
            return Err(ColorError::CircularReference { chain });
        }
        self.stack.push(key);
        Ok(())
    }

    fn nested(
        &mut self,
        key: String,
        t: &Transform,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        self.enter(key)?;
        let result = self.expand(t, direction, out);
        self.stack.pop();
        result
    }

    fn expand(
        &mut self,
        t: &Transform,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let direction = direction.combine(t.direction());
        match t {
            Transform::Group(g) => {
                if direction == Forward {
                    g.transforms.iter().try_for_each(|c| self.expand(c, Forward, out))
                } else {
                    g.transforms.iter().rev().try_for_each(|c| self.expand(c, Inverse, out))
                }
            }
            Transform::Builtin(b) => {
                let def = builtin::transform(&b.style)?;
                self.expand(&def, direction, out)
            }
            Transform::ColorSpace(cs) => {
                t.validate()?;
                match direction {
                    Forward => self.colorspace_pair(&cs.src, &cs.dst, cs.data_bypass, out),
                    Inverse => self.colorspace_pair(&cs.dst, &cs.src, cs.data_bypass, out),
                }
            }
            Transform::Look(lt) => {
                t.validate()?;
                self.looks(lt, direction, out)
            }
            Transform::DisplayView(dv) => {
                t.validate()?;
                self.display_view(dv, direction, out)
            }
            Transform::File(f) => {
                t.validate()?;
                let ops = self.file_ops(f)?;
                push_directed(ops, direction, out)
            }
            _ => {
                t.validate()?;
                push_directed(primitive_ops(t)?, direction, out)
            }
        }
    }

    fn colorspace(&self, name: &str) -> ColorResult<&'a ColorSpace> {
        let registry = self.registry;
        registry
            .resolve_colorspace(name)
            .ok_or_else(|| ColorError::ColorSpaceNotFound {
                name: name.trim().to_string(),
            })
    }

    fn colorspace_pair(
        &mut self,
        src: &str,
        dst: &str,
        data_bypass: bool,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let src = self.colorspace(src)?;
        let dst = self.colorspace(dst)?;
        if data_bypass && (src.is_data() || dst.is_data()) {
            trace!(src = src.name(), dst = dst.name(), "data bypass");
            return Ok(());
        }
        if src.name() == dst.name() {
            return Ok(());
        }
        self.reference_leg(src, true, out)?;
        self.bridge(
            src.reference_space(),
            dst.reference_space(),
            src.name(),
            dst.name(),
            out,
        )?;
        self.reference_leg(dst, false, out)
    }

    fn reference_leg(
        &mut self,
        cs: &ColorSpace,
        to_reference: bool,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let t = if to_reference {
            cs.transform_to_reference()
        } else {
            cs.transform_from_reference()
        };
        match t {
            Some(t) => self.nested(format!("colorspace:{}", cs.name()), &t, Forward, out),
            None => Ok(()),
        }
    }

    /// Crosses between the scene and display references with the default
    /// view transform.
    fn bridge(
        &mut self,
        from: ReferenceSpaceType,
        to: ReferenceSpaceType,
        src: &str,
        dst: &str,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        if from == to {
            return Ok(());
        }
        let registry = self.registry;
        let vt = registry
            .default_view_transform()
            .ok_or_else(|| ColorError::ReferenceSpaceMismatch {
                src: src.to_string(),
                dst: dst.to_string(),
            })?;
        let direction = if from == ReferenceSpaceType::Scene {
            Forward
        } else {
            Inverse
        };
        self.view_transform(vt, direction, out)
    }

    fn view_transform(
        &mut self,
        vt: &ViewTransform,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let t = match direction {
            Forward => vt.forward_transform(),
            Inverse => vt.inverse_transform(),
        };
        match t {
            Some(t) => self.nested(format!("viewtransform:{}", vt.name()), &t, Forward, out),
            None => Ok(()),
        }
    }

    /// Picks the first alternative whose looks all exist.
    fn select_looks(&self, looks: &str) -> ColorResult<Vec<LookEntry>> {
        let list = parse_looks(looks);
        if list.is_empty() {
            return Ok(Vec::new());
        }
        let exists = |e: &LookEntry| self.registry.look(&e.name).is_some();
        if let Some(option) = list.options.iter().find(|o| o.iter().all(exists)) {
            return Ok(option.clone());
        }
        if list.optional {
            debug!(looks, "no look alternative available, skipping optional looks");
            return Ok(Vec::new());
        }
        let missing = list.options.iter().flatten().find(|e| !exists(*e));
        Err(ColorError::LookNotFound {
            name: missing.map(|e| e.name.clone()).unwrap_or_default(),
        })
    }

    fn looks(
        &mut self,
        lt: &LookTransform,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let registry = self.registry;
        let (src, dst) = match direction {
            Forward => (&lt.src, &lt.dst),
            Inverse => (&lt.dst, &lt.src),
        };
        let entries = self.select_looks(&lt.looks)?;
        let mut current = self.colorspace(src)?.name().to_string();

        for entry in look_sequence(&entries, direction) {
            let look = registry
                .look(&entry.name)
                .ok_or_else(|| ColorError::LookNotFound {
                    name: entry.name.clone(),
                })?;
            self.built.metadata.add_look(look.name());

            if !lt.skip_colorspace_conversion {
                if let Some(ps) = look.get_process_space() {
                    self.colorspace_pair(&current, ps, true, out)?;
                    current = self.colorspace(ps)?.name().to_string();
                }
            }
            if let Some(t) = look.transform_for(entry.direction) {
                self.nested(format!("look:{}", look.name()), &t, Forward, out)?;
            }
        }

        if !lt.skip_colorspace_conversion {
            self.colorspace_pair(&current, dst, true, out)?;
        }
        Ok(())
    }

    fn display_view(
        &mut self,
        dv: &DisplayViewTransform,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        let registry = self.registry;
        let display = registry
            .display(&dv.display)
            .ok_or_else(|| ColorError::DisplayNotFound {
                name: dv.display.clone(),
            })?;
        let view = display.view(&dv.view).ok_or_else(|| ColorError::ViewNotFound {
            display: dv.display.clone(),
            view: dv.view.clone(),
        })?;
        let src = self.colorspace(&dv.src)?;
        let target = self.colorspace(view.resolved_colorspace(display.name()))?;
        if dv.data_bypass && (src.is_data() || target.is_data()) {
            return Ok(());
        }

        let mut legs = Vec::new();
        if let Some(looks) = view.looks().filter(|_| !dv.looks_bypass) {
            legs.push(Leg::Transform(Transform::look(src.name(), src.name(), looks)));
        }
        match view.view_transform() {
            None => {
                let mut t = Transform::colorspace(src.name(), target.name());
                if let Transform::ColorSpace(cs) = &mut t {
                    cs.data_bypass = false;
                }
                legs.push(Leg::Transform(t));
            }
            Some(vt_name) => {
                let vt = registry
                    .view_transform(vt_name)
                    .ok_or_else(|| ColorError::ViewTransformNotFound {
                        name: vt_name.to_string(),
                    })?;
                legs.push(Leg::ToReference(src));
                legs.push(Leg::Bridge {
                    from: src.reference_space(),
                    to: vt.reference_space(),
                    src: src.name(),
                    dst: target.name(),
                });
                legs.push(Leg::View(vt));
                legs.push(Leg::Bridge {
                    from: ReferenceSpaceType::Display,
                    to: target.reference_space(),
                    src: src.name(),
                    dst: target.name(),
                });
                legs.push(Leg::FromReference(target));
            }
        }

        match direction {
            Forward => legs.iter().try_for_each(|leg| self.leg(leg, Forward, out)),
            Inverse => legs.iter().rev().try_for_each(|leg| self.leg(leg, Inverse, out)),
        }
    }

    fn leg(
        &mut self,
        leg: &Leg<'_>,
        direction: TransformDirection,
        out: &mut Vec<Op>,
    ) -> ColorResult<()> {
        match (leg, direction) {
            (Leg::Transform(t), _) => self.expand(t, direction, out),
            (Leg::ToReference(cs), Forward) | (Leg::FromReference(cs), Inverse) => {
                self.reference_leg(cs, true, out)
            }
            (Leg::ToReference(cs), Inverse) | (Leg::FromReference(cs), Forward) => {
                self.reference_leg(cs, false, out)
            }
            (Leg::Bridge { from, to, src, dst }, Forward) => self.bridge(*from, *to, src, dst, out),
            (Leg::Bridge { from, to, src, dst }, Inverse) => self.bridge(*to, *from, dst, src, out),
            (Leg::View(vt), _) => self.view_transform(vt, direction, out),
        }
    }

    fn file_ops(&mut self, f: &FileTransform) -> ColorResult<Vec<Op>> {
        let path = self.context.resolve_file_location_tracked(&f.src, &mut self.built.used)?;
        self.built.metadata.add_file(path.display().to_string());
        let op = match self.files.get_or_load(&path, self.loader)? {
            LoadedLut::Lut1D(lut) => Op::Lut1D {
                lut,
                forward: true,
            },
            LoadedLut::Lut3D(lut) if lut.interpolation == f.interpolation => Op::Lut3D {
                lut,
                forward: true,
            },
            LoadedLut::Lut3D(lut) => {
                let lut = (*lut).clone().with_interpolation(f.interpolation);
                Op::Lut3D {
                    lut: Arc::new(lut),
                    forward: true,
                }
            }
        };
        Ok(vec![op])
    }
}

/// Appends `ops`, or their inverses in reverse order.
fn push_directed(
    ops: Vec<Op>,
    direction: TransformDirection,
    out: &mut Vec<Op>,
) -> ColorResult<()> {
    match direction {
        Forward => out.extend(ops),
        Inverse => {
            for op in ops.iter().rev() {
                out.push(op.inverse()?);
            }
        }
    }
    Ok(())
}

/// Forward ops of a primitive transform.
fn primitive_ops(t: &Transform) -> ColorResult<Vec<Op>> {
    let op = match t {
        Transform::Matrix(m) => Op::Matrix {
            matrix: m.matrix,
            offset: m.offset,
        },
        Transform::Exponent(e) => Op::Exponent {
            value: e.value,
            negative_style: e.negative_style,
            fast: false,
        },
        Transform::ExponentWithLinear(e) => Op::ExponentWithLinear {
            gamma: e.gamma,
            offset: e.offset,
            negative_style: e.negative_style,
            forward: true,
            fast: false,
        },
        Transform::Log(l) => Op::Log {
            curve: LogCurve::plain(l.base),
            forward: true,
            fast: false,
        },
        Transform::LogAffine(l) => Op::Log {
            curve: LogCurve::affine(
                l.base,
                l.log_side_slope,
                l.log_side_offset,
                l.lin_side_slope,
                l.lin_side_offset,
            ),
            forward: true,
            fast: false,
        },
        Transform::LogCamera(l) => Op::Log {
            curve: LogCurve::camera(
                l.base,
                l.log_side_slope,
                l.log_side_offset,
                l.lin_side_slope,
                l.lin_side_offset,
                l.lin_side_break,
                l.linear_slope,
            ),
            forward: true,
            fast: false,
        },
        Transform::Range(r) => return Ok(range_op(r).into_iter().collect()),
        Transform::ExposureContrast(ec) => Op::ExposureContrast {
            exposure: ec.exposure,
            contrast: ec.contrast,
            gamma: ec.gamma,
            pivot: ec.pivot,
            log_exposure_step: ec.log_exposure_step,
            log_midway_gray: ec.log_midway_gray,
            style: ec.style,
            forward: true,
        },
        Transform::Cdl(c) => Op::Cdl {
            slope: c.slope,
            offset: c.offset,
            power: c.power,
            saturation: c.saturation,
            style: c.style,
            forward: true,
        },
        Transform::FixedFunction(ff) => Op::FixedFunction {
            style: ff.style,
            params: ff.params.clone(),
            forward: true,
        },
        Transform::Lut1D(l) => Op::Lut1D {
            lut: Arc::new(l.lut.clone()),
            forward: true,
        },
        Transform::Lut3D(l) => Op::Lut3D {
            lut: Arc::new(l.lut.clone()),
            forward: true,
        },
        Transform::Allocation(a) => return Ok(allocation_ops(a)),
        Transform::File(_)
        | Transform::Group(_)
        | Transform::Builtin(_)
        | Transform::ColorSpace(_)
        | Transform::Look(_)
        | Transform::DisplayView(_) => {
            return Err(ColorError::invalid(format!(
                "{} is not a primitive transform",
                t.kind_name()
            )));
        }
    };
    Ok(vec![op])
}

/// Scale/offset/clamp form of a range; `None` for an empty range.
fn range_op(r: &RangeTransform) -> Option<Op> {
    let (scale, offset) = match (r.min_in, r.max_in, r.min_out, r.max_out) {
        (Some(lo_in), Some(hi_in), Some(lo_out), Some(hi_out)) => {
            let scale = (hi_out - lo_out) / (hi_in - lo_in);
            (scale, lo_out - scale * lo_in)
        }
        (Some(lo_in), None, Some(lo_out), None) => (1.0, lo_out - lo_in),
        (None, Some(hi_in), None, Some(hi_out)) => (1.0, hi_out - hi_in),
        _ => return None,
    };
    let clamp = r.style == RangeStyle::Clamp;
    Some(Op::Range {
        scale,
        offset,
        clamp_min: r.min_out.filter(|_| clamp),
        clamp_max: r.max_out.filter(|_| clamp),
    })
}

/// RGB scale and offset as a matrix op, alpha untouched.
fn fit_matrix(scale: f64, offset: f64) -> Op {
    let mut matrix = IDENTITY_MATRIX;
    for c in 0..3 {
        matrix[c * 5] = scale;
    }
    Op::Matrix {
        matrix,
        offset: [offset, offset, offset, 0.0],
    }
}

fn allocation_ops(a: &AllocationTransform) -> Vec<Op> {
    let (min, max, offset) = a.bounds();
    let fit = fit_matrix(1.0 / (max - min), -min / (max - min));
    match a.allocation {
        AllocationType::Uniform => vec![fit],
        AllocationType::Log2 => {
            let mut ops = Vec::with_capacity(3);
            if offset != 0.0 {
                ops.push(fit_matrix(1.0, offset));
            }
            ops.push(Op::Log {
                curve: LogCurve::plain(2.0),
                forward: true,
                fast: false,
            });
            ops.push(fit);
            ops
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::ColorSpace;
    use crate::display::{Display, View};
    use crate::look::Look;
    use crate::transform::{ExponentTransform, LogTransform};

    fn registry() -> ConfigDefinition {
        let mut def = ConfigDefinition::default();
        def.colorspaces.push(ColorSpace::new("lin"));
        def.colorspaces.push(
            ColorSpace::builder("gamma2").to_reference(Transform::exponent(2.0).inverse()).build(),
        );
        def.colorspaces.push(
            ColorSpace::builder("log2")
                .from_reference(Transform::Log(LogTransform::default()))
                .build(),
        );
        def.colorspaces.push(ColorSpace::builder("raw").is_data(true).build());
        def.roles.define("scene_linear", "lin");
        def
    }

    fn build(
        def: &ConfigDefinition,
        t: &Transform,
        dir: TransformDirection,
    ) -> ColorResult<Vec<Op>> {
        let ctx = Context::new();
        let files = FileCache::new(true);
        Builder::new(def, &ctx, &CubeLoader, &files).build(t, dir).map(|b| b.ops)
    }

    fn run(ops: &[Op], v: f64) -> f64 {
        ops.iter().fold([v, v, v, 1.0], |px, op| op.apply(px))[0]
    }

    #[test]
    fn colorspace_pair_via_role() {
        let def = registry();
        let ops = build(&def, &Transform::colorspace("scene_linear", "gamma2"), Forward).unwrap();
        assert!((run(&ops, 0.5) - 0.25).abs() < 1e-12);
        let back = build(&def, &Transform::colorspace("scene_linear", "gamma2"), Inverse).unwrap();
        assert!((run(&back, 0.25) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_names_fail() {
        let def = registry();
        let err = build(&def, &Transform::colorspace("lin", "nope"), Forward).unwrap_err();
        assert!(matches!(err, ColorError::ColorSpaceNotFound { ref name } if name == "nope"));
    }

    #[test]
    fn data_spaces_bypass() {
        let def = registry();
        assert!(build(&def, &Transform::colorspace("raw", "gamma2"), Forward).unwrap().is_empty());
    }

    #[test]
    fn group_inverse_reverses_children() {
        let def = registry();
        let g = Transform::group(vec![
            Transform::exponent(2.0),
            Transform::matrix_offset(IDENTITY_MATRIX, [0.1, 0.1, 0.1, 0.0]),
        ]);
        let fwd = build(&def, &g, Forward).unwrap();
        let inv = build(&def, &g, Inverse).unwrap();
        assert_eq!(inv.len(), 2);
        assert_eq!(inv[0].name(), "Matrix");
        assert!((run(&inv, run(&fwd, 0.3)) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn self_reference_is_circular() {
        let mut def = registry();
        def.colorspaces.push(
            ColorSpace::builder("loop").to_reference(Transform::colorspace("loop", "lin")).build(),
        );
        let err = build(&def, &Transform::colorspace("loop", "lin"), Forward).unwrap_err();
        assert!(matches!(err, ColorError::CircularReference { .. }));
        assert!(err.to_string().contains("colorspace:loop -> colorspace:loop"));
    }

    #[test]
    fn looks_apply_in_process_space() {
        let mut def = registry();
        def.looks.push(Look::new("boost").process_space("log2").transform(Transform::matrix_offset(
            IDENTITY_MATRIX,
            [1.0, 1.0, 1.0, 0.0],
        )));
        let t = Transform::look("lin", "lin", "boost");
        // log2(x) + 1 back to linear doubles the value.
        let ops = build(&def, &t, Forward).unwrap();
        assert!((run(&ops, 0.25) - 0.5).abs() < 1e-9);
        let inv = build(&def, &t, Inverse).unwrap();
        assert!((run(&inv, 0.5) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn optional_looks_skip_missing() {
        let def = registry();
        let optional = Transform::look("lin", "lin", "missing |");
        assert!(build(&def, &optional, Forward).unwrap().is_empty());
        let err = build(&def, &Transform::look("lin", "lin", "missing"), Forward).unwrap_err();
        assert!(matches!(err, ColorError::LookNotFound { .. }));
    }

    #[test]
    fn display_view_targets_colorspace() {
        let mut def = registry();
        let mut display = Display::new("monitor");
        display.add_view(View::new("gamma", "gamma2"));
        def.displays.push(display);
        let t = Transform::DisplayView(DisplayViewTransform::new("lin", "monitor", "gamma"));
        let ops = build(&def, &t, Forward).unwrap();
        assert!((run(&ops, 0.5) - 0.25).abs() < 1e-12);
        let err = build(
            &def,
            &Transform::DisplayView(DisplayViewTransform::new("lin", "monitor", "film")),
            Forward,
        )
        .unwrap_err();
        assert!(matches!(err, ColorError::ViewNotFound { .. }));
    }

    #[test]
    fn allocation_log2_maps_stops() {
        let a = AllocationTransform {
            allocation: AllocationType::Log2,
            vars: vec![-8.0, 8.0],
            ..Default::default()
        };
        let ops = allocation_ops(&a);
        assert!((run(&ops, 1.0) - 0.5).abs() < 1e-12);
        assert!((run(&ops, 256.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn range_forms() {
        let full = RangeTransform {
            min_in: Some(0.0),
            max_in: Some(1.0),
            min_out: Some(0.5),
            max_out: Some(1.5),
            ..Default::default()
        };
        let op = range_op(&full).unwrap();
        assert!((op.apply([2.0, 0.5, -1.0, 1.0])[1] - 1.0).abs() < 1e-12);
        assert_eq!(op.apply([2.0, 0.5, -1.0, 1.0])[0], 1.5);
        assert!(range_op(&RangeTransform::default()).is_none());
    }

    #[test]
    fn clamp_only_range_not_invertible() {
        let def = registry();
        let clamp = Transform::Range(RangeTransform {
            min_in: Some(0.0),
            min_out: Some(0.0),
            ..Default::default()
        });
        assert!(build(&def, &clamp, Forward).is_ok());
        let err = build(&def, &clamp, Inverse).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotInvertible);
    }

    #[test]
    fn missing_file_fails_build() {
        let def = registry();
        let err = build(&def, &Transform::file("/definitely/not/here.cube"), Forward).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::MissingFile);
        let exp = Transform::Exponent(ExponentTransform {
            value: [0.0; 4],
            ..Default::default()
        });
        assert!(build(&def, &exp, Forward).is_err());
    }
}
