//! Boundary conditions: how samples outside an image's extent are made up.

use std::fmt;
use std::str::FromStr;

use pixframe_view::{expand_array_parameter, Flex, FrameError, Image, Sample};

use crate::line_buffer::{LineGeometry, LineSource};
use crate::lines::LinePlan;
use crate::Result;

/// Rule for synthesizing samples beyond the edge of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoundaryCondition {
    /// Reflect about the edge, repeating the edge sample.
    #[default]
    SymmetricMirror,
    /// Reflect about the edge, negating the reflected samples.
    AsymmetricMirror,
    Periodic,
    /// Periodic, negating every other period.
    AsymmetricPeriodic,
    AddZeros,
    AddMaxValue,
    AddMinValue,
    /// Repeat the edge sample (clamp to edge).
    ZeroOrderExtrapolate,
    /// Continue the slope of the two edge samples.
    FirstOrderExtrapolate,
    SecondOrderExtrapolate,
    ThirdOrderExtrapolate,
    /// The samples outside the extent exist in the buffer; read them.
    AlreadyExpanded,
}

impl FromStr for BoundaryCondition {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "" | "mirror" | "symmetric mirror" => BoundaryCondition::SymmetricMirror,
            "asym mirror" => BoundaryCondition::AsymmetricMirror,
            "periodic" => BoundaryCondition::Periodic,
            "asym periodic" => BoundaryCondition::AsymmetricPeriodic,
            "add zeros" => BoundaryCondition::AddZeros,
            "add max" => BoundaryCondition::AddMaxValue,
            "add min" => BoundaryCondition::AddMinValue,
            "zero order" => BoundaryCondition::ZeroOrderExtrapolate,
            "first order" => BoundaryCondition::FirstOrderExtrapolate,
            "second order" => BoundaryCondition::SecondOrderExtrapolate,
            "third order" => BoundaryCondition::ThirdOrderExtrapolate,
            "already expanded" => BoundaryCondition::AlreadyExpanded,
            other => return Err(FrameError::InvalidFlag(format!("boundary condition `{}`", other))),
        })
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundaryCondition::SymmetricMirror => "mirror",
            BoundaryCondition::AsymmetricMirror => "asym mirror",
            BoundaryCondition::Periodic => "periodic",
            BoundaryCondition::AsymmetricPeriodic => "asym periodic",
            BoundaryCondition::AddZeros => "add zeros",
            BoundaryCondition::AddMaxValue => "add max",
            BoundaryCondition::AddMinValue => "add min",
            BoundaryCondition::ZeroOrderExtrapolate => "zero order",
            BoundaryCondition::FirstOrderExtrapolate => "first order",
            BoundaryCondition::SecondOrderExtrapolate => "second order",
            BoundaryCondition::ThirdOrderExtrapolate => "third order",
            BoundaryCondition::AlreadyExpanded => "already expanded",
        })
    }
}

impl BoundaryCondition {
    /// Check that the rule can extend lines of sample type `T`.
    ///
    /// The add max/add min rules need a type with a maximum/minimum value,
    /// and second- and third-order extrapolation are not available.
    pub fn validate<T: Flex>(self) -> Result<()> {
        match self {
            BoundaryCondition::AddMaxValue if T::max_value().is_none() => Err(FrameError::UnsupportedDataType {
                data_type: T::DATA_TYPE,
                operation: "boundary condition `add max`",
            }),
            BoundaryCondition::AddMinValue if T::min_value().is_none() => Err(FrameError::UnsupportedDataType {
                data_type: T::DATA_TYPE,
                operation: "boundary condition `add min`",
            }),
            BoundaryCondition::SecondOrderExtrapolate | BoundaryCondition::ThirdOrderExtrapolate => Err(
                FrameError::NotImplemented("second- and third-order extrapolation boundary conditions"),
            ),
            _ => Ok(()),
        }
    }
}

/// Parse a list of boundary-condition strings.
pub fn parse_boundary_conditions<S: AsRef<str>>(names: &[S]) -> Result<Vec<BoundaryCondition>> {
    names.iter().map(|s| s.as_ref().parse()).collect()
}

/// Expand a boundary-condition array (length 0, 1 or `n`) to one per dimension.
pub fn resolve_boundary_conditions(bc: &[BoundaryCondition], n: usize) -> Result<Vec<BoundaryCondition>> {
    expand_array_parameter("boundary_condition", bc, n, BoundaryCondition::default())
}

/// Whether the conditions ask to read existing data around the image.
///
/// All dimensions must agree.
pub(crate) fn already_expanded(bc: &[BoundaryCondition]) -> Result<bool> {
    let count = bc
        .iter()
        .filter(|&&b| b == BoundaryCondition::AlreadyExpanded)
        .count();
    match count {
        0 => Ok(false),
        c if c == bc.len() => Ok(true),
        _ => Err(FrameError::InvalidFlag(
            "`already expanded` must apply to all dimensions".into(),
        )),
    }
}

/// Map an out-of-range index onto `0..n`, returning whether to negate.
fn fold_index(i: isize, n: usize, bc: BoundaryCondition) -> (usize, bool) {
    let n = n as isize;
    match bc {
        BoundaryCondition::SymmetricMirror | BoundaryCondition::AsymmetricMirror => {
            let m = i.rem_euclid(2 * n);
            let reflected = m >= n;
            let j = if reflected { 2 * n - 1 - m } else { m };
            (j as usize, reflected && bc == BoundaryCondition::AsymmetricMirror)
        }
        _ => {
            let odd = i.div_euclid(n) % 2 != 0;
            (
                i.rem_euclid(n) as usize,
                odd && bc == BoundaryCondition::AsymmetricPeriodic,
            )
        }
    }
}

/// Fill the borders of a staged line.
///
/// `buffer[left..left + n]` holds the line; everything before and after is
/// overwritten according to `bc`.
pub fn extend_line<T: Flex>(buffer: &mut [T], left: usize, n: usize, bc: BoundaryCondition) -> Result<()> {
    debug_assert!(left + n <= buffer.len());
    bc.validate::<T>()?;
    let total = buffer.len();
    let right_start = left + n;
    if n == 0 {
        buffer.iter_mut().for_each(|v| *v = T::zero());
        return Ok(());
    }
    let fill = |buffer: &mut [T], value: T| {
        buffer[..left].iter_mut().for_each(|v| *v = value);
        buffer[right_start..].iter_mut().for_each(|v| *v = value);
    };
    match bc {
        BoundaryCondition::AlreadyExpanded => {}
        BoundaryCondition::AddZeros => fill(buffer, T::zero()),
        BoundaryCondition::AddMaxValue | BoundaryCondition::AddMinValue => {
            let value = if bc == BoundaryCondition::AddMaxValue {
                T::max_value()
            } else {
                T::min_value()
            };
            if let Some(value) = value {
                fill(buffer, value);
            }
        }
        BoundaryCondition::ZeroOrderExtrapolate => {
            let (first, last) = (buffer[left], buffer[right_start - 1]);
            buffer[..left].iter_mut().for_each(|v| *v = first);
            buffer[right_start..].iter_mut().for_each(|v| *v = last);
        }
        BoundaryCondition::FirstOrderExtrapolate => {
            let first = buffer[left];
            let last = buffer[right_start - 1];
            let (head, tail) = if n > 1 {
                (buffer[left + 1] - first, last - buffer[right_start - 2])
            } else {
                (T::zero(), T::zero())
            };
            for p in 0..left {
                let steps = T::from_f64((left - p) as f64);
                buffer[p] = first - head * steps;
            }
            for p in right_start..total {
                let steps = T::from_f64((p - right_start + 1) as f64);
                buffer[p] = last + tail * steps;
            }
        }
        // Rejected by `validate`.
        BoundaryCondition::SecondOrderExtrapolate | BoundaryCondition::ThirdOrderExtrapolate => {}
        BoundaryCondition::SymmetricMirror
        | BoundaryCondition::AsymmetricMirror
        | BoundaryCondition::Periodic
        | BoundaryCondition::AsymmetricPeriodic => {
            for p in (0..left).chain(right_start..total) {
                let (j, negate) = fold_index(p as isize - left as isize, n, bc);
                let v = buffer[left + j];
                buffer[p] = if negate { -v } else { v };
            }
        }
    }
    Ok(())
}

/// Copy `input` into a new image of type `T` that is larger by `left[d]`
/// and `right[d]` samples along each dimension, filling the new samples
/// according to `bc`.
///
/// Dimensions are extended in order, so corner regions combine the rules.
pub fn extend_image<T: Flex>(
    input: &Image,
    left: &[usize],
    right: &[usize],
    bc: &[BoundaryCondition],
) -> Result<Image> {
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let n = input.dimensionality();
    let left = expand_array_parameter("border", left, n, 0)?;
    let right = expand_array_parameter("border", right, n, 0)?;
    let bc = resolve_boundary_conditions(bc, n)?;
    let sizes: Vec<usize> = (0..n).map(|d| input.size(d) + left[d] + right[d]).collect();

    if already_expanded(&bc)? {
        let origin: Vec<isize> = left.iter().map(|&l| -(l as isize)).collect();
        let grown = input.window(&origin, &sizes)?;
        return copy_as::<T>(&grown, &[]);
    }
    // Validate every rule before touching data.
    for (d, &b) in bc.iter().enumerate() {
        if left[d] + right[d] > 0 {
            b.validate::<T>()?;
        }
    }
    let mut ext = copy_as::<T>(input, &left.iter().zip(&right).map(|(&l, &r)| (l, r)).collect::<Vec<_>>())?;

    let te = ext.tensor_elements();
    let mut loop_sizes = sizes.clone();
    loop_sizes.push(te);
    let mut strides = ext.strides().to_vec();
    strides.push(ext.tensor_stride());
    let origin = ext.origin_ptr_mut::<T>()?;
    let mut buffer: Vec<T> = Vec::new();
    for d in 0..n {
        if left[d] + right[d] == 0 || input.size(d) == 0 {
            continue;
        }
        let plan = LinePlan::new(&loop_sizes, d, &[&strides]);
        let stride = plan.line_stride(0);
        buffer.resize(plan.length(), T::zero());
        plan.for_each_line(0..plan.lines(), |_, offsets| {
            // SAFETY: the plan covers exactly the extent of `ext`, which is
            // exclusively owned here.
            unsafe {
                let base = origin.offset(offsets[0]);
                for (i, v) in buffer.iter_mut().enumerate() {
                    *v = *base.offset(i as isize * stride);
                }
                extend_line(&mut buffer, left[d], input.size(d), bc[d])?;
                for (i, &v) in buffer.iter().enumerate() {
                    *base.offset(i as isize * stride) = v;
                }
            }
            Ok(())
        })?;
    }
    Ok(ext)
}

/// Contiguous copy of `src` as type `T`, optionally embedded in a larger
/// zero image with `(left, right)` padding per dimension.
pub(crate) fn copy_as<T: Sample>(src: &Image, padding: &[(usize, usize)]) -> Result<Image> {
    let n = src.dimensionality();
    let sizes: Vec<usize> = (0..n)
        .map(|d| src.size(d) + padding.get(d).map_or(0, |&(l, r)| l + r))
        .collect();
    let mut dst = Image::new(&sizes, src.tensor(), T::DATA_TYPE);
    if src.number_of_samples() == 0 {
        return Ok(dst);
    }
    let source = LineSource::<T>::new(src, false)?;
    let dst_offset: isize = (0..n)
        .map(|d| padding.get(d).map_or(0, |&(l, _)| l) as isize * dst.strides()[d])
        .sum();
    let te = src.tensor_elements();
    let (src_ts, dst_ts) = (src.tensor_stride(), dst.tensor_stride());
    let (mut sizes_l, mut src_strides) = (src.sizes().to_vec(), src.strides().to_vec());
    let mut dst_strides_l = dst.strides().to_vec();
    if n == 0 {
        sizes_l.push(1);
        src_strides.push(0);
        dst_strides_l.push(0);
    }
    let dim = crate::lines::optimal_processing_dim(&sizes_l, &dst_strides_l);
    let plan = LinePlan::new(&sizes_l, dim, &[&src_strides, &dst_strides_l]);
    let dst_origin = dst.origin_ptr_mut::<T>()?;
    let mut staging = vec![T::default(); plan.length() * te];
    plan.for_each_line(0..plan.lines(), |_, offsets| {
        let g = LineGeometry {
            offset: offsets[0],
            stride: plan.line_stride(0),
            length: plan.length(),
            tensor_elements: te,
            tensor_stride: src_ts,
        };
        // SAFETY: geometry lies within `src`; `dst` is exclusively owned and
        // the destination line lies within its extent.
        unsafe {
            source.read_into(g, &mut staging);
            let base = dst_origin.offset(dst_offset + offsets[1]);
            for i in 0..plan.length() {
                for t in 0..te {
                    *base.offset(i as isize * plan.line_stride(1) + t as isize * dst_ts) =
                        staging[i * te + t];
                }
            }
        }
        Ok(())
    })?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;
    use pixframe_view::DataType;

    fn extended(data: &[f64], left: usize, right: usize, bc: BoundaryCondition) -> Vec<f64> {
        let mut buf = vec![f64::NAN; left];
        buf.extend_from_slice(data);
        buf.extend(std::iter::repeat(f64::NAN).take(right));
        extend_line(&mut buf, left, data.len(), bc).unwrap();
        buf
    }

    #[test]
    fn test_parse_round_trip_names() {
        for name in [
            "mirror",
            "asym mirror",
            "periodic",
            "asym periodic",
            "add zeros",
            "add max",
            "add min",
            "zero order",
            "first order",
            "second order",
            "third order",
            "already expanded",
        ] {
            let bc: BoundaryCondition = name.parse().unwrap();
            assert_eq!(bc.to_string(), name);
        }
        assert_eq!("".parse::<BoundaryCondition>().unwrap(), BoundaryCondition::SymmetricMirror);
        assert!(matches!("wrap".parse::<BoundaryCondition>(), Err(FrameError::InvalidFlag(_))));
    }

    #[test]
    fn test_resolve_lengths() {
        assert_eq!(resolve_boundary_conditions(&[], 2).unwrap().len(), 2);
        assert!(resolve_boundary_conditions(
            &[BoundaryCondition::Periodic, BoundaryCondition::AddZeros],
            3
        )
        .is_err());
    }

    #[test]
    fn test_mirror_and_periodic() {
        let d = [1.0, 2.0, 3.0];
        assert_eq!(
            extended(&d, 4, 4, BoundaryCondition::SymmetricMirror),
            vec![3.0, 3.0, 2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 1.0]
        );
        assert_eq!(
            extended(&d, 2, 2, BoundaryCondition::AsymmetricMirror),
            vec![-2.0, -1.0, 1.0, 2.0, 3.0, -3.0, -2.0]
        );
        assert_eq!(
            extended(&d, 2, 2, BoundaryCondition::Periodic),
            vec![2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]
        );
        assert_eq!(
            extended(&d, 2, 2, BoundaryCondition::AsymmetricPeriodic),
            vec![-2.0, -3.0, 1.0, 2.0, 3.0, -1.0, -2.0]
        );
    }

    #[test]
    fn test_constant_and_extrapolation() {
        let d = [1.0, 3.0, 4.0];
        assert_eq!(
            extended(&d, 2, 1, BoundaryCondition::AddZeros),
            vec![0.0, 0.0, 1.0, 3.0, 4.0, 0.0]
        );
        assert_eq!(
            extended(&d, 2, 2, BoundaryCondition::ZeroOrderExtrapolate),
            vec![1.0, 1.0, 1.0, 3.0, 4.0, 4.0, 4.0]
        );
        assert_eq!(
            extended(&d, 2, 2, BoundaryCondition::FirstOrderExtrapolate),
            vec![-3.0, -1.0, 1.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(extended(&d, 1, 0, BoundaryCondition::AddMaxValue)[0], f64::MAX);
    }

    #[test]
    fn test_unsupported_rules() {
        let mut buf = [Complex32::new(1.0, 0.0); 3];
        assert!(matches!(
            extend_line(&mut buf, 1, 1, BoundaryCondition::AddMinValue),
            Err(FrameError::UnsupportedDataType { .. })
        ));
        let mut buf = [0.0f32; 3];
        assert!(matches!(
            extend_line(&mut buf, 1, 1, BoundaryCondition::ThirdOrderExtrapolate),
            Err(FrameError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_validate_without_a_buffer() {
        assert!(BoundaryCondition::AddMaxValue.validate::<f32>().is_ok());
        assert!(BoundaryCondition::Periodic.validate::<Complex32>().is_ok());
        assert!(matches!(
            BoundaryCondition::AddMaxValue.validate::<Complex32>(),
            Err(FrameError::UnsupportedDataType { .. })
        ));
        assert!(matches!(
            BoundaryCondition::SecondOrderExtrapolate.validate::<f64>(),
            Err(FrameError::NotImplemented(_))
        ));
        let img = Image::from_fn(&[4], |c| c[0] as f32);
        assert!(matches!(
            extend_image::<Complex32>(&img, &[1], &[1], &[BoundaryCondition::AddMinValue]),
            Err(FrameError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn test_extend_image_corners() {
        let img = Image::from_fn(&[3, 2], |c| (1 + c[0] + 3 * c[1]) as u8);
        let ext = extend_image::<f32>(&img, &[1], &[2], &[BoundaryCondition::Periodic]).unwrap();
        assert_eq!(ext.sizes(), &[6, 5]);
        assert_eq!(ext.data_type(), DataType::F32);
        for x in 0..6 {
            for y in 0..5 {
                let sx = (x as isize - 1).rem_euclid(3) as usize;
                let sy = (y as isize - 1).rem_euclid(2) as usize;
                let expected = (1 + sx + 3 * sy) as f32;
                assert_eq!(ext.sample::<f32>(&[x, y]).unwrap(), expected, "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_extend_image_already_expanded() {
        let full = Image::from_fn(&[6, 6], |c| (c[0] + 10 * c[1]) as f64);
        let inner = full.window(&[1, 1], &[4, 4]).unwrap();
        let ext = extend_image::<f64>(&inner, &[1], &[1], &[BoundaryCondition::AlreadyExpanded]).unwrap();
        assert_eq!(ext.sample::<f64>(&[0, 0]).unwrap(), 0.0);
        assert_eq!(ext.sample::<f64>(&[5, 5]).unwrap(), 55.0);
        let err = extend_image::<f64>(
            &inner,
            &[1],
            &[1],
            &[BoundaryCondition::AlreadyExpanded, BoundaryCondition::Periodic],
        );
        assert!(matches!(err, Err(FrameError::InvalidFlag(_))));
        assert!(extend_image::<f64>(&inner, &[2], &[2], &[BoundaryCondition::AlreadyExpanded]).is_err());
    }
}
