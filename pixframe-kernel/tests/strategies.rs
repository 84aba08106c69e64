use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_abs_diff_eq;
use pixframe_kernel::{
    extend_image, full, scan, scan_in_place, separable, separable_convolution, BoundaryCondition, DataType,
    DyadicLineFilter, FrameError, FullLineFilter, FullLineParams, Image, Kernel, OneDimensionalFilter, Result,
    ScanLineFilter, ScanLineParams, ScanOptions, SeparableLineFilter, SeparableLineParams,
};
use pixframe_view::{CoordIter, TensorShape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_image(sizes: &[usize], seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    Image::from_fn(sizes, |_| rng.gen_range(-10.0f64..10.0))
}

// ============================================================================
// Scan
// ============================================================================

struct WeightedSum {
    weights: [f32; 3],
    samples: AtomicUsize,
}

impl ScanLineFilter<f32, f64> for WeightedSum {
    fn operations_per_sample(&self) -> usize {
        3
    }

    fn filter(&self, params: &mut ScanLineParams<'_, f32, f64>) -> Result<()> {
        for i in 0..params.length {
            let v: f32 = params
                .inputs
                .iter()
                .zip(self.weights)
                .map(|(line, w)| w * line.get(i))
                .sum();
            params.output.set(i, v as f64);
        }
        self.samples.fetch_add(params.length, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_scan_three_inputs_with_conversion() {
    let a = Image::from_fn(&[37, 11], |c| (c[0] % 200) as u8);
    let b = Image::from_fn(&[1, 11], |c| c[1] as i16 - 5);
    let c = Image::from_vec(&[], vec![0.5f64]).unwrap();
    let mut filter = WeightedSum {
        weights: [1.0, 2.0, 4.0],
        samples: AtomicUsize::new(0),
    };
    let mut out = Image::default();
    scan::<f32, f64, _>(&[&a, &b, &c], &mut out, DataType::F64, None, &mut filter, ScanOptions::default()).unwrap();
    assert_eq!(out.sizes(), &[37, 11]);
    assert_eq!(out.data_type(), DataType::F64);
    assert_eq!(filter.samples.load(Ordering::Relaxed), 37 * 11);
    for coords in CoordIter::new(&[37, 11]) {
        let expected = coords[0] as f64 + 2.0 * (coords[1] as f64 - 5.0) + 2.0;
        assert_eq!(out.sample::<f64>(&coords).unwrap(), expected);
    }
}

struct Norm;

impl ScanLineFilter<f64, f64> for Norm {
    fn filter(&self, params: &mut ScanLineParams<'_, f64, f64>) -> Result<()> {
        let input = &params.inputs[0];
        for i in 0..params.length {
            let sq: f64 = (0..input.tensor_elements()).map(|t| input.get_tensor(i, t).powi(2)).sum();
            params.output.set(i, sq.sqrt());
        }
        Ok(())
    }
}

#[test]
fn test_scan_tensor_to_scalar() {
    let data: Vec<f64> = (0..8).flat_map(|i| [3.0 * i as f64, 4.0 * i as f64]).collect();
    let img = Image::from_vec_tensor(&[8], TensorShape::vector(2), data).unwrap();
    let mut out = Image::default();
    scan::<f64, f64, _>(&[&img], &mut out, DataType::F32, Some(TensorShape::Scalar), &mut Norm, ScanOptions::default())
        .unwrap();
    assert!(out.is_scalar());
    assert_eq!(out.data_type(), DataType::F32);
    for i in 0..8 {
        assert_eq!(out.sample::<f32>(&[i]).unwrap(), 5.0 * i as f32);
    }
}

#[test]
fn test_scan_in_place_tensor_as_spatial_mismatch() {
    let mut img = Image::from_fn(&[6], |c| c[0] as f64);
    let other = Image::from_vec_tensor(&[6], TensorShape::vector(3), vec![1.0f64; 18]).unwrap();
    let mut filter = DyadicLineFilter::new(|x: f64, y: f64| x * y, 1);
    let options = ScanOptions {
        may_execute_in_place: true,
        tensor_as_spatial_dim: true,
        ..ScanOptions::default()
    };
    let err = scan_in_place::<f64, f64, _>(&mut img, &[&other], &mut filter, options).unwrap_err();
    assert!(matches!(err, FrameError::TensorMismatch(1, 3)));
    for i in 0..6 {
        assert_eq!(img.sample::<f64>(&[i]).unwrap(), i as f64);
    }
}

// ============================================================================
// Separable
// ============================================================================

struct CumulativeSum;

impl SeparableLineFilter<f64> for CumulativeSum {
    fn filter(&self, params: &mut SeparableLineParams<'_, f64>) -> Result<()> {
        let mut acc = 0.0;
        for i in 0..params.length {
            acc += params.buffer[params.border + i];
            params.output.set(i, acc);
        }
        Ok(())
    }
}

#[test]
fn test_separable_integral_image() {
    let img = Image::from_fn(&[9, 6, 4], |c| (c[0] + 2 * c[1] + 3 * c[2]) as u16);
    let mut out = Image::default();
    separable::<f64, _>(&img, &mut out, DataType::F64, &[], &[0], &[], &mut CumulativeSum).unwrap();
    for coords in CoordIter::new(&[9, 6, 4]) {
        let mut expected = 0.0;
        for inner in CoordIter::new(&[coords[0] + 1, coords[1] + 1, coords[2] + 1]) {
            expected += (inner[0] + 2 * inner[1] + 3 * inner[2]) as f64;
        }
        assert_eq!(out.sample::<f64>(&coords).unwrap(), expected);
    }
}

#[test]
fn test_separable_selected_dimensions_only() {
    let img = random_image(&[7, 5], 3);
    let mut out = Image::default();
    separable::<f64, _>(&img, &mut out, DataType::F64, &[false, true], &[0], &[], &mut CumulativeSum).unwrap();
    for x in 0..7 {
        let mut acc = 0.0;
        for y in 0..5 {
            acc += img.sample::<f64>(&[x, y]).unwrap();
            assert_abs_diff_eq!(out.sample::<f64>(&[x, y]).unwrap(), acc, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_already_expanded_reads_surrounding_data() {
    let big = random_image(&[20, 18], 4);
    let window = big.window(&[5, 4], &[10, 9]).unwrap();
    let filter = OneDimensionalFilter::new(vec![0.1, 0.2, 0.4, 0.2, 0.1]);
    let (mut inner, mut whole) = (Image::default(), Image::default());
    separable_convolution(&window, &mut inner, &[filter.clone()], &[BoundaryCondition::AlreadyExpanded], &[])
        .unwrap();
    separable_convolution(&big, &mut whole, &[filter], &[], &[]).unwrap();
    assert_eq!(inner.sizes(), &[10, 9]);
    for coords in CoordIter::new(&[10, 9]) {
        assert_abs_diff_eq!(
            inner.sample::<f64>(&coords).unwrap(),
            whole.sample::<f64>(&[coords[0] + 5, coords[1] + 4]).unwrap(),
            epsilon = 1e-12
        );
    }
}

// ============================================================================
// Full
// ============================================================================

struct Maximum;

impl FullLineFilter<f64> for Maximum {
    fn filter(&self, params: &mut FullLineParams<'_, f64>) -> Result<()> {
        for i in 0..params.length {
            let m = (0..params.input.number_of_pixels())
                .map(|k| params.input.pixel(i, k))
                .fold(f64::NEG_INFINITY, f64::max);
            params.output.set(i, m);
        }
        Ok(())
    }
}

#[test]
fn test_full_dilation_matches_extended_brute_force() {
    let img = random_image(&[15, 12], 5);
    let footprint = Image::from_fn(&[3, 5], |c| c[0] == 1 || c[1] == 2);
    let kernel = Kernel::new(footprint).unwrap();
    let bc = [BoundaryCondition::ZeroOrderExtrapolate];
    let mut out = Image::default();
    full::<f64, _>(&img, &mut out, DataType::F64, &bc, &kernel, &mut Maximum).unwrap();

    let ext = extend_image::<f64>(&img, &[1, 2], &[1, 2], &bc).unwrap();
    for coords in CoordIter::new(&[15, 12]) {
        let mut expected = f64::NEG_INFINITY;
        for k in CoordIter::new(&[3, 5]) {
            if k[0] == 1 || k[1] == 2 {
                expected = expected.max(ext.sample::<f64>(&[coords[0] + k[0], coords[1] + k[1]]).unwrap());
            }
        }
        assert_eq!(out.sample::<f64>(&coords).unwrap(), expected);
    }
}

struct CountPixels {
    pixels: AtomicUsize,
}

impl FullLineFilter<f64> for CountPixels {
    fn filter(&self, params: &mut FullLineParams<'_, f64>) -> Result<()> {
        self.pixels.store(params.input.number_of_pixels(), Ordering::Relaxed);
        for i in 0..params.length {
            params.output.set(i, params.input.pixel(i, 0));
        }
        Ok(())
    }
}

#[test]
fn test_full_neighborhood_reports_table_pixels() {
    let img = random_image(&[15, 12], 7);
    let cross = Kernel::new(Image::from_fn(&[3, 5], |c| c[0] == 1 || c[1] == 2)).unwrap();
    let mut filter = CountPixels {
        pixels: AtomicUsize::new(0),
    };
    let mut out = Image::default();
    full::<f64, _>(&img, &mut out, DataType::F64, &[], &cross, &mut filter).unwrap();
    assert_eq!(filter.pixels.load(Ordering::Relaxed), 7);
}

#[test]
fn test_full_rejects_oversized_kernel() {
    let img = random_image(&[4, 4], 6);
    let kernel = Kernel::new(Image::from_fn(&[5, 1], |_| 1.0f64)).unwrap();
    let mut out = Image::default();
    let err = full::<f64, _>(&img, &mut out, DataType::F64, &[], &kernel, &mut Maximum).unwrap_err();
    assert!(matches!(err, FrameError::KernelTooLarge { dim: 0, .. }));
}
