use approx::assert_abs_diff_eq;
use pixframe::pixframe_kernel::{add, FilterTaps, PixelTable};
use pixframe::{
    convolution, convolve_ft, general_convolution, separable_convolution, uniform, BoundaryCondition,
    ConvolutionError, ConvolutionMethod, DataType, FilterSymmetry, Image, Kernel, OneDimensionalFilter,
    Representation,
};
use pixframe_view::CoordIter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

const ALL_BOUNDARIES: [BoundaryCondition; 7] = [
    BoundaryCondition::SymmetricMirror,
    BoundaryCondition::AsymmetricMirror,
    BoundaryCondition::Periodic,
    BoundaryCondition::AsymmetricPeriodic,
    BoundaryCondition::AddZeros,
    BoundaryCondition::ZeroOrderExtrapolate,
    BoundaryCondition::FirstOrderExtrapolate,
];

fn random_image(sizes: &[usize], seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(0.0f32, 100.0);
    Image::from_fn(sizes, |_| dist.sample(&mut rng))
}

/// Largest difference relative to the largest magnitude in `a`.
fn relative_difference(a: &Image, b: &Image) -> f64 {
    assert_eq!(a.sizes(), b.sizes());
    let (mut diff, mut scale) = (0.0f64, 0.0f64);
    for c in CoordIter::new(a.sizes()) {
        let (x, y) = (a.sample::<f64>(&c).unwrap(), b.sample::<f64>(&c).unwrap());
        diff = diff.max((x - y).abs());
        scale = scale.max(x.abs());
    }
    diff / scale.max(f64::MIN_POSITIVE)
}

#[test]
fn test_symmetric_tags_match_general_filter() {
    let img = random_image(&[31, 12], 11);
    let mut rng = StdRng::seed_from_u64(12);
    let normal = Normal::new(0.0, 1.0).unwrap();
    for symmetry in [
        FilterSymmetry::Even,
        FilterSymmetry::Odd,
        FilterSymmetry::DoubleEven,
        FilterSymmetry::DoubleOdd,
    ] {
        let stored: Vec<f64> = (0..4).map(|_| normal.sample(&mut rng)).collect();
        let compact = OneDimensionalFilter::new(stored).with_symmetry(symmetry);
        let general = match compact.full_taps() {
            FilterTaps::Real(taps) => OneDimensionalFilter::new(taps),
            FilterTaps::Complex(_) => unreachable!(),
        };
        for bc in ALL_BOUNDARIES {
            let (mut a, mut b) = (Image::default(), Image::default());
            separable_convolution(&img, &mut a, &[compact.clone()], &[bc], &[]).unwrap();
            separable_convolution(&img, &mut b, &[general.clone()], &[bc], &[]).unwrap();
            assert!(relative_difference(&a, &b) < 1e-5, "{} under {}", symmetry, bc);
        }
    }
}

#[test]
fn test_separable_fourier_and_direct_agree() {
    let img = random_image(&[40, 27], 21);
    let kernel = Image::from_fn(&[7, 5], |c| {
        let x = c[0] as f64 - 3.0;
        let y = c[1] as f64 - 2.0;
        (-(x * x) / 4.0).exp() * (1.0 + 0.5 * y)
    });
    for bc in [BoundaryCondition::SymmetricMirror, BoundaryCondition::Periodic, BoundaryCondition::AddZeros] {
        let (mut sep, mut ft, mut direct) = (Image::default(), Image::default(), Image::default());
        convolution(&img, &kernel, &mut sep, ConvolutionMethod::Separable, &[bc]).unwrap();
        convolution(&img, &kernel, &mut ft, ConvolutionMethod::Fourier, &[bc]).unwrap();
        let k = Kernel::new(kernel.quick_copy()).unwrap();
        general_convolution(&img, &k, &mut direct, &[bc]).unwrap();
        assert!(relative_difference(&direct, &sep) < 2e-5, "separable under {}", bc);
        assert!(relative_difference(&direct, &ft) < 2e-5, "Fourier under {}", bc);
    }
}

#[test]
fn test_asymmetric_kernel_fourier_matches_direct() {
    let img = Image::from_fn(&[14, 7], |c| (c[0] + 14 * c[1]) as f32);
    let mut kernel = Image::scalar_image(&[4, 3], DataType::F32);
    for y in 0..3 {
        kernel.set_sample(&[1, y], 1.0f32).unwrap();
        kernel.set_sample(&[3, y], -1.0f32).unwrap();
    }
    let bc = [BoundaryCondition::AsymmetricMirror];
    let (mut ft, mut direct) = (Image::default(), Image::default());
    let spatial = Representation::Spatial;
    convolve_ft(&img, &kernel, &mut ft, spatial, spatial, spatial, &bc).unwrap();
    general_convolution(&img, &Kernel::new(kernel.quick_copy()).unwrap(), &mut direct, &bc).unwrap();
    assert_eq!(ft.sizes(), &[14, 7]);
    assert!(relative_difference(&direct, &ft) < 2e-5);
}

#[test]
fn test_constant_image_through_fourier() {
    let mut img = Image::scalar_image(&[16, 8], DataType::F32);
    img.fill(10.0f32).unwrap();
    let mut filter = Image::scalar_image(&[4, 4], DataType::F32);
    filter.fill(5.0f32).unwrap();
    let mut out = Image::default();
    let spatial = Representation::Spatial;
    convolve_ft(&img, &filter, &mut out, spatial, spatial, spatial, &[]).unwrap();
    for c in CoordIter::new(&[16, 8]) {
        assert_abs_diff_eq!(out.sample::<f32>(&c).unwrap(), 800.0, epsilon = 1e-3);
    }
}

#[test]
fn test_separable_request_on_non_separable_kernel() {
    let img = random_image(&[9, 9], 31);
    let kernel = Image::from_vec(&[3, 3], vec![1.0f32, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]).unwrap();
    let mut out = Image::default();
    let err = convolution(&img, &kernel, &mut out, ConvolutionMethod::Separable, &[]).unwrap_err();
    assert!(matches!(err, ConvolutionError::NotSeparable));
    let method: ConvolutionMethod = "separable".parse().unwrap();
    assert_eq!(method, ConvolutionMethod::Separable);
    assert!(matches!(
        "quickest".parse::<ConvolutionMethod>(),
        Err(ConvolutionError::UnknownMethod(_))
    ));
}

#[test]
fn test_best_runs_mid_sized_kernel_directly() {
    // 8x8 has more pixels than 7^2, yet direct is estimated cheaper than
    // Fourier on a 512x512 image, so Best must produce the direct result.
    let img = random_image(&[512, 512], 71);
    let mut rng = StdRng::seed_from_u64(72);
    let normal = Normal::new(0.0f64, 1.0).unwrap();
    let kernel = Image::from_fn(&[8, 8], |_| normal.sample(&mut rng));
    assert!(pixframe::separate_filter(&kernel).is_none());
    let cost = pixframe::CostModel::default().estimate(&[512, 512], 512 * 512, &[8, 8]);
    assert!(cost.direct < cost.fourier);

    let bc = [BoundaryCondition::SymmetricMirror];
    let (mut best, mut direct) = (Image::default(), Image::default());
    convolution(&img, &kernel, &mut best, ConvolutionMethod::Best, &bc).unwrap();
    convolution(&img, &kernel, &mut direct, ConvolutionMethod::Direct, &bc).unwrap();
    assert_eq!(best.data_type(), direct.data_type());
    for c in CoordIter::new(&[512, 512]) {
        let (a, b) = (best.sample::<f64>(&c).unwrap(), direct.sample::<f64>(&c).unwrap());
        assert_eq!(a.to_bits(), b.to_bits(), "at {:?}", c);
    }
}

#[test]
fn test_identity_kernel_is_noop() {
    let img = random_image(&[13, 6, 3], 41);
    let identity = Image::from_vec(&[1], vec![1.0f32]).unwrap();
    for method in [ConvolutionMethod::Separable, ConvolutionMethod::Best] {
        let mut out = Image::default();
        convolution(&img, &identity, &mut out, method, &[]).unwrap();
        assert_eq!(out.data_type(), DataType::F32);
        for c in CoordIter::new(img.sizes()) {
            let (a, b) = (img.sample::<f32>(&c).unwrap(), out.sample::<f32>(&c).unwrap());
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}

#[test]
fn test_broadcast_column_plus_one() {
    let mut column = Image::scalar_image(&[256, 1], DataType::F32);
    column.expand_singleton_dimension(1, 256).unwrap();
    let one = Image::from_vec(&[], vec![1.0f32]).unwrap();
    let mut out = Image::default();
    add(&column, &one, &mut out, DataType::F32).unwrap();
    assert_eq!(out.sizes(), &[256, 256]);
    assert_eq!(out.strides()[1], 0);
    for c in [[0, 0], [255, 255], [17, 200], [128, 3]] {
        assert_eq!(out.sample::<f32>(&c).unwrap(), 1.0);
    }
}

#[test]
fn test_binary_kernel_equals_weighted_ones() {
    let img = random_image(&[21, 17], 51);
    let footprint = [true, true, false, true, true, true, false, true, false, true, true, true];
    let binary = Image::from_vec(&[4, 3], footprint.to_vec()).unwrap();
    let weighted = Image::from_fn(&[4, 3], |c| if footprint[c[0] + 4 * c[1]] { 1.0f32 } else { 0.0 });
    let bc = [BoundaryCondition::SymmetricMirror];
    let (mut a, mut b, mut mean) = (Image::default(), Image::default(), Image::default());
    general_convolution(&img, &Kernel::new(binary.quick_copy()).unwrap(), &mut a, &bc).unwrap();
    general_convolution(&img, &Kernel::new(weighted).unwrap(), &mut b, &bc).unwrap();
    assert!(relative_difference(&a, &b) < 1e-5);

    uniform(&img, &Kernel::new(binary).unwrap(), &mut mean, &bc).unwrap();
    let count = footprint.iter().filter(|&&f| f).count() as f64;
    for c in CoordIter::new(img.sizes()) {
        assert_abs_diff_eq!(
            mean.sample::<f64>(&c).unwrap() * count,
            a.sample::<f64>(&c).unwrap(),
            epsilon = 1e-2
        );
    }
}

#[test]
fn test_pixel_table_mirror_is_involution() {
    let mut rng = StdRng::seed_from_u64(61);
    let dist = Uniform::new(-1.0f64, 1.0);
    let weights = Image::from_fn(&[5, 4, 3], |_| {
        let v = dist.sample(&mut rng);
        if v.abs() < 0.3 {
            0.0
        } else {
            v
        }
    });
    let kernel = Kernel::new(weights).unwrap();
    for dim in 0..3 {
        let table: PixelTable = kernel.pixel_table(3, dim).unwrap();
        let mut twice = table.clone();
        twice.mirror();
        assert_ne!(twice, table);
        twice.mirror();
        assert_eq!(twice, table);
    }
}
