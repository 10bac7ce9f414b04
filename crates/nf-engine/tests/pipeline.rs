//! End-to-end pipeline test on a deterministic synthetic ensemble.

use approx::assert_relative_eq;
use nalgebra::DVector;
use nf_core::{AnalysisConfig, CategoryRegistry, Flavor};
use nf_engine::{
    pca, AnalysisInput, BeamVariation, FluxAnalysis, Spectrum, UniverseSet,
};

const N_UNIVERSES: usize = 10;

fn config() -> AnalysisConfig {
    AnalysisConfig::from_json(
        r#"{
            "binning": {"nue": 4, "nuebar": 4, "numu": 4, "numubar": 4},
            "categories": {"thintarget": false}
        }"#,
    )
    .unwrap()
}

fn nominal_value(position: usize) -> f64 {
    100.0 + position as f64
}

/// Universe value for a flat position: nominal scaled by a deterministic,
/// position-dependent variation so every bin has nonzero spread.
fn universe_value(position: usize, universe: usize, amp: f64) -> f64 {
    let pull = (universe as f64 - (N_UNIVERSES - 1) as f64 / 2.0) / (N_UNIVERSES as f64 / 2.0);
    let shape = 1.0 + 0.3 * ((position % 5) as f64);
    nominal_value(position) * (1.0 + amp * shape * pull)
}

fn make_set(index: &nf_core::FlatIndex, category: &str, amp: f64) -> UniverseSet {
    let mut set = UniverseSet::new(category);
    for u in 0..N_UNIVERSES {
        for (horn, flavor) in index.blocks() {
            let offset = index.offset(horn, flavor);
            let values: Vec<f64> = (0..index.n_bins(flavor))
                .map(|b| universe_value(offset + b, u, amp))
                .collect();
            set.push(index, Spectrum::new(horn, flavor, values)).unwrap();
        }
    }
    set
}

fn make_input(index: &nf_core::FlatIndex) -> AnalysisInput {
    let n = index.len();
    let nominal = DVector::from_iterator(n, (0..n).map(nominal_value));

    let mut up = nominal.clone();
    let mut down = nominal.clone();
    let mut single = nominal.clone();
    for i in 0..n {
        up[i] *= 1.0 + 0.02 * ((i % 3) as f64 + 1.0) / 3.0;
        down[i] *= 1.0 - 0.01;
        single[i] *= 1.0 + 0.005;
    }

    AnalysisInput {
        flux_ensemble: make_set(index, "total", 0.02),
        systematic_sets: vec![
            make_set(index, "mesinc", 0.015),
            make_set(index, "nua", 0.01),
            // disabled by config, must not contribute
            make_set(index, "thintarget", 0.5),
        ],
        nominal_stat_sigma: DVector::from_iterator(n, (0..n).map(|i| nominal_value(i).sqrt())),
        nominal_flux: nominal,
        beam_variations: vec![
            BeamVariation {
                name: "horn_current".to_string(),
                up,
                down: Some(down),
                zero_window: None,
            },
            BeamVariation {
                name: "water_layer".to_string(),
                up: single,
                down: None,
                zero_window: Some((0.0, 5.0)),
            },
        ],
    }
}

#[test]
fn pipeline_produces_consistent_budget() {
    let cfg = config();
    let index = cfg.flat_index().unwrap();
    let analysis = FluxAnalysis::new(index.clone(), cfg.registry());
    let products = analysis.run(&make_input(&index)).unwrap();

    let n = index.len();
    assert_eq!(n, 32);
    assert_eq!(products.labels.len(), n);
    assert_eq!(products.bin_rows.len(), n);

    // disabled category excluded entirely
    let names: Vec<&str> =
        products.hadron.categories.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(names, vec!["mesinc", "nua"]);

    // every covariance in the budget is symmetric
    for named in products.named_matrices() {
        let m = named.absolute.matrix();
        for i in 0..n {
            for j in 0..i {
                assert_relative_eq!(m[(i, j)], m[(j, i)], epsilon = 1e-9);
            }
        }
    }

    // correlation diagonal is 1 wherever the variance is nonzero, and all
    // entries are bounded
    for i in 0..n {
        assert_relative_eq!(products.total.correlation[(i, i)], 1.0, epsilon = 1e-12);
        for j in 0..n {
            assert!(products.total.correlation[(i, j)].abs() <= 1.0 + 1e-12);
        }
    }

    // statistical covariance is exactly diagonal
    let stat = products.statistical.covariance.matrix();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                assert_eq!(stat[(i, j)], 0.0);
            }
        }
    }

    // total = stat + pca-reconstructed hadron + beam, elementwise
    let beam = products.beam.as_ref().unwrap();
    let expected = stat
        + products.pca.reconstructed_absolute.matrix()
        + beam.total_absolute.matrix();
    for i in 0..n {
        for j in 0..n {
            assert_relative_eq!(
                products.total.absolute.matrix()[(i, j)],
                expected[(i, j)],
                epsilon = 1e-9
            );
        }
    }

    // flux prediction slices the ensemble mean and total sigma per block
    assert_eq!(products.flux_prediction.len(), 8);
    let first = &products.flux_prediction[0];
    assert_eq!(first.flavor, Flavor::NuE);
    assert_eq!(first.mean.len(), 4);
    assert_relative_eq!(first.sigma[0], products.total.sigma[0], epsilon = 1e-12);
}

#[test]
fn pipeline_eigen_spectrum_matches_trace_and_roundtrips() {
    let cfg = config();
    let index = cfg.flat_index().unwrap();
    let analysis = FluxAnalysis::new(index.clone(), cfg.registry());
    let products = analysis.run(&make_input(&index)).unwrap();

    let input_cov = &products.hadron.total_fractional;
    let pca_result = &products.pca.result;

    assert_relative_eq!(
        pca::eigenvalue_sum(pca_result),
        input_cov.trace(),
        epsilon = 1e-10
    );

    // default threshold keeps every nonzero component, so the
    // reconstruction reproduces the decomposition input
    let rec = products.pca.reconstructed_fractional.matrix();
    for i in 0..index.len() {
        for j in 0..index.len() {
            assert_relative_eq!(rec[(i, j)], input_cov.matrix()[(i, j)], epsilon = 1e-10);
        }
    }

    // variance fractions are a descending probability vector
    assert_relative_eq!(pca_result.fractions.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    for pair in pca_result.eigenvalues.windows(2) {
        assert!(pair[0] >= pair[1]);
    }

    // component spectra cover the kept components for all eight blocks
    assert_eq!(products.pca.component_spectra.len(), products.pca.n_kept * 8);
}

#[test]
fn pipeline_without_beam_runs() {
    let cfg = config();
    let index = cfg.flat_index().unwrap();
    let analysis = FluxAnalysis::new(index.clone(), cfg.registry());
    let mut input = make_input(&index);
    input.beam_variations.clear();

    let products = analysis.run(&input).unwrap();
    assert!(products.beam.is_none());

    let stat = products.statistical.covariance.matrix();
    let expected = stat + products.pca.reconstructed_absolute.matrix();
    assert_relative_eq!(
        products.total.absolute.matrix()[(0, 0)],
        expected[(0, 0)],
        epsilon = 1e-9
    );
}

#[test]
fn disabling_a_category_subtracts_its_exact_contribution() {
    let cfg = config();
    let index = cfg.flat_index().unwrap();
    let input = make_input(&index);

    let with_all = FluxAnalysis::new(index.clone(), cfg.registry());
    let products_all = with_all.run(&input).unwrap();

    let cfg_without = AnalysisConfig::from_json(
        r#"{
            "binning": {"nue": 4, "nuebar": 4, "numu": 4, "numubar": 4},
            "categories": {"thintarget": false, "nua": false}
        }"#,
    )
    .unwrap();
    let without = FluxAnalysis::new(index.clone(), cfg_without.registry());
    let products_without = without.run(&input).unwrap();

    let standalone = products_all
        .hadron
        .categories
        .iter()
        .find(|c| c.category == "nua")
        .unwrap();

    let diff = products_all.hadron.total_absolute.matrix() - standalone.absolute.matrix();
    let reduced = products_without.hadron.total_absolute.matrix();
    for i in 0..index.len() {
        for j in 0..index.len() {
            assert_relative_eq!(diff[(i, j)], reduced[(i, j)], epsilon = 1e-9);
        }
    }
}

#[test]
fn registry_defaults_apply_when_config_is_silent() {
    let cfg = AnalysisConfig::from_json(
        r#"{"binning": {"nue": 4, "nuebar": 4, "numu": 4, "numubar": 4}}"#,
    )
    .unwrap();
    let registry: CategoryRegistry = cfg.registry();
    let index = cfg.flat_index().unwrap();

    let analysis = FluxAnalysis::new(index.clone(), registry);
    // thintarget is opt-in and the config is silent, so it must be
    // excluded here too
    let products = analysis.run(&make_input(&index)).unwrap();
    assert!(products.hadron.categories.iter().all(|c| c.category != "thintarget"));
}
