use std::collections::BTreeMap;

use proptest::prelude::*;
use rare_core::RngHandle;
use rare_we::{Binner, Population, SplitMerger, WalkerId};

fn binned(points: &[(f64, f64)]) -> Population<f64> {
    let binner = Binner::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
    let mut population = Population::new();
    for (weight, progress) in points {
        population.spawn(*progress, *weight);
    }
    for walker in population.walkers_mut() {
        let progress = *walker.state();
        walker.set_progress(progress);
    }
    binner.assign(population).unwrap()
}

fn counts_per_bin(population: &Population<f64>) -> BTreeMap<usize, usize> {
    population
        .occupancy()
        .into_iter()
        .map(|(bin, stats)| (bin, stats.walkers))
        .collect()
}

#[test]
fn four_walkers_in_one_bin_merge_down_to_target() {
    let population = binned(&[(0.25, 2.5), (0.25, 2.5), (0.25, 2.5), (0.25, 2.5)]);
    let resampler = SplitMerger::new(2, 1e-12).unwrap();
    let mut rng = RngHandle::from_seed(7);

    let (population, report) = resampler.resample(population, &mut rng).unwrap();
    assert_eq!(population.len(), 2);
    assert_eq!(report.merges, 2);
    assert_eq!(report.splits, 0);
    assert!(population.iter().all(|walker| walker.bin() == Some(2)));
    assert!((population.total_weight() - 1.0).abs() < 1e-15);
}

#[test]
fn splitting_the_heaviest_reaches_target() {
    let population = binned(&[(1.0, 0.5)]);
    let resampler = SplitMerger::new(4, 1e-12).unwrap();
    let mut rng = RngHandle::from_seed(1);

    let (population, report) = resampler.resample(population, &mut rng).unwrap();
    assert_eq!(report.splits, 3);
    let weights: Vec<f64> = population.iter().map(|walker| walker.weight()).collect();
    assert_eq!(weights, vec![0.25; 4]);
    assert_eq!(population.total_weight(), 1.0);
    let children: Vec<_> = population
        .iter()
        .filter(|walker| walker.parent().is_some())
        .collect();
    assert_eq!(children.len(), 3);
    assert!(population.iter().all(|walker| *walker.state() == 0.5));
}

#[test]
fn split_offspring_get_fresh_ids() {
    let population = binned(&[(0.5, 0.5), (0.5, 3.5)]);
    let resampler = SplitMerger::new(2, 1e-12).unwrap();
    let mut rng = RngHandle::from_seed(3);

    let (population, _) = resampler.resample(population, &mut rng).unwrap();
    let mut ids: Vec<u64> = population.iter().map(|walker| walker.id().as_raw()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn weight_floor_starves_a_bin_without_failing() {
    let population = binned(&[(1.0, 1.5)]);
    let resampler = SplitMerger::new(8, 0.3).unwrap();
    let mut rng = RngHandle::from_seed(11);

    let (population, report) = resampler.resample(population, &mut rng).unwrap();
    assert_eq!(population.len(), 2);
    assert_eq!(report.starved_bins, vec![1]);
    assert_eq!(population.total_weight(), 1.0);
}

#[test]
fn survivor_is_chosen_in_proportion_to_weight() {
    let resampler = SplitMerger::new(1, 1e-12).unwrap();
    let trials = 4000;
    let mut heavy_survived = 0usize;
    for seed in 0..trials {
        let population = binned(&[(0.3, 1.5), (0.1, 1.5)]);
        let mut rng = RngHandle::from_seed(seed);
        let (population, _) = resampler.resample(population, &mut rng).unwrap();
        assert_eq!(population.len(), 1);
        let survivor = &population.walkers()[0];
        assert!((survivor.weight() - 0.4).abs() < 1e-15);
        if survivor.id() == WalkerId::from_raw(0) {
            heavy_survived += 1;
        }
    }
    let fraction = heavy_survived as f64 / trials as f64;
    assert!(
        (fraction - 0.75).abs() < 0.03,
        "heavy walker survived {fraction} of merges"
    );
}

#[test]
fn light_walkers_are_absorbed_more_often() {
    let resampler = SplitMerger::new(2, 1e-12).unwrap();
    let trials = 4000;
    let mut absorbed = [0usize; 3];
    for seed in 0..trials {
        let population = binned(&[(0.1, 2.5), (0.3, 2.5), (0.6, 2.5)]);
        let mut rng = RngHandle::from_seed(seed);
        let (population, report) = resampler.resample(population, &mut rng).unwrap();
        assert_eq!(report.merges, 1);
        let missing = (0..3u64)
            .find(|raw| population.get(WalkerId::from_raw(*raw)).is_none())
            .unwrap();
        absorbed[missing as usize] += 1;
    }
    // pairs are drawn by inverse weight: about 0.74, 0.20 and 0.06
    assert!(absorbed[2] < absorbed[1] && absorbed[1] < absorbed[0], "{absorbed:?}");
    let heaviest = absorbed[2] as f64 / trials as f64;
    assert!((heaviest - 0.064).abs() < 0.02, "heaviest absorbed {heaviest}");
}

#[test]
fn resampling_is_reproducible_for_a_seed() {
    let points: Vec<(f64, f64)> = (0..12)
        .map(|index| (1.0 / 12.0, (index % 4) as f64 + 0.5))
        .collect();
    let resampler = SplitMerger::new(2, 1e-12).unwrap();
    let first = resampler
        .resample(binned(&points), &mut RngHandle::from_seed(99))
        .unwrap();
    let second = resampler
        .resample(binned(&points), &mut RngHandle::from_seed(99))
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn unbinned_walkers_are_rejected() {
    let mut population = Population::new();
    population.spawn(0.5_f64, 1.0);
    let resampler = SplitMerger::new(2, 1e-12).unwrap();
    let err = resampler
        .resample(population, &mut RngHandle::from_seed(0))
        .unwrap_err();
    assert_eq!(err.family(), "resample");
    assert_eq!(err.info().code, "unbinned-walker");
}

#[test]
fn zero_target_is_a_config_error() {
    assert_eq!(SplitMerger::new(0, 1e-12).unwrap_err().family(), "config");
}

proptest! {
    #[test]
    fn resampling_conserves_weight_and_hits_target(
        points in prop::collection::vec((0.001f64..1.0, 0.0f64..4.0), 1..40),
        target in 1usize..6,
        seed in any::<u64>(),
    ) {
        let population = binned(&points);
        let before = population.total_weight();
        let occupied: Vec<usize> = counts_per_bin(&population).into_keys().collect();

        let resampler = SplitMerger::new(target, 1e-12).unwrap();
        let mut rng = RngHandle::from_seed(seed);
        let (population, report) = resampler.resample(population, &mut rng).unwrap();

        prop_assert!((population.total_weight() - before).abs() < 1e-12);
        prop_assert!(report.starved_bins.is_empty());
        let after = counts_per_bin(&population);
        prop_assert_eq!(after.keys().copied().collect::<Vec<_>>(), occupied);
        for count in after.values() {
            prop_assert_eq!(*count, target);
        }
    }
}
