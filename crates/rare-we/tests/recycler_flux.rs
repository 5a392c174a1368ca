use rare_we::{Binner, Boundary, FluxLedger, Population, RecycleReport, Recycler};

fn evaluated(points: &[(f64, f64)]) -> Population<f64> {
    let mut population = Population::new();
    for (weight, progress) in points {
        population.spawn(*progress, *weight);
    }
    for walker in population.walkers_mut() {
        let progress = *walker.state();
        walker.set_progress(progress);
    }
    population
}

#[test]
fn single_crossing_walker_carries_its_weight_as_flux() {
    let recycler = Recycler::new(-1.0_f64, vec![Boundary::forward(4.0)]).unwrap();
    let population = evaluated(&[(1.0, 5.0)]);

    let (population, report) = recycler.recycle(population).unwrap();
    assert_eq!(report.flux, vec![1.0]);
    assert_eq!(report.recycled.len(), 1);

    let walker = &population.walkers()[0];
    assert_eq!(*walker.state(), -1.0);
    assert_eq!(walker.weight(), 1.0);
    assert!(walker.progress().is_none());
    assert!(walker.bin().is_none());
    assert!(walker.is_recycled());
}

#[test]
fn flux_counts_only_walkers_recycled_this_call() {
    let recycler = Recycler::new(0.0_f64, vec![Boundary::forward(4.0)]).unwrap();
    let population = evaluated(&[(0.1, 0.5), (0.2, 4.5), (0.3, 3.9), (0.4, 4.0)]);

    let (population, report) = recycler.recycle(population).unwrap();
    assert!((report.total_flux() - 0.6).abs() < 1e-15);
    assert!((population.total_weight() - 1.0).abs() < 1e-15);
    let recycled: Vec<u64> = report.recycled.iter().map(|id| id.as_raw()).collect();
    assert_eq!(recycled, vec![1, 3]);
    assert_eq!(*population.walkers()[2].state(), 3.9);
}

#[test]
fn recycled_walkers_are_not_counted_twice_in_a_cycle() {
    // the seed itself lies past the boundary
    let recycler = Recycler::new(9.0_f64, vec![Boundary::forward(4.0)]).unwrap();
    let population = evaluated(&[(0.5, 5.0), (0.5, 1.0)]);
    let (mut population, first) = recycler.recycle(population).unwrap();
    assert_eq!(first.total_flux(), 0.5);

    for walker in population.walkers_mut() {
        if walker.progress().is_none() {
            let progress = *walker.state();
            walker.set_progress(progress);
        }
    }
    let (population, second) = recycler.recycle(population).unwrap();
    assert_eq!(second.total_flux(), 0.0);
    assert!(second.recycled.is_empty());
    assert_eq!(population.len(), 2);
}

#[test]
fn stepping_clears_the_recycled_flag() {
    let recycler = Recycler::new(9.0_f64, vec![Boundary::forward(4.0)]).unwrap();
    let (mut population, _) = recycler.recycle(evaluated(&[(1.0, 5.0)])).unwrap();
    let walker = &mut population.walkers_mut()[0];
    walker.advance_to(9.5);
    walker.set_progress(9.5);
    let (_, report) = recycler.recycle(population).unwrap();
    assert_eq!(report.flux, vec![1.0]);
}

#[test]
fn each_walker_is_credited_to_the_first_boundary_it_crossed() {
    let boundaries = vec![Boundary::forward(4.0), Boundary::retrograde(0.5)];
    let recycler = Recycler::new(2.0_f64, boundaries).unwrap();
    let population = evaluated(&[(0.25, 4.2), (0.25, 0.1), (0.25, 2.0), (0.25, 0.5)]);

    let crossings = recycler.crossings(&population);
    assert_eq!(crossings.len(), 3);

    let (population, report) = recycler.recycle(population).unwrap();
    assert_eq!(report.flux, vec![0.25, 0.5]);
    assert_eq!(population.iter().filter(|walker| walker.is_recycled()).count(), 3);
}

#[test]
fn no_boundaries_means_no_recycling() {
    let recycler = Recycler::new(0.0_f64, Vec::new()).unwrap();
    let (population, report) = recycler.recycle(evaluated(&[(1.0, 100.0)])).unwrap();
    assert!(report.flux.is_empty());
    assert_eq!(*population.walkers()[0].state(), 100.0);
}

#[test]
fn invariant_violations_raise_recycle_errors() {
    let recycler = Recycler::new(0.0_f64, vec![Boundary::forward(1.0)]).unwrap();

    let mut unevaluated = Population::new();
    unevaluated.spawn(0.5_f64, 1.0);
    let err = recycler.recycle(unevaluated).unwrap_err();
    assert_eq!(err.family(), "recycle");
    assert_eq!(err.info().code, "missing-progress");

    let err = recycler.recycle(evaluated(&[(-0.1, 0.5)])).unwrap_err();
    assert_eq!(err.info().code, "invalid-weight");

    assert!(Recycler::new(0.0_f64, vec![Boundary::forward(f64::NAN)]).is_err());
}

#[test]
fn recycled_walkers_rebin_after_reevaluation() {
    let binner = Binner::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
    let recycler = Recycler::new(0.5_f64, vec![Boundary::forward(3.0)]).unwrap();
    let population = binner.assign(evaluated(&[(0.5, 3.5), (0.5, 1.5)])).unwrap();

    let (mut population, _) = recycler.recycle(population).unwrap();
    for walker in population.walkers_mut() {
        if walker.progress().is_none() {
            let progress = *walker.state();
            walker.set_progress(progress);
        }
    }
    let population = binner.assign(population).unwrap();
    let bins: Vec<usize> = population.iter().map(|walker| walker.bin().unwrap()).collect();
    assert_eq!(bins, vec![0, 1]);
}

#[test]
fn ledger_accumulates_and_resets_explicitly() {
    let mut ledger = FluxLedger::new(2);
    ledger
        .record(&RecycleReport {
            flux: vec![0.25, 0.0],
            recycled: Vec::new(),
        })
        .unwrap();
    ledger
        .record(&RecycleReport {
            flux: vec![0.25, 0.5],
            recycled: Vec::new(),
        })
        .unwrap();
    assert_eq!(ledger.cumulative(), &[0.5, 0.5]);
    assert_eq!(ledger.total(), 1.0);
    assert_eq!(ledger.cycles(), 2);
    assert_eq!(ledger.mean_flux(), vec![0.25, 0.25]);

    let mismatch = RecycleReport {
        flux: vec![1.0],
        recycled: Vec::new(),
    };
    assert!(ledger.record(&mismatch).is_err());

    ledger.reset();
    assert_eq!(ledger.total(), 0.0);
    assert_eq!(ledger.mean_flux(), vec![0.0, 0.0]);
}
