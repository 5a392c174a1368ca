use rare_core::rng::{derive_substream_seed, RngHandle};

#[test]
fn same_seed_replays_the_same_draws() {
    let mut rng_a = RngHandle::from_seed(1234);
    let mut rng_b = RngHandle::from_seed(1234);

    let seq_a: Vec<f64> = (0..100).map(|_| rng_a.uniform()).collect();
    let seq_b: Vec<f64> = (0..100).map(|_| rng_b.uniform()).collect();

    assert_eq!(seq_a, seq_b);
    assert_eq!(rng_a.seed(), 1234);
}

#[test]
fn uniform_draws_stay_in_unit_interval() {
    let mut rng = RngHandle::from_seed(77);
    for _ in 0..1000 {
        let value = rng.uniform();
        assert!((0.0..1.0).contains(&value));
    }
}

#[test]
fn substreams_differ_per_index() {
    let a = derive_substream_seed(42, 0);
    let b = derive_substream_seed(42, 1);
    assert_ne!(a, b);
    assert_eq!(a, derive_substream_seed(42, 0));
    assert_eq!(RngHandle::for_substream(42, 1).seed(), b);
}

#[test]
fn weighted_pick_follows_shares() {
    let mut rng = RngHandle::from_seed(5);
    let shares = [0.0, 3.0, 1.0];
    let mut counts = [0usize; 3];
    for _ in 0..4000 {
        let index = rng.pick_weighted(&shares).expect("positive shares");
        counts[index] += 1;
    }
    assert_eq!(counts[0], 0);
    let fraction = counts[1] as f64 / 4000.0;
    assert!((fraction - 0.75).abs() < 0.03, "fraction {fraction}");
}

#[test]
fn weighted_pick_rejects_empty_mass() {
    let mut rng = RngHandle::from_seed(5);
    assert_eq!(rng.pick_weighted(&[]), None);
    assert_eq!(rng.pick_weighted(&[0.0, 0.0]), None);
    assert_eq!(rng.pick_weighted(&[f64::INFINITY, 1.0]), None);
}
