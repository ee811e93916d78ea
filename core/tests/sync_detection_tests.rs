use chirplink_core::sync::{generate_chirp, generate_frontdoor, DetectionThreshold, FrontdoorDetector};
use chirplink_core::ProtocolDescriptor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const SAMPLE_RATE: u32 = 44100;

fn noise(len: usize, sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..len).map(|_| normal.sample(&mut rng)).collect()
}

fn detector(protocol: &ProtocolDescriptor, window_len: usize, threshold: DetectionThreshold) -> FrontdoorDetector {
    FrontdoorDetector::new(protocol, SAMPLE_RATE, window_len, threshold).expect("Failed to build detector")
}

#[test]
fn test_detect_frontdoor_in_silence() {
    let protocol = ProtocolDescriptor::standard();
    let frontdoor = generate_frontdoor(&protocol, SAMPLE_RATE, 0.5);

    let mut samples = vec![0.0; 4000];
    samples.extend_from_slice(&frontdoor);
    samples.extend_from_slice(&vec![0.0; 4000]);

    let mut detector = detector(&protocol, samples.len(), DetectionThreshold::Adaptive);
    let detection = detector.scan(&samples).unwrap();
    assert!(detection.is_some(), "Failed to detect frontdoor with clean chirp signal");

    // STRICT: frontdoor should be detected exactly at the start position
    assert_eq!(
        detection.unwrap().position,
        4000,
        "STRICT: frontdoor must be detected at exact position 4000"
    );
}

#[test]
fn test_detect_frontdoor_in_noise() {
    let protocol = ProtocolDescriptor::standard();
    let frontdoor = generate_frontdoor(&protocol, SAMPLE_RATE, 0.5);

    let mut samples = noise(10_000, 0.05, 1);
    for (sample, &chirp) in samples[2500..2500 + frontdoor.len()].iter_mut().zip(frontdoor.iter()) {
        *sample += chirp;
    }

    let mut detector = detector(&protocol, samples.len(), DetectionThreshold::Adaptive);
    let detection = detector.scan(&samples).unwrap().expect("Frontdoor lost in noise");
    assert!(
        (detection.position as i64 - 2500).abs() <= 2,
        "Detected at {}, expected 2500",
        detection.position
    );
    assert!(detection.confidence > 0.8);
}

#[test]
fn test_quiet_frontdoor_detected() {
    let protocol = ProtocolDescriptor::compact();
    let frontdoor = generate_frontdoor(&protocol, SAMPLE_RATE, 0.01);

    let mut samples = vec![0.0; 1000];
    samples.extend_from_slice(&frontdoor);
    samples.extend_from_slice(&vec![0.0; 3000]);

    let mut detector = detector(&protocol, samples.len(), DetectionThreshold::Adaptive);
    let detection = detector.scan(&samples).unwrap().expect("Quiet frontdoor missed");
    assert_eq!(detection.position, 1000);
}

#[test]
fn test_noise_only_never_detects() {
    let protocol = ProtocolDescriptor::standard();
    let window_len = protocol.frontdoor_samples(SAMPLE_RATE) * 2;
    let mut detector = detector(&protocol, window_len, DetectionThreshold::Adaptive);

    for seed in 0..10 {
        let samples = noise(window_len, 0.2, seed);
        assert!(
            detector.scan(&samples).unwrap().is_none(),
            "White noise (seed {}) triggered a detection",
            seed
        );
    }
}

#[test]
fn test_wrong_sweep_does_not_match() {
    let protocol = ProtocolDescriptor::standard();
    let len = protocol.frontdoor_samples(SAMPLE_RATE);

    // Down-sweep over the same band
    let down = generate_chirp(len, 3000.0, 800.0, 0.5, SAMPLE_RATE as f32);
    let mut samples = vec![0.0; 2000];
    samples.extend_from_slice(&down);
    samples.extend_from_slice(&vec![0.0; 2000]);

    let mut detector = detector(&protocol, samples.len(), DetectionThreshold::Adaptive);
    assert!(detector.scan(&samples).unwrap().is_none());
}

#[test]
fn test_fixed_threshold_controls_sensitivity() {
    let protocol = ProtocolDescriptor::standard();
    let frontdoor = generate_frontdoor(&protocol, SAMPLE_RATE, 0.5);

    // Heavy noise pulls the peak well below 1.0
    let mut samples = noise(12_000, 0.5, 9);
    for (sample, &chirp) in samples[3000..3000 + frontdoor.len()].iter_mut().zip(frontdoor.iter()) {
        *sample += chirp;
    }

    let mut lenient = detector(&protocol, samples.len(), DetectionThreshold::Fixed(0.2));
    let mut strict = detector(&protocol, samples.len(), DetectionThreshold::Fixed(0.95));

    assert!(lenient.scan(&samples).unwrap().is_some());
    assert!(strict.scan(&samples).unwrap().is_none());
}
