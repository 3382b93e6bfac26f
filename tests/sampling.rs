use parlance::{Observation, Sampling, UdpTransport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use std::time::Duration;

mod utils;
use utils::udp_receiver;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Sampler driven by a seeded generator so runs are repeatable
struct SeededSampler(Mutex<ChaCha8Rng>);

impl SeededSampler {
    fn new(seed: u64) -> Self {
        SeededSampler(Mutex::new(ChaCha8Rng::seed_from_u64(seed)))
    }
}

impl Sampling for SeededSampler {
    fn roll(&self) -> f64 {
        self.0.lock().unwrap().gen()
    }
}

#[test]
fn test_sampled_sends_land_near_the_rate() {
    const ATTEMPTS: usize = 200;

    let (addr, rx) = udp_receiver();
    let transport = UdpTransport::builder(&addr.to_string())
        .with_sampler(SeededSampler::new(42))
        .build();
    let observation = Observation::counter("some.counter", 1).with_sample_rate(0.5);

    let sent = (0..ATTEMPTS).filter(|_| transport.collect(&observation)).count();

    // Half the attempts, give or take
    assert!(sent > ATTEMPTS / 4, "sent {} of {}", sent, ATTEMPTS);
    assert!(sent < ATTEMPTS * 3 / 4, "sent {} of {}", sent, ATTEMPTS);

    // Every packet that went out carries the rate so the server can
    // compensate for the drops
    for _ in 0..sent {
        assert_eq!("some.counter:1|c|@0.5", rx.recv_timeout(RECV_TIMEOUT).unwrap());
    }
}

#[test]
fn test_unsampled_observations_always_send() {
    const ATTEMPTS: usize = 20;

    let (addr, rx) = udp_receiver();
    let transport = UdpTransport::builder(&addr.to_string())
        .with_sampler(SeededSampler::new(42))
        .build();
    let observation = Observation::counter("some.counter", 1);

    for _ in 0..ATTEMPTS {
        assert!(transport.collect(&observation));
    }
    for _ in 0..ATTEMPTS {
        assert_eq!("some.counter:1|c", rx.recv_timeout(RECV_TIMEOUT).unwrap());
    }
}
