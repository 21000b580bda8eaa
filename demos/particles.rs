use rand::{rngs::SmallRng, Rng, SeedableRng};
use slotpool::{PoolDlistBlock, PoolPtr, SPoolBitset};

const EMITTERS: usize = 8;
const FRAMES: u32 = 240;
const GRAVITY: f32 = -9.81;
const DT: f32 = 1.0 / 60.0;

#[derive(Debug)]
struct Particle {
    pos: (f32, f32),
    vel: (f32, f32),
    ttl: u32,
    emitter: usize,
}

#[derive(Debug)]
struct Emitter {
    origin: (f32, f32),
    rate: u32,
    spawned: u32,
}

fn spawn(rng: &mut SmallRng, emitter: &mut Emitter, id: usize) -> Particle {
    emitter.spawned += 1;
    Particle {
        pos: emitter.origin,
        vel: (rng.gen_range(-2.0..2.0), rng.gen_range(4.0..8.0)),
        ttl: rng.gen_range(30..120),
        emitter: id,
    }
}

fn main() {
    let mut rng = SmallRng::seed_from_u64(0x0123_4567_89AB_CDEF);

    // Emitters never move once placed, so a small static pool is enough;
    // their addresses are stable and particles refer back to them by index.
    let mut emitters = SPoolBitset::<Emitter, EMITTERS, { slotpool::bitset_words(EMITTERS) }>::new();
    let mut handles: Vec<PoolPtr<Emitter>> = Vec::with_capacity(EMITTERS);
    for i in 0..EMITTERS {
        let origin = (i as f32 * 4.0, 0.0);
        let rate = rng.gen_range(1..6);
        let e = emitters
            .create(Emitter { origin, rate, spawned: 0 })
            .unwrap();
        handles.push(e);
    }

    let mut particles = PoolDlistBlock::<Particle, 64>::new();
    particles.reserve(256).unwrap();

    let mut peak = 0;
    let mut expired = 0;
    for frame in 0..FRAMES {
        for (id, &e) in handles.iter().enumerate() {
            let emitter = unsafe { e.as_mut() };
            for _ in 0..emitter.rate {
                let p = spawn(&mut rng, emitter, id);
                particles.create(p);
            }
        }

        for p in particles.iter_mut() {
            p.vel.1 += GRAVITY * DT;
            p.pos.0 += p.vel.0 * DT;
            p.pos.1 += p.vel.1 * DT;
            p.ttl = p.ttl.saturating_sub(1);
        }

        let mut cursor = particles.cursor_front_mut();
        while let Some(p) = cursor.current() {
            if p.ttl == 0 || p.pos.1 < -10.0 {
                cursor.destroy_current();
                expired += 1;
            } else {
                cursor.move_next();
            }
        }

        peak = peak.max(particles.len());
        if frame % 60 == 59 {
            println!(
                "frame {:3}: {:4} live particles, capacity {:4}",
                frame + 1,
                particles.len(),
                particles.capacity()
            );
        }
    }

    let mut per_emitter = [0usize; EMITTERS];
    for p in particles.iter() {
        per_emitter[p.emitter] += 1;
    }

    for (id, e) in emitters.iter().enumerate() {
        println!(
            "emitter {} at {:5.1}: spawned {:4}, {:3} still alive",
            id, e.origin.0, e.spawned, per_emitter[id]
        );
    }
    println!("peak {}, expired {}", peak, expired);

    particles.destroy_all();
    particles.shrink_to_fit(0);
    assert_eq!(particles.capacity(), 0);
}
