//! Behavior shared by every pool kind, instantiated once per kind.

use core::hash::BuildHasherDefault;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rustc_hash::FxHasher;
use std::collections::HashSet;
use std::vec::Vec;

use super::{flags, Pool, PoolPtr};
use crate::algorithm::{Algorithm, Enumerate, Traversal};
use crate::growth::{Blocks, Dynamic, Global};
use crate::storage::{Growable, Policy};
use crate::test_utils::{DropCounter, Droppable, FlakyMemory, RNG_SEED};
use crate::{Bitset, Dlist, List, PoolError, Static};

#[repr(align(64))]
#[derive(Debug, Default, PartialEq)]
struct CacheLine(u64);

fn check_invariants<T, A: Algorithm<T, P>, P: Policy, const F: u32>(pool: &Pool<T, A, P, F>) {
    assert!(pool.len() <= pool.capacity());
    assert_eq!(pool.is_empty(), pool.len() == 0);
    assert_eq!(pool.is_full(), pool.len() == pool.capacity());
}

/// Creates `n` elements, then destroys them again in reverse order.
fn fill_and_drain<A: Algorithm<CacheLine, P>, P: Policy, const F: u32>(pool: &mut Pool<CacheLine, A, P, F>, n: usize) {
    let mut seen: HashSet<usize, BuildHasherDefault<FxHasher>> = HashSet::default();
    let mut ptrs = Vec::new();

    for i in 0..n {
        let before = pool.len();
        let ptr = pool.create(CacheLine(i as u64)).unwrap();
        assert_eq!(pool.len(), before + 1);
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        assert!(seen.insert(ptr.as_ptr() as usize), "slot handed out twice");
        ptrs.push(ptr);
        check_invariants(pool);
    }

    for (i, ptr) in ptrs.iter().enumerate() {
        assert_eq!(unsafe { ptr.as_ref() }.0, i as u64);
    }

    while let Some(ptr) = ptrs.pop() {
        let before = pool.len();
        unsafe { pool.destroy(ptr) };
        assert_eq!(pool.len(), before - 1);
        check_invariants(pool);
    }
    assert!(pool.is_empty());
}

/// Randomly creates and destroys elements, then checks that every element
/// was dropped exactly once.
fn randomized<'d, A: Algorithm<Droppable<'d, u32>, P>, P: Policy, const F: u32>(
    pool: &mut Pool<Droppable<'d, u32>, A, P, F>,
    drop_count: &'d DropCounter,
    limit: usize,
) {
    let mut rng = SmallRng::from_seed(RNG_SEED);
    let mut live: Vec<PoolPtr<Droppable<'d, u32>>> = Vec::new();
    let mut created = 0;

    for round in 0..2000u32 {
        if live.len() < limit && rng.gen_bool(0.55) {
            live.push(pool.create(drop_count.new_droppable(round)).unwrap());
            created += 1;
        } else if !live.is_empty() {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            let value = unsafe { pool.remove(victim) };
            assert!(value.value <= round);
        }
        assert_eq!(pool.len(), live.len());
    }

    for ptr in live.drain(..) {
        unsafe { pool.destroy(ptr) };
    }
    assert_eq!(drop_count.dropped(), created);
    assert!(pool.is_empty());
}

/// Counting through iteration matches `len` at sizes 0, 1, n/2 and n.
fn iteration_counts<A: Traversal<u32, P>, P: Policy, const F: u32>(pool: &mut Pool<u32, A, P, F>, n: usize) {
    assert_eq!(pool.iter().count(), 0);
    assert_eq!(pool.iter().next_back(), None);

    let mut target = 1;
    for i in 0..n {
        pool.create(i as u32).unwrap();
        if pool.len() == target || pool.len() == n {
            assert_eq!(pool.iter().count(), pool.len());
            assert_eq!(pool.iter().rev().count(), pool.len());
            assert_eq!(pool.iter_mut().len(), pool.len());
            target = n / 2;
        }
    }

    let sum: u32 = pool.iter().sum();
    assert_eq!(sum as usize, n * (n - 1) / 2);

    for x in &mut *pool {
        *x *= 2;
    }
    assert_eq!(pool.iter().map(|&x| x as usize).sum::<usize>(), n * (n - 1));
}

fn enumeration<'d, A: Enumerate<Droppable<'d, u32>, P>, P: Policy, const F: u32>(
    pool: &mut Pool<Droppable<'d, u32>, A, P, F>,
    drop_count: &'d DropCounter,
    n: usize,
) {
    let ptrs: Vec<_> = (0..n as u32).map(|i| pool.create(drop_count.new_droppable(i)).unwrap()).collect();
    for ptr in ptrs.iter().step_by(3) {
        unsafe { pool.destroy(*ptr) };
    }
    let destroyed = drop_count.dropped();

    let mut visited = 0;
    pool.for_each(|d| {
        assert_ne!(d.value % 3, 0);
        d.value += 1;
        visited += 1;
    });
    assert_eq!(visited, pool.len());

    pool.destroy_all();
    assert_eq!(pool.len(), 0);
    assert_eq!(drop_count.dropped(), destroyed + visited);

    pool.destroy_all();
    assert_eq!(pool.len(), 0);
    assert_eq!(drop_count.dropped(), destroyed + visited);
}

fn static_exhaustion<A: Algorithm<u32, P>, P: Policy, const F: u32>(pool: &mut Pool<u32, A, P, F>) {
    let cap = pool.capacity();
    for i in 0..cap {
        assert!(pool.create(i as u32).is_some());
    }
    assert!(pool.create(0).is_none());
    assert_eq!(pool.try_create(0), Err(PoolError::Exhausted));
    assert_eq!(pool.len(), cap);
    assert!(pool.is_full());
}

fn growable_behavior<A: Algorithm<u32, P>, P: Growable, const F: u32>(unit: usize) {
    // A pool without slots is empty and full at once.
    let mut pool = Pool::<u32, A, P, F>::new();
    assert_eq!(pool.capacity(), 0);
    assert!(pool.is_empty() && pool.is_full());

    // Growth past the reserved capacity.
    pool.reserve(2).unwrap();
    assert!(pool.capacity() >= 2);
    let a = pool.create(1).unwrap();
    let b = pool.create(2).unwrap();
    let c = pool.create(3).unwrap();
    assert!(pool.capacity() >= 3);
    assert_eq!(pool.len(), 3);

    // reserve never decreases capacity, shrink never drops below max(len, n).
    let cap = pool.capacity();
    pool.reserve(1).unwrap();
    assert_eq!(pool.capacity(), cap);
    pool.reserve(cap + 5).unwrap();
    assert!(pool.capacity() >= cap + 5);
    pool.shrink_to_fit(0);
    assert!(pool.capacity() >= pool.len());

    // Moving the whole pool keeps pointers valid.
    let (len, cap) = (pool.len(), pool.capacity());
    let mut moved = pool.take();
    assert_eq!((pool.len(), pool.capacity()), (0, 0));
    assert_eq!((moved.len(), moved.capacity()), (len, cap));
    unsafe {
        assert_eq!(*a.as_ref(), 1);
        assert_eq!(*b.as_ref(), 2);
        assert_eq!(*c.as_ref(), 3);
    }

    let mut target = Pool::<u32, A, P, F>::new();
    let spare = target.create(98);
    unsafe { target.destroy(spare) };
    assert_eq!(target.capacity(), unit);
    target.assign_from(&mut moved);
    assert_eq!((moved.len(), moved.capacity()), (0, 0));
    assert_eq!((target.len(), target.capacity()), (len, cap));

    unsafe {
        target.destroy(a);
        target.destroy(b);
        target.destroy(c);
    }
    target.shrink_to_fit(0);
    assert_eq!(target.capacity(), 0);

    // The moved-from pool is fully usable again.
    let p = pool.create(7).unwrap();
    assert_eq!(pool.capacity(), unit);
    unsafe { pool.destroy(p) };
}

fn fixed_capacity<A: Algorithm<u32, P>, P: Growable>(unit: usize) {
    let mut pool = Pool::<u32, A, P, { flags::FIXED_CAPACITY }>::new();
    assert!(pool.create(1).is_none());
    assert_eq!(pool.capacity(), 0);

    pool.reserve(1).unwrap();
    assert_eq!(pool.capacity(), unit);
    let ptrs: Vec<_> = (0..unit as u32).map(|i| pool.create(i).unwrap()).collect();
    assert!(pool.create(0).is_none());
    assert_eq!(pool.len(), unit);

    for ptr in ptrs {
        unsafe { pool.destroy(ptr) };
    }
}

macro_rules! static_suite {
    ($name:ident, $alg:ty, enumerate: $enumerate:tt, traverse: $traverse:tt) => {
        mod $name {
            use super::*;

            #[test]
            fn fill_and_drain() {
                let mut pool = Pool::<CacheLine, $alg, Static<u32, 32>>::new();
                super::fill_and_drain(&mut pool, 32);
                super::fill_and_drain(&mut pool, 17);
            }

            #[test]
            fn randomized() {
                let drop_count = DropCounter::new();
                let mut pool = Pool::<Droppable<'_, u32>, $alg, Static<u32, 64>>::new();
                super::randomized(&mut pool, &drop_count, 64);
            }

            #[test]
            fn exhaustion() {
                // Exhaustion, then reuse after destroying everything.
                let mut pool = Pool::<u32, $alg, Static<u32, 2>>::new();
                super::static_exhaustion(&mut pool);
                assert!(pool.create_with(|| 0).is_none());

                let mut pool = Pool::<u32, $alg, Static<u32, 2>>::new();
                let a = pool.create(1);
                let b = pool.create(2);
                unsafe {
                    pool.destroy(a);
                    pool.destroy(b);
                }
                assert_eq!(pool.len(), 0);
                assert_eq!(pool.capacity(), 2);
            }

            static_suite!(@enumerate $enumerate, $alg);
            static_suite!(@traverse $traverse, $alg);
        }
    };
    (@enumerate yes, $alg:ty) => {
        #[test]
        fn enumeration() {
            let drop_count = DropCounter::new();
            let mut pool = Pool::<Droppable<'_, u32>, $alg, Static<u32, 30>>::new();
            super::enumeration(&mut pool, &drop_count, 30);
        }
    };
    (@enumerate no, $alg:ty) => {};
    (@traverse yes, $alg:ty) => {
        #[test]
        fn iteration() {
            let mut pool = Pool::<u32, $alg, Static<u32, 40>>::new();
            super::iteration_counts(&mut pool, 40);
        }
    };
    (@traverse no, $alg:ty) => {};
}

macro_rules! growable_suite {
    ($name:ident, $alg:ty, $policy:ty, unit: $unit:expr, enumerate: $enumerate:tt, traverse: $traverse:tt) => {
        mod $name {
            use super::*;

            #[test]
            fn fill_and_drain() {
                let mut pool = Pool::<CacheLine, $alg, $policy>::new();
                super::fill_and_drain(&mut pool, 50);
                super::fill_and_drain(&mut pool, 7);
            }

            #[test]
            fn randomized() {
                let drop_count = DropCounter::new();
                let mut pool = Pool::<Droppable<'_, u32>, $alg, $policy>::new();
                super::randomized(&mut pool, &drop_count, 100);
            }

            #[test]
            fn growable_behavior() {
                super::growable_behavior::<$alg, $policy, 0>($unit);
            }

            #[test]
            fn fixed_capacity() {
                super::fixed_capacity::<$alg, $policy>($unit);
            }

            growable_suite!(@enumerate $enumerate, $alg, $policy);
            growable_suite!(@traverse $traverse, $alg, $policy);
        }
    };
    (@enumerate yes, $alg:ty, $policy:ty) => {
        #[test]
        fn enumeration() {
            let drop_count = DropCounter::new();
            let mut pool = Pool::<Droppable<'_, u32>, $alg, $policy>::new();
            super::enumeration(&mut pool, &drop_count, 45);
        }
    };
    (@enumerate no, $alg:ty, $policy:ty) => {};
    (@traverse yes, $alg:ty, $policy:ty) => {
        #[test]
        fn iteration() {
            let mut pool = Pool::<u32, $alg, $policy>::new();
            super::iteration_counts(&mut pool, 40);
        }
    };
    (@traverse no, $alg:ty, $policy:ty) => {};
}

static_suite!(static_list, List, enumerate: yes, traverse: no);
static_suite!(static_bitset, Bitset<{ crate::bitset_words(64) }>, enumerate: yes, traverse: yes);
static_suite!(static_dlist, Dlist, enumerate: yes, traverse: yes);

growable_suite!(dynamic_list, List, Dynamic<Global>, unit: 1, enumerate: no, traverse: no);
growable_suite!(block_list, List, Blocks<Global, 4>, unit: 4, enumerate: no, traverse: no);
growable_suite!(dynamic_dlist, Dlist, Dynamic<Global>, unit: 1, enumerate: yes, traverse: yes);
growable_suite!(block_dlist, Dlist, Blocks<Global, 4>, unit: 4, enumerate: yes, traverse: yes);

#[test]
fn block_pool_regrows_after_full_shrink() {
    // Shrinking an unused block pool, then growing it by one block.
    let mut pool = crate::PoolDlistBlock::<u32, 2>::new();
    pool.shrink_to_fit(0);
    assert_eq!(pool.capacity(), 0);
    pool.create(1).unwrap();
    assert_eq!(pool.capacity(), 2);
}

#[test]
fn block_shrink_waits_for_empty_pool() {
    let mut pool = crate::PoolListBlock::<u32, 2>::new();
    let ptrs: Vec<_> = (0..5).map(|i| pool.create(i).unwrap()).collect();
    assert_eq!(pool.capacity(), 6);

    unsafe { pool.destroy(ptrs[0]) };
    pool.shrink_to_fit(0);
    assert_eq!(pool.capacity(), 6);

    for &ptr in &ptrs[1..] {
        unsafe { pool.destroy(ptr) };
    }
    pool.shrink_to_fit(3);
    assert_eq!(pool.capacity(), 4);

    // The rebuilt free chain covers every surviving slot.
    let ptrs: Vec<_> = (0..4).map(|i| pool.create(i).unwrap()).collect();
    assert_eq!(pool.capacity(), 4);
    for ptr in ptrs {
        unsafe { pool.destroy(ptr) };
    }
}

#[test]
fn reserve_shortfall() {
    type Flaky = Pool<u32, Dlist, Dynamic<FlakyMemory>>;
    type FlakyRaising = Pool<u32, Dlist, Dynamic<FlakyMemory>, { flags::RESERVE_RAISES }>;

    {
        let _budget = FlakyMemory::budget(3);
        let mut pool = Flaky::new();
        assert_eq!(pool.reserve(10), Ok(()));
        assert_eq!(pool.capacity(), 3);
    }

    {
        let _budget = FlakyMemory::budget(3);
        let mut pool = FlakyRaising::new();
        assert_eq!(
            pool.reserve(10),
            Err(PoolError::AllocFailed { requested: 10, capacity: 3 })
        );
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.reserve(3), Ok(()));

        let ptrs: Vec<_> = (0..3).map(|i| pool.create(i).unwrap()).collect();
        assert!(pool.create(3).is_none());
        assert_eq!(pool.try_create(3), Err(PoolError::Exhausted));
        for ptr in ptrs {
            unsafe { pool.destroy(ptr) };
        }
    }

    assert_eq!(FlakyMemory::outstanding(), 0);
}

#[test]
fn dropping_pools_releases_all_storage() {
    type Blocky = Pool<u32, Dlist, Blocks<FlakyMemory, 3>>;
    type Single = Pool<u32, List, Dynamic<FlakyMemory>>;

    {
        let mut pool = Blocky::new();
        for i in 0..10 {
            pool.create(i);
        }
        let mut single = Single::new();
        let p = single.create(1);
        let q = single.create(2);
        unsafe {
            single.destroy(p);
            single.destroy(q);
        }
        assert_eq!(single.capacity(), 2);
    }
    assert_eq!(FlakyMemory::outstanding(), 0);
}
