use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use fog_games::{
    cache::{EfgTreeCache, PublicStateCache},
    gamestates::{goofspiel::GoofspielDomain, liars_dice::LiarsDiceDomain},
    Domain,
};

fn bench_build_tree(c: &mut Criterion) {
    c.bench_function("build_tree_iigs4", |b| {
        b.iter(|| {
            let domain: Rc<dyn Domain> = Rc::new(GoofspielDomain::iigs(4));
            let mut cache = EfgTreeCache::new(domain);
            cache.build_tree();
            cache.node_count()
        })
    });

    c.bench_function("build_tree_liars_dice", |b| {
        b.iter(|| {
            let domain: Rc<dyn Domain> = Rc::new(LiarsDiceDomain::new([2, 2], 2));
            let mut cache = EfgTreeCache::new(domain);
            cache.build_tree();
            cache.node_count()
        })
    });

    c.bench_function("build_public_states_iigs3", |b| {
        b.iter(|| {
            let domain: Rc<dyn Domain> = Rc::new(GoofspielDomain::iigs(3));
            let mut cache = PublicStateCache::new(domain);
            cache.build_tree();
            cache.count_public_states()
        })
    });
}

criterion_group!(benches, bench_build_tree);
criterion_main!(benches);
