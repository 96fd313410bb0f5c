use criterion::{black_box, criterion_group, criterion_main, Criterion};
use runeclash_core::actor::{Actor, ActorId, Brand};
use runeclash_core::context::{AttackIntent, AttackTags, DamagePacket, StatusAttempt};
use runeclash_core::resolver::{AttackResolver, NullSink};
use runeclash_core::simulation::{simulate, simulate_parallel, ActorTemplate, SimConfig};
use runeclash_core::CombatRng;

fn bench_resolve_attack(c: &mut Criterion) {
    let resolver = AttackResolver::default();
    let mut attacker = Actor::new(ActorId::new(0), "attacker", 100);
    attacker.mod_cache.affinities.insert("fire".into(), 0.2);
    attacker.mod_cache.brands.push(Brand {
        kind: "arcane".into(),
        flat: 1.0,
        pct: 0.1,
    });
    let intent = AttackIntent::new(
        vec![DamagePacket::new("physical", 6.0), DamagePacket::new("fire", 4.0)],
        AttackTags::BASIC,
    )
    .with_statuses(vec![StatusAttempt::new("burn", 0.5, 3.0)]);
    let mut rng = CombatRng::new(42);

    c.bench_function("resolve_attack", |b| {
        b.iter(|| {
            // Fresh defender each iteration so HP never bottoms out
            let mut defender = Actor::new(ActorId::new(1), "defender", 1_000);
            defender.mod_cache.resists.insert("physical".into(), 0.25);
            black_box(resolver.resolve(
                &mut attacker,
                &mut defender,
                1,
                black_box(intent.clone()),
                &mut rng,
                &NullSink,
            ))
        })
    });
}

fn duel_config(n: u32) -> SimConfig {
    let mut a = ActorTemplate::named("striker", 40);
    a.stamina = 30;
    a.weapon.packets = vec![DamagePacket::new("physical", 6.0)];
    a.weapon.status_attempts = vec![StatusAttempt::new("bleed", 0.3, 2.0).with_potency(2.0)];
    let mut b = ActorTemplate::named("brute", 50);
    b.stamina = 30;
    b.weapon.packets = vec![DamagePacket::new("physical", 4.0)];
    SimConfig::new(a, b, n, 7)
}

fn bench_simulate_batch(c: &mut Criterion) {
    let config = duel_config(100);
    c.bench_function("simulate_100", |b| b.iter(|| black_box(simulate(&config))));
}

fn bench_simulate_parallel_batch(c: &mut Criterion) {
    let config = duel_config(100);
    c.bench_function("simulate_parallel_100", |b| {
        b.iter(|| black_box(simulate_parallel(&config)))
    });
}

criterion_group!(benches, bench_resolve_attack, bench_simulate_batch, bench_simulate_parallel_batch);
criterion_main!(benches);
