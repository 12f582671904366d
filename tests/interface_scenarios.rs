mod util;

use ddd_interface::algs::communicator::Communicator;
use ddd_interface::coupling::Gid;
use ddd_interface::interface::{Direction, InterfaceRegistry, TypeMask};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use util::{BORDER, GHOST, MASTER, Shared, run_ranks, store_for};

/// Per (remote proc, direction): global ids in interface order.
type Lists = BTreeMap<(usize, Direction), Vec<Gid>>;

fn random_world(n_ranks: usize, n_objects: u64, seed: u64) -> Vec<Shared> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n_objects)
        .map(|gid| {
            let owner = rng.gen_range(0..n_ranks);
            let mut copies = vec![(owner, MASTER)];
            for r in (0..n_ranks).filter(|&r| r != owner) {
                match rng.gen_range(0..4) {
                    0 => copies.push((r, BORDER)),
                    1 => copies.push((r, GHOST)),
                    _ => {}
                }
            }
            Shared::new(gid * 7 + 3, &copies)
                .attr(rng.gen_range(0..3))
                .typ(rng.gen_range(0..2))
        })
        .collect()
}

#[test]
fn three_owners_one_type_gives_single_ab_item_per_neighbour() {
    let world = vec![
        Shared::new(10, &[(0, MASTER), (1, BORDER), (2, BORDER)]).typ(0),
        Shared::new(11, &[(1, MASTER), (0, BORDER), (2, BORDER)]).typ(1),
        Shared::new(12, &[(2, MASTER), (0, BORDER), (1, BORDER)]).typ(1),
    ];
    let per_rank = run_ranks(3, |comm| {
        let store = store_for(comm.rank(), &world);
        let mut reg = InterfaceRegistry::default();
        let id = reg
            .define(TypeMask::of(&[0]).unwrap(), &[MASTER], &[BORDER])
            .unwrap();
        reg.build(id, &store, comm).unwrap();
        let view = reg.interface(id).unwrap();
        view.partitions()
            .map(|p| {
                (
                    p.proc(),
                    p.count(Direction::AB),
                    p.count(Direction::BA),
                    p.count(Direction::ABA),
                    p.channel().is_some(),
                )
            })
            .collect::<Vec<_>>()
    });
    assert_eq!(per_rank[0], vec![(1, 1, 0, 0, true), (2, 1, 0, 0, true)]);
    assert_eq!(per_rank[1], vec![(0, 0, 1, 0, true)]);
    assert_eq!(per_rank[2], vec![(0, 0, 1, 0, true)]);
}

#[test]
fn lists_mirror_across_processors() {
    let n = 4;
    let world = random_world(n, 200, 0xdd);
    let lists: Vec<(Lists, Lists)> = run_ranks(n, |comm| {
        let store = store_for(comm.rank(), &world);
        let mut reg = InterfaceRegistry::default();
        let id = reg
            .define(TypeMask::ALL, &[MASTER, BORDER], &[BORDER, GHOST])
            .unwrap();
        reg.build_all(&store, comm).unwrap();
        let collect = |view: ddd_interface::interface::InterfaceView<'_>| {
            let mut out = Lists::new();
            for part in view.partitions() {
                for d in Direction::ALL {
                    let gids: Vec<Gid> = part.entries(d).iter().map(|e| e.gid).collect();
                    if !gids.is_empty() {
                        out.insert((part.proc(), d), gids);
                    }
                }
            }
            out
        };
        (collect(reg.interface(id).unwrap()), collect(reg.standard()))
    });

    let mut checked = 0;
    for p in 0..n {
        for ((q, dir), gids) in &lists[p].0 {
            let mirrored = lists[*q].0.get(&(p, dir.mirror()));
            assert_eq!(mirrored, Some(gids), "rank {p} -> {q} {dir}");
            checked += 1;
        }
        for ((q, dir), gids) in &lists[p].1 {
            assert_eq!(*dir, Direction::ABA);
            assert_eq!(lists[*q].1.get(&(p, Direction::ABA)), Some(gids));
        }
    }
    assert!(checked > 0);
}

#[test]
fn rebuild_is_deterministic_and_covers_selection() {
    let world = random_world(3, 120, 7);
    run_ranks(3, |comm| {
        let store = store_for(comm.rank(), &world);
        let mut reg = InterfaceRegistry::default();
        let id = reg
            .define(TypeMask::of(&[1]).unwrap(), &[MASTER], &[BORDER, GHOST])
            .unwrap();

        reg.build(id, &store, comm).unwrap();
        let first = reg.interface(id).unwrap().entries().to_vec();
        let shape: Vec<_> = reg
            .interface(id)
            .unwrap()
            .partitions()
            .map(|p| (p.proc(), p.ranges()))
            .collect();

        reg.build(id, &store, comm).unwrap();
        let view = reg.interface(id).unwrap();
        assert_eq!(view.entries(), &first[..]);
        let again: Vec<_> = view.partitions().map(|p| (p.proc(), p.ranges())).collect();
        assert_eq!(again, shape);

        let def = reg.definition(id).unwrap();
        let selected: usize = store
            .objects()
            .map(|(o, h)| {
                store
                    .couplings(o)
                    .iter()
                    .filter(|c| def.direction(h, c).is_some())
                    .count()
            })
            .sum();
        let covered: usize = view
            .partitions()
            .map(|p| Direction::ALL.iter().map(|&d| p.count(d)).sum::<usize>())
            .sum();
        assert_eq!(covered, selected);
        assert_eq!(view.n_items(), selected);
    });
}

#[test]
fn teardown_then_rebuild_restores_same_structure() {
    let world = random_world(2, 40, 11);
    run_ranks(2, |comm| {
        let store = store_for(comm.rank(), &world);
        let mut reg = InterfaceRegistry::default();
        let id = reg.define(TypeMask::ALL, &[MASTER], &[BORDER]).unwrap();
        reg.set_name(id, "master-border").unwrap();
        reg.build_all(&store, comm).unwrap();
        let before = reg.dump();
        let allocated = reg.pool().allocated();

        reg.teardown_all();
        assert!(reg.interface(id).unwrap().is_empty());
        assert_eq!(reg.pool().free(), allocated);

        reg.build_all(&store, comm).unwrap();
        assert_eq!(reg.dump(), before);
        assert_eq!(reg.pool().allocated(), allocated);
        assert!(before.contains("\"master-border\""));
    });
}

#[test]
fn store_changes_show_up_after_rebuild() {
    use ddd_interface::algs::communicator::LocalHub;

    let comms = LocalHub::new(3).comms();
    let world = vec![
        Shared::new(1, &[(0, BORDER), (1, MASTER)]).attr(4),
        Shared::new(2, &[(0, MASTER), (2, BORDER)]),
    ];
    let mut store = store_for(0, &world);
    let mut reg = InterfaceRegistry::default();
    let id = reg.define(TypeMask::ALL, &[MASTER], &[BORDER]).unwrap();
    reg.build(id, &store, &comms[0]).unwrap();
    assert_eq!(reg.neighbours(id).unwrap(), vec![1, 2]);
    assert_eq!(reg.interface(id).unwrap().partition(1).unwrap().count(Direction::BA), 1);

    // object 1 becomes the master copy; the old master turns ghost
    let o = store.find(1).unwrap();
    store.set_prio(o, MASTER).unwrap();
    store.add_coupling(o, 1, GHOST, 1).unwrap();
    store.set_attr(o, 9).unwrap();
    reg.build(id, &store, &comms[0]).unwrap();
    let view = reg.interface(id).unwrap();
    assert!(view.partition(1).is_none());

    let o2 = store.find(2).unwrap();
    store.clear_couplings(o2).unwrap();
    reg.build(id, &store, &comms[0]).unwrap();
    assert!(reg.interface(id).unwrap().is_empty());
    assert!(store.neighbour_ranks().contains(&1));
}
