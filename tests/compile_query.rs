//! Compile/query round-trip tests for the knowledge base.
//!
//! Each test compiles a small corpus into a temp directory, reopens it in
//! query state (usually through a fresh handle, as a separate process
//! would) and checks the query surface against the inserted axioms.

use std::collections::HashSet;

use peirce::arity::Arity;
use peirce::distance::DistanceProvider;
use peirce::kb::{KbOptions, KnowledgeBase};
use peirce::logic::{AxiomId, Literal, LogicalFunction, Term};
use peirce::postpone::SlotTag;

fn imply(p: &str, q: &str) -> LogicalFunction {
    LogicalFunction::imply(
        LogicalFunction::literal(Literal::new(p, [Term::new("x")])),
        LogicalFunction::literal(Literal::new(q, [Term::new("x")])),
    )
}

fn arity(s: &str) -> Arity {
    Arity::new(s)
}

/// Compile a corpus under `prefix`, then reopen it with a fresh handle.
fn compile_then_open(
    prefix: &std::path::Path,
    options: KbOptions,
    fill: impl FnOnce(&mut KnowledgeBase),
) -> KnowledgeBase {
    {
        let mut kb = KnowledgeBase::new(prefix, options.clone());
        kb.prepare_compile().unwrap();
        fill(&mut kb);
        kb.finalize().unwrap();
    }
    let mut kb = KnowledgeBase::new(prefix, options);
    kb.prepare_query().unwrap();
    kb
}

#[test]
fn single_implication_distances() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
    });

    assert_eq!(kb.distance(&arity("p/1"), &arity("q/1")), Some(1.0));
    assert_eq!(kb.distance(&arity("q/1"), &arity("p/1")), Some(1.0));
    assert_eq!(kb.distance(&arity("p/1"), &arity("p/1")), Some(0.0));
    assert_eq!(kb.distance(&arity("q/1"), &arity("q/1")), Some(0.0));
}

#[test]
fn chained_implications_add_up() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
        kb.insert_implication(imply("q", "r"), "ax2").unwrap();
    });

    assert_eq!(kb.distance(&arity("p/1"), &arity("r/1")), Some(2.0));
}

#[test]
fn cutoff_hides_long_chains() {
    let dir = tempfile::TempDir::new().unwrap();
    let options = KbOptions {
        max_distance: 1.0,
        ..Default::default()
    };
    let kb = compile_then_open(&dir.path().join("kb"), options, |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
        kb.insert_implication(imply("q", "r"), "ax2").unwrap();
    });

    assert_eq!(kb.distance(&arity("p/1"), &arity("q/1")), Some(1.0));
    assert_eq!(kb.distance(&arity("p/1"), &arity("r/1")), None);
    assert_eq!(kb.max_distance(), 1.0);
}

#[test]
fn axiom_groups_union_across_members() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut ax1 = None;
    let mut ax2 = None;
    let mut ax3 = None;
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        ax1 = kb
            .insert_implication(imply("p", "q"), "group_a#ax1")
            .unwrap();
        ax2 = kb
            .insert_implication(imply("q", "r"), "group_a#group_b#ax2")
            .unwrap();
        ax3 = kb.insert_implication(imply("r", "s"), "plain").unwrap();
    });
    let (ax1, ax2, ax3) = (ax1.unwrap(), ax2.unwrap(), ax3.unwrap());

    let group = kb.axiom_group_of(ax1);
    assert!(group.contains(&ax1));
    assert!(group.contains(&ax2));
    assert!(!group.contains(&ax3));
    // ax2 also belongs to group_b, which contains only itself.
    let group2 = kb.axiom_group_of(ax2);
    assert!(group2.contains(&ax1));
    // Ungrouped axioms have no group neighbors.
    assert!(kb.axiom_group_of(ax3).is_empty());
}

#[test]
fn inconsistency_index_covers_both_literals() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut id = None;
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        let inc = LogicalFunction::inconsistent(
            Literal::new("p", [Term::new("x"), Term::new("y")]),
            Literal::new("q", [Term::new("x"), Term::new("y")]),
        );
        id = kb.insert_inconsistency(inc, "inc1").unwrap();
    });
    let id = id.unwrap();

    assert_eq!(kb.inconsistencies_of(&arity("p/2")), vec![id]);
    assert_eq!(kb.inconsistencies_of(&arity("q/2")), vec![id]);
    assert!(kb.inconsistencies_of(&arity("r/1")).is_empty());
}

#[test]
fn postponement_table_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        let decl = LogicalFunction::literal(Literal::new("eq", [Term::new("*"), Term::new(".")]))
            .with_param("2");
        kb.insert_unification_postponement(decl, "unipp-eq").unwrap();
    });

    let pp = kb.unification_postponement(&arity("eq/2")).unwrap();
    assert_eq!(pp.slots(), [SlotTag::Indispensable, SlotTag::Dispensable]);
    // The requested minimum of 2 clamps to the number of `+` slots (none here).
    assert_eq!(pp.min_partial(), 0);
    assert!(kb.unification_postponement(&arity("neq/2")).is_none());
}

#[test]
fn cost_based_distances_sum_weights() {
    let dir = tempfile::TempDir::new().unwrap();
    let options = KbOptions {
        distance_provider: DistanceProvider::CostBased { fallback: -1.0 },
        ..Default::default()
    };
    let kb = compile_then_open(&dir.path().join("kb"), options, |kb| {
        kb.insert_implication(imply("p", "q").with_param(":0.5"), "ax1")
            .unwrap();
        kb.insert_implication(imply("q", "r").with_param(":2"), "ax2")
            .unwrap();
        // No parameter and a negative fallback: contributes no edge.
        kb.insert_implication(imply("p", "z"), "ax3").unwrap();
    });

    assert_eq!(kb.distance(&arity("p/1"), &arity("q/1")), Some(0.5));
    assert_eq!(kb.distance(&arity("p/1"), &arity("r/1")), Some(2.5));
    // z/1 is registered (it appears in an implication) but unreachable.
    assert_eq!(kb.distance(&arity("p/1"), &arity("z/1")), None);
}

#[test]
fn argument_sets_merge_on_shared_members() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        kb.insert_argument_set(LogicalFunction::literal(Literal::new(
            "buy",
            [Term::new("x"), Term::new("y"), Term::new(".")],
        )))
        .unwrap();
        kb.insert_argument_set(LogicalFunction::and(vec![
            LogicalFunction::literal(Literal::new("buy", [Term::new("."), Term::new("y"), Term::new(".")])),
            LogicalFunction::literal(Literal::new("sell", [Term::new("z")])),
        ]))
        .unwrap();
        kb.insert_argument_set(LogicalFunction::literal(Literal::new(
            "own",
            [Term::new("w")],
        )))
        .unwrap();
    });

    let buy0 = kb.argument_set_id(&arity("buy/3"), 0).unwrap();
    let buy1 = kb.argument_set_id(&arity("buy/3"), 1).unwrap();
    let sell0 = kb.argument_set_id(&arity("sell/1"), 0).unwrap();
    let own0 = kb.argument_set_id(&arity("own/1"), 0).unwrap();

    // buy/3 slot 1 bridges the first two declarations.
    assert_eq!(buy0, buy1);
    assert_eq!(buy1, sell0);
    assert_ne!(own0, buy0);
    // The dispensable slot never joined a set.
    assert!(kb.argument_set_id(&arity("buy/3"), 2).is_none());
}

#[test]
fn config_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let prefix = dir.path().join("kb");
    let options = KbOptions {
        max_distance: 4.5,
        distance_provider: DistanceProvider::CostBased { fallback: 0.25 },
        ..Default::default()
    };
    {
        let mut kb = KnowledgeBase::new(&prefix, options);
        kb.prepare_compile().unwrap();
        kb.insert_implication(imply("p", "q").with_param(":1"), "ax1")
            .unwrap();
        kb.finalize().unwrap();
    }

    // A fresh handle with *default* options must restore the compiled
    // provider and cutoff from the config file.
    let mut kb = KnowledgeBase::new(&prefix, KbOptions::default());
    kb.prepare_query().unwrap();
    assert!(kb.is_valid_version());
    assert_eq!(kb.max_distance(), 4.5);
    assert_eq!(
        *kb.distance_provider(),
        DistanceProvider::CostBased { fallback: 0.25 }
    );
}

#[test]
fn stop_words_cut_the_graph_unless_disabled() {
    let dir = tempfile::TempDir::new().unwrap();
    let stop_words: HashSet<Arity> = HashSet::from([arity("q/1")]);

    let options = KbOptions {
        stop_words: stop_words.clone(),
        ..Default::default()
    };
    let kb = compile_then_open(&dir.path().join("kb1"), options, |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
        kb.insert_implication(imply("q", "r"), "ax2").unwrap();
    });
    assert_eq!(kb.distance(&arity("p/1"), &arity("q/1")), None);
    assert_eq!(kb.distance(&arity("p/1"), &arity("r/1")), None);
    assert_eq!(kb.distance(&arity("p/1"), &arity("p/1")), Some(0.0));

    let options = KbOptions {
        stop_words,
        disable_stop_words: true,
        ..Default::default()
    };
    let kb = compile_then_open(&dir.path().join("kb2"), options, |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
        kb.insert_implication(imply("q", "r"), "ax2").unwrap();
    });
    assert_eq!(kb.distance(&arity("p/1"), &arity("r/1")), Some(2.0));
}

#[test]
fn axiom_and_arity_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    let func = LogicalFunction::imply(
        LogicalFunction::and(vec![
            LogicalFunction::literal(Literal::new("buy", [Term::new("e"), Term::new("x")])),
            LogicalFunction::literal(Literal::new("money", [Term::new("m")])),
        ]),
        LogicalFunction::literal(Literal::new("own", [Term::new("x")])),
    );
    let mut inserted = None;
    let mut unnamed = None;
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        inserted = kb.insert_implication(func.clone(), "buy-own").unwrap();
        unnamed = kb.insert_implication(imply("p", "q"), "").unwrap();
    });
    let inserted = inserted.unwrap();

    let ax = kb.get_axiom(inserted).unwrap();
    assert_eq!(ax.name, "buy-own");
    assert_eq!(ax.func, func);
    assert_eq!(ax.id, inserted);

    let anon = kb.get_axiom(unnamed.unwrap()).unwrap();
    assert_eq!(anon.name, "__unnamed_0__");
    assert_eq!(kb.axioms_with_name("__unnamed_0__"), vec![anon.id]);

    // Every arity the axioms touched round-trips through the registry.
    for a in ["buy/2", "money/1", "own/1", "p/1", "q/1"] {
        let arity = arity(a);
        let id = kb.arity_id(&arity).unwrap();
        assert_eq!(kb.arity_of(id), Some(&arity));
    }

    // Unknown entities degrade to empty.
    assert!(kb.get_axiom(AxiomId(999)).is_none());
    assert!(kb.distance(&arity("ghost/1"), &arity("p/1")).is_none());
}

#[test]
fn inverted_indices_are_sound_and_complete() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut ids = Vec::new();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        for (p, q, name) in [("p", "q", "ax1"), ("p", "r", "ax2"), ("q", "r", "ax3")] {
            ids.push(kb.insert_implication(imply(p, q), name).unwrap().unwrap());
        }
    });

    // Soundness: every id in a bucket really has the arity on that side.
    for id in kb.axioms_with_lhs(&arity("p/1")) {
        let ax = kb.get_axiom(id).unwrap();
        assert!(ax.func.lhs_literals().iter().any(|l| l.arity == arity("p/1")));
    }
    // Completeness: each inserted axiom shows up in its buckets.
    let with_lhs_p = kb.axioms_with_lhs(&arity("p/1"));
    assert!(with_lhs_p.contains(&ids[0]) && with_lhs_p.contains(&ids[1]));
    let with_rhs_r = kb.axioms_with_rhs(&arity("r/1"));
    assert!(with_rhs_r.contains(&ids[1]) && with_rhs_r.contains(&ids[2]));
    assert_eq!(kb.num_axioms(), 3);
}

#[test]
fn matrix_laws_hold_on_a_small_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let corpus = [
        ("p", "q"),
        ("q", "r"),
        ("r", "s"),
        ("p", "s"),
        ("t", "q"),
    ];
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        for (i, (p, q)) in corpus.iter().enumerate() {
            kb.insert_implication(imply(p, q), &format!("ax{i}")).unwrap();
        }
    });

    let arities: Vec<Arity> = ["p/1", "q/1", "r/1", "s/1", "t/1"]
        .iter()
        .map(|s| arity(s))
        .collect();

    for a in &arities {
        // Zero diagonal.
        assert_eq!(kb.distance(a, a), Some(0.0), "diagonal of {a}");
        for b in &arities {
            // Symmetry.
            assert_eq!(kb.distance(a, b), kb.distance(b, a), "symmetry {a},{b}");
            // Triangle inequality through every intermediate.
            for c in &arities {
                if let (Some(ab), Some(bc), Some(ac)) =
                    (kb.distance(a, b), kb.distance(b, c), kb.distance(a, c))
                {
                    assert!(ac <= ab + bc + 1e-6, "triangle {a},{b},{c}");
                }
            }
        }
    }

    // Row distance sets contain what point queries see.
    let from_p = kb.distances_from(&arity("p/1"));
    assert!(from_p.contains(&0.0) && from_p.contains(&1.0));
}

#[test]
fn cutoff_bounds_every_stored_distance() {
    let dir = tempfile::TempDir::new().unwrap();
    let options = KbOptions {
        max_distance: 2.0,
        ..Default::default()
    };
    let chain = ["a", "b", "c", "d", "e"];
    let kb = compile_then_open(&dir.path().join("kb"), options, |kb| {
        for w in chain.windows(2) {
            kb.insert_implication(imply(w[0], w[1]), "").unwrap();
        }
    });

    for p in &chain {
        for q in &chain {
            if let Some(d) = kb.distance(&Arity::from_parts(p, 1), &Arity::from_parts(q, 1)) {
                assert!(d <= 2.0, "{p} ~ {q} = {d}");
            }
        }
    }
    assert_eq!(kb.distance(&arity("a/1"), &arity("e/1")), None);
}

#[test]
fn recompiling_the_same_corpus_is_deterministic() {
    let dir = tempfile::TempDir::new().unwrap();
    let fill = |kb: &mut KnowledgeBase| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
        kb.insert_implication(imply("q", "r"), "ax2").unwrap();
        kb.insert_implication(imply("p", "r"), "").unwrap();
    };

    let kb1 = compile_then_open(&dir.path().join("one"), KbOptions::default(), fill);
    let kb2 = compile_then_open(&dir.path().join("two"), KbOptions::default(), fill);

    // Byte-identical axiom store.
    let dat1 = std::fs::read(&kb1.files().axioms_dat).unwrap();
    let dat2 = std::fs::read(&kb2.files().axioms_dat).unwrap();
    assert_eq!(dat1, dat2);

    // Equivalent matrix: same distance for every pair.
    for a in ["p/1", "q/1", "r/1"] {
        for b in ["p/1", "q/1", "r/1"] {
            assert_eq!(
                kb1.distance(&arity(a), &arity(b)),
                kb2.distance(&arity(a), &arity(b)),
                "{a} ~ {b}"
            );
        }
    }
}

#[test]
fn distance_cache_is_transparent() {
    let dir = tempfile::TempDir::new().unwrap();
    let kb = compile_then_open(&dir.path().join("kb"), KbOptions::default(), |kb| {
        kb.insert_implication(imply("p", "q"), "ax1").unwrap();
    });

    let first = kb.distance(&arity("p/1"), &arity("q/1"));
    let cached = kb.distance(&arity("p/1"), &arity("q/1"));
    assert_eq!(first, cached);
    kb.clear_distance_cache();
    assert_eq!(kb.distance(&arity("p/1"), &arity("q/1")), first);
}

#[test]
fn parallel_build_matches_serial_build() {
    let dir = tempfile::TempDir::new().unwrap();
    let fill = |kb: &mut KnowledgeBase| {
        // A braided graph big enough to spread across workers.
        for i in 0..20 {
            kb.insert_implication(imply(&format!("n{i}"), &format!("n{}", i + 1)), "")
                .unwrap();
        }
        for i in 0..10 {
            kb.insert_implication(imply(&format!("n{i}"), &format!("n{}", i + 5)), "")
                .unwrap();
        }
    };

    let serial = compile_then_open(
        &dir.path().join("serial"),
        KbOptions {
            threads: 1,
            ..Default::default()
        },
        fill,
    );
    let parallel = compile_then_open(
        &dir.path().join("parallel"),
        KbOptions {
            threads: 4,
            ..Default::default()
        },
        fill,
    );

    for i in 0..=20 {
        for j in 0..=20 {
            let a = Arity::from_parts(&format!("n{i}"), 1);
            let b = Arity::from_parts(&format!("n{j}"), 1);
            assert_eq!(serial.distance(&a, &b), parallel.distance(&a, &b), "n{i} ~ n{j}");
        }
    }
}
