//! Randomized checks of the binary join decomposition.
//!
//! Joins of random size, type and key arity are generated; every successful plan
//! must form a chain over exactly the tables of the join, and every failure must
//! name exactly the tables that cannot be linked to the anchor.

use join_schema_server::error::SchemaError;
use join_schema_server::schema::{JoinPlan, ResolvedSchema, StepKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

struct GeneratedJoin {
    doc: String,
    tables: Vec<String>,
    arities: Vec<usize>,
    join_type: &'static str,
    preserve: Option<usize>,
}

fn generate(rng: &mut StdRng, mixed_arity: bool) -> GeneratedJoin {
    let n = rng.gen_range(2..=7);
    let tables: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
    let base = rng.gen_range(1..=3);
    let arities: Vec<usize> = (0..n)
        .map(|_| {
            if mixed_arity && rng.gen_bool(0.3) {
                rng.gen_range(1..=3)
            } else {
                base
            }
        })
        .collect();

    let join_type = match rng.gen_range(0..4) {
        0 => "inner",
        1 => "left",
        2 => "right",
        _ => "outer",
    };
    let preserve = (join_type == "outer" && (n > 2 || rng.gen_bool(0.5)))
        .then(|| rng.gen_range(0..n));

    let mut doc = String::from("name: generated\ntables:\n");
    for table in &tables {
        doc.push_str(&format!(
            "  - name: {table}\n    index_columns: [k0]\n    columns:\n"
        ));
        for k in 0..3 {
            doc.push_str(&format!("      - {{name: k{k}, datatype: long}}\n"));
        }
    }
    doc.push_str(&format!("joins:\n  - type: {join_type}\n"));
    if let Some(p) = preserve {
        doc.push_str(&format!("    preserve: {}\n", tables[p]));
    }
    doc.push_str("    matches:\n");
    for (table, arity) in tables.iter().zip(&arities) {
        let keys: Vec<String> = (0..*arity).map(|k| format!("k{k}")).collect();
        doc.push_str(&format!("      {table}: [{}]\n", keys.join(", ")));
    }

    GeneratedJoin {
        doc,
        tables,
        arities,
        join_type,
        preserve,
    }
}

fn expected_anchor(join: &GeneratedJoin) -> usize {
    match (join.join_type, join.preserve) {
        ("right", _) => join.tables.len() - 1,
        ("outer", Some(p)) => p,
        _ => 0,
    }
}

fn check_chain(plan: &JoinPlan, join: &GeneratedJoin) {
    let anchor = expected_anchor(join);
    assert_eq!(plan.anchor, join.tables[anchor], "{}", join.doc);
    assert_eq!(plan.steps.len(), join.tables.len() - 1, "{}", join.doc);

    // Each step attaches one new table to a table that is already joined.
    let mut joined: BTreeSet<&str> = BTreeSet::from([plan.anchor.as_str()]);
    for step in &plan.steps {
        assert!(joined.contains(step.left.as_str()), "{}", join.doc);
        assert!(joined.insert(step.right.as_str()), "{}", join.doc);
        assert_eq!(step.left_keys.len(), step.right_keys.len());
        let expected_kind = match (join.join_type, join.preserve) {
            ("inner", _) => StepKind::Inner,
            ("outer", None) => StepKind::FullOuter,
            _ => StepKind::LeftOuter,
        };
        assert_eq!(step.kind, expected_kind, "{}", join.doc);
    }

    let declared: BTreeSet<&str> = join.tables.iter().map(String::as_str).collect();
    assert_eq!(joined, declared, "{}", join.doc);
    let planned: BTreeSet<&str> = plan.tables.iter().map(String::as_str).collect();
    assert_eq!(planned, declared, "{}", join.doc);
}

#[test]
fn test_uniform_arity_joins_always_form_a_chain() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let join = generate(&mut rng, false);
        let schema = ResolvedSchema::from_yaml_str(&join.doc)
            .unwrap_or_else(|e| panic!("{e}\n{}", join.doc));
        check_chain(&schema.plans[0], &join);
    }
}

#[test]
fn test_mixed_arity_joins_chain_or_name_disconnected_tables() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..300 {
        let join = generate(&mut rng, true);
        let anchor = expected_anchor(&join);
        let disconnected: Vec<String> = join
            .tables
            .iter()
            .zip(&join.arities)
            .filter(|(_, arity)| **arity != join.arities[anchor])
            .map(|(table, _)| table.clone())
            .collect();

        match ResolvedSchema::from_yaml_str(&join.doc) {
            Ok(schema) => {
                assert!(disconnected.is_empty(), "{}", join.doc);
                check_chain(&schema.plans[0], &join);
            }
            Err(SchemaError::JoinPlanUnreachable { join: path, tables }) => {
                assert_eq!(path, "joins[0]");
                assert_eq!(tables, disconnected, "{}", join.doc);
            }
            Err(other) => panic!("unexpected error {other}\n{}", join.doc),
        }
    }
}
