//! Quick benchmark to verify key completion and sync performance

use std::time::Instant;

use formsync::similarity::{best_match, ACCEPTANCE_THRESHOLD};
use formsync::{shared, Binder, BindingRegistry, ConfigTree, ControlHandle, HeadlessControl};

fn main() {
    let identifiers: Vec<String> = (0..200)
        .map(|i| format!("section_{}_field_{}", i / 10, i % 10))
        .collect();
    let pool: Vec<&str> = identifiers.iter().map(String::as_str).collect();

    let keys = vec!["section_3_field", "field_7", "sectoin_12_feild_4", "xyz123"];

    println!("Key Completion Performance Test");
    println!("===============================\n");

    for key in &keys {
        let iterations = 1_000;
        let start = Instant::now();

        let mut found = None;
        for _ in 0..iterations {
            found = best_match(key, pool.iter().copied(), ACCEPTANCE_THRESHOLD);
        }

        let elapsed = start.elapsed();
        let per_op = elapsed / iterations;

        println!("Key: {:30} -> {:?}", format!("\"{}\"", key), found.map(|(id, _)| id));
        println!("  Time for {} iterations over {} controls: {:?}", iterations, pool.len(), elapsed);
        println!("  Per operation: {:?}\n", per_op);
    }

    println!("Push/Pull Performance");
    println!("=====================\n");

    let controls: Vec<ControlHandle> = identifiers
        .iter()
        .map(|id| ControlHandle::SingleLineText(HeadlessControl::new(id.as_str(), String::new())))
        .collect();
    let tree: ConfigTree = identifiers
        .iter()
        .map(|id| (id.clone(), format!("value of {}", id)))
        .collect();

    let registry = BindingRegistry::new();
    let binder = match Binder::builder("bench", &registry)
        .data(shared(tree))
        .build(&controls)
    {
        Ok(binder) => binder,
        Err(e) => {
            eprintln!("bench binder failed: {}", e);
            return;
        }
    };

    let iterations = 1_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = binder.push_to_controls();
        let _ = binder.pull_from_controls();
    }
    let elapsed = start.elapsed();

    println!("{} hooks x {} push+pull cycles:", binder.hooks().len(), iterations);
    println!("  Total:         {:?}", elapsed);
    println!("  Per cycle:     {:?}", elapsed / iterations);
}
