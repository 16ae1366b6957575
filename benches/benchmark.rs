use criterion::{Criterion, criterion_group, criterion_main};
use netwick::{load_newick_str, parse_tree_str};

const TIP_COUNTS: &[usize] = &[100, 1000];

/// Builds a ladder tree string with `tips` leaves and unit branch lengths.
fn ladder_newick(tips: usize) -> String {
    let mut out = String::from("(t0:1.0,t1:1.0)");
    for tip in 2..tips {
        out = format!("({out}:1.0,t{tip}:1.0)");
    }
    out.push(';');
    out
}

fn parsing(c: &mut Criterion) {
    for &tips in TIP_COUNTS {
        let newick = ladder_newick(tips);
        c.bench_function(&format!("parse-{tips}"), |b| {
            b.iter(|| parse_tree_str(&newick).unwrap());
        });
    }
}

fn traversal_and_layout(c: &mut Criterion) {
    for &tips in TIP_COUNTS {
        let newick = ladder_newick(tips);
        c.bench_function(&format!("traverse-{tips}"), |b| {
            let mut tree = parse_tree_str(&newick).unwrap();
            b.iter(|| tree.traverse().unwrap());
        });
        c.bench_function(&format!("draw-{tips}"), |b| {
            let mut tree = parse_tree_str(&newick).unwrap();
            b.iter(|| tree.draw_tree().unwrap());
        });
    }
}

fn full_pipeline(c: &mut Criterion) {
    let newick = ladder_newick(500);
    c.bench_function("load-500", |b| {
        b.iter(|| load_newick_str(&newick).unwrap());
    });
}

criterion_group!(parse, parsing);
criterion_group!(derive, traversal_and_layout);
criterion_group! {
    name = pipeline;
    config = Criterion::default().sample_size(10);
    targets = full_pipeline
}
criterion_main!(parse, derive, pipeline);
