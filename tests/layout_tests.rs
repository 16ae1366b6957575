use netwick::layout::LayoutOptions;
use netwick::{BranchIndex, Tree, load_newick_str, parse_tree_str, untangle};

fn find_tip(tree: &Tree, name: &str) -> BranchIndex {
    tree.external_branches()
        .into_iter()
        .find(|&i| tree[i].name() == Some(name))
        .unwrap_or_else(|| panic!("no tip named {name}"))
}

fn tip_order(tree: &Tree) -> Vec<String> {
    let mut tips: Vec<BranchIndex> = tree.external_branches();
    tips.sort_by(|&a, &b| {
        tree[a]
            .y
            .partial_cmp(&tree[b].y)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tips.iter()
        .map(|&i| tree[i].name().unwrap().to_string())
        .collect()
}

// --- TESTS RECTANGULAR LAYOUT ---
#[test]
fn tips_stack_in_visit_order() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    tree.draw_tree().unwrap();

    assert_eq!(tree[find_tip(&tree, "A")].y, Some(0.5));
    assert_eq!(tree[find_tip(&tree, "B")].y, Some(1.5));
    assert_eq!(tree[find_tip(&tree, "C")].y, Some(2.5));
    assert_eq!(tree.y_span(), 3.0);

    // x is height
    assert_eq!(tree[find_tip(&tree, "A")].x, Some(2.0));
    assert_eq!(tree[find_tip(&tree, "C")].x, Some(2.0));
}

#[test]
fn internal_nodes_sit_at_child_mean() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    tree.draw_tree().unwrap();

    let root = tree.root();
    let top = tree[root].children()[0];
    let inner = tree[top].children()[0];
    assert_eq!(tree[inner].y, Some(1.0)); // mean of A (0.5) and B (1.5)
    assert_eq!(tree[top].y, Some(1.75)); // mean of inner (1.0) and C (2.5)
    assert_eq!(tree[inner].x, Some(1.0));
}

#[test]
fn explicit_order_overrides_visit_order() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    let order: Vec<String> = ["C", "A", "B"].iter().map(|s| s.to_string()).collect();
    tree.draw_tree_with(&LayoutOptions {
        order: Some(&order),
        ..LayoutOptions::default()
    })
    .unwrap();

    assert_eq!(tip_order(&tree), ["C", "A", "B"]);
}

#[test]
fn unknown_tip_in_order_is_fatal() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    let order: Vec<String> = ["A", "B", "Z"].iter().map(|s| s.to_string()).collect();
    let err = tree
        .draw_tree_with(&LayoutOptions {
            order: Some(&order),
            ..LayoutOptions::default()
        })
        .unwrap_err();
    assert_eq!(err, netwick::TreeError::UnknownTip("Z".to_string()));
}

#[test]
fn pad_nodes_reserve_vertical_space() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    tree.traverse().unwrap();
    let root = tree.root();
    let top = tree[root].children()[0];
    let inner = tree[top].children()[0];

    tree.draw_tree_with(&LayoutOptions {
        pad_nodes: &[(inner, 1.0)],
        ..LayoutOptions::default()
    })
    .unwrap();

    // one unit above and below the (A,B) block
    assert_eq!(tree[find_tip(&tree, "A")].y, Some(1.5));
    assert_eq!(tree[find_tip(&tree, "B")].y, Some(2.5));
    assert_eq!(tree[find_tip(&tree, "C")].y, Some(4.5));
    assert_eq!(tree.y_span(), 5.0);
}

#[test]
fn collapsed_clades_take_their_width() {
    let mut tree = load_newick_str("((A:1,B:1):1,C:2):0;").unwrap();
    let root = tree.root();
    let top = tree[root].children()[0];
    let inner = tree[top].children()[0];
    tree.collapse_subtree(inner, "cladeX", None).unwrap();
    tree.draw_tree().unwrap();

    // the clade occupies width + 1 = 2 vertical units
    assert_eq!(tree[find_tip(&tree, "cladeX")].y, Some(1.0));
    assert_eq!(tree[find_tip(&tree, "C")].y, Some(2.5));
    assert_eq!(tree.y_span(), 3.0);
}

// --- TESTS UNROOTED LAYOUT ---
#[test]
fn unrooted_children_sit_one_length_from_parent() {
    let mut tree = parse_tree_str("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();
    tree.draw_unrooted().unwrap();

    for &i in tree.objects() {
        let Some(p) = tree[i].parent else { continue };
        let dx = tree[i].x.unwrap() - tree[p].x.unwrap();
        let dy = tree[i].y.unwrap() - tree[p].y.unwrap();
        let distance = (dx * dx + dy * dy).sqrt();
        assert!(
            (distance - tree[i].length).abs() < 1e-9,
            "branch {i} sits {distance} from its parent, length {}",
            tree[i].length
        );
    }
}

#[test]
fn unrooted_wedges_separate_subtrees() {
    let mut tree = parse_tree_str("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();
    tree.draw_unrooted().unwrap();

    // the two cherries get opposite half-planes
    let ay = tree[find_tip(&tree, "A")].y.unwrap();
    let by = tree[find_tip(&tree, "B")].y.unwrap();
    let cy = tree[find_tip(&tree, "C")].y.unwrap();
    let dy = tree[find_tip(&tree, "D")].y.unwrap();
    assert!(ay >= 0.0 && by >= 0.0);
    assert!(cy <= 0.0 && dy <= 0.0);
}

// --- TESTS UNTANGLER ---
#[test]
fn untangle_is_a_fixed_point_on_agreeing_trees() {
    let newick = "((A:1,B:1):1,(C:1,D:1):1):0;";
    let mut trees = vec![
        load_newick_str(newick).unwrap(),
        load_newick_str(newick).unwrap(),
    ];
    let before: Vec<_> = trees.iter().map(tip_order).collect();

    untangle(&mut trees, None, 3).unwrap();

    let after: Vec<_> = trees.iter().map(tip_order).collect();
    assert_eq!(before, after);
}

#[test]
fn untangle_reorders_a_mirrored_tree() {
    let mut trees = vec![
        load_newick_str("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap(),
        load_newick_str("((D:1,C:1):1,(B:1,A:1):1):0;").unwrap(),
    ];

    untangle(&mut trees, None, 3).unwrap();

    assert_eq!(tip_order(&trees[0]), ["A", "B", "C", "D"]);
    assert_eq!(tip_order(&trees[1]), ["A", "B", "C", "D"]);
}

#[test]
fn untangle_rejects_heavy_polytomies() {
    let polytomy = "(A:1,B:1,C:1,D:1,E:1,F:1,G:1,H:1,I:1,J:1):0;";
    let mut trees = vec![
        load_newick_str(polytomy).unwrap(),
        load_newick_str(polytomy).unwrap(),
    ];
    let err = untangle(&mut trees, None, 1).unwrap_err();
    assert_eq!(err, netwick::TreeError::TooPolytomic(10));
}
