use netwick::error::TreeError;
use netwick::{BranchIndex, Tree, load_newick_str, parse_tree_str};

fn find_tip(tree: &Tree, name: &str) -> BranchIndex {
    tree.external_branches()
        .into_iter()
        .find(|&i| tree[i].name() == Some(name))
        .unwrap_or_else(|| panic!("no tip named {name}"))
}

// --- TESTS TRAVERSAL ---
#[test]
fn heights_satisfy_parent_plus_length() {
    let mut tree = parse_tree_str("((A:1,B:2):1.5,(C:0.5,D:2.5):1):0;").unwrap();
    tree.traverse().unwrap();
    for &i in tree.objects() {
        if let Some(p) = tree[i].parent {
            assert_eq!(
                tree[i].height.unwrap(),
                tree[p].height.unwrap() + tree[i].length
            );
        }
    }
    assert_eq!(tree.tree_height(), 3.5); // D: 1 + 2.5
}

#[test]
fn node_leaves_are_union_of_children() {
    let mut tree = parse_tree_str("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();
    tree.traverse().unwrap();
    for &i in &tree.internal_branches() {
        let mut expected = std::collections::BTreeSet::new();
        for &c in tree[i].children() {
            if tree[c].is_node() {
                expected.extend(tree[c].leaf_names().unwrap().iter().cloned());
            } else {
                expected.insert(tree[c].name().unwrap().to_string());
            }
        }
        assert_eq!(tree[i].leaf_names().unwrap(), &expected);
    }
}

#[test]
fn repeated_traversal_is_idempotent() {
    let mut tree = parse_tree_str("((A:1,B:2):1.5,(C:0.5,D:2.5):1):0;").unwrap();
    tree.traverse().unwrap();
    let heights: Vec<_> = tree.objects().iter().map(|&i| tree[i].height).collect();
    let leaf_sets: Vec<_> = tree
        .internal_branches()
        .iter()
        .map(|&i| tree[i].leaf_names().unwrap().clone())
        .collect();
    let tree_height = tree.tree_height();

    tree.traverse().unwrap();
    assert_eq!(
        heights,
        tree.objects().iter().map(|&i| tree[i].height).collect::<Vec<_>>()
    );
    assert_eq!(
        leaf_sets,
        tree.internal_branches()
            .iter()
            .map(|&i| tree[i].leaf_names().unwrap().clone())
            .collect::<Vec<_>>()
    );
    assert_eq!(tree_height, tree.tree_height());
}

// --- TESTS SORTING ---
#[test]
fn descending_sort_puts_internal_children_first() {
    let mut tree = parse_tree_str("(A:1,(B:1,C:1):1):0;").unwrap();
    tree.sort_branches(true).unwrap();
    let tips = tree.traverse().unwrap();
    let names: Vec<_> = tips.iter().map(|&i| tree[i].name().unwrap()).collect();
    assert_eq!(names, ["B", "C", "A"]);

    tree.sort_branches(false).unwrap();
    let tips = tree.traverse().unwrap();
    let names: Vec<_> = tips.iter().map(|&i| tree[i].name().unwrap()).collect();
    assert_eq!(names, ["A", "B", "C"]);
}

// --- TESTS MULTITYPE CONTRACTION ---
#[test]
fn single_type_splices_singleton_chains() {
    let mut tree = parse_tree_str("((A:1.0)1[&rate=0.5]:1.0,B:2.0):0.0;").unwrap();
    tree.single_type().unwrap();

    // the singleton node is gone, its length was added to A's
    let a = find_tip(&tree, "A");
    assert_eq!(tree[a].length, 2.0);
    assert!(
        tree.internal_branches()
            .iter()
            .all(|&i| tree[i].children().len() >= 2)
    );
}

// --- TESTS COLLAPSE / UNCOLLAPSE ---
#[test]
fn collapse_subtree_and_restore() {
    let mut tree = load_newick_str("((A:1,B:1):1,C:2):0;").unwrap();
    let root = tree.root();
    let top = tree[root].children()[0];
    let inner = tree[top].children()[0];
    assert!(tree[inner].is_node());

    let clade = tree.collapse_subtree(inner, "cladeX", None).unwrap();
    assert_eq!(tree.num_objects(), 4); // root, top, clade, C
    let names: Vec<_> = tree
        .external_branches()
        .iter()
        .map(|&i| tree[i].name().unwrap().to_string())
        .collect();
    assert!(names.contains(&"cladeX".to_string()));
    assert!(!names.contains(&"A".to_string()));

    // the clade remembers the collapsed descent
    let leaves: Vec<_> = tree[clade].leaf_names().unwrap().iter().cloned().collect();
    assert_eq!(leaves, ["A", "B"]);
    tree.traverse().unwrap();
    assert_eq!(tree.tree_height(), 2.0); // the collapsed tips still count

    tree.uncollapse_subtree().unwrap();
    assert_eq!(tree.num_objects(), 6);
    let mut names = tree.tip_names();
    names.sort();
    assert_eq!(names, ["A", "B", "C"]);
}

#[test]
fn collapsing_the_root_is_fatal() {
    let mut tree = load_newick_str("((A:1,B:1):1,C:2):0;").unwrap();
    let root = tree.root();
    assert_eq!(
        tree.collapse_subtree(root, "everything", None),
        Err(TreeError::CollapseWholeTree(root))
    );
}

// --- TESTS COLLAPSE BRANCHES ---
#[test]
fn collapse_all_internal_nodes_yields_polytomy() {
    let source = load_newick_str("((A:1,B:1):1,(C:1,D:1):2):0;").unwrap();
    let collapsed = source.collapse_branches(Some(&|_: &netwick::Branch| true), &[]).unwrap();

    // the original is untouched
    assert_eq!(source.num_objects(), 8);

    // all four tips hang off one polytomy, lengths summed along each path
    assert_eq!(collapsed[collapsed.root()].children().len(), 4);
    assert_eq!(collapsed[find_tip(&collapsed, "A")].length, 2.0);
    assert_eq!(collapsed[find_tip(&collapsed, "B")].length, 2.0);
    assert_eq!(collapsed[find_tip(&collapsed, "C")].length, 3.0);
    assert_eq!(collapsed[find_tip(&collapsed, "D")].length, 3.0);
}

#[test]
fn collapse_by_support_trait() {
    let newick = "((A:1,B:1)0.3[&support=0.3]:1,(C:1,D:1)0.9[&support=0.9]:2):0;";
    let source = load_newick_str(newick).unwrap();
    let collapsed = source.collapse_branches(None, &[]).unwrap();

    // only the low-support node dissolves
    let top = collapsed[collapsed.root()].children()[0];
    assert_eq!(collapsed[top].children().len(), 3);
    let mut names = collapsed.tip_names();
    names.sort();
    assert_eq!(names, ["A", "B", "C", "D"]);
}

#[test]
fn explicit_collapse_list_rejects_tips_and_root() {
    let tree = load_newick_str("((A:1,B:1):1,C:2):0;").unwrap();
    let a = find_tip(&tree, "A");
    assert_eq!(
        tree.collapse_branches(None, &[a]).unwrap_err(),
        TreeError::NotANode(a)
    );
    assert_eq!(
        tree.collapse_branches(None, &[tree.root()]).unwrap_err(),
        TreeError::RootCollapse
    );
}

// --- TESTS REDUCTION ---
#[test]
fn reduce_tree_keeps_minimal_embedding() {
    let source = load_newick_str("((A:1,B:1):1,(C:1,D:1):2):0;").unwrap();
    let keep = [find_tip(&source, "A"), find_tip(&source, "D")];
    let mut reduced = source.reduce_tree(&keep).unwrap();

    let mut names = reduced.tip_names();
    names.sort();
    assert_eq!(names, ["A", "D"]);

    // path lengths to the kept tips are preserved
    reduced.traverse().unwrap();
    assert_eq!(reduced[find_tip(&reduced, "A")].height, Some(2.0));
    assert_eq!(reduced[find_tip(&reduced, "D")].height, Some(3.0));

    // contracting the leftover single-child nodes sums the pruned stems
    reduced.single_type().unwrap();
    assert_eq!(reduced[find_tip(&reduced, "A")].length, 2.0);
    assert_eq!(reduced[find_tip(&reduced, "D")].length, 3.0);

    // the original is untouched
    assert_eq!(source.num_objects(), 8);
}

#[test]
fn reduce_tree_rejects_empty_and_internal() {
    let tree = load_newick_str("((A:1,B:1):1,C:2):0;").unwrap();
    assert_eq!(tree.reduce_tree(&[]).unwrap_err(), TreeError::EmptyReduction);
    let root = tree.root();
    let top = tree[root].children()[0];
    assert_eq!(
        tree.reduce_tree(&[top]).unwrap_err(),
        TreeError::NotTipLike(top)
    );
}

// --- TESTS ANCESTRY ---
#[test]
fn common_ancestor_of_sibling_tips() {
    let mut tree = parse_tree_str("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();
    tree.traverse().unwrap();
    let a = find_tip(&tree, "A");
    let b = find_tip(&tree, "B");
    let mrca = tree.common_ancestor(&[a, b]).unwrap();
    assert_eq!(tree[a].parent, Some(mrca));
    assert_eq!(tree[b].parent, Some(mrca));

    let c = find_tip(&tree, "C");
    let deeper = tree.common_ancestor(&[a, c]).unwrap();
    assert!(tree[deeper].height.unwrap() < tree[mrca].height.unwrap());

    assert_eq!(tree.common_ancestor(&[a]), Err(TreeError::NotEnoughBranches));
}

#[test]
fn tmrca_matrix_orders_pairs_by_divergence() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    tree.traverse().unwrap();
    tree.set_absolute_time(2020.0);

    let matrix = tree.all_tmrcas();
    // A and B diverged more recently (2019) than either did from C (2018),
    // so the time *to* their common ancestor is shorter
    assert_eq!(matrix["A"]["B"], 2019.0);
    assert_eq!(matrix["A"]["C"], 2018.0);
    assert_eq!(matrix["B"]["C"], 2018.0);
    assert_eq!(matrix["A"]["A"], 0.0);
    assert_eq!(matrix["B"]["A"], matrix["A"]["B"]);
}

#[test]
fn count_lineages_across_time_slices() {
    let mut tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    tree.traverse().unwrap();
    tree.set_absolute_time(2020.0);

    assert_eq!(tree.count_lineages(2019.5), 3); // A, B and C all cross
    assert_eq!(tree.count_lineages(2018.5), 2); // the (A,B) ancestor and C
    assert_eq!(
        tree.count_lineages_with(2019.5, &|b| b.absolute_time, &|b| b.is_leaf()),
        3
    );
}

// --- TESTS HANGING NODES ---
#[test]
fn fix_hanging_nodes_removes_empty_nodes() {
    let mut tree = Tree::new();
    let top = tree.attach_node(tree.root()).unwrap();
    let empty = tree.attach_node(top).unwrap();
    tree.attach_leaf(top, "A").unwrap();

    assert_eq!(tree.traverse().unwrap_err(), TreeError::HangingNode(empty));
    tree.fix_hanging_nodes();
    assert!(!tree.objects().contains(&empty));
    tree.traverse().unwrap();
    assert_eq!(tree.tip_names(), ["A"]);
}

#[test]
fn reduce_tree_prunes_emptied_nodes() {
    let tree = parse_tree_str("((A:1,B:1):1,C:2):0;").unwrap();
    let root = tree.root();
    let top = tree[root].children()[0];
    let inner = tree[top].children()[0];

    let reduced = tree.reduce_tree(&[find_tip(&tree, "C")]).unwrap();
    assert!(!reduced.objects().contains(&inner));
    assert_eq!(reduced.tip_names(), ["C"]);
}
