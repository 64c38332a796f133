//! A quadratic-split R-tree with a fixed node fanout (§3, §4.3, §9).
//!
//! This is the data structure a [`super::SpatialIndex`] wraps in a
//! shared/exclusive lock; by itself it has no locking or parallelism — that
//! lives one layer up, where batches are built and merged before a single
//! call into the tree.
//!
//! Deletion does not rebalance or reclaim underfull nodes: an emptied leaf
//! is simply left in place. That keeps the removal path a one-pass
//! predicate filter instead of a second reinsertion phase, at the cost of a
//! few dead branches after heavy churn — acceptable for a structure that is
//! rebuilt from the CSV on every process restart anyway.

use crate::coord::Mbr;

#[derive(Debug, Clone)]
pub struct Entry {
    pub mbr: Mbr,
    pub payload: String,
}

enum Node {
    Leaf(Vec<Entry>),
    Internal(Vec<(Mbr, Box<Node>)>),
}

impl Node {
    fn insert(&mut self, entry: Entry, fanout: usize, min_group: usize) -> Option<(Mbr, Node)> {
        match self {
            Node::Leaf(entries) => {
                entries.push(entry);
                if entries.len() > fanout {
                    let (group_a, group_b) =
                        quadratic_split(std::mem::take(entries), |e| e.mbr, min_group);
                    *entries = group_a;
                    let sibling_mbr = envelope_of(&group_b, |e| e.mbr);
                    Some((sibling_mbr, Node::Leaf(group_b)))
                } else {
                    None
                }
            }
            Node::Internal(children) => {
                let idx = choose_subtree(children, &entry.mbr);
                let split = children[idx].1.insert(entry, fanout, min_group);
                children[idx].0 = children[idx].1.mbr();
                if let Some((new_mbr, new_node)) = split {
                    children.push((new_mbr, Box::new(new_node)));
                }
                if children.len() > fanout {
                    let (group_a, group_b) =
                        quadratic_split(std::mem::take(children), |(m, _)| *m, min_group);
                    let sibling_mbr = envelope_of(&group_b, |(m, _)| *m);
                    *children = group_a;
                    Some((sibling_mbr, Node::Internal(group_b)))
                } else {
                    None
                }
            }
        }
    }

    fn mbr(&self) -> Mbr {
        match self {
            Node::Leaf(entries) => envelope_of(entries, |e| e.mbr),
            Node::Internal(children) => envelope_of(children, |(m, _)| *m),
        }
    }

    fn search_into<'a>(&'a self, query: &Mbr, out: &mut Vec<&'a Entry>) {
        match self {
            Node::Leaf(entries) => {
                for e in entries {
                    if e.mbr.intersects(query) {
                        out.push(e);
                    }
                }
            }
            Node::Internal(children) => {
                for (mbr, child) in children {
                    if mbr.intersects(query) {
                        child.search_into(query, out);
                    }
                }
            }
        }
    }

    fn remove_matching(&mut self, predicate: &dyn Fn(&str) -> bool, removed: &mut Vec<Entry>) {
        match self {
            Node::Leaf(entries) => {
                let mut i = 0;
                while i < entries.len() {
                    if predicate(&entries[i].payload) {
                        removed.push(entries.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
            Node::Internal(children) => {
                for (_, child) in children.iter_mut() {
                    child.remove_matching(predicate, removed);
                }
            }
        }
    }
}

fn envelope_of<T>(items: &[T], mbr_of: impl Fn(&T) -> Mbr) -> Mbr {
    let mut it = items.iter();
    let first = it.next().expect("envelope of empty node");
    let mut m = mbr_of(first);
    for item in it {
        m = m.union(&mbr_of(item));
    }
    m
}

fn choose_subtree(children: &[(Mbr, Box<Node>)], mbr: &Mbr) -> usize {
    let mut best = 0;
    let mut best_enlargement = f64::MAX;
    let mut best_area = f64::MAX;
    for (i, (child_mbr, _)) in children.iter().enumerate() {
        let enlargement = child_mbr.enlargement(mbr);
        let area = child_mbr.area();
        if enlargement < best_enlargement || (enlargement == best_enlargement && area < best_area)
        {
            best = i;
            best_enlargement = enlargement;
            best_area = area;
        }
    }
    best
}

/// Guillaume/Gunther-style quadratic split: pick the pair of items that
/// would waste the most area if kept together as seeds, then assign the
/// rest by least enlargement, topping off whichever group would otherwise
/// fall under `min_group`.
fn quadratic_split<T>(mut items: Vec<T>, mbr_of: impl Fn(&T) -> Mbr, min_group: usize) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let mut seed_a = 0;
    let mut seed_b = 1;
    let mut worst_waste = f64::MIN;
    for i in 0..n {
        for j in (i + 1)..n {
            let mi = mbr_of(&items[i]);
            let mj = mbr_of(&items[j]);
            let waste = mi.union(&mj).area() - mi.area() - mj.area();
            if waste > worst_waste {
                worst_waste = waste;
                seed_a = i;
                seed_b = j;
            }
        }
    }

    let (lo, hi) = if seed_a < seed_b {
        (seed_a, seed_b)
    } else {
        (seed_b, seed_a)
    };
    let item_b = items.remove(hi);
    let item_a = items.remove(lo);

    let mut mbr_a = mbr_of(&item_a);
    let mut mbr_b = mbr_of(&item_b);
    let mut group_a = vec![item_a];
    let mut group_b = vec![item_b];

    while !items.is_empty() {
        if group_a.len() + items.len() <= min_group {
            group_a.extend(items.drain(..));
            break;
        }
        if group_b.len() + items.len() <= min_group {
            group_b.extend(items.drain(..));
            break;
        }

        let mut pick = 0;
        let mut best_diff = f64::MIN;
        let mut enl_a = 0.0;
        let mut enl_b = 0.0;
        for (idx, item) in items.iter().enumerate() {
            let m = mbr_of(item);
            let a = mbr_a.enlargement(&m);
            let b = mbr_b.enlargement(&m);
            let diff = (a - b).abs();
            if diff > best_diff {
                best_diff = diff;
                pick = idx;
                enl_a = a;
                enl_b = b;
            }
        }

        let item = items.remove(pick);
        let m = mbr_of(&item);
        let goes_to_a = enl_a < enl_b
            || (enl_a == enl_b && (mbr_a.area() < mbr_b.area() || group_a.len() <= group_b.len()));
        if goes_to_a {
            mbr_a = mbr_a.union(&m);
            group_a.push(item);
        } else {
            mbr_b = mbr_b.union(&m);
            group_b.push(item);
        }
    }

    (group_a, group_b)
}

pub struct RTree {
    root: Node,
    fanout: usize,
    min_group: usize,
    count: usize,
}

impl RTree {
    #[must_use]
    pub fn new(fanout: usize) -> Self {
        let fanout = fanout.max(2);
        Self {
            root: Node::Leaf(Vec::new()),
            fanout,
            min_group: ((fanout + 1) / 4).max(1),
            count: 0,
        }
    }

    pub fn insert(&mut self, entry: Entry) {
        if let Some((sibling_mbr, sibling_node)) =
            self.root.insert(entry, self.fanout, self.min_group)
        {
            let old_root = std::mem::replace(&mut self.root, Node::Leaf(Vec::new()));
            let old_mbr = old_root.mbr();
            self.root = Node::Internal(vec![
                (old_mbr, Box::new(old_root)),
                (sibling_mbr, Box::new(sibling_node)),
            ]);
        }
        self.count += 1;
    }

    pub fn insert_batch(&mut self, entries: Vec<Entry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    #[must_use]
    pub fn search(&self, query: &Mbr) -> Vec<&Entry> {
        let mut out = Vec::new();
        if self.count > 0 {
            self.root.search_into(query, &mut out);
        }
        out
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<&Entry> {
        let mut out = Vec::with_capacity(self.count);
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a Entry>) {
            match node {
                Node::Leaf(entries) => out.extend(entries.iter()),
                Node::Internal(children) => {
                    for (_, child) in children {
                        walk(child, out);
                    }
                }
            }
        }
        walk(&self.root, &mut out);
        out
    }

    pub fn remove_matching(&mut self, predicate: impl Fn(&str) -> bool) -> Vec<Entry> {
        let mut removed = Vec::new();
        self.root.remove_matching(&predicate, &mut removed);
        self.count -= removed.len();
        removed
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, x: f64, y: f64) -> Entry {
        Entry {
            mbr: Mbr::degenerate(crate::model::Point::new(x, y)),
            payload: format!("{id},Point"),
        }
    }

    #[test]
    fn search_finds_intersecting_entries_after_splits() {
        let mut tree = RTree::new(4);
        for i in 0..200u64 {
            tree.insert(entry(i, i as f64, i as f64));
        }
        assert_eq!(tree.size(), 200);

        let query = Mbr {
            min_x: 10.0,
            min_y: 10.0,
            max_x: 20.0,
            max_y: 20.0,
        };
        let hits = tree.search(&query);
        assert_eq!(hits.len(), 11); // ids 10..=20
    }

    #[test]
    fn remove_matching_drops_only_targeted_ids() {
        let mut tree = RTree::new(4);
        for i in 0..50u64 {
            tree.insert(entry(i, i as f64, 0.0));
        }
        let removed = tree.remove_matching(|payload| {
            let id: u64 = payload.split(',').next().unwrap().parse().unwrap();
            id % 2 == 0
        });
        assert_eq!(removed.len(), 25);
        assert_eq!(tree.size(), 25);
    }

    #[test]
    fn at_most_one_entry_per_id_after_dedup_insert() {
        let mut tree = RTree::new(64);
        tree.insert(entry(1, 1.0, 1.0));
        tree.insert(entry(1, 1.0, 1.0));
        // The tree itself does not dedup — that is SpatialIndex::build_from's job.
        assert_eq!(tree.size(), 2);
    }
}
