//! Union-find connected components over a pairwise-correlation graph.
//!
//! A column's membership in a `QuasiIdentifierGroup` falls naturally out of
//! which component it lands in: since components partition the vertex set,
//! the "assigned to at most one group" invariant holds without any extra
//! bookkeeping.

pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    pub fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Groups of indices sharing a root, in first-seen order. Singleton
    /// components (no edges joined them to anything) are included; callers
    /// filter those out since a lone column isn't a quasi-identifier group.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        for i in 0..n {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_merges_components() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 2);
        let mut components = uf.components();
        components.sort_by_key(|c| c.len());
        assert_eq!(components.last().unwrap().len(), 3);
    }

    #[test]
    fn disjoint_elements_stay_singletons() {
        let mut uf = UnionFind::new(3);
        let components = uf.components();
        assert_eq!(components.len(), 3);
    }
}
