//! Connected components of a dark-pixel mask.
//!
//! Run-length labeling with a union-find over runs; runs in adjacent rows
//! are joined when they touch, including diagonally (8-connectivity).

/// Disjoint-set forest over run indices.
struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: u32) -> u32 {
        let mut root = i;
        while self.parent[root as usize] != root {
            self.parent[root as usize] = self.parent[self.parent[root as usize] as usize];
            root = self.parent[root as usize];
        }
        root
    }

    fn union(&mut self, i: u32, j: u32) {
        let ri = self.find(i);
        let rj = self.find(j);
        if ri == rj {
            return;
        }
        match self.rank[ri as usize].cmp(&self.rank[rj as usize]) {
            std::cmp::Ordering::Less => self.parent[ri as usize] = rj,
            std::cmp::Ordering::Greater => self.parent[rj as usize] = ri,
            std::cmp::Ordering::Equal => {
                self.parent[ri as usize] = rj;
                self.rank[rj as usize] += 1;
            }
        }
    }
}

/// Bounding box and pixel count of one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ComponentStats {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
    pub pixel_count: usize,
}

impl ComponentStats {
    fn empty() -> Self {
        Self {
            min_x: usize::MAX,
            max_x: 0,
            min_y: usize::MAX,
            max_y: 0,
            pixel_count: 0,
        }
    }

    pub fn bbox_width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn bbox_height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    pub fn fill_ratio(&self) -> f32 {
        self.pixel_count as f32 / (self.bbox_width() * self.bbox_height()) as f32
    }
}

/// Labeled mask: `labels[i] == 0` is background, `k > 0` belongs to
/// `stats[k - 1]`.
pub(crate) struct Components {
    pub width: usize,
    pub labels: Vec<u32>,
    pub stats: Vec<ComponentStats>,
}

#[derive(Clone, Copy, Debug)]
struct Run {
    y: usize,
    x_start: usize,
    x_end: usize, // inclusive
}

pub(crate) fn label_components(mask: &[bool], width: usize, height: usize) -> Components {
    let mut runs = Vec::new();
    // Index of the first run of each row, plus a sentinel.
    let mut row_start = Vec::with_capacity(height + 1);

    for y in 0..height {
        row_start.push(runs.len());
        let row = &mask[y * width..(y + 1) * width];
        let mut x = 0;
        while x < width {
            if row[x] {
                let start = x;
                while x < width && row[x] {
                    x += 1;
                }
                runs.push(Run {
                    y,
                    x_start: start,
                    x_end: x - 1,
                });
            } else {
                x += 1;
            }
        }
    }
    row_start.push(runs.len());

    let mut uf = UnionFind::new(runs.len());
    for y in 1..height {
        let prev = row_start[y - 1]..row_start[y];
        let curr = row_start[y]..row_start[y + 1];
        let mut p = prev.start;
        for c in curr {
            let run = runs[c];
            // Skip previous-row runs that end left of the diagonal neighbour.
            while p < prev.end && runs[p].x_end + 1 < run.x_start {
                p += 1;
            }
            let mut q = p;
            while q < prev.end && runs[q].x_start <= run.x_end + 1 {
                uf.union(c as u32, q as u32);
                q += 1;
            }
        }
    }

    let mut root_to_label = vec![0u32; runs.len()];
    let mut stats: Vec<ComponentStats> = Vec::new();
    let mut labels = vec![0u32; width * height];

    for (i, run) in runs.iter().enumerate() {
        let root = uf.find(i as u32) as usize;
        if root_to_label[root] == 0 {
            stats.push(ComponentStats::empty());
            root_to_label[root] = stats.len() as u32;
        }
        let label = root_to_label[root];
        let s = &mut stats[label as usize - 1];
        s.min_x = s.min_x.min(run.x_start);
        s.max_x = s.max_x.max(run.x_end);
        s.min_y = s.min_y.min(run.y);
        s.max_y = s.max_y.max(run.y);
        s.pixel_count += run.x_end - run.x_start + 1;

        let row = run.y * width;
        labels[row + run.x_start..=row + run.x_end].fill(label);
    }

    Components {
        width,
        labels,
        stats,
    }
}

impl Components {
    /// Extremal pixels of component `label`: the leftmost and rightmost
    /// pixel of every row plus the topmost and bottommost of every column.
    ///
    /// Every convex-hull vertex of the component is among these points.
    pub fn outline_points(&self, label: u32) -> Vec<(f64, f64)> {
        let s = self.stats[label as usize - 1];
        let mut pts = Vec::with_capacity(2 * (s.bbox_width() + s.bbox_height()));

        for y in s.min_y..=s.max_y {
            let row = &self.labels[y * self.width..(y + 1) * self.width];
            let first = (s.min_x..=s.max_x).find(|&x| row[x] == label);
            let last = (s.min_x..=s.max_x).rev().find(|&x| row[x] == label);
            if let (Some(a), Some(b)) = (first, last) {
                pts.push((a as f64, y as f64));
                if b != a {
                    pts.push((b as f64, y as f64));
                }
            }
        }

        for x in s.min_x..=s.max_x {
            let at = |y: usize| self.labels[y * self.width + x] == label;
            let first = (s.min_y..=s.max_y).find(|&y| at(y));
            let last = (s.min_y..=s.max_y).rev().find(|&y| at(y));
            if let (Some(a), Some(b)) = (first, last) {
                pts.push((x as f64, a as f64));
                if b != a {
                    pts.push((x as f64, b as f64));
                }
            }
        }

        pts
    }
}
