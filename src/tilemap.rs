/// Row-major 2D storage. Horizontal indices wrap modulo the width, vertical
/// indices must already be in range.
///
/// Projection rules (which columns of a row are real surface) live in
/// [`crate::projection::GridProjection`]; this type only stores values.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self::new_with(width, height, T::default())
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` on a size mismatch.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x % self.width
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Strict lookup: `None` for anything outside `[0,width) x [0,height)`.
    pub fn get_checked(&self, x: i64, y: i64) -> Option<&T> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize)
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Build a new map of the same shape by transforming every value.
    pub fn map<U: Clone>(&self, f: impl Fn(&T) -> U) -> Tilemap<U> {
        Tilemap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// 4-connected neighbours, wrapping east-west and stopping at the poles.
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);
        result.push(((x + self.width - 1) % self.width, y));
        result.push(((x + 1) % self.width, y));
        if y > 0 {
            result.push((x, y - 1));
        }
        if y + 1 < self.height {
            result.push((x, y + 1));
        }
        result
    }

    /// 8-connected neighbours with the same wrapping rules as [`Self::neighbors`].
    pub fn neighbors_8(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(8);
        for dy in -1i64..=1 {
            let ny = y as i64 + dy;
            if ny < 0 || ny >= self.height as i64 {
                continue;
            }
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x as i64 + dx).rem_euclid(self.width as i64) as usize;
                result.push((nx, ny as usize));
            }
        }
        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data
            .iter_mut()
            .enumerate()
            .map(move |(idx, val)| (idx % width, idx / width, val))
    }
}
