//! Pressed-key tracking
//!
//! Only the four driving keys matter to the scene; any other key name is ignored.

/// Driving keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
}

impl Key {
    pub const ALL: [Key; 4] = [Key::Left, Key::Right, Key::Up, Key::Down];

    /// Map a key name to a driving key.
    ///
    /// Accepts the scene's own names (`LEFT`, `UP`, ...) and browser
    /// `KeyboardEvent.key` values (`ArrowLeft`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LEFT" | "ArrowLeft" => Some(Key::Left),
            "RIGHT" | "ArrowRight" => Some(Key::Right),
            "UP" | "ArrowUp" => Some(Key::Up),
            "DOWN" | "ArrowDown" => Some(Key::Down),
            _ => None,
        }
    }

    #[inline]
    fn bit(self) -> u8 {
        match self {
            Key::Left => 1,
            Key::Right => 2,
            Key::Up => 4,
            Key::Down => 8,
        }
    }
}

/// Set of currently held keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet(u8);

impl KeySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, key: Key) {
        self.0 |= key.bit();
    }

    pub fn remove(&mut self, key: Key) {
        self.0 &= !key.bit();
    }

    #[inline]
    pub fn contains(&self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Whether either steering key is held
    pub fn steering(&self) -> bool {
        self.contains(Key::Left) || self.contains(Key::Right)
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        Key::ALL.into_iter().filter(|k| self.contains(*k))
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_names_are_ignored() {
        let keys: KeySet = ["UP", "SPACE", "w", "ArrowLeft"]
            .into_iter()
            .filter_map(Key::from_name)
            .collect();
        assert!(keys.contains(Key::Up));
        assert!(keys.contains(Key::Left));
        assert!(!keys.contains(Key::Right));
        assert!(!keys.contains(Key::Down));
        assert_eq!(keys.iter().count(), 2);
    }

    #[test]
    fn test_insert_remove() {
        let mut keys = KeySet::new();
        assert!(keys.is_empty());
        keys.insert(Key::Right);
        assert!(keys.steering());
        keys.remove(Key::Right);
        assert!(!keys.steering());
        assert!(keys.is_empty());
    }
}
