//! Inode numbers for virtual paths.
//!
//! The kernel addresses entries by inode while the resolver works on paths.
//! Only `lookup` hands out inodes, and each one lives until the kernel
//! forgets every lookup of it. Directory listings reuse a live inode when
//! there is one and otherwise report a provisional number derived from the
//! path, which is never stored.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

pub const ROOT_INO: u64 = 1;

/// Set on every provisional inode so it cannot collide with an allocated one.
const PROVISIONAL_BIT: u64 = 1 << 63;

struct Node {
    path: String,
    lookups: u64,
}

pub struct InodeTable {
    nodes: HashMap<u64, Node>,
    inodes: HashMap<String, u64>,
    next_ino: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            nodes: HashMap::new(),
            inodes: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        table.nodes.insert(
            ROOT_INO,
            Node {
                path: "/".to_string(),
                lookups: 0,
            },
        );
        table.inodes.insert("/".to_string(), ROOT_INO);
        table
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.nodes.get(&ino).map(|node| node.path.as_str())
    }

    /// Records one kernel lookup of `path` and returns its inode.
    pub fn lookup(&mut self, path: &str) -> u64 {
        let ino = match self.inodes.get(path) {
            Some(ino) => *ino,
            None => {
                let ino = self.next_ino;
                self.next_ino += 1;
                self.nodes.insert(
                    ino,
                    Node {
                        path: path.to_string(),
                        lookups: 0,
                    },
                );
                self.inodes.insert(path.to_string(), ino);
                ino
            }
        };
        if let Some(node) = self.nodes.get_mut(&ino) {
            node.lookups += 1;
        }
        ino
    }

    /// Drops `nlookup` lookups of `ino`, releasing it when none are left.
    /// The root is never released.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        let released = match self.nodes.get_mut(&ino) {
            Some(node) => {
                node.lookups = node.lookups.saturating_sub(nlookup);
                node.lookups == 0
            }
            None => false,
        };
        if released {
            if let Some(node) = self.nodes.remove(&ino) {
                self.inodes.remove(&node.path);
            }
        }
    }

    /// Inode to report for `path` in a listing, without allocating.
    pub fn entry_ino(&self, path: &str) -> u64 {
        match self.inodes.get(path) {
            Some(ino) => *ino,
            None => provisional_ino(path),
        }
    }

    /// Listing inode of the directory containing `path`; the root is its own
    /// parent.
    pub fn parent_ino(&self, path: &str) -> u64 {
        self.entry_ino(&parent_path(path))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn provisional_ino(path: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish() | PROVISIONAL_BIT
}

pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

pub fn parent_path(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}
