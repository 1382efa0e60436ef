//! FUSE adapter over the faceted resolver.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, Request,
};
use libc::{c_int, EIO, ENOENT, ENOTDIR};
use tracing::{debug, info};

use crate::database::index::IndexStore;
use crate::fs::inode::{child_path, InodeTable};
use crate::resolve::{EntryKind, Resolution, Resolver};

const BLOCK_SIZE: u64 = 512;
const NAME_MAX: u32 = 255;

/// Read-only tag tree.
///
/// Owns the frozen index. The kernel serialises callbacks through `&mut
/// self`, so the SQLite connection is never shared between threads.
pub struct TagFs {
    store: IndexStore,
    inodes: InodeTable,
    ttl: Duration,
    uid: u32,
    gid: u32,
    mounted_at: SystemTime,
}

impl TagFs {
    /// Directories are owned by whoever owns `source`.
    pub fn new(store: IndexStore, source: &Path, ttl: Duration) -> Self {
        let (uid, gid) = match fs::metadata(source) {
            Ok(meta) => (meta.uid(), meta.gid()),
            Err(e) => {
                debug!("Cannot stat source {:?} ({}), directories owned by root", source, e);
                (0, 0)
            }
        };
        Self {
            store,
            inodes: InodeTable::new(),
            ttl,
            uid,
            gid,
            mounted_at: SystemTime::now(),
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, c_int> {
        self.inodes.path(ino).map(str::to_string).ok_or(ENOENT)
    }

    fn dir_attr(&self, ino: u64) -> FileAttr {
        FileAttr {
            ino,
            size: 0,
            blocks: 0,
            atime: self.mounted_at,
            mtime: self.mounted_at,
            ctime: self.mounted_at,
            crtime: self.mounted_at,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    /// Attributes of a leaf, taken from the real file but presented as a link.
    fn link_attr(&self, ino: u64, real_path: &Path) -> Result<FileAttr, c_int> {
        let meta = fs::metadata(real_path).map_err(|e| os_errno(&e))?;
        let atime = meta.accessed().unwrap_or(UNIX_EPOCH);
        let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
        let ctime = UNIX_EPOCH + Duration::from_secs(meta.ctime().max(0) as u64);

        Ok(FileAttr {
            ino,
            size: meta.len(),
            blocks: meta.len().div_ceil(BLOCK_SIZE),
            atime,
            mtime,
            ctime,
            crtime: ctime,
            kind: FileType::Symlink,
            perm: (meta.mode() & 0o7777) as u16,
            nlink: 1,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        })
    }

    fn attr_at(&self, ino: u64, path: &str) -> Result<FileAttr, c_int> {
        match Resolver::new(&self.store).resolve(path) {
            Ok(Resolution::Root) | Ok(Resolution::Directory(_)) => Ok(self.dir_attr(ino)),
            Ok(Resolution::Link(file)) => self.link_attr(ino, &file.real_path),
            Err(e) => {
                debug!("{}: {}", path, e);
                Err(e.errno())
            }
        }
    }

    pub fn attr_of(&self, ino: u64) -> Result<FileAttr, c_int> {
        let path = self.path_of(ino)?;
        self.attr_at(ino, &path)
    }

    /// Resolves `name` under `parent` and records a kernel lookup of the
    /// result. The caller owes a matching `forget`.
    pub fn lookup_child(&mut self, parent: u64, name: &str) -> Result<FileAttr, c_int> {
        let parent_path = self.path_of(parent)?;
        if name.is_empty() || name.contains('/') {
            return Err(ENOENT);
        }
        let path = child_path(&parent_path, name);
        // Resolve before allocating so failed lookups leave no inode behind.
        let resolution = Resolver::new(&self.store).resolve(&path).map_err(|e| {
            debug!("lookup {}: {}", path, e);
            e.errno()
        })?;
        let ino = self.inodes.lookup(&path);
        match resolution {
            Resolution::Link(file) => self.link_attr(ino, &file.real_path),
            Resolution::Root | Resolution::Directory(_) => Ok(self.dir_attr(ino)),
        }
    }

    pub fn link_target(&self, ino: u64) -> Result<PathBuf, c_int> {
        let path = self.path_of(ino)?;
        Resolver::new(&self.store).read_link(&path).map_err(|e| {
            debug!("readlink {}: {}", path, e);
            e.errno()
        })
    }

    /// Full listing of a directory inode, `.` and `..` included. Listing
    /// allocates no inodes.
    pub fn dir_entries(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>, c_int> {
        let path = self.path_of(ino)?;
        let listed = Resolver::new(&self.store).list(&path).map_err(|e| {
            debug!("readdir {}: {}", path, e);
            e.errno()
        })?;

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (self.inodes.parent_ino(&path), FileType::Directory, "..".to_string()),
        ];
        for entry in listed {
            if entry.name.is_empty() || entry.name.contains('/') {
                debug!("Skipping unrepresentable entry {:?} in {}", entry.name, path);
                continue;
            }
            let kind = match entry.kind {
                EntryKind::File => FileType::Symlink,
                EntryKind::Attribute | EntryKind::Value => FileType::Directory,
            };
            let child = self.inodes.entry_ino(&child_path(&path, &entry.name));
            entries.push((child, kind, entry.name));
        }
        Ok(entries)
    }

    pub fn forget_inode(&mut self, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    pub fn open_dir(&self, ino: u64) -> Result<(), c_int> {
        match self.attr_of(ino)?.kind {
            FileType::Directory => Ok(()),
            _ => Err(ENOTDIR),
        }
    }
}

fn os_errno(e: &io::Error) -> c_int {
    e.raw_os_error().unwrap_or(EIO)
}

impl Filesystem for TagFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut fuser::KernelConfig) -> Result<(), c_int> {
        info!("Tag tree ready: {} files indexed", self.store.file_count().unwrap_or(0));
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("FUSE destroy");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = name.to_string_lossy();
        debug!("lookup: parent={}, name={}", parent, name);
        match self.lookup_child(parent, &name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        debug!("forget: ino={}, nlookup={}", ino, nlookup);
        self.forget_inode(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr: ino={}", ino);
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        debug!("readlink: ino={}", ino);
        match self.link_target(ino) {
            Ok(target) => reply.data(target.as_os_str().as_encoded_bytes()),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir: ino={}", ino);
        match self.open_dir(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);
        let entries = match self.dir_entries(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        for (i, (entry_ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        debug!("access: ino={}, mask={}", ino, mask);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let files = self.store.file_count().unwrap_or(0) as u64;
        reply.statfs(0, 0, 0, files, 0, BLOCK_SIZE as u32, NAME_MAX, BLOCK_SIZE as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::inode::ROOT_INO;
    use crate::ingest::scanner::tests::scan;
    use crate::utils::config::TagFsConfig;
    use anyhow::Result;

    struct Mounted {
        _dir: tempfile::TempDir,
        root: PathBuf,
        fs: TagFs,
    }

    fn mounted() -> Result<Mounted> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().to_path_buf();
        fs::write(root.join("doc.pdf"), "Author: Alice, Bob\nTitle: Report\n")?;
        fs::write(root.join("memo.txt"), "Author: Alice\n")?;
        let (store, _) = scan(&root, &TagFsConfig::default())?;
        let fs = TagFs::new(store, &root, Duration::from_secs(1));
        Ok(Mounted { _dir: dir, root, fs })
    }

    fn names(entries: &[(u64, FileType, String)]) -> Vec<&str> {
        entries.iter().map(|(_, _, name)| name.as_str()).collect()
    }

    #[test]
    fn test_root_attr_is_a_directory() -> Result<()> {
        let m = mounted()?;
        let attr = m.fs.attr_of(ROOT_INO).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.perm, 0o755);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.uid, fs::metadata(&m.root)?.uid());
        Ok(())
    }

    #[test]
    fn test_readdir_root_lists_attributes() -> Result<()> {
        let m = mounted()?;
        let entries = m.fs.dir_entries(ROOT_INO).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(names(&entries), vec![".", "..", "author", "title"]);
        assert_eq!(entries[1].0, ROOT_INO);
        Ok(())
    }

    #[test]
    fn test_walk_down_to_a_link() -> Result<()> {
        let mut m = mounted()?;
        let author = m.fs.lookup_child(ROOT_INO, "author").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(author.kind, FileType::Directory);

        let alice = m.fs.lookup_child(author.ino, "Alice").map_err(io::Error::from_raw_os_error)?;
        let entries = m.fs.dir_entries(alice.ino).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(names(&entries), vec![".", "..", "doc.pdf", "memo.txt", "Bob"]);
        assert_eq!(entries[1].0, author.ino);
        assert_eq!(entries[2].1, FileType::Symlink);
        assert_eq!(entries[4].1, FileType::Directory);

        let doc = m.fs.lookup_child(alice.ino, "doc.pdf").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(doc.kind, FileType::Symlink);
        assert_eq!(doc.nlink, 1);
        assert_eq!(doc.size, fs::metadata(m.root.join("doc.pdf"))?.len());
        assert_eq!(m.fs.link_target(doc.ino), Ok(m.root.join("doc.pdf")));

        let relisted = m.fs.dir_entries(alice.ino).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(relisted[2].0, doc.ino);
        Ok(())
    }

    #[test]
    fn test_listing_allocates_no_inodes() -> Result<()> {
        let mut m = mounted()?;
        let author = m.fs.lookup_child(ROOT_INO, "author").map_err(io::Error::from_raw_os_error)?;
        let before = m.fs.inodes.len();

        let first = m.fs.dir_entries(author.ino).map_err(io::Error::from_raw_os_error)?;
        let second = m.fs.dir_entries(author.ino).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(first, second);
        assert_eq!(m.fs.inodes.len(), before);
        Ok(())
    }

    #[test]
    fn test_forget_releases_looked_up_inodes() -> Result<()> {
        let mut m = mounted()?;
        let before = m.fs.inodes.len();
        let author = m.fs.lookup_child(ROOT_INO, "author").map_err(io::Error::from_raw_os_error)?;
        let alice = m.fs.lookup_child(author.ino, "Alice").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(m.fs.inodes.len(), before + 2);

        m.fs.forget_inode(alice.ino, 1);
        m.fs.forget_inode(author.ino, 1);
        assert_eq!(m.fs.inodes.len(), before);
        assert_eq!(m.fs.attr_of(alice.ino).map(|a| a.ino), Err(ENOENT));
        m.fs.forget_inode(ROOT_INO, 1);
        assert!(m.fs.attr_of(ROOT_INO).is_ok());
        Ok(())
    }

    #[test]
    fn test_blank_value_is_not_listed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("doc.pdf"), "Title:  \n")?;
        let (store, _) = scan(dir.path(), &TagFsConfig::default())?;
        let mut tagfs = TagFs::new(store, dir.path(), Duration::from_secs(1));

        let title = tagfs.lookup_child(ROOT_INO, "title").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(title.kind, FileType::Directory);
        let entries = tagfs.dir_entries(title.ino).map_err(io::Error::from_raw_os_error)?;
        assert_eq!(names(&entries), vec![".", "..", "doc.pdf"]);
        Ok(())
    }

    #[test]
    fn test_errors_map_to_errno() -> Result<()> {
        let mut m = mounted()?;
        assert_eq!(m.fs.lookup_child(ROOT_INO, "nosuchattr").map(|a| a.ino), Err(ENOENT));
        assert_eq!(m.fs.attr_of(9999).map(|a| a.ino), Err(ENOENT));
        assert_eq!(m.fs.link_target(ROOT_INO), Err(ENOENT));

        let author = m.fs.lookup_child(ROOT_INO, "author").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(m.fs.lookup_child(author.ino, "missing.pdf").map(|a| a.ino), Err(ENOENT));

        let doc = m.fs.lookup_child(author.ino, "doc.pdf").map_err(io::Error::from_raw_os_error)?;
        assert_eq!(m.fs.dir_entries(doc.ino).map(|e| e.len()), Err(ENOTDIR));
        assert_eq!(m.fs.open_dir(doc.ino), Err(ENOTDIR));
        assert_eq!(m.fs.open_dir(author.ino), Ok(()));
        Ok(())
    }

    #[test]
    fn test_vanished_file_reports_stat_errno() -> Result<()> {
        let mut m = mounted()?;
        let author = m.fs.lookup_child(ROOT_INO, "author").map_err(io::Error::from_raw_os_error)?;
        let doc = m.fs.lookup_child(author.ino, "doc.pdf").map_err(io::Error::from_raw_os_error)?;
        fs::remove_file(m.root.join("doc.pdf"))?;
        assert_eq!(m.fs.attr_of(doc.ino).map(|a| a.ino), Err(ENOENT));
        Ok(())
    }

    #[test]
    fn test_failed_lookup_allocates_no_inode() -> Result<()> {
        let mut m = mounted()?;
        let before = m.fs.inodes.len();
        let _ = m.fs.lookup_child(ROOT_INO, "nosuchattr");
        let _ = m.fs.lookup_child(ROOT_INO, "bad/name");
        assert_eq!(m.fs.inodes.len(), before);
        Ok(())
    }
}
