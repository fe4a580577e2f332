//! File records produced by traversal and consumed by the archive codec.
//!
//! A [`FileRecord`] captures one directory entry with the POSIX metadata the
//! ustar format can carry: type, size, permission bits, mtime, ownership
//! (both numeric and by name), the symlink target, and device numbers.
//! Records are plain data and are not mutated after construction.

use std::ffi::CStr;
use std::path::PathBuf;

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link (not followed).
    Symlink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
    /// Anything the platform reports that does not fit the above.
    Unknown,
}

impl FileKind {
    /// Returns true for device entries (character or block).
    pub fn is_device(&self) -> bool {
        matches!(self, FileKind::CharDevice | FileKind::BlockDevice)
    }
}

/// A logical file entry: one node of the traversed tree.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path relative to the chosen root, forward slashes, no leading slash.
    pub relative_path: String,
    /// Absolute path on disk, used to read file bodies during packing.
    pub absolute_path: PathBuf,
    /// Entry kind.
    pub kind: FileKind,
    /// Size in bytes (0 for non-regular entries).
    pub size: u64,
    /// Full `st_mode`; only the low 9 permission bits are archived.
    pub mode: u32,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Owner name from the user database, or the decimal uid as a fallback.
    pub owner_name: String,
    /// Group name from the group database, or the decimal gid as a fallback.
    pub group_name: String,
    /// Symlink target; `None` for everything but symlinks.
    pub link_target: Option<String>,
    /// Device (major, minor); `None` for non-device entries.
    pub device: Option<(u32, u32)>,
}

impl FileRecord {
    /// Returns true if this record is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Returns true if this record is a regular file.
    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::Regular
    }

    /// Returns the low 9 permission bits as stored in the archive.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o777
    }
}

/// Resolves a uid to a user name via the OS user database.
///
/// Returns the decimal uid as a string when the lookup fails, so the archive
/// always carries *some* owner identity.
pub(crate) fn resolve_user_name(uid: u32) -> String {
    lookup_user(uid).unwrap_or_else(|| uid.to_string())
}

/// Resolves a gid to a group name, falling back to the decimal gid.
pub(crate) fn resolve_group_name(gid: u32) -> String {
    lookup_group(gid).unwrap_or_else(|| gid.to_string())
}

fn lookup_user(uid: u32) -> Option<String> {
    let mut buf = vec![0u8; 1024];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    loop {
        let rc = unsafe {
            libc::getpwuid_r(
                uid,
                &mut pwd,
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return name.to_str().ok().map(str::to_owned);
    }
}

fn lookup_group(gid: u32) -> Option<String> {
    let mut buf = vec![0u8; 1024];
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::group = std::ptr::null_mut();

    loop {
        let rc = unsafe {
            libc::getgrgid_r(
                gid,
                &mut grp,
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return name.to_str().ok().map(str::to_owned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(kind: FileKind) -> FileRecord {
        FileRecord {
            relative_path: "dir/file.txt".into(),
            absolute_path: PathBuf::from("/tmp/dir/file.txt"),
            kind,
            size: 42,
            mode: 0o100644,
            mtime: 1_700_000_000,
            uid: 1000,
            gid: 1000,
            owner_name: "user".into(),
            group_name: "user".into(),
            link_target: None,
            device: None,
        }
    }

    #[test]
    fn test_permissions_masks_type_bits() {
        let rec = sample_record(FileKind::Regular);
        assert_eq!(rec.permissions(), 0o644);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(sample_record(FileKind::Directory).is_dir());
        assert!(sample_record(FileKind::Regular).is_regular());
        assert!(FileKind::CharDevice.is_device());
        assert!(FileKind::BlockDevice.is_device());
        assert!(!FileKind::Symlink.is_device());
    }

    #[test]
    fn test_resolve_user_name_falls_back_to_decimal() {
        // uid 0 resolves to "root" on every sane Unix; an absurd uid does not.
        assert_eq!(resolve_user_name(0), "root");
        assert_eq!(resolve_user_name(0xFFFF_FFF0), "4294967280");
    }
}
